//! Agent roster: the closed set of specialists the supervisor can route to.
//!
//! Agents are plain enum variants carrying a fixed system directive, so an
//! unknown agent can only ever appear at the router's text-normalization
//! boundary and never past it.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

/// Name under which the user's prompt is attributed in the work log.
pub const USER_IDENTITY: &str = "User";

/// Name of the routing identity. Loop-level failures are attributed to it.
pub const SUPERVISOR_IDENTITY: &str = "Supervisor";

/// Wire name of the terminal routing decision.
pub const FINISH: &str = "FINISH";

const SUPERVISOR_DIRECTIVE: &str = "You are the Supervisor. Your team is: [Researcher, Coder]. \
Based on the user's request, decide who should act next. \
Return ONLY the name of the next agent: 'Researcher', 'Coder', or 'FINISH' if done.";

const RESEARCHER_DIRECTIVE: &str = "You are a researcher. Analyze the request.";

const CODER_DIRECTIVE: &str = "You are a Coder. Write the code for the request.";

/// A specialist the supervisor can hand work to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Agent {
    Researcher,
    Coder,
}

impl Agent {
    /// All agents, in routing priority order (first substring match wins).
    pub const ALL: [Agent; 2] = [Agent::Researcher, Agent::Coder];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Researcher => "Researcher",
            Self::Coder => "Coder",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|agent| agent.as_str() == s)
    }

    /// The fixed instruction prepended to the work log when this agent runs.
    pub fn system_directive(&self) -> &'static str {
        match self {
            Self::Researcher => RESEARCHER_DIRECTIVE,
            Self::Coder => CODER_DIRECTIVE,
        }
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The instruction given to the completion backend when routing.
pub fn supervisor_directive() -> &'static str {
    SUPERVISOR_DIRECTIVE
}

/// Who produced a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Agent(Agent),
}

impl Speaker {
    pub fn name(&self) -> &'static str {
        match self {
            Self::User => USER_IDENTITY,
            Self::Agent(agent) => agent.as_str(),
        }
    }
}

impl Serialize for Speaker {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one routing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingDecision {
    Agent(Agent),
    /// Terminal sentinel: the workflow is done.
    Finish,
}

impl RoutingDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent(agent) => agent.as_str(),
            Self::Finish => FINISH,
        }
    }
}

impl fmt::Display for RoutingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
