//! Supervisor router: picks the next agent from the accumulated work log.

use std::sync::Arc;

use crate::agents::{supervisor_directive, Agent, RoutingDecision};
use crate::completion::{ChatMessage, CompletionClient};
use crate::error::CompletionError;
use crate::work_log::WorkLog;

/// Result of one routing call.
///
/// `error` is set when the completion backend failed; the decision is then
/// always `Finish`.
#[derive(Debug, Clone)]
pub struct RouterVerdict {
    pub decision: RoutingDecision,
    /// The raw answer the backend gave, when there was one.
    pub raw_answer: Option<String>,
    pub error: Option<CompletionError>,
}

/// Stateless supervisor: every call is a pure function of the log passed in.
pub struct SupervisorRouter {
    client: Arc<dyn CompletionClient>,
}

impl SupervisorRouter {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    pub async fn decide(&self, log: &WorkLog) -> RouterVerdict {
        let mut messages = Vec::with_capacity(log.len() + 1);
        messages.push(ChatMessage::system(supervisor_directive()));
        messages.extend(log.to_messages());

        match self.client.complete(&messages).await {
            Ok(answer) => {
                let decision = parse_routing_answer(&answer);
                tracing::debug!(
                    "[Router] Answer {:?} normalized to {}",
                    answer.trim(),
                    decision
                );
                RouterVerdict {
                    decision,
                    raw_answer: Some(answer),
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!("[Router] Completion failed, finishing workflow: {}", e);
                RouterVerdict {
                    decision: RoutingDecision::Finish,
                    raw_answer: None,
                    error: Some(e),
                }
            }
        }
    }
}

/// Normalize a free-form routing answer.
///
/// Agents are checked in priority order and the first whose name occurs in
/// the answer wins. Anything else, including an explicit `FINISH`, maps to
/// `Finish`.
pub fn parse_routing_answer(answer: &str) -> RoutingDecision {
    let answer = answer.trim();
    Agent::ALL
        .into_iter()
        .find(|agent| answer.contains(agent.as_str()))
        .map(RoutingDecision::Agent)
        .unwrap_or(RoutingDecision::Finish)
}
