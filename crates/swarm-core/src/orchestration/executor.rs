//! Step executor: runs one agent against the current work log.

use std::sync::Arc;

use crate::agents::{Agent, Speaker};
use crate::completion::{ChatMessage, CompletionClient};
use crate::error::SwarmError;
use crate::work_log::{WorkItem, WorkLog};

/// Produces an agent's contribution. Has no side effects; persisting the
/// result is the orchestrator's job.
pub struct StepExecutor {
    client: Arc<dyn CompletionClient>,
}

impl StepExecutor {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    /// Build the request for `agent`: its directive followed by the log.
    pub fn build_messages(agent: Agent, log: &WorkLog) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(log.len() + 1);
        messages.push(ChatMessage::system(agent.system_directive()));
        messages.extend(log.to_messages());
        messages
    }

    /// Run `agent` and wrap its answer as the next work item.
    pub async fn execute(&self, agent: Agent, log: &WorkLog) -> Result<WorkItem, SwarmError> {
        let messages = Self::build_messages(agent, log);
        let content = self
            .client
            .complete(&messages)
            .await
            .map_err(|source| SwarmError::Completion { agent, source })?;

        Ok(WorkItem::new(Speaker::Agent(agent), content, log.next_sequence()))
    }
}
