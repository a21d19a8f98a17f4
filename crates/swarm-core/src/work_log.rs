//! The work log: ordered, append-only record of one run.

use serde::Serialize;

use crate::agents::Speaker;
use crate::completion::ChatMessage;
use crate::error::SwarmError;

/// One message of the work log. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkItem {
    pub speaker: Speaker,
    pub content: String,
    /// Position in the log; equals the item's index.
    pub sequence: usize,
}

impl WorkItem {
    pub fn new(speaker: Speaker, content: impl Into<String>, sequence: usize) -> Self {
        Self {
            speaker,
            content: content.into(),
            sequence,
        }
    }

    /// Render for the completion backend. Agent output is tagged with the
    /// agent's name so the supervisor can tell who said what.
    pub fn to_message(&self) -> ChatMessage {
        match self.speaker {
            Speaker::User => ChatMessage::user(self.content.clone()),
            Speaker::Agent(agent) => {
                ChatMessage::assistant(format!("{}: {}", agent.as_str(), self.content))
            }
        }
    }
}

/// Append-only sequence of work items owned by a single orchestration run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkLog {
    items: Vec<WorkItem>,
}

impl WorkLog {
    /// A log holding exactly the user's prompt.
    pub fn seeded(prompt: impl Into<String>) -> Self {
        Self {
            items: vec![WorkItem::new(Speaker::User, prompt, 0)],
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn last(&self) -> Option<&WorkItem> {
        self.items.last()
    }

    /// Sequence number the next appended item must carry.
    pub fn next_sequence(&self) -> usize {
        self.items.len()
    }

    /// Append an item produced against the current log.
    ///
    /// Rejects items whose sequence is not the next position, which would
    /// mean the item was produced against a different (stale) log.
    pub fn append(&mut self, item: WorkItem) -> Result<&WorkItem, SwarmError> {
        if item.sequence != self.next_sequence() {
            return Err(SwarmError::Internal(format!(
                "work item sequence {} does not follow log length {}",
                item.sequence,
                self.items.len()
            )));
        }
        self.items.push(item);
        Ok(&self.items[self.items.len() - 1])
    }

    pub fn to_messages(&self) -> Vec<ChatMessage> {
        self.items.iter().map(WorkItem::to_message).collect()
    }
}
