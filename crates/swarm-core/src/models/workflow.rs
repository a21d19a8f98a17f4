use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::Task;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// `completed` and `failed` are only ever written when the loop exits.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Durable record grouping the tasks of one user request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(id: String, user_id: String, title: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            title,
            status: WorkflowStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A workflow together with its tasks in execution order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowWithTasks {
    #[serde(flatten)]
    pub workflow: Workflow,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// Input for submitting a new workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorkflowInput {
    pub title: String,
    pub initial_prompt: String,
}
