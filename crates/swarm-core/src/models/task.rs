use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Durable record of one step of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub workflow_id: String,
    /// Position of the task within its workflow; matches work log order.
    pub sequence: i64,
    pub title: String,
    pub assigned_agent: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        id: String,
        workflow_id: String,
        sequence: i64,
        title: String,
        assigned_agent: String,
        status: TaskStatus,
        input_payload: Option<serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            workflow_id,
            sequence,
            title,
            assigned_agent,
            status,
            input_payload,
            output_payload: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Wrap step output the way the API exposes it: `{"result": "..."}`.
    pub fn result_payload(text: &str) -> serde_json::Value {
        serde_json::json!({ "result": text })
    }

    /// The textual result recorded in `output_payload`, if any.
    pub fn result(&self) -> Option<&str> {
        self.output_payload
            .as_ref()
            .and_then(|p| p.get("result"))
            .and_then(|r| r.as_str())
    }
}
