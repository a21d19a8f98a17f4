use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Owner of workflows. Identified by email; no credentials are stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: String, email: String, full_name: Option<String>) -> Self {
        Self {
            id,
            email,
            full_name,
            created_at: Utc::now(),
        }
    }
}
