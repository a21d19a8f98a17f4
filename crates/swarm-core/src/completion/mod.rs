//! Completion capability: the text-generation backend the agents call.
//!
//! The orchestrator only sees the `CompletionClient` trait: an ordered list
//! of role-tagged messages goes in, generated text comes out. Two HTTP
//! implementations are provided:
//!
//! ```text
//! CompletionConfig ──► build_client ──► OllamaClient           POST {base}/api/chat
//!                                   └─► OpenAiCompatibleClient POST {base}/chat/completions
//! ```

pub mod ollama;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{CompletionConfig, CompletionProvider};
use crate::error::CompletionError;

pub use ollama::OllamaClient;
pub use openai::OpenAiCompatibleClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message of a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A request/response text-generation backend.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError>;
}

/// Build the client selected by the configuration.
pub fn build_client(config: &CompletionConfig) -> Arc<dyn CompletionClient> {
    match config.provider {
        CompletionProvider::Ollama => Arc::new(OllamaClient::new(config.clone())),
        CompletionProvider::OpenAi => Arc::new(OpenAiCompatibleClient::new(config.clone())),
    }
}

pub(crate) fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Map a reqwest failure onto the completion error taxonomy.
pub(crate) fn transport_error(err: reqwest::Error, timeout_secs: u64) -> CompletionError {
    if err.is_timeout() {
        CompletionError::Timeout(timeout_secs)
    } else {
        CompletionError::Transport(err.to_string())
    }
}

pub(crate) fn temperature_value(temperature: f64) -> serde_json::Value {
    serde_json::Number::from_f64(temperature)
        .map(serde_json::Value::Number)
        .unwrap_or_else(|| serde_json::Value::from(0))
}
