//! Core error types for SwarmOS.
//!
//! `SwarmError` is used throughout the core domain (stores, executor,
//! orchestrator). `CompletionError` describes failures of the text
//! completion backend. When the `axum` feature is enabled, `SwarmError`
//! also implements `IntoResponse` so it can be returned from handlers.

use crate::agents::Agent;

/// Failure of the completion capability (LLM backend).
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompletionError {
    #[error("completion request timed out after {0}s")]
    Timeout(u64),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SwarmError {
    #[error("{agent} failed: {source}")]
    Completion {
        agent: Agent,
        #[source]
        source: CompletionError,
    },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// axum integration (opt-in via feature flag)
// ---------------------------------------------------------------------------

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for SwarmError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            SwarmError::Completion { .. } => StatusCode::BAD_GATEWAY,
            SwarmError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SwarmError::NotFound(_) => StatusCode::NOT_FOUND,
            SwarmError::BadRequest(_) => StatusCode::BAD_REQUEST,
            SwarmError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            SwarmError::NotFound(msg) | SwarmError::BadRequest(msg) => msg.clone(),
            other => other.to_string(),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}
