//! Ollama chat backend.
//!
//! POST {base_url}/api/chat
//! Body: `{"model", "messages", "stream": false, "options": {"temperature"}}`
//! Response: `{"message": {"role": "assistant", "content": "..."}, ...}`

use async_trait::async_trait;

use super::{http_client, temperature_value, transport_error, ChatMessage, CompletionClient};
use crate::config::CompletionConfig;
use crate::error::CompletionError;

pub struct OllamaClient {
    client: reqwest::Client,
    config: CompletionConfig,
}

impl OllamaClient {
    pub fn new(config: CompletionConfig) -> Self {
        Self {
            client: http_client(config.timeout_secs),
            config,
        }
    }

    fn request_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "stream": false,
            "options": {
                "temperature": temperature_value(self.config.temperature),
            }
        })
    }
}

#[async_trait]
impl CompletionClient for OllamaClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        let url = format!("{}/api/chat", self.config.base_url.trim_end_matches('/'));

        tracing::debug!(
            "[Ollama] Calling {} (model: {}, {} messages)",
            url,
            self.config.model,
            messages.len()
        );

        let response = self
            .client
            .post(&url)
            .json(&self.request_body(messages))
            .send()
            .await
            .map_err(|e| transport_error(e, self.config.timeout_secs))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| transport_error(e, self.config.timeout_secs))?;

        if !status.is_success() {
            return Err(CompletionError::Api {
                status: status.as_u16(),
                body: response_text,
            });
        }

        parse_chat_response(&response_text)
    }
}

fn parse_chat_response(body: &str) -> Result<String, CompletionError> {
    let json: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| CompletionError::InvalidResponse(format!("not JSON: {}", e)))?;

    if let Some(err) = json.get("error").and_then(|e| e.as_str()) {
        return Err(CompletionError::InvalidResponse(err.to_string()));
    }

    let content = json
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| CompletionError::InvalidResponse("missing message.content".to_string()))?;

    Ok(content.to_string())
}
