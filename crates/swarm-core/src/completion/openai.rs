//! OpenAI-compatible chat completions backend.
//!
//! POST {base_url}/chat/completions
//! Headers:
//!   Authorization: Bearer {api_key}   (only when a key is configured)
//!   content-type: application/json

use async_trait::async_trait;

use super::{http_client, temperature_value, transport_error, ChatMessage, CompletionClient};
use crate::config::CompletionConfig;
use crate::error::CompletionError;

pub struct OpenAiCompatibleClient {
    client: reqwest::Client,
    config: CompletionConfig,
}

impl OpenAiCompatibleClient {
    pub fn new(config: CompletionConfig) -> Self {
        Self {
            client: http_client(config.timeout_secs),
            config,
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatibleClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": temperature_value(self.config.temperature),
        });

        tracing::debug!(
            "[OpenAI] Calling {} (model: {}, {} messages)",
            url,
            self.config.model,
            messages.len()
        );

        let mut request = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.bearer_auth(key);
        }

        let response = request
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

        parse_chat_completion(&response_text)
    }
}

fn parse_chat_completion(body: &str) -> Result<String, CompletionError> {
    let json: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| CompletionError::InvalidResponse(format!("not JSON: {}", e)))?;

    let content = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|msg| msg.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| {
            CompletionError::InvalidResponse("missing choices[0].message.content".to_string())
        })?;

    Ok(content.to_string())
}
