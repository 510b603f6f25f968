//! Anthropic Messages API provider implementation.
//!
//! Key differences from OpenAI-compatible APIs:
//! - Auth via `x-api-key` header (not `Authorization: Bearer`)
//! - Required `anthropic-version` header
//! - System message is a top-level `system` field, not in the messages array
//! - `max_tokens` is mandatory

use crate::brain::LlmProvider;
use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::providers::openai_compat::map_transport_error;
use crate::types::{CompletionRequest, CompletionResponse, Message, Role, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

/// The default Anthropic API base URL.
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// The required Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

const DEFAULT_MAX_TOKENS: usize = 4096;

/// Anthropic Messages API provider.
pub struct AnthropicProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: usize,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider from configuration.
    ///
    /// Returns `LlmError::AuthFailed` if the API key environment variable is not set.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| LlmError::AuthFailed {
            provider: format!("Anthropic (env var '{}' not set)", config.api_key_env),
        })?;
        Self::new_with_key(config, api_key)
    }

    /// Create a new Anthropic provider with an explicitly provided API key.
    pub fn new_with_key(config: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| LlmError::Connection {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            max_tokens: if config.max_tokens == 0 {
                DEFAULT_MAX_TOKENS
            } else {
                config.max_tokens
            },
        })
    }

    fn build_request_body(&self, request: &CompletionRequest) -> Value {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let max_tokens = request.max_tokens.unwrap_or(self.max_tokens);

        let (system_text, messages) = Self::split_system(&request.messages);
        let messages_json: Vec<Value> = messages
            .iter()
            .map(|msg| {
                json!({
                    "role": msg.role.as_str(),
                    "content": msg.content,
                })
            })
            .collect();

        let mut body = json!({
            "model": model,
            "max_tokens": max_tokens,
            "temperature": request.temperature,
            "messages": messages_json,
        });
        if let Some(system) = system_text {
            body["system"] = Value::String(system);
        }
        body
    }

    /// Concatenate system messages and return the remaining conversation.
    fn split_system(messages: &[Message]) -> (Option<String>, Vec<&Message>) {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut rest = Vec::new();
        for msg in messages {
            if msg.role == Role::System {
                system_parts.push(&msg.content);
            } else {
                rest.push(msg);
            }
        }
        let system = (!system_parts.is_empty()).then(|| system_parts.join("\n\n"));
        (system, rest)
    }

    fn parse_response(body: &Value) -> Result<CompletionResponse, LlmError> {
        let model = body["model"].as_str().unwrap_or("unknown").to_string();
        let finish_reason = body["stop_reason"].as_str().map(|s| s.to_string());

        let usage = TokenUsage {
            input_tokens: body["usage"]["input_tokens"].as_u64().unwrap_or(0) as usize,
            output_tokens: body["usage"]["output_tokens"].as_u64().unwrap_or(0) as usize,
        };

        let blocks = body["content"]
            .as_array()
            .ok_or_else(|| LlmError::ResponseParse {
                message: "Missing 'content' array in response".to_string(),
            })?;

        let text = blocks
            .iter()
            .filter(|block| block["type"].as_str().unwrap_or("text") == "text")
            .filter_map(|block| block["text"].as_str())
            .collect::<Vec<_>>()
            .join("");

        Ok(CompletionResponse {
            message: Message::new(Role::Assistant, text),
            usage,
            model,
            finish_reason,
        })
    }

    fn map_http_error(status: reqwest::StatusCode, body_text: &str) -> LlmError {
        match status.as_u16() {
            401 => LlmError::AuthFailed {
                provider: "Anthropic".to_string(),
            },
            429 => {
                let retry_after = serde_json::from_str::<Value>(body_text)
                    .ok()
                    .and_then(|v| v["error"]["retry_after_secs"].as_u64())
                    .unwrap_or(30);
                LlmError::RateLimited {
                    retry_after_secs: retry_after,
                }
            }
            _ => LlmError::ApiRequest {
                message: format!("HTTP {} from Anthropic API: {}", status, body_text),
            },
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/messages", self.base_url);
        let body = self.build_request_body(&request);

        debug!(model = %self.model, "Sending Anthropic completion request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body_text = response.text().await.map_err(|e| LlmError::ApiRequest {
            message: format!("Failed to read response body: {}", e),
        })?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, &body_text));
        }

        let json: Value = serde_json::from_str(&body_text).map_err(|e| LlmError::ResponseParse {
            message: format!("Invalid JSON from Anthropic API: {}", e),
        })?;

        Self::parse_response(&json)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
