//! OpenAI-compatible LLM provider.
//!
//! Supports OpenAI, Groq, Ollama, vLLM, LM Studio, and any endpoint that
//! follows the OpenAI chat completions API format.

use crate::brain::LlmProvider;
use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse, Message, Role, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// OpenAI-compatible LLM provider.
pub struct OpenAiCompatibleProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    provider_name: String,
}

impl OpenAiCompatibleProvider {
    /// Create a new provider from configuration.
    ///
    /// Reads the API key from the environment variable named in
    /// `config.api_key_env`. Local endpoints do not need a key.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let is_local = config
            .base_url
            .as_deref()
            .is_some_and(|u| u.contains("localhost") || u.contains("127.0.0.1"));

        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .or_else(|| {
                if is_local {
                    debug!("No API key set for local provider; using dummy bearer token");
                    Some("ollama".to_string())
                } else {
                    None
                }
            })
            .ok_or_else(|| LlmError::AuthFailed {
                provider: format!("{} (env var '{}' not set)", config.provider, config.api_key_env),
            })?;
        Self::new_with_key(config, api_key)
    }

    /// Create a new provider with an explicitly provided API key.
    pub fn new_with_key(config: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| LlmError::Connection {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            provider_name: config.provider.clone(),
        })
    }

    fn messages_to_json(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| {
                json!({
                    "role": msg.role.as_str(),
                    "content": msg.content,
                })
            })
            .collect()
    }

    /// Build the chat completions request body.
    fn build_request_body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": request.model.as_deref().unwrap_or(&self.model),
            "messages": Self::messages_to_json(&request.messages),
            "temperature": request.temperature,
            "stream": false,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if request.json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }

    /// Parse an OpenAI-format response body into a CompletionResponse.
    fn parse_response(body: &Value, model: &str) -> Result<CompletionResponse, LlmError> {
        let choice =
            body.get("choices")
                .and_then(|c| c.get(0))
                .ok_or_else(|| LlmError::ResponseParse {
                    message: "No choices in response".to_string(),
                })?;

        let message = choice
            .get("message")
            .ok_or_else(|| LlmError::ResponseParse {
                message: "No message in choice".to_string(),
            })?;

        let text = message
            .get("content")
            .and_then(|c| c.as_str())
            .unwrap_or("");

        let finish_reason = choice
            .get("finish_reason")
            .and_then(|f| f.as_str())
            .map(|s| s.to_string());

        let usage_obj = body.get("usage");
        let usage = TokenUsage {
            input_tokens: usage_obj
                .and_then(|u| u.get("prompt_tokens"))
                .and_then(|t| t.as_u64())
                .unwrap_or(0) as usize,
            output_tokens: usage_obj
                .and_then(|u| u.get("completion_tokens"))
                .and_then(|t| t.as_u64())
                .unwrap_or(0) as usize,
        };

        let resp_model = body
            .get("model")
            .and_then(|m| m.as_str())
            .unwrap_or(model)
            .to_string();

        Ok(CompletionResponse {
            message: Message::new(Role::Assistant, text),
            usage,
            model: resp_model,
            finish_reason,
        })
    }

    fn map_http_error(&self, status: reqwest::StatusCode, body: &str) -> LlmError {
        match status.as_u16() {
            401 => {
                debug!(body = %body, "Authentication failed (401)");
                LlmError::AuthFailed {
                    provider: self.provider_name.clone(),
                }
            }
            429 => {
                // "Rate limit reached ... Please try again in 20s"
                let retry_secs = serde_json::from_str::<Value>(body)
                    .ok()
                    .and_then(|v| {
                        v.get("error")?
                            .get("message")?
                            .as_str()
                            .map(|s| s.to_string())
                    })
                    .and_then(|msg| {
                        msg.split("in ")
                            .last()
                            .and_then(|s| s.trim().trim_end_matches('.').trim_end_matches('s').parse::<u64>().ok())
                    })
                    .unwrap_or(5);
                LlmError::RateLimited {
                    retry_after_secs: retry_secs,
                }
            }
            code if code >= 500 => LlmError::ApiRequest {
                message: format!("Server error ({}): {}", status, body),
            },
            _ => LlmError::ApiRequest {
                message: format!("HTTP {}: {}", status, body),
            },
        }
    }
}

/// Convert a transport failure into an `LlmError`.
pub(crate) fn map_transport_error(err: reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout {
            timeout_secs: REQUEST_TIMEOUT_SECS,
        }
    } else if err.is_connect() {
        LlmError::Connection {
            message: err.to_string(),
        }
    } else {
        LlmError::ApiRequest {
            message: format!("Request failed: {}", err),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request_body(&request);

        debug!(url = %url, model = %self.model, "Sending OpenAI completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let response_body = response.text().await.map_err(|e| LlmError::ApiRequest {
            message: format!("Failed to read response body: {}", e),
        })?;

        if !status.is_success() {
            return Err(self.map_http_error(status, &response_body));
        }

        let json: Value =
            serde_json::from_str(&response_body).map_err(|e| LlmError::ResponseParse {
                message: format!("Invalid JSON: {}", e),
            })?;

        Self::parse_response(&json, &self.model)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn supports_json_mode(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_provider() -> OpenAiCompatibleProvider {
        let config = LlmConfig {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "UNUSED".to_string(),
            base_url: Some("http://localhost:8080/v1/".to_string()),
            max_tokens: 1024,
            temperature: 0.0,
        };
        OpenAiCompatibleProvider::new_with_key(&config, "test-key".to_string()).unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let provider = test_provider();
        assert_eq!(provider.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_request_body_json_mode() {
        let provider = test_provider();
        let request = CompletionRequest {
            messages: vec![Message::system("sys"), Message::user("hi")],
            max_tokens: Some(256),
            json_mode: true,
            ..Default::default()
        };
        let body = provider.build_request_body(&request);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_request_body_plain_mode() {
        let provider = test_provider();
        let body = provider.build_request_body(&CompletionRequest::default());
        assert!(body.get("response_format").is_none());
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_parse_response() {
        let body = json!({
            "model": "gpt-4o-2024-08-06",
            "choices": [{
                "message": { "role": "assistant", "content": "## Hardware\nQubits." },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 4 }
        });
        let response = OpenAiCompatibleProvider::parse_response(&body, "gpt-4o").unwrap();
        assert_eq!(response.text(), "## Hardware\nQubits.");
        assert_eq!(response.model, "gpt-4o-2024-08-06");
        assert_eq!(response.usage.total(), 16);
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_parse_response_without_choices() {
        let err = OpenAiCompatibleProvider::parse_response(&json!({}), "gpt-4o").unwrap_err();
        assert!(matches!(err, LlmError::ResponseParse { .. }));
    }

    #[test]
    fn test_map_http_errors() {
        let provider = test_provider();
        assert!(matches!(
            provider.map_http_error(reqwest::StatusCode::UNAUTHORIZED, ""),
            LlmError::AuthFailed { .. }
        ));

        let body = r#"{"error":{"message":"Rate limit reached. Please try again in 20s"}}"#;
        match provider.map_http_error(reqwest::StatusCode::TOO_MANY_REQUESTS, body) {
            LlmError::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, 20),
            other => panic!("unexpected error: {other:?}"),
        }

        match provider.map_http_error(reqwest::StatusCode::TOO_MANY_REQUESTS, "busy") {
            LlmError::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, 5),
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(matches!(
            provider.map_http_error(reqwest::StatusCode::BAD_GATEWAY, "upstream"),
            LlmError::ApiRequest { .. }
        ));
    }
}
