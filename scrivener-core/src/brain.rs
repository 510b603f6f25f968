//! Brain module: LLM provider abstraction and structured output.
//!
//! Defines the `LlmProvider` trait for model-agnostic completions, the
//! `Brain` wrapper that binds a provider to one role (planning/grading or
//! drafting), and a mock provider for tests.

use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse, Message, TokenUsage};
use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use tracing::{debug, warn};

/// Trait for LLM providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Perform a full completion and return the response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Return the model name.
    fn model_name(&self) -> &str;

    /// Whether the provider honors `CompletionRequest::json_mode`.
    fn supports_json_mode(&self) -> bool {
        false
    }
}

/// Description of a typed output the model must produce.
///
/// `shape` is an example JSON document appended to the system prompt; the
/// reply is parsed into the caller's Rust type with `serde_json`.
#[derive(Debug, Clone, Copy)]
pub struct OutputSchema {
    pub name: &'static str,
    pub shape: &'static str,
}

impl OutputSchema {
    /// Instructions appended to the system prompt in structured mode.
    pub fn instructions(&self) -> String {
        format!(
            "\n\n<Output Format>\nRespond with a single JSON object of type `{}` and nothing else. \
             It must have exactly this shape:\n{}\n</Output Format>",
            self.name, self.shape
        )
    }
}

static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*\})\s*```").expect("fenced JSON pattern is valid")
});

/// Locate the JSON object in a model reply.
///
/// Accepts a bare object, an object wrapped in a Markdown code fence, or an
/// object surrounded by prose (first `{` to last `}`).
pub fn extract_json(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }
    if let Some(caps) = FENCED_JSON.captures(trimmed) {
        return caps.get(1).map(|m| m.as_str());
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

/// The Brain binds an LLM provider to one role and adds prompt
/// construction, structured-output parsing, and usage tracking.
pub struct Brain {
    provider: Arc<dyn LlmProvider>,
    temperature: f32,
    max_tokens: Option<usize>,
    total_usage: Mutex<TokenUsage>,
}

impl Brain {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            temperature: 0.0,
            max_tokens: None,
            total_usage: Mutex::new(TokenUsage::default()),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Send a system + user prompt pair and return the reply text.
    pub async fn think(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let response = self.send(system.to_string(), user, false).await?;
        let text = response.message.content.trim().to_string();
        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(text)
    }

    /// Send a prompt pair and parse the reply into `T`.
    ///
    /// Output that is not a JSON object of the requested shape is an
    /// `LlmError::StructuredOutput`; it is never replaced with a default.
    pub async fn think_structured<T: DeserializeOwned>(
        &self,
        system: &str,
        user: &str,
        schema: &OutputSchema,
    ) -> Result<T, LlmError> {
        let system = format!("{}{}", system, schema.instructions());
        let response = self
            .send(system, user, self.provider.supports_json_mode())
            .await?;
        parse_structured(response.text(), schema)
    }

    async fn send(
        &self,
        system: String,
        user: &str,
        json_mode: bool,
    ) -> Result<CompletionResponse, LlmError> {
        let request = CompletionRequest {
            messages: vec![Message::system(system), Message::user(user)],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            model: None,
            json_mode,
        };

        debug!(
            model = self.provider.model_name(),
            json_mode, "Sending completion request"
        );

        let response = self.provider.complete(request).await?;
        self.total_usage
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .accumulate(&response.usage);

        debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Completion received"
        );
        Ok(response)
    }

    /// Total token usage across all calls made through this brain.
    pub fn total_usage(&self) -> TokenUsage {
        *self
            .total_usage
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the model name.
    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }
}

/// Parse a structured reply into `T`.
pub fn parse_structured<T: DeserializeOwned>(
    text: &str,
    schema: &OutputSchema,
) -> Result<T, LlmError> {
    let json = extract_json(text).ok_or_else(|| {
        warn!(schema = schema.name, "Model reply contained no JSON object");
        LlmError::StructuredOutput {
            schema: schema.name.to_string(),
            message: "no JSON object found in reply".to_string(),
        }
    })?;
    serde_json::from_str(json).map_err(|e| LlmError::StructuredOutput {
        schema: schema.name.to_string(),
        message: e.to_string(),
    })
}

type MockHandler = Box<dyn Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync>;

/// A mock LLM provider for testing and development.
///
/// Queued responses are returned first, in order. Once the queue is empty,
/// the optional handler answers based on the request, which keeps
/// concurrently running section loops deterministic.
pub struct MockLlmProvider {
    model: String,
    responses: Mutex<VecDeque<Result<CompletionResponse, LlmError>>>,
    handler: Option<MockHandler>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            responses: Mutex::new(VecDeque::new()),
            handler: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a MockLlmProvider that always returns the given text.
    pub fn with_response(text: &str) -> Self {
        let text = text.to_string();
        Self::with_handler(move |_| Ok(text.clone()))
    }

    /// Create a MockLlmProvider that answers every request with `handler`.
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            handler: Some(Box::new(handler)),
            ..Self::new()
        }
    }

    /// Queue a response to be returned by the next `complete` call.
    pub fn queue_response(&self, response: CompletionResponse) {
        self.lock_responses().push_back(Ok(response));
    }

    /// Queue a plain text response.
    pub fn queue_text(&self, text: &str) {
        self.queue_response(Self::text_response(text));
    }

    /// Queue an error for the next `complete` call.
    pub fn queue_error(&self, error: LlmError) {
        self.lock_responses().push_back(Err(error));
    }

    /// Create a simple text response for testing.
    pub fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse {
            message: Message::assistant(text),
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
            model: "mock-model".to_string(),
            finish_reason: Some("stop".to_string()),
        }
    }

    /// All requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `complete` calls received.
    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn lock_responses(
        &self,
    ) -> std::sync::MutexGuard<'_, VecDeque<Result<CompletionResponse, LlmError>>> {
        self.responses.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if let Some(queued) = self.lock_responses().pop_front() {
            return queued;
        }
        match &self.handler {
            Some(handler) => handler(&request).map(|text| Self::text_response(&text)),
            None => Ok(Self::text_response(
                "I'm a mock LLM. No queued responses available.",
            )),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
