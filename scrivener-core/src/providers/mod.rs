//! LLM provider implementations.
//!
//! Provides concrete implementations of the `LlmProvider` trait for:
//! - Anthropic Messages API (Claude models)
//! - OpenAI-compatible APIs (OpenAI, Groq, Ollama, vLLM, LM Studio)
//!
//! Use `create_provider()` to instantiate the appropriate provider based on config.

pub mod anthropic;
pub mod openai_compat;

use crate::brain::LlmProvider;
use crate::config::LlmConfig;
use crate::error::LlmError;
use std::sync::Arc;
use tracing::debug;

pub use anthropic::AnthropicProvider;
pub use openai_compat::OpenAiCompatibleProvider;

/// Default base URL for OpenAI-compatible providers known by name.
pub fn default_base_url(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("https://api.openai.com/v1"),
        "groq" => Some("https://api.groq.com/openai/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        _ => None,
    }
}

/// Create an LLM provider for one model role.
///
/// `anthropic` uses the native Messages API; every other provider name is
/// served through the OpenAI-compatible client with its default base URL
/// unless `base_url` is configured.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "Creating LLM provider");
    match config.provider.as_str() {
        "anthropic" => Ok(Arc::new(AnthropicProvider::new(config)?)),
        other => {
            let mut config = config.clone();
            if config.base_url.is_none() {
                config.base_url = default_base_url(other).map(str::to_string);
            }
            Ok(Arc::new(OpenAiCompatibleProvider::new(&config)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_base_urls() {
        assert_eq!(
            default_base_url("groq"),
            Some("https://api.groq.com/openai/v1")
        );
        assert_eq!(default_base_url("ollama"), Some("http://localhost:11434/v1"));
        assert_eq!(default_base_url("custom"), None);
    }

    #[test]
    fn test_create_provider_missing_key() {
        let config = LlmConfig {
            api_key_env: "SCRIVENER_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..Default::default()
        };
        let err = create_provider(&config).err().unwrap();
        assert!(matches!(err, LlmError::AuthFailed { .. }));
    }

    #[test]
    fn test_create_provider_local_ollama_needs_no_key() {
        let config = LlmConfig {
            provider: "ollama".to_string(),
            model: "qwen2.5:14b".to_string(),
            api_key_env: "SCRIVENER_TEST_OLLAMA_KEY_NEVER_SET".to_string(),
            ..Default::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "qwen2.5:14b");
        assert!(provider.supports_json_mode());
    }
}
