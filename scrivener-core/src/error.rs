//! Error types for the Scrivener core library.
//!
//! Uses `thiserror` for public API error types with structured error variants
//! covering LLM adapters, search providers, configuration, planning, human
//! feedback, and final report assembly.

use std::path::PathBuf;

/// Top-level error type for the Scrivener core library.
#[derive(Debug, thiserror::Error)]
pub enum ScrivenerError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("Feedback protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Assembly error: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from the model-completion adapter.
///
/// None of these are retried by the research loop; they propagate to the
/// caller with the section they occurred in.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Structured output did not match {schema}: {message}")]
    StructuredOutput { schema: String, message: String },

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },
}

/// Errors from a single search-provider call.
///
/// These are absorbed per query by the search layer and never abort the
/// remaining queries or the research loop.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("{provider} request failed: {message}")]
    Request { provider: String, message: String },

    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{provider} rate limit exceeded")]
    RateLimited { provider: String },

    #[error("{provider} response parse error: {message}")]
    Parse { provider: String, message: String },
}

impl SearchError {
    /// Whether this failure came from provider-side rate limiting.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            SearchError::RateLimited { .. } => true,
            SearchError::Status { status, .. } => *status == 429,
            _ => false,
        }
    }
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported search API: {name}")]
    UnknownSearchApi { name: String },

    #[error("Unsupported LLM provider: {name}")]
    UnknownProvider { name: String },

    #[error("{provider} requires the environment variable '{var}'")]
    MissingApiKey { provider: String, var: String },

    #[error("Conflicting options: {message}")]
    ConflictingOptions { message: String },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// Errors raised while validating a report plan.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("Report plan has no sections")]
    Empty,

    #[error("Duplicate section name in plan: {name}")]
    DuplicateSection { name: String },

    #[error("Section name must not be blank")]
    BlankName,
}

/// Errors from the human-feedback boundary.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Feedback value of type {kind} is not supported; expected `true` or a feedback string")]
    UnsupportedResponse { kind: String },

    #[error("Feedback channel closed before a response was received")]
    ChannelClosed,
}

/// Errors from final report assembly.
#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error("No completed content for planned section '{name}'")]
    MissingSection { name: String },

    #[error("Section '{name}' failed: {message}")]
    SectionFailed { name: String, message: String },
}

/// Errors from session persistence.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session not found: {id}")]
    NotFound { id: String },

    #[error("Session {id} is in phase {phase}; expected {expected}")]
    WrongPhase {
        id: String,
        phase: String,
        expected: String,
    },
}

/// A type alias for results using the top-level `ScrivenerError`.
pub type Result<T> = std::result::Result<T, ScrivenerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_llm() {
        let err = ScrivenerError::Llm(LlmError::ApiRequest {
            message: "connection refused".into(),
        });
        assert_eq!(
            err.to_string(),
            "LLM error: API request failed: connection refused"
        );
    }

    #[test]
    fn test_error_display_config() {
        let err = ScrivenerError::Config(ConfigError::UnknownSearchApi {
            name: "perplexity".into(),
        });
        assert_eq!(
            err.to_string(),
            "Configuration error: Unsupported search API: perplexity"
        );
    }

    #[test]
    fn test_error_display_assembly() {
        let err = ScrivenerError::Assembly(AssemblyError::MissingSection {
            name: "Conclusion".into(),
        });
        assert_eq!(
            err.to_string(),
            "Assembly error: No completed content for planned section 'Conclusion'"
        );
    }

    #[test]
    fn test_error_display_protocol() {
        let err = ProtocolError::UnsupportedResponse {
            kind: "number".into(),
        };
        assert_eq!(
            err.to_string(),
            "Feedback value of type number is not supported; expected `true` or a feedback string"
        );
    }

    #[test]
    fn test_search_error_rate_limit_detection() {
        let limited = SearchError::Status {
            provider: "exa".into(),
            status: 429,
            body: "Too Many Requests".into(),
        };
        assert!(limited.is_rate_limit());
        assert!(
            SearchError::RateLimited {
                provider: "tavily".into()
            }
            .is_rate_limit()
        );
        let other = SearchError::Parse {
            provider: "google".into(),
            message: "missing items".into(),
        };
        assert!(!other.is_rate_limit());
    }

    #[test]
    fn test_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: ScrivenerError = serde_err.into();
        assert!(matches!(err, ScrivenerError::Serialization(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ScrivenerError = io_err.into();
        assert!(matches!(err, ScrivenerError::Io(_)));
    }
}
