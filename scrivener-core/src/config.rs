//! Configuration system for Scrivener.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/scrivener/config.toml` and/or `.scrivener/config.toml`
//! in the workspace directory. The research core only ever sees the resulting
//! [`ReportConfig`] snapshot.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::search::SearchConfig;

/// Default report structure used by the planner.
pub const DEFAULT_REPORT_STRUCTURE: &str = "Use this structure to create a report on the user-provided topic:

1. Introduction (no research needed)
   - Brief overview of the topic area

2. Main Body Sections:
   - Each section should focus on a sub-topic of the user-provided topic

3. Conclusion
   - Aim for 1 structural element (either a list or a table) that distills the main body sections
   - Provide a concise summary of the report";

/// Top-level configuration for report generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Template describing the sections the planner should produce.
    pub report_structure: String,
    /// Number of search queries generated per planning or research round.
    pub number_of_queries: usize,
    /// Maximum search→grade iterations per section.
    pub max_search_depth: usize,
    /// Model used for planning and grading.
    pub planner: LlmConfig,
    /// Model used for query generation and drafting.
    pub writer: LlmConfig,
    /// Search backend selection and parameters.
    pub search: SearchConfig,
    /// Directory for persisted report sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sessions_dir: Option<PathBuf>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            report_structure: DEFAULT_REPORT_STRUCTURE.to_string(),
            number_of_queries: 2,
            max_search_depth: 2,
            planner: LlmConfig::default(),
            writer: LlmConfig::default(),
            search: SearchConfig::default(),
            sessions_dir: None,
        }
    }
}

impl ReportConfig {
    /// Check value ranges and mutually exclusive options.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.number_of_queries == 0 {
            return Err(ConfigError::Invalid {
                message: "number_of_queries must be at least 1".to_string(),
            });
        }
        if self.max_search_depth == 0 {
            return Err(ConfigError::Invalid {
                message: "max_search_depth must be at least 1".to_string(),
            });
        }
        self.search.params.validate()
    }

    /// Resolve the directory sessions are persisted to.
    pub fn sessions_dir(&self, workspace: &Path) -> PathBuf {
        self.sessions_dir
            .clone()
            .unwrap_or_else(|| workspace.join(".scrivener").join("sessions"))
    }
}

/// Configuration for one LLM role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name: "anthropic", "openai", "groq", "ollama", or any OpenAI-compatible name.
    pub provider: String,
    /// Model identifier (e.g., "claude-3-7-sonnet-latest", "gpt-4o").
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Optional base URL override for the API endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Maximum tokens to generate in a response.
    pub max_tokens: usize,
    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-3-7-sonnet-latest".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: None,
            max_tokens: 8192,
            temperature: 0.0,
        }
    }
}

/// Individual values the CLI can override on top of the layered config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub search_api: Option<String>,
    pub number_of_queries: Option<usize>,
    pub max_search_depth: Option<usize>,
    pub planner_model: Option<String>,
    pub writer_model: Option<String>,
}

impl ConfigOverrides {
    fn merge_into(&self, mut figment: Figment) -> Figment {
        if let Some(api) = &self.search_api {
            figment = figment.merge(Serialized::default("search.api", api));
        }
        if let Some(n) = self.number_of_queries {
            figment = figment.merge(Serialized::default("number_of_queries", n));
        }
        if let Some(depth) = self.max_search_depth {
            figment = figment.merge(Serialized::default("max_search_depth", depth));
        }
        if let Some(model) = &self.planner_model {
            figment = figment.merge(Serialized::default("planner.model", model));
        }
        if let Some(model) = &self.writer_model {
            figment = figment.merge(Serialized::default("writer.model", model));
        }
        figment
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `SCRIVENER_`)
/// 3. Explicit config file, if given
/// 4. Workspace-local config (`.scrivener/config.toml`)
/// 5. User config (`~/.config/scrivener/config.toml`)
/// 6. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    config_file: Option<&Path>,
    overrides: Option<&ConfigOverrides>,
) -> Result<ReportConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(ReportConfig::default()));

    // User-level config
    if let Some(config_dir) = directories::ProjectDirs::from("dev", "scrivener", "scrivener") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = ws.join(".scrivener").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = config_file {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        figment = figment.merge(Toml::file(path));
    }

    // Environment variables (SCRIVENER_NUMBER_OF_QUERIES, SCRIVENER_SEARCH__API, etc.)
    figment = figment.merge(Env::prefixed("SCRIVENER_").split("__"));

    if let Some(overrides) = overrides {
        figment = overrides.merge_into(figment);
    }

    let config: ReportConfig = figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReportConfig::default();
        assert_eq!(config.number_of_queries, 2);
        assert_eq!(config.max_search_depth, 2);
        assert_eq!(config.planner.provider, "anthropic");
        assert_eq!(config.writer.model, "claude-3-7-sonnet-latest");
        assert_eq!(config.search.api, "tavily");
        assert!(config.report_structure.contains("Introduction"));
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = ReportConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: ReportConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized.writer.model, config.writer.model);
        assert_eq!(deserialized.search.api, config.search.api);
        assert_eq!(
            deserialized.search.params.max_results,
            config.search.params.max_results
        );
    }

    #[test]
    fn test_load_config_defaults() {
        let config = load_config(None, None, None).unwrap();
        assert!(config.number_of_queries >= 1);
    }

    #[test]
    fn test_load_config_with_overrides() {
        let overrides = ConfigOverrides {
            search_api: Some("exa".to_string()),
            max_search_depth: Some(4),
            writer_model: Some("gpt-4o".to_string()),
            ..Default::default()
        };

        let config = load_config(None, None, Some(&overrides)).unwrap();
        assert_eq!(config.search.api, "exa");
        assert_eq!(config.max_search_depth, 4);
        assert_eq!(config.writer.model, "gpt-4o");
        assert_eq!(config.planner.model, "claude-3-7-sonnet-latest");
    }

    #[test]
    fn test_load_config_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(".scrivener");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("config.toml"),
            r#"
number_of_queries = 3

[writer]
provider = "openai"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"
max_tokens = 4096
temperature = 0.2

[search]
api = "duckduckgo"

[search.params]
max_results = 3
include_raw_content = false
max_tokens_per_source = 500
"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None, None).unwrap();
        assert_eq!(config.number_of_queries, 3);
        assert_eq!(config.writer.provider, "openai");
        assert_eq!(config.search.api, "duckduckgo");
        assert_eq!(config.search.params.max_results, 3);
        assert!(!config.search.params.include_raw_content);
        // Untouched sections keep their defaults.
        assert_eq!(config.planner.provider, "anthropic");
    }

    #[test]
    fn test_load_config_missing_explicit_file() {
        let err = load_config(None, Some(Path::new("/nonexistent/scrivener.toml")), None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_validate_rejects_zero_depth() {
        let config = ReportConfig {
            max_search_depth: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_conflicting_domains() {
        let mut config = ReportConfig::default();
        config.search.params.include_domains = Some(vec!["arxiv.org".into()]);
        config.search.params.exclude_domains = Some(vec!["reddit.com".into()]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ConflictingOptions { .. })
        ));
    }

    #[test]
    fn test_sessions_dir_default() {
        let config = ReportConfig::default();
        assert_eq!(
            config.sessions_dir(Path::new("/work")),
            PathBuf::from("/work/.scrivener/sessions")
        );
    }
}
