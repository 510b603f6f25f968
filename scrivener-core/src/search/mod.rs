//! Web search: backend adapters, the search executor, and source formatting.
//!
//! Every backend normalizes its provider payload into [`SearchResult`] as soon
//! as it is received. A failed query never aborts its siblings; it becomes an
//! empty result set and a warning.

pub mod arxiv;
pub mod duckduckgo;
pub mod exa;
pub mod format;
pub mod google;
pub mod tavily;

use crate::error::{ConfigError, SearchError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

pub use format::{CHARS_PER_TOKEN, deduplicate_sources, format_sources};

const USER_AGENT: &str = concat!("Scrivener/", env!("CARGO_PKG_VERSION"));

/// One retrieved document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    /// Identity key for deduplication.
    pub url: String,
    /// Short snippet or summary.
    pub content: String,
    /// Provider-defined relevance; not comparable across providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Full text when the provider returned it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<String>,
}

/// The results of one query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResults {
    pub query: String,
    pub results: Vec<SearchResult>,
}

impl QueryResults {
    pub fn new(query: impl Into<String>, results: Vec<SearchResult>) -> Self {
        Self {
            query: query.into(),
            results,
        }
    }

    pub fn empty(query: impl Into<String>) -> Self {
        Self::new(query, Vec::new())
    }
}

/// Search backend selection plus its parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Backend name: tavily, exa, arxiv, duckduckgo, or google.
    pub api: String,
    #[serde(default)]
    pub params: SearchParams,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api: SearchApi::Tavily.as_str().to_string(),
            params: SearchParams::default(),
        }
    }
}

/// Parameters passed through to the selected backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    /// Results requested per query.
    pub max_results: usize,
    /// Ask for (or fetch) full page text.
    pub include_raw_content: bool,
    /// Budget for each source's raw content in the formatted source block.
    pub max_tokens_per_source: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_domains: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_domains: Option<Vec<String>>,
    /// Exa: subpages to retrieve per result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subpages: Option<usize>,
    /// Tavily: "general" or "news".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Tavily: "basic" or "advanced".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_depth: Option<String>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            max_results: 5,
            include_raw_content: true,
            max_tokens_per_source: 1000,
            include_domains: None,
            exclude_domains: None,
            subpages: None,
            topic: None,
            search_depth: None,
        }
    }
}

impl SearchParams {
    /// Reject option combinations no backend accepts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_empty = |d: &Option<Vec<String>>| d.as_ref().is_some_and(|v| !v.is_empty());
        if non_empty(&self.include_domains) && non_empty(&self.exclude_domains) {
            return Err(ConfigError::ConflictingOptions {
                message: "include_domains and exclude_domains cannot be used together".to_string(),
            });
        }
        if self.max_results == 0 {
            return Err(ConfigError::Invalid {
                message: "search.params.max_results must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Character budget for one source's raw content.
    pub fn max_chars_per_source(&self) -> usize {
        self.max_tokens_per_source.saturating_mul(CHARS_PER_TOKEN)
    }
}

/// The fixed set of search backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchApi {
    Tavily,
    Exa,
    Arxiv,
    DuckDuckGo,
    Google,
}

impl SearchApi {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchApi::Tavily => "tavily",
            SearchApi::Exa => "exa",
            SearchApi::Arxiv => "arxiv",
            SearchApi::DuckDuckGo => "duckduckgo",
            SearchApi::Google => "google",
        }
    }

    pub fn all() -> [SearchApi; 5] {
        [
            SearchApi::Tavily,
            SearchApi::Exa,
            SearchApi::Arxiv,
            SearchApi::DuckDuckGo,
            SearchApi::Google,
        ]
    }
}

impl fmt::Display for SearchApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchApi {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        SearchApi::all()
            .into_iter()
            .find(|api| api.as_str() == name)
            .ok_or(ConfigError::UnknownSearchApi {
                name: s.to_string(),
            })
    }
}

/// A pluggable web-search provider.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Provider name used in logs and errors.
    fn name(&self) -> &str;

    /// Run one query and normalize the provider payload.
    async fn search_query(&self, query: &str) -> Result<Vec<SearchResult>, SearchError>;

    /// Run every query, in order, absorbing per-query failures.
    ///
    /// Backends with their own pacing or concurrency limits override this.
    async fn search(&self, queries: &[String]) -> Vec<QueryResults> {
        let mut sets = Vec::with_capacity(queries.len());
        for query in queries {
            let outcome = self.search_query(query).await;
            sets.push(absorb_failure(self.name(), query, outcome));
        }
        sets
    }
}

/// Turn one query outcome into a result set, logging failures.
pub fn absorb_failure(
    provider: &str,
    query: &str,
    outcome: Result<Vec<SearchResult>, SearchError>,
) -> QueryResults {
    match outcome {
        Ok(results) => {
            debug!(provider, query, count = results.len(), "Search query completed");
            QueryResults::new(query, results)
        }
        Err(e) => {
            warn!(provider, query, error = %e, "Search query failed; using empty result set");
            QueryResults::empty(query)
        }
    }
}

/// Resolve a backend by name.
pub fn create_backend(
    api: SearchApi,
    params: &SearchParams,
) -> Result<Arc<dyn SearchBackend>, ConfigError> {
    Ok(match api {
        SearchApi::Tavily => Arc::new(tavily::TavilyBackend::from_env(params)?),
        SearchApi::Exa => Arc::new(exa::ExaBackend::from_env(params)?),
        SearchApi::Arxiv => Arc::new(arxiv::ArxivBackend::new(params)?),
        SearchApi::DuckDuckGo => Arc::new(duckduckgo::DuckDuckGoBackend::new(params)?),
        SearchApi::Google => Arc::new(google::GoogleBackend::from_env(params)?),
    })
}

/// Routes query lists to one backend and formats what comes back.
#[derive(Clone)]
pub struct SearchExecutor {
    backend: Arc<dyn SearchBackend>,
    params: SearchParams,
}

impl SearchExecutor {
    pub fn new(backend: Arc<dyn SearchBackend>, params: SearchParams) -> Result<Self, ConfigError> {
        params.validate()?;
        Ok(Self { backend, params })
    }

    /// Build the executor for the configured backend.
    ///
    /// Unknown backend names and conflicting parameters are fatal.
    pub fn from_config(config: &SearchConfig) -> Result<Self, ConfigError> {
        let api: SearchApi = config.api.parse()?;
        config.params.validate()?;
        let backend = create_backend(api, &config.params)?;
        Self::new(backend, config.params.clone())
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Raw per-query result sets, in query order.
    pub async fn search(&self, queries: &[String]) -> Vec<QueryResults> {
        self.backend.search(queries).await
    }

    /// Search and return the deduplicated, formatted source block.
    pub async fn execute(&self, queries: &[String]) -> String {
        let sets = self.search(queries).await;
        let total: usize = sets.iter().map(|s| s.results.len()).sum();
        info!(
            backend = self.backend.name(),
            queries = queries.len(),
            results = total,
            "Search round finished"
        );
        format_sources(
            &sets,
            self.params.max_chars_per_source(),
            self.params.include_raw_content,
        )
    }
}

/// Build the HTTP client shared by the backends.
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ConfigError::Invalid {
            message: format!("Failed to create HTTP client: {}", e),
        })
}

/// Read an environment variable holding a provider key.
pub(crate) fn api_key_from_env(provider: &str, var: &str) -> Result<String, ConfigError> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingApiKey {
            provider: provider.to_string(),
            var: var.to_string(),
        })
}

/// Check the status of a provider response and decode its JSON body.
pub(crate) async fn read_json(
    provider: &str,
    response: reqwest::Response,
) -> Result<serde_json::Value, SearchError> {
    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(SearchError::RateLimited {
            provider: provider.to_string(),
        });
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SearchError::Status {
            provider: provider.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    response.json().await.map_err(|e| SearchError::Parse {
        provider: provider.to_string(),
        message: e.to_string(),
    })
}

pub(crate) fn request_error(provider: &str, err: reqwest::Error) -> SearchError {
    SearchError::Request {
        provider: provider.to_string(),
        message: err.to_string(),
    }
}

type MockSearchHandler =
    Box<dyn Fn(&str) -> Result<Vec<SearchResult>, SearchError> + Send + Sync>;

/// In-memory search backend for tests and offline runs.
///
/// Queued outcomes are consumed first; afterwards the handler (or an empty
/// result list) answers each query.
pub struct MockSearchBackend {
    queued: Mutex<VecDeque<Result<Vec<SearchResult>, SearchError>>>,
    handler: Option<MockSearchHandler>,
    queries: Mutex<Vec<String>>,
}

impl MockSearchBackend {
    pub fn new() -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            handler: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&str) -> Result<Vec<SearchResult>, SearchError> + Send + Sync + 'static,
    {
        Self {
            handler: Some(Box::new(handler)),
            ..Self::new()
        }
    }

    pub fn queue_results(&self, results: Vec<SearchResult>) {
        self.lock_queue().push_back(Ok(results));
    }

    pub fn queue_error(&self, error: SearchError) {
        self.lock_queue().push_back(Err(error));
    }

    /// Every query received so far, in arrival order.
    pub fn queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock_queue(
        &self,
    ) -> std::sync::MutexGuard<'_, VecDeque<Result<Vec<SearchResult>, SearchError>>> {
        self.queued.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockSearchBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchBackend for MockSearchBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search_query(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(query.to_string());
        if let Some(queued) = self.lock_queue().pop_front() {
            return queued;
        }
        match &self.handler {
            Some(handler) => handler(query),
            None => Ok(Vec::new()),
        }
    }
}
