//! Tavily search backend.

use super::{
    SearchBackend, SearchParams, SearchResult, api_key_from_env, http_client, read_json,
    request_error,
};
use crate::error::{ConfigError, SearchError};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

const TAVILY_API_URL: &str = "https://api.tavily.com/search";
const PROVIDER: &str = "tavily";

/// Tavily search API client.
pub struct TavilyBackend {
    client: reqwest::Client,
    api_key: String,
    params: SearchParams,
}

impl TavilyBackend {
    /// Create a backend using `TAVILY_API_KEY`.
    pub fn from_env(params: &SearchParams) -> Result<Self, ConfigError> {
        let api_key = api_key_from_env(PROVIDER, "TAVILY_API_KEY")?;
        Self::with_api_key(params, api_key)
    }

    pub fn with_api_key(params: &SearchParams, api_key: String) -> Result<Self, ConfigError> {
        Ok(Self {
            client: http_client(30)?,
            api_key,
            params: params.clone(),
        })
    }

    fn request_body(&self, query: &str) -> Value {
        let mut body = json!({
            "query": query,
            "max_results": self.params.max_results,
            "include_raw_content": self.params.include_raw_content,
            "include_answer": false,
            "topic": self.params.topic.as_deref().unwrap_or("general"),
        });
        if let Some(depth) = &self.params.search_depth {
            body["search_depth"] = json!(depth);
        }
        if let Some(domains) = &self.params.include_domains {
            body["include_domains"] = json!(domains);
        }
        if let Some(domains) = &self.params.exclude_domains {
            body["exclude_domains"] = json!(domains);
        }
        body
    }
}

#[async_trait]
impl SearchBackend for TavilyBackend {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn search_query(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        debug!(query, "Tavily search");
        let response = self
            .client
            .post(TAVILY_API_URL)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(query))
            .send()
            .await
            .map_err(|e| request_error(PROVIDER, e))?;
        let payload = read_json(PROVIDER, response).await?;
        parse_tavily_response(&payload)
    }
}

/// Normalize a Tavily response into search results.
pub fn parse_tavily_response(payload: &Value) -> Result<Vec<SearchResult>, SearchError> {
    let rows = payload
        .get("results")
        .and_then(|v| v.as_array())
        .ok_or_else(|| SearchError::Parse {
            provider: PROVIDER.to_string(),
            message: "missing results array".to_string(),
        })?;

    Ok(rows
        .iter()
        .filter_map(|row| {
            let url = row.get("url").and_then(|v| v.as_str())?.trim();
            if url.is_empty() {
                return None;
            }
            Some(SearchResult {
                title: row
                    .get("title")
                    .and_then(|v| v.as_str())
                    .unwrap_or("Untitled")
                    .to_string(),
                url: url.to_string(),
                content: row
                    .get("content")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                score: row.get("score").and_then(|v| v.as_f64()),
                raw_content: row
                    .get("raw_content")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
            })
        })
        .collect())
}
