//! Exa neural search backend.
//!
//! Queries run sequentially with a short pause between them and a longer
//! pause after the provider reports rate limiting.

use super::{
    QueryResults, SearchBackend, SearchParams, SearchResult, absorb_failure, api_key_from_env,
    http_client, read_json, request_error,
};
use crate::error::{ConfigError, SearchError};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

const EXA_API_URL: &str = "https://api.exa.ai/search";
const PROVIDER: &str = "exa";
const QUERY_SPACING: Duration = Duration::from_millis(250);
const RATE_LIMIT_PAUSE: Duration = Duration::from_secs(1);

/// Exa search API client.
pub struct ExaBackend {
    client: reqwest::Client,
    api_key: String,
    params: SearchParams,
}

impl ExaBackend {
    /// Create a backend using `EXA_API_KEY`.
    pub fn from_env(params: &SearchParams) -> Result<Self, ConfigError> {
        params.validate()?;
        let api_key = api_key_from_env(PROVIDER, "EXA_API_KEY")?;
        Self::with_api_key(params, api_key)
    }

    /// Include and exclude domain lists are mutually exclusive.
    pub fn with_api_key(params: &SearchParams, api_key: String) -> Result<Self, ConfigError> {
        params.validate()?;
        Ok(Self {
            client: http_client(30)?,
            api_key,
            params: params.clone(),
        })
    }

    fn request_body(&self, query: &str) -> Value {
        let mut contents = json!({ "text": true, "summary": true });
        if let Some(subpages) = self.params.subpages {
            contents["subpages"] = json!(subpages);
        }
        let mut body = json!({
            "query": query,
            "numResults": self.params.max_results,
            "type": "auto",
            "contents": contents,
        });
        if let Some(domains) = &self.params.include_domains {
            body["includeDomains"] = json!(domains);
        }
        if let Some(domains) = &self.params.exclude_domains {
            body["excludeDomains"] = json!(domains);
        }
        body
    }
}

#[async_trait]
impl SearchBackend for ExaBackend {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn search_query(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        debug!(query, "Exa search");
        let response = self
            .client
            .post(EXA_API_URL)
            .header("x-api-key", &self.api_key)
            .json(&self.request_body(query))
            .send()
            .await
            .map_err(|e| request_error(PROVIDER, e))?;
        let payload = read_json(PROVIDER, response).await?;
        parse_exa_response(&payload, self.params.subpages.is_some())
    }

    async fn search(&self, queries: &[String]) -> Vec<QueryResults> {
        let mut sets = Vec::with_capacity(queries.len());
        for (i, query) in queries.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(QUERY_SPACING).await;
            }
            let outcome = self.search_query(query).await;
            let rate_limited = outcome.as_ref().err().is_some_and(SearchError::is_rate_limit);
            sets.push(absorb_failure(PROVIDER, query, outcome));
            if rate_limited {
                warn!(query, "Exa rate limit exceeded; adding extra delay");
                tokio::time::sleep(RATE_LIMIT_PAUSE).await;
            }
        }
        sets
    }
}

fn str_field<'a>(row: &'a Value, key: &str) -> &'a str {
    row.get(key).and_then(|v| v.as_str()).unwrap_or_default()
}

/// Summary first, then text, separated by a blank line.
fn merged_content(summary: &str, text: &str) -> String {
    match (summary.is_empty(), text.is_empty()) {
        (false, false) => format!("{summary}\n\n{text}"),
        (false, true) => summary.to_string(),
        _ => text.to_string(),
    }
}

fn normalize_row(row: &Value) -> Option<SearchResult> {
    let url = str_field(row, "url").trim();
    if url.is_empty() {
        return None;
    }
    let text = str_field(row, "text");
    Some(SearchResult {
        title: str_field(row, "title").to_string(),
        url: url.to_string(),
        content: merged_content(str_field(row, "summary"), text),
        score: row.get("score").and_then(|v| v.as_f64()),
        raw_content: Some(text.to_string()),
    })
}

/// Normalize an Exa response. Subpages are appended after the main results,
/// skipping URLs already present for this query.
pub fn parse_exa_response(
    payload: &Value,
    include_subpages: bool,
) -> Result<Vec<SearchResult>, SearchError> {
    let rows = payload
        .get("results")
        .and_then(|v| v.as_array())
        .ok_or_else(|| SearchError::Parse {
            provider: PROVIDER.to_string(),
            message: "missing results array".to_string(),
        })?;

    let mut seen = HashSet::new();
    let mut results = Vec::new();
    for row in rows {
        if let Some(result) = normalize_row(row)
            && seen.insert(result.url.clone())
        {
            results.push(result);
        }
    }

    if include_subpages {
        let subpages = rows
            .iter()
            .filter_map(|row| row.get("subpages").and_then(|v| v.as_array()))
            .flatten();
        for subpage in subpages {
            if let Some(mut result) = normalize_row(subpage)
                && seen.insert(result.url.clone())
            {
                result.score = result.score.or(Some(0.0));
                results.push(result);
            }
        }
    }

    Ok(results)
}
