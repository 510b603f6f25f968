//! DuckDuckGo instant-answer backend. No API key required.

use super::{SearchBackend, SearchParams, SearchResult, http_client, read_json, request_error};
use crate::error::{ConfigError, SearchError};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

const PROVIDER: &str = "duckduckgo";

pub struct DuckDuckGoBackend {
    client: reqwest::Client,
    max_results: usize,
}

impl DuckDuckGoBackend {
    pub fn new(params: &SearchParams) -> Result<Self, ConfigError> {
        Ok(Self {
            client: http_client(10)?,
            max_results: params.max_results,
        })
    }
}

#[async_trait]
impl SearchBackend for DuckDuckGoBackend {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn search_query(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let url = format!(
            "https://api.duckduckgo.com/?q={}&format=json&no_html=1&skip_disambig=1",
            urlencoding::encode(query)
        );
        debug!(query, "DuckDuckGo search");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| request_error(PROVIDER, e))?;
        let body = read_json(PROVIDER, response).await?;
        Ok(parse_instant_answer(&body, self.max_results))
    }
}

/// Normalize an instant-answer payload: the abstract first, then results and
/// related topics (nested topic groups are flattened).
pub fn parse_instant_answer(body: &Value, max_results: usize) -> Vec<SearchResult> {
    let mut results = Vec::new();

    let abstract_text = body
        .get("AbstractText")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    let abstract_url = body
        .get("AbstractURL")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    if !abstract_text.is_empty() && !abstract_url.is_empty() {
        let heading = body
            .get("Heading")
            .and_then(|v| v.as_str())
            .filter(|h| !h.is_empty())
            .or_else(|| body.get("AbstractSource").and_then(|v| v.as_str()))
            .unwrap_or("DuckDuckGo");
        results.push(snippet_result(heading, abstract_url, abstract_text));
    }

    let mut topics = Vec::new();
    for key in ["Results", "RelatedTopics"] {
        if let Some(items) = body.get(key).and_then(|v| v.as_array()) {
            collect_topics(items, &mut topics);
        }
    }
    for topic in topics {
        if results.len() >= max_results {
            break;
        }
        let text = topic.get("Text").and_then(|v| v.as_str()).unwrap_or_default();
        let url = topic
            .get("FirstURL")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        if text.is_empty() || url.is_empty() {
            continue;
        }
        let title = text.split(" - ").next().unwrap_or(text);
        results.push(snippet_result(title, url, text));
    }

    results.truncate(max_results);
    results
}

fn collect_topics<'a>(items: &'a [Value], out: &mut Vec<&'a Value>) {
    for item in items {
        match item.get("Topics").and_then(|v| v.as_array()) {
            Some(nested) => collect_topics(nested, out),
            None => out.push(item),
        }
    }
}

fn snippet_result(title: &str, url: &str, text: &str) -> SearchResult {
    SearchResult {
        title: title.to_string(),
        url: url.to_string(),
        content: text.to_string(),
        score: None,
        raw_content: Some(text.to_string()),
    }
}
