//! Google Custom Search backend with optional full-page fetching.
//!
//! Queries run concurrently behind a semaphore. When raw content is
//! requested, each hit's page is fetched behind a second, smaller semaphore
//! with jittered pacing and one retry.

use super::{
    QueryResults, SearchBackend, SearchParams, SearchResult, absorb_failure, api_key_from_env,
    http_client, read_json, request_error,
};
use crate::error::{ConfigError, SearchError};
use async_trait::async_trait;
use futures::future::join_all;
use rand::Rng;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

const GOOGLE_API_URL: &str = "https://www.googleapis.com/customsearch/v1";
const PROVIDER: &str = "google";
const QUERY_CONCURRENCY: usize = 5;
const FETCH_CONCURRENCY: usize = 3;
const PAGE_SIZE: usize = 10;
const PAGE_SPACING: Duration = Duration::from_millis(200);
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

pub struct GoogleBackend {
    client: reqwest::Client,
    api_key: String,
    cx: String,
    params: SearchParams,
}

impl GoogleBackend {
    /// Create a backend using `GOOGLE_API_KEY` and `GOOGLE_CX`.
    pub fn from_env(params: &SearchParams) -> Result<Self, ConfigError> {
        let api_key = api_key_from_env(PROVIDER, "GOOGLE_API_KEY")?;
        let cx = api_key_from_env(PROVIDER, "GOOGLE_CX")?;
        Self::with_credentials(params, api_key, cx)
    }

    pub fn with_credentials(
        params: &SearchParams,
        api_key: String,
        cx: String,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            client: http_client(10)?,
            api_key,
            cx,
            params: params.clone(),
        })
    }

    async fn search_api(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let max_results = self.params.max_results;
        let mut results = Vec::new();
        let mut start = 1;
        while results.len() < max_results {
            let num = PAGE_SIZE.min(max_results - results.len());
            debug!(query, start, num, "Google Custom Search request");
            let response = self
                .client
                .get(GOOGLE_API_URL)
                .query(&[
                    ("q", query),
                    ("key", self.api_key.as_str()),
                    ("cx", self.cx.as_str()),
                    ("start", &start.to_string()),
                    ("num", &num.to_string()),
                ])
                .send()
                .await
                .map_err(|e| request_error(PROVIDER, e))?;
            let payload = read_json(PROVIDER, response).await?;
            let page = parse_custom_search(&payload);
            let full_page = page.len() >= num;
            results.extend(page);
            if !full_page {
                break;
            }
            start += num;
            tokio::time::sleep(PAGE_SPACING).await;
        }
        Ok(results)
    }

    async fn fetch_all(&self, results: Vec<SearchResult>) -> Vec<SearchResult> {
        let semaphore = Semaphore::new(FETCH_CONCURRENCY);
        let fetched = join_all(
            results
                .into_iter()
                .map(|result| fetch_full_content(&self.client, &semaphore, result)),
        )
        .await;
        info!(count = fetched.len(), "Fetched full content for results");
        fetched
    }
}

#[async_trait]
impl SearchBackend for GoogleBackend {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn search_query(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let results = self.search_api(query).await?;
        if self.params.include_raw_content && !results.is_empty() {
            return Ok(self.fetch_all(results).await);
        }
        Ok(results)
    }

    async fn search(&self, queries: &[String]) -> Vec<QueryResults> {
        let semaphore = Semaphore::new(QUERY_CONCURRENCY);
        join_all(queries.iter().map(|query| {
            let semaphore = &semaphore;
            async move {
                let outcome = match semaphore.acquire().await {
                    Ok(_permit) => self.search_query(query).await,
                    Err(_) => Ok(Vec::new()),
                };
                absorb_failure(PROVIDER, query, outcome)
            }
        }))
        .await
    }
}

/// Normalize one page of Custom Search items. The snippet doubles as raw
/// content until the page itself is fetched.
pub fn parse_custom_search(payload: &Value) -> Vec<SearchResult> {
    payload
        .get("items")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let url = item.get("link").and_then(|v| v.as_str())?;
                    let snippet = item
                        .get("snippet")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default();
                    Some(SearchResult {
                        title: item
                            .get("title")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        url: url.to_string(),
                        content: snippet.to_string(),
                        score: None,
                        raw_content: Some(snippet.to_string()),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

enum Fetched {
    Text(String),
    Binary(String),
    Status(u16),
}

impl Fetched {
    fn is_retryable(&self) -> bool {
        matches!(self, Fetched::Status(code) if *code == 429 || *code >= 500)
    }
}

async fn fetch_page(client: &reqwest::Client, url: &str) -> Result<Fetched, reqwest::Error> {
    let response = client
        .get(url)
        .header(
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        )
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        return Ok(Fetched::Status(status.as_u16()));
    }
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_lowercase();
    if is_binary(&content_type) {
        return Ok(Fetched::Binary(content_type));
    }
    Ok(Fetched::Text(response.text().await?))
}

fn is_binary(content_type: &str) -> bool {
    content_type.contains("application/pdf") || content_type.contains("application/octet-stream")
}

fn jitter() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(200..=800))
}

/// Replace a result's raw content with the text of its page.
///
/// Non-success statuses keep the snippet; transport failures are recorded
/// in the raw content instead of failing the query.
async fn fetch_full_content(
    client: &reqwest::Client,
    semaphore: &Semaphore,
    mut result: SearchResult,
) -> SearchResult {
    let Ok(_permit) = semaphore.acquire().await else {
        return result;
    };
    tokio::time::sleep(jitter()).await;

    let mut outcome = fetch_page(client, &result.url).await;
    let retry = match &outcome {
        Ok(fetched) => fetched.is_retryable(),
        Err(_) => true,
    };
    if retry {
        debug!(url = %result.url, "Retrying page fetch after backoff");
        tokio::time::sleep(RETRY_BACKOFF + jitter()).await;
        outcome = fetch_page(client, &result.url).await;
    }

    match outcome {
        Ok(Fetched::Text(html)) => result.raw_content = Some(html_to_text(&html)),
        Ok(Fetched::Binary(content_type)) => {
            result.raw_content = Some(format!(
                "[Binary content: {}. Content extraction not supported for this type of file]",
                content_type
            ));
        }
        Ok(Fetched::Status(status)) => {
            debug!(url = %result.url, status, "Page fetch returned non-success status");
        }
        Err(e) => {
            warn!(url = %result.url, error = %e, "Failed to fetch page content");
            result.raw_content = Some(format!("[Error fetching content: {}]", e));
        }
    }
    result
}

/// Strip markup from an HTML page and return its readable text.
///
/// Script and style bodies are dropped, block-level tags become line breaks,
/// and common entities are decoded.
pub fn html_to_text(html: &str) -> String {
    const BLOCK_TAGS: &[&str] = &[
        "p", "br", "div", "li", "tr", "h1", "h2", "h3", "h4", "h5", "h6", "section", "article",
    ];

    let mut text = String::with_capacity(html.len() / 2);
    let mut chars = html.chars();
    let mut skipping: Option<&str> = None;

    while let Some(ch) = chars.next() {
        if ch != '<' {
            if skipping.is_none() {
                text.push(ch);
            }
            continue;
        }

        let mut tag = String::new();
        for c in chars.by_ref() {
            if c == '>' {
                break;
            }
            tag.push(c);
        }
        let name: String = tag
            .trim_start_matches('/')
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        let closing = tag.starts_with('/');

        match skipping {
            Some(skipped) => {
                if closing && name == skipped {
                    skipping = None;
                }
            }
            None => {
                if !closing && (name == "script" || name == "style") {
                    skipping = Some(if name == "script" { "script" } else { "style" });
                } else if BLOCK_TAGS.contains(&name.as_str()) {
                    text.push('\n');
                }
            }
        }
    }

    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_custom_search() {
        let payload = json!({
            "items": [
                {
                    "title": "Quantum error correction - Wikipedia",
                    "link": "https://en.wikipedia.org/wiki/Quantum_error_correction",
                    "snippet": "Quantum error correction is used to protect quantum information."
                },
                { "title": "No link" }
            ]
        });
        let results = parse_custom_search(&payload);
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].raw_content.as_deref(),
            Some("Quantum error correction is used to protect quantum information.")
        );
        assert!(parse_custom_search(&json!({"searchInformation": {}})).is_empty());
    }

    #[test]
    fn test_html_to_text() {
        let html = r#"
        <html>
        <head><style>.foo { color: red; }</style></head>
        <body>
            <h1>Surface Codes</h1>
            <p>Logical qubits &amp; <b>physical</b> qubits.</p>
            <script type="text/javascript">var x = "<p>";</script>
            <ul><li>Item 1</li><li>Item 2</li></ul>
        </body>
        </html>"#;

        let text = html_to_text(html);
        assert!(text.contains("Surface Codes"));
        assert!(text.contains("Logical qubits & physical qubits."));
        assert!(text.contains("Item 1\nItem 2"));
        assert!(!text.contains("var x"));
        assert!(!text.contains("color: red"));
    }

    #[test]
    fn test_binary_content_types() {
        assert!(is_binary("application/pdf"));
        assert!(is_binary("application/octet-stream; charset=binary"));
        assert!(!is_binary("text/html; charset=utf-8"));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(Fetched::Status(429).is_retryable());
        assert!(Fetched::Status(503).is_retryable());
        assert!(!Fetched::Status(404).is_retryable());
        assert!(!Fetched::Text(String::new()).is_retryable());
    }

    #[test]
    fn test_jitter_range() {
        for _ in 0..20 {
            let d = jitter();
            assert!(d >= Duration::from_millis(200) && d <= Duration::from_millis(800));
        }
    }
}
