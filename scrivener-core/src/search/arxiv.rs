//! arXiv search backend over the public Atom API.

use super::{
    QueryResults, SearchBackend, SearchParams, SearchResult, absorb_failure, http_client,
    request_error,
};
use crate::error::{ConfigError, SearchError};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::debug;

const ARXIV_API_BASE: &str = "https://export.arxiv.org/api/query";
const PROVIDER: &str = "arxiv";
const MIN_REQUEST_SPACING: Duration = Duration::from_secs(3);

/// arXiv API client. Requests within one search call are spaced apart.
pub struct ArxivBackend {
    client: reqwest::Client,
    max_results: usize,
}

impl ArxivBackend {
    pub fn new(params: &SearchParams) -> Result<Self, ConfigError> {
        Ok(Self {
            client: http_client(30)?,
            max_results: params.max_results,
        })
    }
}

/// Minimum spacing between consecutive requests of one search call.
struct RequestSpacing {
    min: Duration,
    last: Option<Instant>,
}

impl RequestSpacing {
    fn new(min: Duration) -> Self {
        Self { min, last: None }
    }

    /// Wait out the remainder of the spacing, then mark a request as sent.
    async fn wait(&mut self) {
        if let Some(wait) = self
            .last
            .and_then(|instant| self.min.checked_sub(instant.elapsed()))
        {
            tokio::time::sleep(wait).await;
        }
        self.last = Some(Instant::now());
    }
}

#[async_trait]
impl SearchBackend for ArxivBackend {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn search_query(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let url = build_search_url(query, self.max_results);
        debug!(url = %url, "arXiv search");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| request_error(PROVIDER, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let body = response
            .text()
            .await
            .map_err(|e| request_error(PROVIDER, e))?;
        Ok(parse_atom_feed(&body))
    }

    async fn search(&self, queries: &[String]) -> Vec<QueryResults> {
        let mut spacing = RequestSpacing::new(MIN_REQUEST_SPACING);
        let mut sets = Vec::with_capacity(queries.len());
        for query in queries {
            spacing.wait().await;
            let outcome = self.search_query(query).await;
            sets.push(absorb_failure(PROVIDER, query, outcome));
        }
        sets
    }
}

/// Build the query URL for a free-text search.
pub fn build_search_url(query: &str, max_results: usize) -> String {
    format!(
        "{}?search_query={}&start=0&max_results={}&sortBy=relevance&sortOrder=descending",
        ARXIV_API_BASE,
        urlencoding::encode(&format!("all:{}", query)),
        max_results,
    )
}

/// Normalize an Atom feed into search results.
///
/// The abstract is the snippet; the raw content adds authors and dates.
pub fn parse_atom_feed(xml: &str) -> Vec<SearchResult> {
    blocks(xml, "<entry>", "</entry>")
        .filter_map(parse_entry)
        .collect()
}

fn parse_entry(entry: &str) -> Option<SearchResult> {
    let id_url = tag_text(entry, "id")?;
    let title = normalize_whitespace(&tag_text(entry, "title")?);
    let summary = normalize_whitespace(&tag_text(entry, "summary").unwrap_or_default());
    let published = tag_text(entry, "published").unwrap_or_default();
    let authors: Vec<String> = blocks(entry, "<author>", "</author>")
        .filter_map(|author| tag_text(author, "name"))
        .collect();

    let mut raw = String::new();
    if !authors.is_empty() {
        raw.push_str(&format!("Authors: {}\n", authors.join(", ")));
    }
    if !published.is_empty() {
        raw.push_str(&format!("Published: {}\n", published));
    }
    if let Some(pdf) = pdf_link(entry) {
        raw.push_str(&format!("PDF: {}\n", pdf));
    }
    if !raw.is_empty() {
        raw.push('\n');
    }
    raw.push_str(&summary);

    Some(SearchResult {
        title,
        url: id_url,
        content: summary,
        score: None,
        raw_content: Some(raw),
    })
}

/// Iterate over `open ... close` blocks, inclusive.
fn blocks<'a>(xml: &'a str, open: &'a str, close: &'a str) -> impl Iterator<Item = &'a str> {
    let mut from = 0;
    std::iter::from_fn(move || {
        let start = from + xml[from..].find(open)?;
        let end = start + xml[start..].find(close)? + close.len();
        from = end;
        Some(&xml[start..end])
    })
}

/// Text of the first `<tag ...>text</tag>`.
fn tag_text(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let mut from = 0;
    loop {
        let start = from + xml[from..].find(&open)?;
        let after = start + open.len();
        // Skip longer tag names sharing the prefix, e.g. <id> vs <idx>.
        match xml[after..].chars().next() {
            Some('>') | Some(' ') => {
                let content_start = after + xml[after..].find('>')? + 1;
                let content_end = content_start + xml[content_start..].find(&close)?;
                return Some(xml[content_start..content_end].trim().to_string());
            }
            _ => from = after,
        }
    }
}

fn pdf_link(entry: &str) -> Option<String> {
    blocks(entry, "<link", ">")
        .find(|link| link.contains("title=\"pdf\"") || link.contains("application/pdf"))
        .and_then(|link| attribute(link, "href"))
}

fn attribute(tag: &str, attr: &str) -> Option<String> {
    let needle = format!("{}=\"", attr);
    let start = tag.find(&needle)? + needle.len();
    let end = start + tag[start..].find('"')?;
    Some(tag[start..end].to_string())
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>ArXiv Query</title>
  <id>http://arxiv.org/api/query</id>
  <entry>
    <id>http://arxiv.org/abs/quant-ph/9705052v1</id>
    <published>1997-05-28T00:00:00Z</published>
    <title>Stabilizer Codes and
      Quantum Error Correction</title>
    <summary>  Controlling operational errors and decoherence is one of the
major challenges.  </summary>
    <author><name>Daniel Gottesman</name></author>
    <link href="http://arxiv.org/abs/quant-ph/9705052v1" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/quant-ph/9705052v1" rel="related" type="application/pdf"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/1208.0928v2</id>
    <title>Surface codes: Towards practical large-scale quantum computation</title>
    <summary>This article provides an introduction to surface code quantum computing.</summary>
    <author><name>Austin G. Fowler</name></author>
    <author><name>Matteo Mariantoni</name></author>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_atom_feed() {
        let results = parse_atom_feed(SAMPLE_FEED);
        assert_eq!(results.len(), 2);

        let first = &results[0];
        assert_eq!(first.url, "http://arxiv.org/abs/quant-ph/9705052v1");
        assert_eq!(first.title, "Stabilizer Codes and Quantum Error Correction");
        assert_eq!(
            first.content,
            "Controlling operational errors and decoherence is one of the major challenges."
        );
        let raw = first.raw_content.as_deref().unwrap();
        assert!(raw.starts_with("Authors: Daniel Gottesman\nPublished: 1997-05-28T00:00:00Z\n"));
        assert!(raw.contains("PDF: http://arxiv.org/pdf/quant-ph/9705052v1"));
        assert!(raw.ends_with("major challenges."));

        let second = &results[1];
        assert!(
            second
                .raw_content
                .as_deref()
                .unwrap()
                .starts_with("Authors: Austin G. Fowler, Matteo Mariantoni\n\n")
        );
    }

    #[test]
    fn test_feed_id_is_not_an_entry() {
        let results = parse_atom_feed(SAMPLE_FEED);
        assert!(results.iter().all(|r| r.url != "http://arxiv.org/api/query"));
    }

    #[test]
    fn test_parse_empty_feed() {
        assert!(parse_atom_feed("<feed></feed>").is_empty());
    }

    #[test]
    fn test_build_search_url() {
        let url = build_search_url("quantum error correction", 5);
        assert!(url.starts_with(ARXIV_API_BASE));
        assert!(url.contains("search_query=all%3Aquantum%20error%20correction"));
        assert!(url.contains("max_results=5"));
    }

    #[tokio::test]
    async fn test_spacing_is_local_to_each_search() {
        let min = Duration::from_millis(300);
        let mut first = RequestSpacing::new(min);
        first.wait().await;

        let started = Instant::now();
        RequestSpacing::new(min).wait().await;
        assert!(started.elapsed() < Duration::from_millis(100));

        first.wait().await;
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_spacing_separates_consecutive_requests() {
        let min = Duration::from_millis(150);
        let mut spacing = RequestSpacing::new(min);
        let started = Instant::now();
        spacing.wait().await;
        spacing.wait().await;
        spacing.wait().await;
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[test]
    fn test_tag_text_skips_prefixed_tags() {
        assert_eq!(
            tag_text("<identity>x</identity><id>y</id>", "id").as_deref(),
            Some("y")
        );
    }
}
