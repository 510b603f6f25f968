//! Source deduplication and formatting.
//!
//! Flattens per-query result sets, keeps the first result seen for each URL,
//! and renders one fixed text block per surviving source. The output is a
//! pure function of the input order.

use super::{QueryResults, SearchResult};
use std::collections::HashSet;
use tracing::warn;

/// Rough characters-per-token ratio used to turn token budgets into character budgets.
pub const CHARS_PER_TOKEN: usize = 4;

const TRUNCATION_MARKER: &str = "... [truncated]";

/// Flatten result sets and drop later results whose URL was already seen.
pub fn deduplicate_sources(result_sets: &[QueryResults]) -> Vec<&SearchResult> {
    let mut seen: HashSet<&str> = HashSet::new();
    result_sets
        .iter()
        .flat_map(|set| set.results.iter())
        .filter(|result| seen.insert(result.url.as_str()))
        .collect()
}

/// Render deduplicated sources as the context block handed to the writer.
///
/// Raw content is included only when `include_raw` is set, and is cut to
/// `max_chars_per_source` characters with a visible marker. A missing raw
/// body is rendered as empty text and logged.
pub fn format_sources(
    result_sets: &[QueryResults],
    max_chars_per_source: usize,
    include_raw: bool,
) -> String {
    let separator = "=".repeat(80);
    let divider = "-".repeat(80);
    let mut out = String::from("Content from sources:\n");

    for source in deduplicate_sources(result_sets) {
        out.push_str(&format!(
            "{separator}\nSource: {}\n{divider}\nURL: {}\n===\n\
             Most relevant content from source: {}\n===\n",
            source.title, source.url, source.content
        ));
        if include_raw {
            let raw = match source.raw_content.as_deref() {
                Some(raw) => truncate_chars(raw, max_chars_per_source),
                None => {
                    warn!(url = %source.url, "No raw content for source");
                    String::new()
                }
            };
            out.push_str(&format!(
                "Full source content limited to {max_chars_per_source} characters: {raw}\n\n"
            ));
        }
        out.push_str(&format!("{separator}\n\n"));
    }

    out.trim().to_string()
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn source(url: &str, content: &str, raw: Option<&str>) -> SearchResult {
        SearchResult {
            title: format!("T {url}"),
            url: url.to_string(),
            content: content.to_string(),
            score: Some(0.5),
            raw_content: raw.map(str::to_string),
        }
    }

    #[test]
    fn test_first_occurrence_wins() {
        let sets = vec![
            QueryResults::new("q1", vec![source("https://a", "first", None)]),
            QueryResults::new(
                "q2",
                vec![
                    source("https://b", "other", None),
                    source("https://a", "second", None),
                ],
            ),
        ];
        let unique = deduplicate_sources(&sets);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].content, "first");
        assert_eq!(unique[1].url, "https://b");

        let text = format_sources(&sets, 100, false);
        assert!(text.contains("Most relevant content from source: first"));
        assert!(!text.contains("second"));
    }

    #[test]
    fn test_block_layout() {
        let sets = vec![QueryResults::new(
            "q",
            vec![source("https://a", "snippet", Some("body"))],
        )];
        let expected = format!(
            "Content from sources:\n{eq}\nSource: T https://a\n{dash}\nURL: https://a\n===\n\
             Most relevant content from source: snippet\n===\n\
             Full source content limited to 40 characters: body\n\n{eq}",
            eq = "=".repeat(80),
            dash = "-".repeat(80),
        );
        assert_eq!(format_sources(&sets, 40, true), expected);
    }

    #[test]
    fn test_raw_content_truncated_with_marker() {
        let long = "x".repeat(50);
        let sets = vec![QueryResults::new(
            "q",
            vec![source("https://a", "s", Some(&long))],
        )];
        let text = format_sources(&sets, 10, true);
        assert!(text.contains(&format!("{}{}", "x".repeat(10), TRUNCATION_MARKER)));
        assert!(!text.contains(&"x".repeat(11)));
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll... [truncated]");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("exact", 5), "exact");
    }

    #[test]
    fn test_missing_raw_content_is_tolerated() {
        let sets = vec![QueryResults::new("q", vec![source("https://a", "s", None)])];
        let text = format_sources(&sets, 10, true);
        assert!(text.contains("Full source content limited to 10 characters: \n"));
    }

    #[test]
    fn test_raw_content_omitted_when_disabled() {
        let sets = vec![QueryResults::new(
            "q",
            vec![source("https://a", "s", Some("secret body"))],
        )];
        let text = format_sources(&sets, 100, false);
        assert!(!text.contains("Full source content"));
        assert!(!text.contains("secret body"));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(format_sources(&[], 100, true), "Content from sources:");
        assert_eq!(
            format_sources(&[QueryResults::empty("q")], 100, true),
            "Content from sources:"
        );
    }
}
