//! Property-based tests for source deduplication and formatting.

use proptest::prelude::*;

use scrivener_core::search::{QueryResults, SearchResult, deduplicate_sources, format_sources};

fn result_strategy() -> impl Strategy<Value = SearchResult> {
    (
        0usize..6,
        "[a-z ]{0,20}",
        proptest::option::of("[a-z ]{0,40}"),
    )
        .prop_map(|(idx, content, raw)| SearchResult {
            title: format!("Source {idx}"),
            url: format!("https://example.com/{idx}"),
            content,
            score: None,
            raw_content: raw,
        })
}

fn sets_strategy() -> impl Strategy<Value = Vec<QueryResults>> {
    prop::collection::vec(
        ("[a-z]{1,8}", prop::collection::vec(result_strategy(), 0..5))
            .prop_map(|(query, results)| QueryResults::new(query, results)),
        0..5,
    )
}

fn flatten(sets: &[QueryResults]) -> Vec<&SearchResult> {
    sets.iter().flat_map(|s| s.results.iter()).collect()
}

proptest! {
    #[test]
    fn dedup_is_idempotent(sets in sets_strategy(), budget in 1usize..64, raw in any::<bool>()) {
        let once: Vec<SearchResult> = deduplicate_sources(&sets).into_iter().cloned().collect();
        let again = vec![QueryResults::new("merged", once)];
        prop_assert_eq!(
            format_sources(&sets, budget, raw),
            format_sources(&again, budget, raw)
        );
    }

    #[test]
    fn dedup_has_no_duplicate_urls(sets in sets_strategy()) {
        let deduped = deduplicate_sources(&sets);
        let mut urls: Vec<&str> = deduped.iter().map(|r| r.url.as_str()).collect();
        let total = urls.len();
        urls.sort_unstable();
        urls.dedup();
        prop_assert_eq!(urls.len(), total);
    }

    #[test]
    fn dedup_keeps_first_occurrence(sets in sets_strategy()) {
        let flat = flatten(&sets);
        for kept in deduplicate_sources(&sets) {
            let first = flat.iter().find(|r| r.url == kept.url);
            prop_assert_eq!(first.map(|r| &r.content), Some(&kept.content));
            prop_assert_eq!(first.map(|r| &r.raw_content), Some(&kept.raw_content));
        }
    }

    #[test]
    fn dedup_preserves_first_seen_order(sets in sets_strategy()) {
        let mut expected: Vec<&str> = Vec::new();
        for result in flatten(&sets) {
            if !expected.contains(&result.url.as_str()) {
                expected.push(result.url.as_str());
            }
        }
        let actual: Vec<&str> = deduplicate_sources(&sets).iter().map(|r| r.url.as_str()).collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn formatted_block_lists_each_source_once(sets in sets_strategy(), raw in any::<bool>()) {
        let unique = deduplicate_sources(&sets).len();
        let formatted = format_sources(&sets, 16, raw);
        prop_assert!(formatted.starts_with("Content from sources:"));
        prop_assert_eq!(formatted.matches("\nURL: ").count(), unique);
    }
}
