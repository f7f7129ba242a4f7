//! Unit tests for the derived view: filtering, ordering, tag vocabulary,
//! collections, dashboard stats, domain analytics and bookmark cards.

mod common;

use chrono::{Duration, FixedOffset, TimeZone, Utc};
use rstest::rstest;

use common::{at, bookmark};
use linknest::services::derived_view::*;
use linknest::types::bookmark::Bookmark;
use linknest::types::preferences::LocalPreferences;

fn sample() -> Vec<Bookmark> {
    vec![
        bookmark("b1", "Rust Book", "https://doc.rust-lang.org/book", &["rust", " docs "], 100),
        bookmark("b2", "axum", "https://github.com/tokio-rs/axum", &["Rust", "web"], 300),
        bookmark("b3", "Tokio", "https://tokio.rs", &["async", ""], 200),
        bookmark("b4", "Crates", "https://crates.io/search?q=serde", &[], 400),
        bookmark("b5", "Axum examples", "https://github.com/tokio-rs/axum/examples", &["web"], 500),
    ]
}

fn ids(list: &[Bookmark]) -> Vec<&str> {
    list.iter().map(|b| b.id.as_str()).collect()
}

// ─── Filtering and ordering ───

#[test]
fn test_tag_filter_is_case_insensitive_and_all_passes_everything() {
    let records = sample();
    let rust: Vec<&str> = filter_by_tag(&records, "RUST").iter().map(|b| b.id.as_str()).collect();
    assert_eq!(rust, vec!["b1", "b2"]);
    assert_eq!(filter_by_tag(&records, ALL_TAGS).len(), records.len());
    assert!(filter_by_tag(&records, "nope").is_empty());
}

#[rstest]
#[case("", 5)]
#[case("   ", 5)]
#[case("AXUM", 2)]
#[case("tokio", 3)]
#[case("serde", 1)]
#[case("zzz", 0)]
fn test_query_matches_title_or_url(#[case] query: &str, #[case] expected: usize) {
    let records = sample();
    let hits = records.iter().filter(|b| matches_query(b, query)).count();
    assert_eq!(hits, expected);
}

#[test]
fn test_sort_modes() {
    let records = sample();
    assert_eq!(ids(&sort_bookmarks(&records, SortMode::Newest)), vec!["b5", "b4", "b2", "b3", "b1"]);
    assert_eq!(ids(&sort_bookmarks(&records, SortMode::Oldest)), vec!["b1", "b3", "b2", "b4", "b5"]);
    // Plain code-point order: uppercase before lowercase.
    assert_eq!(ids(&sort_bookmarks(&records, SortMode::Az)), vec!["b5", "b4", "b1", "b3", "b2"]);
    assert_eq!(ids(&records), vec!["b1", "b2", "b3", "b4", "b5"], "input is untouched");
}

#[test]
fn test_equal_timestamps_break_ties_by_id() {
    let records = vec![
        bookmark("a", "A", "https://a.io", &[], 10),
        bookmark("c", "C", "https://c.io", &[], 10),
        bookmark("b", "B", "https://b.io", &[], 10),
    ];
    let newest = sort_bookmarks(&records, SortMode::Newest);
    let mut oldest = sort_bookmarks(&records, SortMode::Oldest);
    oldest.reverse();
    assert_eq!(newest, oldest);
}

#[test]
fn test_az_sort_is_stable_for_equal_titles() {
    let records = vec![
        bookmark("x", "Same", "https://x.io", &[], 1),
        bookmark("y", "Same", "https://y.io", &[], 2),
    ];
    assert_eq!(ids(&sort_bookmarks(&records, SortMode::Az)), vec!["x", "y"]);
}

#[test]
fn test_visible_applies_tag_then_query_then_sort() {
    let records = sample();
    let view = ViewQuery {
        tag: "web".to_string(),
        query: "axum".to_string(),
        sort: SortMode::Oldest,
    };
    assert_eq!(ids(&visible_bookmarks(&records, &view)), vec!["b2", "b5"]);
    assert_eq!(visible_bookmarks(&records, &ViewQuery::default()).len(), 5);
}

#[test]
fn test_sort_mode_parses_wire_names() {
    assert_eq!("newest".parse::<SortMode>(), Ok(SortMode::Newest));
    assert_eq!("oldest".parse::<SortMode>(), Ok(SortMode::Oldest));
    assert_eq!("az".parse::<SortMode>(), Ok(SortMode::Az));
    assert!("za".parse::<SortMode>().is_err());
    assert_eq!(serde_json::to_string(&SortMode::Az).unwrap(), "\"az\"");
}

// ─── Tags ───

#[test]
fn test_tag_vocabulary_is_sorted_distinct_and_case_sensitive() {
    assert_eq!(tag_vocabulary(&sample()), vec!["Rust", "async", "docs", "rust", "web"]);
    assert!(tag_vocabulary(&[]).is_empty());
}

#[test]
fn test_tag_collections_count_usage() {
    let collections = tag_collections(&sample());
    assert_eq!(collections[0], TagCount { tag: "web".to_string(), count: 2 });
    assert_eq!(collections.len(), 5);
    let tags: Vec<&str> = collections.iter().map(|c| c.tag.as_str()).collect();
    assert_eq!(tags, vec!["web", "Rust", "async", "docs", "rust"]);
}

// ─── Stats ───

#[test]
fn test_summary_stats_counts_today_in_local_zone() {
    let tz = FixedOffset::east_opt(2 * 3600).unwrap();
    // 2024-05-01 10:00 at +02:00 is 08:00 UTC.
    let now = tz.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    let records = vec![
        // 2024-04-30 22:30 UTC is already May 1st at +02:00.
        bookmark("late", "Late", "https://late.io", &[], -5400),
        bookmark("morning", "Morning", "https://m.io", &[], 7 * 3600),
        bookmark("yesterday", "Yesterday", "https://y.io", &[], -86400),
    ];
    let stats = summary_stats(&records, &now);
    assert_eq!(stats.total, 3);
    assert_eq!(stats.added_today, 2);
    assert_eq!(stats.last_added_label, "May 1");
}

#[test]
fn test_summary_stats_empty() {
    let stats = summary_stats(&[], &Utc::now());
    assert_eq!(
        stats,
        SummaryStats { total: 0, added_today: 0, last_added_label: PLACEHOLDER_LABEL.to_string() }
    );
}

// ─── Analytics ───

#[test]
fn test_domain_breakdown_and_extract() {
    assert_eq!(extract_domain("https://github.com/a"), Some("github.com".to_string()));
    assert_eq!(extract_domain("not a url"), None);

    let mut records = sample();
    records.push(bookmark("bad", "Bad", "::::", &[], 1));
    let domains = domain_breakdown(&records);
    assert_eq!(domains[0], DomainCount { domain: "github.com".to_string(), count: 2 });
    assert_eq!(domains.len(), 4);
    let rest: Vec<&str> = domains[1..].iter().map(|d| d.domain.as_str()).collect();
    assert_eq!(rest, vec!["crates.io", "doc.rust-lang.org", "tokio.rs"]);
}

#[test]
fn test_analytics_summary() {
    let now = at(0) + Duration::days(10);
    let records = vec![
        bookmark("old", "Old", "https://a.io", &[], 0),
        bookmark("edge", "Edge", "https://b.io", &[], 3 * 86400),
        bookmark("new", "New", "https://a.io", &[], 9 * 86400),
        bookmark("nohost", "No host", "garbage", &[], 9 * 86400),
    ];
    let summary = analytics_summary(&records, now);
    assert_eq!(summary.total, 4);
    assert_eq!(summary.recent_7_days, 3);
    assert_eq!(summary.unique_domains, 2);
    assert_eq!(summary.top_domain_label, "a.io");
    assert_eq!(summary.top_domains.len(), 2);
}

#[test]
fn test_analytics_summary_caps_top_domains_and_handles_empty() {
    let records: Vec<Bookmark> = (0..8)
        .map(|i| bookmark(&format!("b{}", i), "T", &format!("https://site{}.io", i), &[], i))
        .collect();
    let summary = analytics_summary(&records, at(100));
    assert_eq!(summary.unique_domains, 8);
    assert_eq!(summary.top_domains.len(), 5);

    let empty = analytics_summary(&[], Utc::now());
    assert_eq!(empty.top_domain_label, PLACEHOLDER_LABEL);
    assert!(empty.top_domains.is_empty());
}

// ─── Cards ───

#[test]
fn test_bookmark_card_respects_favicon_preference() {
    let bm = bookmark("b1", "Docs", "https://docs.rs/serde", &["a", " ", "b", "c", "d"], 1);
    let on = bookmark_card(&bm, &LocalPreferences::default());
    assert_eq!(on.domain.as_deref(), Some("docs.rs"));
    assert_eq!(
        on.favicon_url.as_deref(),
        Some("https://www.google.com/s2/favicons?domain=docs.rs&sz=64")
    );
    assert_eq!(on.display_tags, vec!["a", "b", "c"]);

    let off = bookmark_card(&bm, &LocalPreferences { realtime_enabled: true, favicons_enabled: false });
    assert!(off.favicon_url.is_none());
    assert_eq!(off.domain, on.domain);
}
