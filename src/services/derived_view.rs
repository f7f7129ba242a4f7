//! Derived View.
//!
//! Pure projections over cached bookmarks for display: filtering, sorting,
//! tag vocabulary, collections, dashboard statistics and per-domain
//! analytics. Nothing here mutates its input or performs I/O.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::bookmark::Bookmark;
use crate::types::preferences::LocalPreferences;

/// Shown where a label has no value.
pub const PLACEHOLDER_LABEL: &str = "—";
/// Tag selection that disables tag filtering.
pub const ALL_TAGS: &str = "all";

const TOP_DOMAIN_LIMIT: usize = 5;
const CARD_TAG_LIMIT: usize = 3;
const RECENT_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    Newest,
    Oldest,
    Az,
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(SortMode::Newest),
            "oldest" => Ok(SortMode::Oldest),
            "az" => Ok(SortMode::Az),
            other => Err(format!("unknown sort mode: {}", other)),
        }
    }
}

/// Filter and ordering selected in the list UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewQuery {
    pub tag: String,
    pub query: String,
    pub sort: SortMode,
}

impl Default for ViewQuery {
    fn default() -> Self {
        Self {
            tag: ALL_TAGS.to_string(),
            query: String::new(),
            sort: SortMode::Newest,
        }
    }
}

pub fn filter_by_tag<'a>(bookmarks: &'a [Bookmark], tag: &str) -> Vec<&'a Bookmark> {
    if tag == ALL_TAGS {
        return bookmarks.iter().collect();
    }
    bookmarks.iter().filter(|b| b.has_tag(tag)).collect()
}

/// Case-insensitive substring match on title or URL.
pub fn matches_query(bookmark: &Bookmark, query: &str) -> bool {
    let q = query.trim().to_lowercase();
    q.is_empty()
        || bookmark.title.to_lowercase().contains(&q)
        || bookmark.url.to_lowercase().contains(&q)
}

fn compare(mode: SortMode, a: &Bookmark, b: &Bookmark) -> Ordering {
    match mode {
        SortMode::Newest => b
            .created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id)),
        SortMode::Oldest => a
            .created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id)),
        SortMode::Az => a.title.cmp(&b.title),
    }
}

/// Stable sort of a copy of `bookmarks`.
pub fn sort_bookmarks(bookmarks: &[Bookmark], mode: SortMode) -> Vec<Bookmark> {
    let mut sorted = bookmarks.to_vec();
    sorted.sort_by(|a, b| compare(mode, a, b));
    sorted
}

/// Tag filter, then query filter, then sort.
pub fn visible_bookmarks(bookmarks: &[Bookmark], view: &ViewQuery) -> Vec<Bookmark> {
    let mut visible: Vec<Bookmark> = filter_by_tag(bookmarks, &view.tag)
        .into_iter()
        .filter(|b| matches_query(b, &view.query))
        .cloned()
        .collect();
    visible.sort_by(|a, b| compare(view.sort, a, b));
    visible
}

/// Distinct cleaned tags, case-sensitive, ascending.
pub fn tag_vocabulary(bookmarks: &[Bookmark]) -> Vec<String> {
    bookmarks
        .iter()
        .flat_map(|b| b.clean_tags())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

/// Tag collections: bookmark count per tag, most used first, ties by name.
pub fn tag_collections(bookmarks: &[Bookmark]) -> Vec<TagCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for tag in bookmarks.iter().flat_map(|b| b.clean_tags()) {
        *counts.entry(tag).or_default() += 1;
    }
    let mut rows: Vec<TagCount> = counts
        .into_iter()
        .map(|(tag, count)| TagCount {
            tag: tag.to_string(),
            count,
        })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    rows
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total: usize,
    pub added_today: usize,
    pub last_added_label: String,
}

/// Dashboard header numbers. `now` fixes both the instant and the time zone
/// whose calendar day counts as "today".
pub fn summary_stats<Tz>(bookmarks: &[Bookmark], now: &DateTime<Tz>) -> SummaryStats
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let tz = now.timezone();
    let today = now.date_naive();
    let added_today = bookmarks
        .iter()
        .filter(|b| b.created_at.with_timezone(&tz).date_naive() == today)
        .count();
    let last_added_label = bookmarks
        .iter()
        .max_by_key(|b| b.created_at)
        .map(|b| b.created_at.with_timezone(&tz).format("%b %-d").to_string())
        .unwrap_or_else(|| PLACEHOLDER_LABEL.to_string());
    SummaryStats {
        total: bookmarks.len(),
        added_today,
        last_added_label,
    }
}

/// Hostname of a bookmark URL, or `None` when it does not parse.
pub fn extract_domain(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .filter(|h| !h.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainCount {
    pub domain: String,
    pub count: usize,
}

/// Bookmark count per hostname, most frequent first, ties by hostname.
pub fn domain_breakdown(bookmarks: &[Bookmark]) -> Vec<DomainCount> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for domain in bookmarks.iter().filter_map(|b| extract_domain(&b.url)) {
        *counts.entry(domain).or_default() += 1;
    }
    let mut rows: Vec<DomainCount> = counts
        .into_iter()
        .map(|(domain, count)| DomainCount { domain, count })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.domain.cmp(&b.domain)));
    rows
}

/// Bookmarks created no more than seven days (by elapsed time) before `now`.
pub fn created_within_last_week(bookmarks: &[Bookmark], now: DateTime<Utc>) -> usize {
    let window = Duration::days(RECENT_WINDOW_DAYS);
    bookmarks
        .iter()
        .filter(|b| now.signed_duration_since(b.created_at) <= window)
        .count()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub total: usize,
    pub recent_7_days: usize,
    pub unique_domains: usize,
    pub top_domains: Vec<DomainCount>,
    pub top_domain_label: String,
}

pub fn analytics_summary(bookmarks: &[Bookmark], now: DateTime<Utc>) -> AnalyticsSummary {
    let domains = domain_breakdown(bookmarks);
    AnalyticsSummary {
        total: bookmarks.len(),
        recent_7_days: created_within_last_week(bookmarks, now),
        unique_domains: domains.len(),
        top_domain_label: domains
            .first()
            .map(|d| d.domain.clone())
            .unwrap_or_else(|| PLACEHOLDER_LABEL.to_string()),
        top_domains: domains.into_iter().take(TOP_DOMAIN_LIMIT).collect(),
    }
}

/// What a bookmark card needs beyond the raw row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkCard {
    pub id: String,
    pub title: String,
    pub url: String,
    pub domain: Option<String>,
    pub favicon_url: Option<String>,
    pub display_tags: Vec<String>,
}

pub fn favicon_url(domain: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(domain.as_bytes()).collect();
    format!("https://www.google.com/s2/favicons?domain={}&sz=64", encoded)
}

pub fn bookmark_card(bookmark: &Bookmark, prefs: &LocalPreferences) -> BookmarkCard {
    let domain = extract_domain(&bookmark.url);
    let favicon = match (&domain, prefs.favicons_enabled) {
        (Some(d), true) => Some(favicon_url(d)),
        _ => None,
    };
    BookmarkCard {
        id: bookmark.id.clone(),
        title: bookmark.title.clone(),
        url: bookmark.url.clone(),
        domain,
        favicon_url: favicon,
        display_tags: bookmark
            .clean_tags()
            .take(CARD_TAG_LIMIT)
            .map(str::to_string)
            .collect(),
    }
}
