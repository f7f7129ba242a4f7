//! Input rules shared by the create and edit flows.

use std::collections::HashSet;

use tracing::debug;
use url::Url;

use crate::types::bookmark::BookmarkFields;
use crate::types::errors::ValidationError;

/// Raw form input as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookmarkInput {
    pub title: String,
    pub url: String,
    /// Comma-separated tag list.
    pub tags: String,
}

impl BookmarkInput {
    pub fn new(title: &str, url: &str, tags: &str) -> Self {
        Self {
            title: title.to_string(),
            url: url.to_string(),
            tags: tags.to_string(),
        }
    }
}

/// True when `input` starts with something shaped like `scheme://`.
fn has_scheme(input: &str) -> bool {
    match input.find("://") {
        Some(idx) if idx > 0 => {
            let scheme = &input[..idx];
            scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}

/// Trims the input and prefixes `https://` when it carries no scheme.
pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() || has_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// True when `value` parses as an absolute http or https URL.
pub fn is_valid_url(value: &str) -> bool {
    match Url::parse(value) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// Splits on commas, trims, drops blanks and case-insensitive duplicates.
/// The first spelling of each tag wins and order is preserved.
pub fn parse_tags(input: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Validates raw input into the fields sent to the store.
pub fn validate(input: &BookmarkInput) -> Result<BookmarkFields, ValidationError> {
    let title = input.title.trim();
    if title.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    let url = normalize_url(&input.url);
    if url.is_empty() {
        return Err(ValidationError::EmptyUrl);
    }
    if !is_valid_url(&url) {
        debug!(%url, "rejected bookmark url");
        return Err(ValidationError::InvalidUrl(url));
    }
    Ok(BookmarkFields {
        title: title.to_string(),
        url,
        tags: parse_tags(&input.tags),
    })
}
