use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A saved link, as stored by the remote backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub url: String,
    #[serde(default, deserialize_with = "nullable_tags")]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Bookmark {
    /// Tags with surrounding whitespace removed and blanks dropped.
    pub fn clean_tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty())
    }

    /// Case-insensitive check against the cleaned tag set.
    pub fn has_tag(&self, tag: &str) -> bool {
        let wanted = tag.to_lowercase();
        self.clean_tags().any(|t| t.to_lowercase() == wanted)
    }

    /// Returns a copy carrying the edited fields; identity and timestamps are kept.
    pub fn with_fields(&self, fields: &BookmarkFields) -> Bookmark {
        Bookmark {
            title: fields.title.clone(),
            url: fields.url.clone(),
            tags: fields.tags.clone(),
            ..self.clone()
        }
    }
}

// The backend sends `"tags": null` for rows saved without tags.
fn nullable_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// The user-editable part of a bookmark, already validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkFields {
    pub title: String,
    pub url: String,
    pub tags: Vec<String>,
}

/// Insert payload for the remote store.
///
/// `id` and `created_at` are normally assigned by the store. They are only
/// supplied when a row is recreated during an edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBookmark {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub title: String,
    pub url: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl NewBookmark {
    pub fn from_fields(user_id: &str, fields: &BookmarkFields) -> Self {
        Self {
            id: None,
            user_id: user_id.to_string(),
            title: fields.title.clone(),
            url: fields.url.clone(),
            tags: fields.tags.clone(),
            created_at: None,
        }
    }

    /// Payload recreating `original` with new fields under the same id and creation time.
    pub fn recreate(original: &Bookmark, fields: &BookmarkFields) -> Self {
        Self {
            id: Some(original.id.clone()),
            user_id: original.user_id.clone(),
            title: fields.title.clone(),
            url: fields.url.clone(),
            tags: fields.tags.clone(),
            created_at: Some(original.created_at),
        }
    }

    /// Payload restoring `original` verbatim.
    pub fn restore(original: &Bookmark) -> Self {
        Self {
            id: Some(original.id.clone()),
            user_id: original.user_id.clone(),
            title: original.title.clone(),
            url: original.url.clone(),
            tags: original.tags.clone(),
            created_at: Some(original.created_at),
        }
    }
}
