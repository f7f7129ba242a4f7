use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::bookmark::Bookmark;

/// Kind of row change reported by the realtime feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A single realtime change notification.
///
/// `record` is the raw row as delivered by the transport: the new row for
/// inserts and updates, the old row (at least its `id`) for deletes. It is
/// decoded by the reconciler so that malformed payloads surface as stream
/// errors instead of being dropped silently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub record: Value,
}

impl ChangeEvent {
    pub fn insert(bookmark: &Bookmark) -> Self {
        Self {
            kind: ChangeKind::Insert,
            record: serde_json::to_value(bookmark).unwrap_or(Value::Null),
        }
    }

    pub fn update(bookmark: &Bookmark) -> Self {
        Self {
            kind: ChangeKind::Update,
            record: serde_json::to_value(bookmark).unwrap_or(Value::Null),
        }
    }

    pub fn delete(id: &str) -> Self {
        Self {
            kind: ChangeKind::Delete,
            record: serde_json::json!({ "id": id }),
        }
    }
}

/// Subscription status transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelStatus {
    Subscribed,
    ChannelError,
    TimedOut,
    Closed,
}

impl ChannelStatus {
    /// Whether the stream must be considered broken and the cache refetched.
    pub fn is_broken(self) -> bool {
        matches!(self, ChannelStatus::ChannelError | ChannelStatus::TimedOut)
    }
}

/// Everything a subscription can yield.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    Change(ChangeEvent),
    Status(ChannelStatus),
}
