//! Contract between the sync layer and the backend holding bookmark rows.

use async_trait::async_trait;

use crate::services::change_feed::Subscription;
use crate::types::bookmark::{Bookmark, BookmarkFields, NewBookmark};
use crate::types::errors::StoreError;

/// Row-level access to the backend.
///
/// Every call is scoped to an owner id; implementations must never touch
/// rows of another owner.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Id of the user the store is currently authenticated as.
    async fn current_user_id(&self) -> Result<String, StoreError>;

    /// All rows of `owner_id`, newest first.
    async fn fetch_bookmarks(&self, owner_id: &str) -> Result<Vec<Bookmark>, StoreError>;

    /// Inserts a row and returns it as stored.
    async fn insert_bookmark(&self, row: NewBookmark) -> Result<Bookmark, StoreError>;

    /// Deletes the row matching both `id` and `owner_id`.
    async fn delete_bookmark(&self, id: &str, owner_id: &str) -> Result<(), StoreError>;

    /// Whether [`RemoteStore::update_bookmark`] is usable.
    fn supports_atomic_update(&self) -> bool {
        false
    }

    /// Replaces title, url and tags of a row in one step.
    async fn update_bookmark(
        &self,
        id: &str,
        owner_id: &str,
        fields: &BookmarkFields,
    ) -> Result<Bookmark, StoreError> {
        let _ = (owner_id, fields);
        Err(StoreError::Unsupported(format!("update of {}", id)))
    }
}

/// Source of realtime change notifications.
pub trait ChangeFeed: Send + Sync {
    /// Opens a subscription delivering changes to rows of `owner_id`.
    fn subscribe(&self, owner_id: &str) -> Result<Subscription, StoreError>;
}
