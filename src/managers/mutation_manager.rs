//! Optimistic Mutation Protocol.
//!
//! Create, delete and edit with immediate local feedback. Delete and edit
//! capture a cache snapshot first and put it back verbatim when the store
//! rejects the change. Outcomes are reported through the session's
//! [`ToastQueue`].

use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::managers::bookmark_cache::{BookmarkCacheTrait, SharedCache};
use crate::services::notifications::ToastQueue;
use crate::services::remote_store::RemoteStore;
use crate::services::validation::{validate, BookmarkInput};
use crate::types::bookmark::{Bookmark, BookmarkFields, NewBookmark};
use crate::types::config::EditStrategy;
use crate::types::errors::SyncError;
use crate::types::session::SessionContext;

/// Message recorded when a delete is rolled back.
pub const DELETE_ERROR_MESSAGE: &str = "Could not delete bookmark.";
const RETRY_HINT: &str = "Please try again.";

/// Clears an in-flight marker when the operation ends, however it ends.
struct InFlight<'a>(&'a Mutex<Option<String>>);

impl<'a> InFlight<'a> {
    fn claim(
        slot: &'a Mutex<Option<String>>,
        id: &str,
        busy: fn(String) -> SyncError,
    ) -> Result<Self, SyncError> {
        let mut guard = slot.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(current) = guard.as_ref() {
            return Err(busy(current.clone()));
        }
        *guard = Some(id.to_string());
        Ok(Self(slot))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut guard = self.0.lock().unwrap_or_else(|p| p.into_inner());
        *guard = None;
    }
}

pub struct BookmarkMutator {
    session: SessionContext,
    store: Arc<dyn RemoteStore>,
    cache: SharedCache,
    toasts: ToastQueue,
    strategy: EditStrategy,
    deleting: Mutex<Option<String>>,
    saving: Mutex<Option<String>>,
    last_error: Mutex<Option<String>>,
}

impl BookmarkMutator {
    pub fn new(
        session: SessionContext,
        store: Arc<dyn RemoteStore>,
        cache: SharedCache,
        toasts: ToastQueue,
        strategy: EditStrategy,
    ) -> Self {
        Self {
            session,
            store,
            cache,
            toasts,
            strategy,
            deleting: Mutex::new(None),
            saving: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    /// Id of the bookmark whose delete is in flight, if any.
    pub fn deleting_id(&self) -> Option<String> {
        self.deleting.lock().ok().and_then(|g| g.clone())
    }

    /// Id of the bookmark whose edit is in flight, if any.
    pub fn saving_id(&self) -> Option<String> {
        self.saving.lock().ok().and_then(|g| g.clone())
    }

    /// Last rollback message, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|g| g.clone())
    }

    fn set_last_error(&self, value: Option<&str>) {
        if let Ok(mut guard) = self.last_error.lock() {
            *guard = value.map(str::to_string);
        }
    }

    /// The edit strategy actually used against the current store.
    pub fn effective_strategy(&self) -> EditStrategy {
        match self.strategy {
            EditStrategy::Auto if self.store.supports_atomic_update() => EditStrategy::AtomicUpdate,
            EditStrategy::Auto => EditStrategy::DeleteThenReinsert,
            explicit => explicit,
        }
    }

    /// Confirms the store is still authenticated as this session's user.
    async fn ensure_session(&self) -> Result<(), SyncError> {
        let user = self.store.current_user_id().await?;
        if user != self.session.user_id {
            warn!(session = %self.session.user_id, store = %user, "session user mismatch");
            return Err(SyncError::Auth(
                "signed-in user does not match this session".to_string(),
            ));
        }
        Ok(())
    }

    /// Validates and inserts a new bookmark, then adds it to the cache.
    #[tracing::instrument(skip(self, input), fields(owner_id = %self.session.user_id))]
    pub async fn create(&self, input: &BookmarkInput) -> Result<Bookmark, SyncError> {
        let fields = validate(input)?;
        let result = async {
            self.ensure_session().await?;
            let row = NewBookmark::from_fields(&self.session.user_id, &fields);
            Ok::<_, SyncError>(self.store.insert_bookmark(row).await?)
        }
        .await;

        match result {
            Ok(bookmark) => {
                self.cache.with(|cache| cache.upsert(bookmark.clone()));
                self.toasts.success("Bookmark added successfully");
                info!(id = %bookmark.id, "bookmark created");
                Ok(bookmark)
            }
            Err(e) => {
                warn!(error = %e, "bookmark create failed");
                self.toasts
                    .error("Something went wrong", "Could not add bookmark.");
                Err(e)
            }
        }
    }

    /// Removes a bookmark locally, then remotely; rolls back on failure.
    #[tracing::instrument(skip(self), fields(owner_id = %self.session.user_id))]
    pub async fn delete(&self, id: &str) -> Result<(), SyncError> {
        let _in_flight = InFlight::claim(&self.deleting, id, SyncError::DeleteInProgress)?;

        let snapshot = self.cache.snapshot();
        self.cache.with(|cache| cache.remove(id));

        let result = async {
            self.ensure_session().await?;
            self.store
                .delete_bookmark(id, &self.session.user_id)
                .await
                .map_err(SyncError::from)
        }
        .await;

        match result {
            Ok(()) => {
                self.toasts.success("Bookmark deleted");
                info!(id, "bookmark deleted");
                Ok(())
            }
            Err(e) => {
                warn!(id, error = %e, "delete failed, restoring snapshot");
                self.cache.restore(snapshot);
                self.set_last_error(Some(DELETE_ERROR_MESSAGE));
                self.toasts.error("Delete failed", RETRY_HINT);
                Err(e)
            }
        }
    }

    /// Applies edited fields to a cached bookmark and persists them.
    #[tracing::instrument(skip(self, input), fields(owner_id = %self.session.user_id))]
    pub async fn edit(&self, id: &str, input: &BookmarkInput) -> Result<Bookmark, SyncError> {
        let fields = validate(input)?;
        let original = self
            .cache
            .get(id)
            .ok_or_else(|| SyncError::NotInCache(id.to_string()))?;
        let _in_flight = InFlight::claim(&self.saving, id, SyncError::EditInProgress)?;

        let snapshot = self.cache.snapshot();
        let optimistic = original.with_fields(&fields);
        self.cache.with(|cache| cache.replace(id, optimistic));

        let result = match self.ensure_session().await {
            Err(e) => Err(e),
            Ok(()) => match self.effective_strategy() {
                EditStrategy::AtomicUpdate => self
                    .store
                    .update_bookmark(id, &self.session.user_id, &fields)
                    .await
                    .map_err(SyncError::from),
                _ => self.recreate(&original, &fields).await,
            },
        };

        match result {
            Ok(saved) => {
                self.cache.with(|cache| cache.replace(id, saved.clone()));
                self.toasts.success("Bookmark updated");
                info!(id, "bookmark updated");
                Ok(saved)
            }
            Err(e) => {
                warn!(id, error = %e, "edit failed, restoring snapshot");
                self.cache.restore(snapshot);
                let message = match &e {
                    SyncError::Remote(inner) => inner.to_string(),
                    _ => RETRY_HINT.to_string(),
                };
                self.toasts.error("Update failed", &message);
                Err(e)
            }
        }
    }

    /// Delete-then-reinsert under the same id and creation time. Between the
    /// two calls the row does not exist remotely.
    async fn recreate(&self, original: &Bookmark, fields: &BookmarkFields) -> Result<Bookmark, SyncError> {
        let owner = &self.session.user_id;
        self.store.delete_bookmark(&original.id, owner).await?;

        match self
            .store
            .insert_bookmark(NewBookmark::recreate(original, fields))
            .await
        {
            Ok(saved) => Ok(saved),
            Err(insert_err) => {
                // Best effort: put the original row back. Its outcome is only logged.
                if let Err(restore_err) = self
                    .store
                    .insert_bookmark(NewBookmark::restore(original))
                    .await
                {
                    warn!(id = %original.id, error = %restore_err, "could not restore original row");
                }
                Err(insert_err.into())
            }
        }
    }
}
