//! Change Reconciler.
//!
//! Applies realtime change events to the [`SharedCache`] and falls back to a
//! debounced full refetch whenever the stream cannot be trusted: an event
//! that fails to decode, or a channel error/timeout status. The refetch timer
//! is single-shot; every new trigger cancels the pending one and starts over.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::managers::bookmark_cache::{BookmarkCacheTrait, SharedCache};
use crate::services::change_feed::Subscription;
use crate::services::remote_store::{ChangeFeed, RemoteStore};
use crate::types::bookmark::Bookmark;
use crate::types::config::DuplicateInsertPolicy;
use crate::types::errors::SyncError;
use crate::types::events::{ChangeEvent, ChangeKind, FeedMessage};

/// Message shown when a full load fails.
pub const LOAD_ERROR_MESSAGE: &str = "Could not load bookmarks.";

#[derive(Default)]
struct PendingRefetch {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

pub struct ChangeReconciler {
    owner_id: String,
    cache: SharedCache,
    store: Arc<dyn RemoteStore>,
    policy: DuplicateInsertPolicy,
    debounce: Duration,
    pending: Mutex<PendingRefetch>,
    realtime: Mutex<Option<JoinHandle<()>>>,
    load_error: Mutex<Option<String>>,
    refetches: AtomicUsize,
}

impl ChangeReconciler {
    pub fn new(
        owner_id: &str,
        cache: SharedCache,
        store: Arc<dyn RemoteStore>,
        policy: DuplicateInsertPolicy,
        debounce: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            owner_id: owner_id.to_string(),
            cache,
            store,
            policy,
            debounce,
            pending: Mutex::new(PendingRefetch::default()),
            realtime: Mutex::new(None),
            load_error: Mutex::new(None),
            refetches: AtomicUsize::new(0),
        })
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Last load failure message, cleared by the next successful load.
    pub fn load_error(&self) -> Option<String> {
        self.load_error.lock().ok().and_then(|g| g.clone())
    }

    /// Number of full fetches attempted so far.
    pub fn refetch_count(&self) -> usize {
        self.refetches.load(Ordering::SeqCst)
    }

    fn set_load_error(&self, value: Option<String>) {
        if let Ok(mut guard) = self.load_error.lock() {
            *guard = value;
        }
    }

    /// Applies one change event to the cache.
    pub fn apply_event(&self, event: &ChangeEvent) -> Result<(), SyncError> {
        match event.kind {
            ChangeKind::Insert => {
                let record = decode_row(event)?;
                let policy = self.policy;
                self.cache.with(|cache| {
                    let id = record.id.clone();
                    if !cache.upsert(record.clone()) && policy == DuplicateInsertPolicy::TakeLatest {
                        cache.replace(&id, record);
                    }
                });
            }
            ChangeKind::Update => {
                let record = decode_row(event)?;
                let id = record.id.clone();
                self.cache.with(|cache| cache.replace(&id, record));
            }
            ChangeKind::Delete => {
                let id = event
                    .record
                    .get("id")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| SyncError::Stream("delete event without id".to_string()))?;
                self.cache.with(|cache| cache.remove(id));
            }
        }
        Ok(())
    }

    /// Routes a subscription message: changes are applied, broken-stream
    /// statuses and undecodable events schedule a refetch.
    pub fn handle_message(self: &Arc<Self>, message: FeedMessage) {
        match message {
            FeedMessage::Change(event) => {
                if let Err(e) = self.apply_event(&event) {
                    warn!(error = %e, kind = ?event.kind, "realtime event rejected");
                    self.schedule_refetch();
                }
            }
            FeedMessage::Status(status) => {
                debug!(?status, "realtime status");
                if status.is_broken() {
                    self.schedule_refetch();
                }
            }
        }
    }

    /// Arms the refetch timer, cancelling a pending one that has not fired yet.
    pub fn schedule_refetch(self: &Arc<Self>) {
        let Ok(mut pending) = self.pending.lock() else {
            return;
        };
        if let Some(handle) = pending.handle.take() {
            handle.abort();
        }
        pending.generation += 1;
        let generation = pending.generation;
        let weak = Arc::downgrade(self);
        let delay = self.debounce;
        pending.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(this) = weak.upgrade() else {
                return;
            };
            // Once fired the fetch is no longer cancellable by later triggers.
            if let Ok(mut pending) = this.pending.lock() {
                if pending.generation == generation {
                    pending.handle = None;
                }
            }
            let _ = this.refetch().await;
        }));
        debug!(generation, "refetch scheduled");
    }

    /// Whether a refetch timer is armed and has not fired yet.
    pub fn refetch_pending(&self) -> bool {
        self.pending
            .lock()
            .map(|p| p.handle.is_some())
            .unwrap_or(false)
    }

    /// Full fetch; on success the cache is replaced wholesale.
    #[tracing::instrument(skip(self), fields(owner_id = %self.owner_id))]
    pub async fn refetch(&self) -> Result<usize, SyncError> {
        self.refetches.fetch_add(1, Ordering::SeqCst);
        match self.store.fetch_bookmarks(&self.owner_id).await {
            Ok(rows) => {
                let count = rows.len();
                self.cache.with(|cache| cache.replace_all(rows));
                self.set_load_error(None);
                info!(count, "bookmarks loaded");
                Ok(count)
            }
            Err(e) => {
                warn!(error = %e, "bookmark load failed");
                self.set_load_error(Some(LOAD_ERROR_MESSAGE.to_string()));
                Err(SyncError::Load(e.to_string()))
            }
        }
    }

    /// Subscribes to `feed` and drives the subscription on a background task.
    /// Restarting replaces a running subscription.
    pub fn start(self: &Arc<Self>, feed: &dyn ChangeFeed) -> Result<(), SyncError> {
        let subscription = feed.subscribe(&self.owner_id)?;
        self.stop_realtime();
        let task = tokio::spawn(drive(Arc::downgrade(self), subscription));
        if let Ok(mut guard) = self.realtime.lock() {
            *guard = Some(task);
        }
        info!(owner_id = %self.owner_id, "realtime started");
        Ok(())
    }

    fn stop_realtime(&self) -> bool {
        let task = self.realtime.lock().ok().and_then(|mut g| g.take());
        match task {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    /// Stops reacting to realtime messages and disarms the refetch timer.
    /// Safe to call repeatedly.
    pub fn stop(&self) {
        if self.stop_realtime() {
            info!(owner_id = %self.owner_id, "realtime stopped");
        }
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(handle) = pending.handle.take() {
                handle.abort();
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.realtime
            .lock()
            .map(|g| g.as_ref().map(|t| !t.is_finished()).unwrap_or(false))
            .unwrap_or(false)
    }
}

impl Drop for ChangeReconciler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn decode_row(event: &ChangeEvent) -> Result<Bookmark, SyncError> {
    serde_json::from_value(event.record.clone())
        .map_err(|e| SyncError::Stream(format!("undecodable {:?} payload: {}", event.kind, e)))
}

async fn drive(reconciler: Weak<ChangeReconciler>, mut subscription: Subscription) {
    while let Some(message) = subscription.next().await {
        let Some(this) = reconciler.upgrade() else {
            break;
        };
        this.handle_message(message);
    }
    subscription.unsubscribe();
}
