//! Dashboard for LinkNest.
//!
//! Composition root for one authenticated session: wires the cache, the
//! change reconciler, the mutation layer, notifications and local
//! preferences together and exposes the derived views.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Local, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::managers::bookmark_cache::SharedCache;
use crate::managers::change_reconciler::ChangeReconciler;
use crate::managers::mutation_manager::BookmarkMutator;
use crate::services::derived_view::{
    self, AnalyticsSummary, BookmarkCard, SummaryStats, TagCount, ViewQuery,
};
use crate::services::notifications::ToastQueue;
use crate::services::preferences_store::{PreferencesStore, PreferencesStoreTrait};
use crate::services::remote_store::{ChangeFeed, RemoteStore};
use crate::services::validation::BookmarkInput;
use crate::types::bookmark::Bookmark;
use crate::types::config::SyncConfig;
use crate::types::errors::{PreferencesError, SyncError};
use crate::types::preferences::LocalPreferences;
use crate::types::session::SessionContext;

/// Everything one signed-in session needs.
///
/// Dropping the dashboard stops realtime and disarms any pending refetch;
/// requests already sent to the store run to completion but their results
/// are no longer applied by background tasks.
pub struct Dashboard {
    session: SessionContext,
    feed: Option<Arc<dyn ChangeFeed>>,
    cache: SharedCache,
    reconciler: Arc<ChangeReconciler>,
    mutator: BookmarkMutator,
    toasts: ToastQueue,
    preferences: PreferencesStore,
    config: SyncConfig,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl Dashboard {
    /// Wires a dashboard. Nothing is fetched or subscribed until [`load`].
    ///
    /// [`load`]: Dashboard::load
    pub fn new(
        session: SessionContext,
        store: Arc<dyn RemoteStore>,
        feed: Option<Arc<dyn ChangeFeed>>,
        preferences: PreferencesStore,
        config: SyncConfig,
    ) -> Self {
        let cache = SharedCache::new();
        let toasts = ToastQueue::new(config.toast_ttl());
        let reconciler = ChangeReconciler::new(
            &session.user_id,
            cache.clone(),
            store.clone(),
            config.duplicate_insert_policy,
            config.refetch_debounce(),
        );
        let mutator = BookmarkMutator::new(
            session.clone(),
            store,
            cache.clone(),
            toasts.clone(),
            config.edit_strategy,
        );
        Self {
            session,
            feed,
            cache,
            reconciler,
            mutator,
            toasts,
            preferences,
            config,
            background: Mutex::new(Vec::new()),
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    pub fn reconciler(&self) -> &Arc<ChangeReconciler> {
        &self.reconciler
    }

    pub fn mutator(&self) -> &BookmarkMutator {
        &self.mutator
    }

    pub fn toasts(&self) -> &ToastQueue {
        &self.toasts
    }

    pub fn preferences(&self) -> LocalPreferences {
        self.preferences.get()
    }

    /// Initial load followed by realtime setup. A failed load is recorded on
    /// the reconciler and returned; realtime is still started so a later
    /// broken-stream status can recover.
    #[tracing::instrument(skip(self), fields(owner_id = %self.session.user_id))]
    pub async fn load(&self) -> Result<usize, SyncError> {
        let loaded = self.reconciler.refetch().await;
        self.sync_realtime()?;
        loaded
    }

    /// Full refetch on demand.
    pub async fn refresh(&self) -> Result<usize, SyncError> {
        self.reconciler.refetch().await
    }

    /// Starts or stops the realtime subscription to match the preferences.
    pub fn sync_realtime(&self) -> Result<(), SyncError> {
        let wanted = self.preferences.get().realtime_enabled;
        apply_realtime(&self.reconciler, self.feed.as_deref(), wanted)
    }

    pub fn realtime_active(&self) -> bool {
        self.reconciler.is_running()
    }

    /// Persists new preferences and applies the realtime switch immediately.
    pub fn apply_preferences(&self, prefs: LocalPreferences) -> Result<(), PreferencesError> {
        self.preferences.update(prefs)?;
        if let Err(e) = self.sync_realtime() {
            warn!(error = %e, "could not apply realtime preference");
        }
        Ok(())
    }

    /// Follows preference writes made by another process: the file is polled
    /// every `period` and realtime is switched on or off as the record
    /// changes. The tasks end when the dashboard is dropped.
    pub fn watch_preferences(&self, period: Duration) {
        let poller = self.preferences.spawn_poller(period);
        let mut changes = self.preferences.watch();
        let reconciler = Arc::downgrade(&self.reconciler);
        let feed = self.feed.clone();
        let follower = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let wanted = changes.borrow_and_update().realtime_enabled;
                let Some(reconciler) = reconciler.upgrade() else {
                    break;
                };
                debug!(realtime = wanted, "preferences changed");
                if let Err(e) = apply_realtime(&reconciler, feed.as_deref(), wanted) {
                    warn!(error = %e, "could not apply realtime preference");
                }
            }
        });
        if let Ok(mut tasks) = self.background.lock() {
            tasks.push(poller);
            tasks.push(follower);
        }
    }

    pub async fn add(&self, input: &BookmarkInput) -> Result<Bookmark, SyncError> {
        self.mutator.create(input).await
    }

    pub async fn edit(&self, id: &str, input: &BookmarkInput) -> Result<Bookmark, SyncError> {
        self.mutator.edit(id, input).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), SyncError> {
        self.mutator.delete(id).await
    }

    pub fn visible(&self, view: &ViewQuery) -> Vec<Bookmark> {
        derived_view::visible_bookmarks(&self.cache.records(), view)
    }

    pub fn cards(&self, view: &ViewQuery) -> Vec<BookmarkCard> {
        let prefs = self.preferences.get();
        self.visible(view)
            .iter()
            .map(|b| derived_view::bookmark_card(b, &prefs))
            .collect()
    }

    pub fn tags(&self) -> Vec<String> {
        derived_view::tag_vocabulary(&self.cache.records())
    }

    pub fn collections(&self) -> Vec<TagCount> {
        derived_view::tag_collections(&self.cache.records())
    }

    pub fn stats(&self) -> SummaryStats {
        derived_view::summary_stats(&self.cache.records(), &Local::now())
    }

    pub fn analytics(&self) -> AnalyticsSummary {
        derived_view::analytics_summary(&self.cache.records(), Utc::now())
    }
}

/// Brings the subscription in line with the realtime preference.
fn apply_realtime(
    reconciler: &Arc<ChangeReconciler>,
    feed: Option<&dyn ChangeFeed>,
    wanted: bool,
) -> Result<(), SyncError> {
    match (feed, wanted) {
        (Some(feed), true) => {
            if !reconciler.is_running() {
                reconciler.start(feed)?;
            }
        }
        (None, true) => {
            warn!("realtime requested but the store has no change feed");
        }
        (_, false) => {
            if reconciler.is_running() {
                info!("realtime disabled by preferences");
            }
            reconciler.stop();
        }
    }
    Ok(())
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        if let Ok(mut tasks) = self.background.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
        self.reconciler.stop();
    }
}
