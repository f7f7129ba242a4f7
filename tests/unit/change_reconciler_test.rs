//! Unit tests for the change reconciler: event application, the debounced
//! refetch and realtime subscription handling. Timer tests run on paused
//! tokio time.

mod common;

use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;
use serde_json::json;
use tokio::sync::mpsc;

use common::{bookmark, FlakyStore, USER};
use linknest::managers::bookmark_cache::{BookmarkCacheTrait, SharedCache};
use linknest::managers::change_reconciler::{ChangeReconciler, LOAD_ERROR_MESSAGE};
use linknest::services::change_feed::Subscription;
use linknest::services::remote_store::{ChangeFeed, RemoteStore};
use linknest::types::config::DuplicateInsertPolicy;
use linknest::types::errors::{StoreError, SyncError};
use linknest::types::events::{ChangeEvent, ChangeKind, ChannelStatus, FeedMessage};

const DEBOUNCE: Duration = Duration::from_millis(600);

fn setup_with(policy: DuplicateInsertPolicy) -> (Arc<ChangeReconciler>, SharedCache, Arc<FlakyStore>) {
    let store = FlakyStore::new(true);
    let cache = SharedCache::new();
    let reconciler = ChangeReconciler::new(USER, cache.clone(), store.clone(), policy, DEBOUNCE);
    (reconciler, cache, store)
}

fn setup() -> (Arc<ChangeReconciler>, SharedCache, Arc<FlakyStore>) {
    setup_with(DuplicateInsertPolicy::KeepExisting)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

// ─── Event application ───

#[test]
fn test_insert_event_adds_to_front() {
    let (reconciler, cache, _store) = setup();
    cache.with(|c| c.replace_all(vec![bookmark("b1", "One", "https://one.io", &[], 10)]));

    let fresh = bookmark("b2", "Two", "https://two.io", &["x"], 20);
    reconciler.apply_event(&ChangeEvent::insert(&fresh)).unwrap();

    let ids: Vec<String> = cache.records().into_iter().map(|b| b.id).collect();
    assert_eq!(ids, vec!["b2", "b1"]);
}

#[test]
fn test_duplicate_insert_keeps_existing_by_default() {
    let (reconciler, cache, _store) = setup();
    let local = bookmark("b1", "Local", "https://one.io", &[], 10);
    cache.with(|c| c.upsert(local.clone()));

    let echo = bookmark("b1", "Server", "https://one.io", &[], 10);
    reconciler.apply_event(&ChangeEvent::insert(&echo)).unwrap();

    assert_eq!(cache.records(), vec![local]);
}

#[rstest]
#[case(DuplicateInsertPolicy::KeepExisting)]
#[case(DuplicateInsertPolicy::TakeLatest)]
fn test_same_insert_event_twice_leaves_one_record(#[case] policy: DuplicateInsertPolicy) {
    let (reconciler, cache, _store) = setup_with(policy);
    let fresh = bookmark("b1", "One", "https://one.io", &["x"], 10);
    let event = ChangeEvent::insert(&fresh);

    reconciler.apply_event(&event).unwrap();
    reconciler.apply_event(&event).unwrap();

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.records(), vec![fresh]);
}

#[test]
fn test_duplicate_insert_take_latest_replaces_in_place() {
    let (reconciler, cache, _store) = setup_with(DuplicateInsertPolicy::TakeLatest);
    cache.with(|c| {
        c.replace_all(vec![
            bookmark("b2", "Two", "https://two.io", &[], 20),
            bookmark("b1", "Local", "https://one.io", &[], 10),
        ])
    });

    let echo = bookmark("b1", "Server", "https://one.io", &[], 10);
    reconciler.apply_event(&ChangeEvent::insert(&echo)).unwrap();

    let records = cache.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1], echo);
}

#[test]
fn test_update_event_replaces_known_and_ignores_unknown() {
    let (reconciler, cache, _store) = setup();
    cache.with(|c| c.upsert(bookmark("b1", "One", "https://one.io", &[], 10)));

    let edited = bookmark("b1", "Uno", "https://one.io", &["es"], 10);
    reconciler.apply_event(&ChangeEvent::update(&edited)).unwrap();
    assert_eq!(cache.get("b1"), Some(edited));

    let ghost = bookmark("ghost", "Ghost", "https://ghost.io", &[], 5);
    reconciler.apply_event(&ChangeEvent::update(&ghost)).unwrap();
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_delete_event_removes_and_unknown_is_no_op() {
    let (reconciler, cache, _store) = setup();
    cache.with(|c| c.upsert(bookmark("b1", "One", "https://one.io", &[], 10)));

    reconciler.apply_event(&ChangeEvent::delete("missing")).unwrap();
    assert_eq!(cache.len(), 1);

    reconciler.apply_event(&ChangeEvent::delete("b1")).unwrap();
    assert!(cache.is_empty());
}

#[test]
fn test_malformed_event_is_a_stream_error() {
    let (reconciler, cache, _store) = setup();
    let event = ChangeEvent {
        kind: ChangeKind::Insert,
        record: json!({"id": "b1", "title": 42}),
    };
    let err = reconciler.apply_event(&event).unwrap_err();
    assert!(matches!(err, SyncError::Stream(_)));
    assert!(cache.is_empty());

    let no_id = ChangeEvent {
        kind: ChangeKind::Delete,
        record: json!({}),
    };
    assert!(matches!(reconciler.apply_event(&no_id), Err(SyncError::Stream(_))));
}

// ─── Refetch ───

#[tokio::test]
async fn test_refetch_replaces_cache_and_clears_error() {
    let (reconciler, cache, store) = setup();
    store.seed("Old", "https://old.io", &[], 10).await;
    store.seed("New", "https://new.io", &[], 20).await;
    cache.with(|c| c.upsert(bookmark("stale", "Stale", "https://stale.io", &[], 1)));

    store.fail_fetch(true);
    assert!(matches!(reconciler.refetch().await, Err(SyncError::Load(_))));
    assert_eq!(reconciler.load_error().as_deref(), Some(LOAD_ERROR_MESSAGE));
    assert_eq!(cache.len(), 1, "failed load must leave the cache untouched");

    store.fail_fetch(false);
    assert_eq!(reconciler.refetch().await.unwrap(), 2);
    assert!(reconciler.load_error().is_none());
    let titles: Vec<String> = cache.records().into_iter().map(|b| b.title).collect();
    assert_eq!(titles, vec!["New", "Old"]);
}

#[tokio::test(start_paused = true)]
async fn test_triggers_inside_window_coalesce_into_one_fetch() {
    let (reconciler, _cache, store) = setup();

    reconciler.schedule_refetch();
    tokio::time::sleep(Duration::from_millis(300)).await;
    reconciler.schedule_refetch();
    tokio::time::sleep(Duration::from_millis(200)).await;
    reconciler.schedule_refetch();
    assert!(reconciler.refetch_pending());

    // Last trigger at 500ms; the fetch is due at 1100ms.
    tokio::time::sleep(Duration::from_millis(590)).await;
    assert_eq!(reconciler.refetch_count(), 0);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(reconciler.refetch_count(), 1);
    assert!(!reconciler.refetch_pending());
    assert_eq!(store.calls(), vec!["fetch"]);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(reconciler.refetch_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_triggers_outside_window_fetch_separately() {
    let (reconciler, _cache, _store) = setup();

    reconciler.schedule_refetch();
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(reconciler.refetch_count(), 1);

    reconciler.schedule_refetch();
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(reconciler.refetch_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stop_disarms_pending_refetch() {
    let (reconciler, _cache, _store) = setup();
    reconciler.schedule_refetch();
    reconciler.stop();
    reconciler.stop();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(reconciler.refetch_count(), 0);
}

// ─── Realtime ───

#[tokio::test(start_paused = true)]
async fn test_realtime_events_from_store_reach_cache() {
    let (reconciler, cache, store) = setup();
    reconciler.start(store.as_ref()).unwrap();
    assert!(reconciler.is_running());
    settle().await;

    let saved = store.seed("Remote", "https://remote.io", &["r"], 50).await;
    settle().await;
    assert_eq!(cache.get(&saved.id), Some(saved.clone()));

    store.inner.delete_bookmark(&saved.id, USER).await.unwrap();
    settle().await;
    assert!(cache.is_empty());

    reconciler.stop();
    assert!(!reconciler.is_running());
    store.seed("After stop", "https://after.io", &[], 60).await;
    settle().await;
    assert!(cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_broken_channel_status_triggers_debounced_refetch() {
    let (reconciler, cache, store) = setup();
    store.seed("Missed", "https://missed.io", &[], 10).await;

    let (tx, rx) = mpsc::unbounded_channel();
    reconciler.handle_message(FeedMessage::Status(ChannelStatus::Subscribed));
    assert!(!reconciler.refetch_pending());

    let feed = FixedFeed::new(Subscription::from_channel(rx));
    reconciler.start(&feed).unwrap();

    tx.send(FeedMessage::Status(ChannelStatus::ChannelError)).unwrap();
    settle().await;
    tx.send(FeedMessage::Status(ChannelStatus::TimedOut)).unwrap();
    settle().await;
    assert!(reconciler.refetch_pending());
    assert!(cache.is_empty());

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(reconciler.refetch_count(), 1);
    assert_eq!(cache.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_realtime_event_triggers_refetch() {
    let (reconciler, cache, store) = setup();
    store.seed("Truth", "https://truth.io", &[], 10).await;

    reconciler.handle_message(FeedMessage::Change(ChangeEvent {
        kind: ChangeKind::Update,
        record: json!("garbage"),
    }));
    assert!(reconciler.refetch_pending());

    tokio::time::sleep(Duration::from_millis(650)).await;
    assert_eq!(cache.records()[0].title, "Truth");
}

#[tokio::test]
async fn test_start_fails_when_store_is_signed_out() {
    let (reconciler, _cache, store) = setup();
    store.inner.sign_out();
    let err = reconciler.start(store.as_ref()).unwrap_err();
    assert_eq!(err, SyncError::Auth(StoreError::Unauthenticated.to_string()));
    assert!(!reconciler.is_running());
}

/// Feed handing out one pre-built subscription.
struct FixedFeed(std::sync::Mutex<Option<Subscription>>);

impl FixedFeed {
    fn new(subscription: Subscription) -> Self {
        Self(std::sync::Mutex::new(Some(subscription)))
    }
}

impl ChangeFeed for FixedFeed {
    fn subscribe(&self, _owner_id: &str) -> Result<Subscription, StoreError> {
        self.0
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| StoreError::Rejected("already subscribed".to_string()))
    }
}
