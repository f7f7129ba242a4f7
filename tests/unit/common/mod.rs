//! Shared fixtures for the integration tests: a SQLite-backed store that can
//! be told to fail or stall individual calls, and bookmark builders.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Notify;

use linknest::services::remote_store::{ChangeFeed, RemoteStore};
use linknest::services::change_feed::Subscription;
use linknest::services::sqlite_store::SqliteStore;
use linknest::types::bookmark::{Bookmark, BookmarkFields, NewBookmark};
use linknest::types::errors::StoreError;

pub const USER: &str = "user-1";

/// Fixed creation time `secs` seconds after 2024-05-01T00:00:00Z.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(secs)
}

pub fn bookmark(id: &str, title: &str, url: &str, tags: &[&str], secs: i64) -> Bookmark {
    Bookmark {
        id: id.to_string(),
        user_id: USER.to_string(),
        title: title.to_string(),
        url: url.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        created_at: at(secs),
        updated_at: None,
    }
}

#[derive(Default)]
struct Faults {
    fetch: bool,
    inserts: usize,
    delete: bool,
    update: bool,
}

fn injected() -> StoreError {
    StoreError::Transport("injected failure".to_string())
}

/// In-memory store with per-call fault injection and a call log.
pub struct FlakyStore {
    pub inner: SqliteStore,
    atomic: bool,
    faults: Mutex<Faults>,
    delete_gate: Mutex<Option<Arc<Notify>>>,
    calls: Mutex<Vec<String>>,
}

impl FlakyStore {
    pub fn new(atomic: bool) -> Arc<Self> {
        let inner = SqliteStore::open_in_memory().expect("in-memory store");
        inner.sign_in(USER);
        Arc::new(Self {
            inner,
            atomic,
            faults: Mutex::new(Faults::default()),
            delete_gate: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_fetch(&self, on: bool) {
        self.faults.lock().unwrap().fetch = on;
    }

    /// The next `n` inserts fail.
    pub fn fail_next_inserts(&self, n: usize) {
        self.faults.lock().unwrap().inserts = n;
    }

    pub fn fail_delete(&self, on: bool) {
        self.faults.lock().unwrap().delete = on;
    }

    pub fn fail_update(&self, on: bool) {
        self.faults.lock().unwrap().update = on;
    }

    /// Makes every delete wait for a permit on the returned gate.
    pub fn gate_deletes(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.delete_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    /// Inserts a row directly, bypassing faults and the call log.
    pub async fn seed(&self, title: &str, url: &str, tags: &[&str], secs: i64) -> Bookmark {
        self.inner
            .insert_bookmark(NewBookmark {
                id: None,
                user_id: USER.to_string(),
                title: title.to_string(),
                url: url.to_string(),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                created_at: Some(at(secs)),
            })
            .await
            .expect("seed insert")
    }

    pub async fn rows(&self) -> Vec<Bookmark> {
        self.inner.fetch_bookmarks(USER).await.expect("fetch rows")
    }
}

#[async_trait]
impl RemoteStore for FlakyStore {
    async fn current_user_id(&self) -> Result<String, StoreError> {
        self.inner.current_user_id().await
    }

    async fn fetch_bookmarks(&self, owner_id: &str) -> Result<Vec<Bookmark>, StoreError> {
        self.record("fetch".to_string());
        if self.faults.lock().unwrap().fetch {
            return Err(injected());
        }
        self.inner.fetch_bookmarks(owner_id).await
    }

    async fn insert_bookmark(&self, row: NewBookmark) -> Result<Bookmark, StoreError> {
        self.record(format!("insert:{}", row.id.as_deref().unwrap_or("new")));
        {
            let mut faults = self.faults.lock().unwrap();
            if faults.inserts > 0 {
                faults.inserts -= 1;
                return Err(injected());
            }
        }
        self.inner.insert_bookmark(row).await
    }

    async fn delete_bookmark(&self, id: &str, owner_id: &str) -> Result<(), StoreError> {
        self.record(format!("delete:{}", id));
        let gate = self.delete_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.faults.lock().unwrap().delete {
            return Err(injected());
        }
        self.inner.delete_bookmark(id, owner_id).await
    }

    fn supports_atomic_update(&self) -> bool {
        self.atomic
    }

    async fn update_bookmark(
        &self,
        id: &str,
        owner_id: &str,
        fields: &BookmarkFields,
    ) -> Result<Bookmark, StoreError> {
        self.record(format!("update:{}", id));
        if self.faults.lock().unwrap().update {
            return Err(injected());
        }
        self.inner.update_bookmark(id, owner_id, fields).await
    }
}

impl ChangeFeed for FlakyStore {
    fn subscribe(&self, owner_id: &str) -> Result<Subscription, StoreError> {
        self.inner.subscribe(owner_id)
    }
}
