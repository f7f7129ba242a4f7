//! Local Bookmark Cache.
//!
//! Ordered in-memory mirror of the signed-in user's bookmarks. Holds at most
//! one record per id. Callers share it as [`SharedCache`] and keep each lock
//! to a single operation.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::types::bookmark::Bookmark;

/// Trait defining the cache operations the reconciler and mutation layer use.
pub trait BookmarkCacheTrait {
    fn replace_all(&mut self, records: Vec<Bookmark>);
    fn upsert(&mut self, record: Bookmark) -> bool;
    fn replace(&mut self, id: &str, record: Bookmark) -> bool;
    fn remove(&mut self, id: &str) -> bool;
    fn get(&self, id: &str) -> Option<&Bookmark>;
    fn records(&self) -> &[Bookmark];
}

/// Cloned cache contents used for rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSnapshot(Vec<Bookmark>);

impl CacheSnapshot {
    pub fn records(&self) -> &[Bookmark] {
        &self.0
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BookmarkCache {
    records: Vec<Bookmark>,
}

impl BookmarkCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|b| b.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot(self.records.clone())
    }

    /// Puts back a snapshot verbatim.
    pub fn restore(&mut self, snapshot: CacheSnapshot) {
        self.records = snapshot.0;
    }
}

impl BookmarkCacheTrait for BookmarkCache {
    /// Installs `records` as given. Ordering comes from the fetch query.
    fn replace_all(&mut self, records: Vec<Bookmark>) {
        self.records = records;
    }

    /// Adds `record` at the front when its id is unknown; otherwise leaves the
    /// cached copy untouched. Returns whether the record was added.
    fn upsert(&mut self, record: Bookmark) -> bool {
        if self.contains(&record.id) {
            return false;
        }
        self.records.insert(0, record);
        true
    }

    /// Replaces the record with `id` in place. Returns whether it existed.
    fn replace(&mut self, id: &str, record: Bookmark) -> bool {
        match self.position(id) {
            Some(idx) => {
                self.records[idx] = record;
                true
            }
            None => false,
        }
    }

    fn remove(&mut self, id: &str) -> bool {
        match self.position(id) {
            Some(idx) => {
                self.records.remove(idx);
                true
            }
            None => false,
        }
    }

    fn get(&self, id: &str) -> Option<&Bookmark> {
        self.records.iter().find(|b| b.id == id)
    }

    fn records(&self) -> &[Bookmark] {
        &self.records
    }
}

/// Cache handle shared between the reconciler, the mutation layer and views.
#[derive(Clone, Default)]
pub struct SharedCache(Arc<Mutex<BookmarkCache>>);

impl SharedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` under the lock. Never call back into the cache from `f`.
    pub fn with<R>(&self, f: impl FnOnce(&mut BookmarkCache) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    /// Copy of the current records.
    pub fn records(&self) -> Vec<Bookmark> {
        self.lock().records().to_vec()
    }

    pub fn get(&self, id: &str) -> Option<Bookmark> {
        self.lock().get(id).cloned()
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        self.lock().snapshot()
    }

    pub fn restore(&self, snapshot: CacheSnapshot) {
        self.lock().restore(snapshot);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock leaves the Vec structurally valid, so a
    // poisoned lock is recovered instead of propagated.
    fn lock(&self) -> MutexGuard<'_, BookmarkCache> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
