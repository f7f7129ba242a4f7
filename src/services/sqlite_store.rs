//! Self-hosted bookmark backend on SQLite.
//!
//! Implements [`RemoteStore`] and [`ChangeFeed`]: every successful write is
//! published on an in-process [`ChangeFeedHub`], so several dashboards sharing
//! one store observe each other's changes the way browser tabs do with the
//! hosted backend. Access is restricted to the signed-in user's rows.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, OptionalExtension};
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::Database;
use crate::services::change_feed::{ChangeFeedHub, Subscription};
use crate::services::remote_store::{ChangeFeed, RemoteStore};
use crate::types::bookmark::{Bookmark, BookmarkFields, NewBookmark};
use crate::types::errors::StoreError;
use crate::types::events::ChangeEvent;

const SELECT_COLUMNS: &str = "id, user_id, title, url, tags, created_at, updated_at";

type RawRow = (String, String, String, String, String, String, Option<String>);

pub struct SqliteStore {
    db: Mutex<Database>,
    feed: ChangeFeedHub,
    signed_in: Mutex<Option<String>>,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Mutex::new(db),
            feed: ChangeFeedHub::new(),
            signed_in: Mutex::new(None),
        }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Authenticates subsequent calls as `user_id`.
    pub fn sign_in(&self, user_id: &str) {
        if let Ok(mut guard) = self.signed_in.lock() {
            *guard = Some(user_id.to_string());
        }
    }

    pub fn sign_out(&self) {
        if let Ok(mut guard) = self.signed_in.lock() {
            *guard = None;
        }
    }

    /// The hub this store publishes its changes on.
    pub fn feed(&self) -> &ChangeFeedHub {
        &self.feed
    }

    fn conn(&self) -> Result<MutexGuard<'_, Database>, StoreError> {
        self.db
            .lock()
            .map_err(|e| StoreError::Database(format!("lock poisoned: {}", e)))
    }

    fn session_user(&self) -> Option<String> {
        self.signed_in.lock().ok().and_then(|g| g.clone())
    }

    /// Row-level policy: only the signed-in user may touch their own rows.
    fn authorize(&self, owner_id: &str) -> Result<(), StoreError> {
        match self.session_user() {
            None => Err(StoreError::Unauthenticated),
            Some(user) if user == owner_id => Ok(()),
            Some(_) => Err(StoreError::Rejected(
                "row-level security: owner does not match session".to_string(),
            )),
        }
    }

    fn format_ts(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_ts(raw: &str) -> Result<DateTime<Utc>, StoreError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| StoreError::Decode(format!("bad timestamp '{}': {}", raw, e)))
    }

    fn read_raw(row: &rusqlite::Row) -> rusqlite::Result<RawRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
        ))
    }

    fn decode(raw: RawRow) -> Result<Bookmark, StoreError> {
        let (id, user_id, title, url, tags, created_at, updated_at) = raw;
        let tags: Vec<String> = serde_json::from_str(&tags)
            .map_err(|e| StoreError::Decode(format!("bad tags for {}: {}", id, e)))?;
        Ok(Bookmark {
            created_at: Self::parse_ts(&created_at)?,
            updated_at: updated_at.as_deref().map(Self::parse_ts).transpose()?,
            id,
            user_id,
            title,
            url,
            tags,
        })
    }

    fn load_row(db: &Database, id: &str, owner_id: &str) -> Result<Option<Bookmark>, StoreError> {
        let raw = db
            .connection()
            .query_row(
                &format!(
                    "SELECT {} FROM bookmarks WHERE id = ?1 AND user_id = ?2",
                    SELECT_COLUMNS
                ),
                params![id, owner_id],
                Self::read_raw,
            )
            .optional()?;
        raw.map(Self::decode).transpose()
    }

    fn encode_tags(tags: &[String]) -> Result<String, StoreError> {
        serde_json::to_string(tags).map_err(|e| StoreError::Rejected(e.to_string()))
    }
}

#[async_trait]
impl RemoteStore for SqliteStore {
    async fn current_user_id(&self) -> Result<String, StoreError> {
        self.session_user().ok_or(StoreError::Unauthenticated)
    }

    async fn fetch_bookmarks(&self, owner_id: &str) -> Result<Vec<Bookmark>, StoreError> {
        self.authorize(owner_id)?;
        let db = self.conn()?;
        let mut stmt = db.connection().prepare(&format!(
            "SELECT {} FROM bookmarks WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
            SELECT_COLUMNS
        ))?;
        let raws = stmt
            .query_map(params![owner_id], Self::read_raw)?
            .collect::<Result<Vec<_>, _>>()?;
        let rows = raws
            .into_iter()
            .map(Self::decode)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(owner_id, count = rows.len(), "fetched bookmarks");
        Ok(rows)
    }

    async fn insert_bookmark(&self, row: NewBookmark) -> Result<Bookmark, StoreError> {
        self.authorize(&row.user_id)?;
        let bookmark = Bookmark {
            id: row.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            user_id: row.user_id,
            title: row.title,
            url: row.url,
            tags: row.tags,
            // Stored with microsecond precision; return exactly what a fetch would.
            created_at: row.created_at.unwrap_or_else(Utc::now).trunc_subsecs(6),
            updated_at: None,
        };
        {
            let db = self.conn()?;
            let tags = Self::encode_tags(&bookmark.tags)?;
            db.connection()
                .execute(
                    "INSERT INTO bookmarks (id, user_id, title, url, tags, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)",
                    params![
                        bookmark.id,
                        bookmark.user_id,
                        bookmark.title,
                        bookmark.url,
                        tags,
                        Self::format_ts(&bookmark.created_at)
                    ],
                )
                .map_err(|e| match e {
                    rusqlite::Error::SqliteFailure(err, msg)
                        if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                    {
                        StoreError::Rejected(msg.unwrap_or_else(|| "duplicate key".to_string()))
                    }
                    other => StoreError::from(other),
                })?;
        }
        info!(id = %bookmark.id, owner_id = %bookmark.user_id, "bookmark inserted");
        self.feed
            .publish(&bookmark.user_id, ChangeEvent::insert(&bookmark));
        Ok(bookmark)
    }

    async fn delete_bookmark(&self, id: &str, owner_id: &str) -> Result<(), StoreError> {
        self.authorize(owner_id)?;
        let affected = {
            let db = self.conn()?;
            db.connection().execute(
                "DELETE FROM bookmarks WHERE id = ?1 AND user_id = ?2",
                params![id, owner_id],
            )?
        };
        if affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        info!(id, owner_id, "bookmark deleted");
        self.feed.publish(owner_id, ChangeEvent::delete(id));
        Ok(())
    }

    fn supports_atomic_update(&self) -> bool {
        true
    }

    async fn update_bookmark(
        &self,
        id: &str,
        owner_id: &str,
        fields: &BookmarkFields,
    ) -> Result<Bookmark, StoreError> {
        self.authorize(owner_id)?;
        let updated = {
            let db = self.conn()?;
            let tags = Self::encode_tags(&fields.tags)?;
            let affected = db.connection().execute(
                "UPDATE bookmarks SET title = ?1, url = ?2, tags = ?3, updated_at = ?4
                 WHERE id = ?5 AND user_id = ?6",
                params![
                    fields.title,
                    fields.url,
                    tags,
                    Self::format_ts(&Utc::now()),
                    id,
                    owner_id
                ],
            )?;
            if affected == 0 {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Self::load_row(&db, id, owner_id)?.ok_or_else(|| StoreError::NotFound(id.to_string()))?
        };
        info!(id, owner_id, "bookmark updated");
        self.feed.publish(owner_id, ChangeEvent::update(&updated));
        Ok(updated)
    }
}

impl ChangeFeed for SqliteStore {
    fn subscribe(&self, owner_id: &str) -> Result<Subscription, StoreError> {
        self.authorize(owner_id)?;
        self.feed.subscribe(owner_id)
    }
}
