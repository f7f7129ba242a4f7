//! HTTP client for a PostgREST-style hosted backend.
//!
//! Talks to `<base>/rest/v1/bookmarks` with the project API key and the
//! user's access token. Updates of the `tags` column are unreliable on some
//! deployments, so atomic update is opt-in via [`RestConfig::atomic_update`].

use std::env;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::services::remote_store::RemoteStore;
use crate::types::bookmark::{Bookmark, BookmarkFields, NewBookmark};
use crate::types::errors::{ConfigError, StoreError};

const TABLE_PATH: &str = "rest/v1/bookmarks";

/// Connection settings for [`RestStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestConfig {
    pub base_url: String,
    pub api_key: String,
    pub access_token: Option<String>,
    pub user_id: Option<String>,
    pub atomic_update: bool,
}

impl RestConfig {
    /// Reads `LINKNEST_BACKEND_URL`, `LINKNEST_API_KEY`, and optionally
    /// `LINKNEST_ACCESS_TOKEN`, `LINKNEST_USER_ID`, `LINKNEST_ATOMIC_UPDATE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("LINKNEST_BACKEND_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing("LINKNEST_BACKEND_URL".to_string()))?;
        Url::parse(&base_url)
            .map_err(|e| ConfigError::ParseError(format!("LINKNEST_BACKEND_URL: {}", e)))?;
        let api_key = lookup("LINKNEST_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing("LINKNEST_API_KEY".to_string()))?;
        let atomic_update = matches!(
            lookup("LINKNEST_ATOMIC_UPDATE").as_deref().map(str::trim),
            Some("1") | Some("true") | Some("yes")
        );
        Ok(Self {
            base_url,
            api_key,
            access_token: lookup("LINKNEST_ACCESS_TOKEN").filter(|v| !v.is_empty()),
            user_id: lookup("LINKNEST_USER_ID").filter(|v| !v.is_empty()),
            atomic_update,
        })
    }

    /// Table endpoint with the given PostgREST filter pairs.
    pub fn table_url(&self, query: &[(&str, String)]) -> Result<Url, StoreError> {
        let mut base = Url::parse(&self.base_url)
            .map_err(|e| StoreError::Transport(format!("bad base url: {}", e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let mut url = base
            .join(TABLE_PATH)
            .map_err(|e| StoreError::Transport(format!("bad base url: {}", e)))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

/// [`RemoteStore`] over HTTP.
pub struct RestStore {
    client: Client,
    config: RestConfig,
}

impl RestStore {
    pub fn new(config: RestConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    fn authed(&self, req: RequestBuilder) -> Result<RequestBuilder, StoreError> {
        let token = self
            .config
            .access_token
            .as_deref()
            .ok_or(StoreError::Unauthenticated)?;
        Ok(req
            .header("apikey", &self.config.api_key)
            .bearer_auth(token))
    }

    /// Maps a non-success response onto the store error taxonomy.
    pub fn classify_status(status: StatusCode, body: &str) -> StoreError {
        match status {
            StatusCode::UNAUTHORIZED => StoreError::Unauthenticated,
            StatusCode::NOT_FOUND => StoreError::NotFound(body.to_string()),
            s if s.is_client_error() => StoreError::Rejected(format!("{}: {}", s, body)),
            s => StoreError::Transport(format!("{}: {}", s, body)),
        }
    }

    async fn check(resp: Response) -> Result<Response, StoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        warn!(%status, "backend rejected request");
        Err(Self::classify_status(status, &body))
    }

    async fn single_row(resp: Response) -> Result<Bookmark, StoreError> {
        let rows: Vec<Bookmark> = Self::check(resp).await?.json().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("empty representation".to_string()))
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn current_user_id(&self) -> Result<String, StoreError> {
        match (&self.config.access_token, &self.config.user_id) {
            (Some(_), Some(user)) => Ok(user.clone()),
            _ => Err(StoreError::Unauthenticated),
        }
    }

    async fn fetch_bookmarks(&self, owner_id: &str) -> Result<Vec<Bookmark>, StoreError> {
        let url = self.config.table_url(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{}", owner_id)),
            ("order", "created_at.desc".to_string()),
        ])?;
        let resp = self.authed(self.client.get(url))?.send().await?;
        let rows: Vec<Bookmark> = Self::check(resp).await?.json().await?;
        debug!(owner_id, count = rows.len(), "fetched bookmarks over http");
        Ok(rows)
    }

    async fn insert_bookmark(&self, row: NewBookmark) -> Result<Bookmark, StoreError> {
        let url = self.config.table_url(&[("select", "*".to_string())])?;
        let resp = self
            .authed(self.client.post(url))?
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;
        Self::single_row(resp).await
    }

    async fn delete_bookmark(&self, id: &str, owner_id: &str) -> Result<(), StoreError> {
        let url = self.config.table_url(&[
            ("id", format!("eq.{}", id)),
            ("user_id", format!("eq.{}", owner_id)),
        ])?;
        let resp = self
            .authed(self.client.delete(url))?
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let deleted: Vec<serde_json::Value> = Self::check(resp).await?.json().await?;
        if deleted.is_empty() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn supports_atomic_update(&self) -> bool {
        self.config.atomic_update
    }

    async fn update_bookmark(
        &self,
        id: &str,
        owner_id: &str,
        fields: &BookmarkFields,
    ) -> Result<Bookmark, StoreError> {
        if !self.config.atomic_update {
            return Err(StoreError::Unsupported(format!("update of {}", id)));
        }
        let url = self.config.table_url(&[
            ("id", format!("eq.{}", id)),
            ("user_id", format!("eq.{}", owner_id)),
            ("select", "*".to_string()),
        ])?;
        let resp = self
            .authed(self.client.patch(url))?
            .header("Prefer", "return=representation")
            .json(fields)
            .send()
            .await?;
        Self::single_row(resp).await
    }
}
