//! LinkNest RPC server: JSON-RPC over stdin/stdout for a desktop front end.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! Request:  {"id":1, "method":"bookmark.add", "params":{"title":"...","url":"...","tags":"a, b"}}
//! Response: {"id":1, "result":{...}} or {"id":1, "error":"..."}
//!
//! With `LINKNEST_BACKEND_URL` and friends set, bookmarks live in the hosted
//! store; otherwise a local SQLite store under the platform data dir is used.

use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;

use linknest::app::Dashboard;
use linknest::platform;
use linknest::rpc_handler::handle_method;
use linknest::services::preferences_store::PreferencesStore;
use linknest::services::remote_store::{ChangeFeed, RemoteStore};
use linknest::services::rest_store::{RestConfig, RestStore};
use linknest::services::sqlite_store::SqliteStore;
use linknest::types::config::SyncConfig;
use linknest::types::session::SessionContext;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_USER: &str = "local";

/// Simple rate limiter: max requests per second.
struct RateLimiter {
    window_start: Instant,
    request_count: u32,
    max_per_second: u32,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        Self { window_start: Instant::now(), request_count: 0, max_per_second }
    }

    /// Returns true if the request is allowed, false if rate-limited.
    fn check(&mut self) -> bool {
        if self.window_start.elapsed().as_secs() >= 1 {
            self.window_start = Instant::now();
            self.request_count = 0;
        }
        self.request_count += 1;
        self.request_count <= self.max_per_second
    }
}

fn emit(value: &Value) {
    println!("{}", value);
    let _ = io::stdout().flush();
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("LINKNEST_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn build_dashboard() -> Result<Dashboard, Box<dyn Error>> {
    let config = SyncConfig::load(&platform::get_config_dir().join("sync.json")).unwrap_or_else(|e| {
        warn!(error = %e, "falling back to default sync config");
        SyncConfig::default()
    });
    let preferences = PreferencesStore::new(None);

    match RestConfig::from_env() {
        Ok(rest) => {
            info!(base_url = %rest.base_url, "using hosted bookmark store");
            let rest = RestStore::new(rest);
            let session = SessionContext::new(rest.current_user_id().await?);
            let store: Arc<dyn RemoteStore> = Arc::new(rest);
            Ok(Dashboard::new(session, store, None, preferences, config))
        }
        Err(reason) => {
            let db_path = platform::get_data_dir().join("linknest.db");
            info!(path = %db_path.display(), %reason, "using local bookmark store");
            let user = std::env::var("LINKNEST_USER_ID").unwrap_or_else(|_| DEFAULT_USER.to_string());
            let sqlite = Arc::new(SqliteStore::open(&db_path)?);
            sqlite.sign_in(&user);
            let store: Arc<dyn RemoteStore> = sqlite.clone();
            let feed: Arc<dyn ChangeFeed> = sqlite;
            Ok(Dashboard::new(SessionContext::new(user), store, Some(feed), preferences, config))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging();

    let dashboard = build_dashboard().await?;
    if let Err(e) = dashboard.load().await {
        warn!(error = %e, "initial load failed");
    }
    dashboard.watch_preferences(dashboard.config().preferences_poll());

    // Signal ready
    emit(&json!({"event":"ready","version":env!("CARGO_PKG_VERSION")}));

    let mut rate_limiter = RateLimiter::new(200);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let req: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                emit(&json!({"id":null,"error":format!("parse error: {}",e)}));
                continue;
            }
        };

        let id = req.get("id").cloned().unwrap_or(Value::Null);

        if !rate_limiter.check() {
            emit(&json!({"id": id, "error": "rate limit exceeded"}));
            continue;
        }

        let method = req.get("method").and_then(|v| v.as_str()).unwrap_or("");
        let params = req.get("params").cloned().unwrap_or(json!({}));

        let response = match handle_method(&dashboard, method, &params).await {
            Ok(val) => json!({"id": id, "result": val}),
            Err(err) => json!({"id": id, "error": err}),
        };
        emit(&response);
    }

    info!("stdin closed, shutting down");
    Ok(())
}
