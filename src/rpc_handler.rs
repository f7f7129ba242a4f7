//! RPC method handler for the LinkNest JSON-RPC protocol.
//!
//! Extracted from `rpc_server.rs` so it can be unit-tested independently.
//! The `handle_method` function dispatches JSON-RPC method calls to the
//! session's [`Dashboard`].

use serde::Serialize;
use serde_json::{json, Value};

use crate::app::Dashboard;
use crate::services::derived_view::{SortMode, ViewQuery, ALL_TAGS};
use crate::services::validation::BookmarkInput;

fn to_json<T: Serialize>(value: &T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| format!("serialization error: {}", e))
}

fn str_param<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

fn bookmark_input(params: &Value) -> BookmarkInput {
    BookmarkInput::new(
        str_param(params, "title").unwrap_or(""),
        str_param(params, "url").unwrap_or(""),
        str_param(params, "tags").unwrap_or(""),
    )
}

fn view_query(params: &Value) -> Result<ViewQuery, String> {
    let sort = match str_param(params, "sort") {
        Some(s) => s.parse::<SortMode>()?,
        None => SortMode::Newest,
    };
    Ok(ViewQuery {
        tag: str_param(params, "tag").unwrap_or(ALL_TAGS).to_string(),
        query: str_param(params, "query").unwrap_or("").to_string(),
        sort,
    })
}

/// Dispatch a JSON-RPC method call to the appropriate handler.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub async fn handle_method(dashboard: &Dashboard, method: &str, params: &Value) -> Result<Value, String> {
    match method {
        "ping" => Ok(json!({
            "pong": true,
            "greeting": dashboard.session().greeting_name(),
            "realtime": dashboard.realtime_active(),
        })),

        // ─── Bookmarks ───
        "bookmark.add" => {
            let input = bookmark_input(params);
            let bookmark = dashboard.add(&input).await.map_err(|e| e.to_string())?;
            to_json(&bookmark)
        }
        "bookmark.list" => {
            let view = view_query(params)?;
            to_json(&dashboard.visible(&view))
        }
        "bookmark.cards" => {
            let view = view_query(params)?;
            to_json(&dashboard.cards(&view))
        }
        "bookmark.edit" => {
            let id = str_param(params, "id").ok_or("missing id")?;
            let input = bookmark_input(params);
            let bookmark = dashboard.edit(id, &input).await.map_err(|e| e.to_string())?;
            to_json(&bookmark)
        }
        "bookmark.delete" => {
            let id = str_param(params, "id").ok_or("missing id")?;
            dashboard.delete(id).await.map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "bookmark.refresh" => {
            let count = dashboard.refresh().await.map_err(|e| e.to_string())?;
            Ok(json!({"count": count}))
        }

        // ─── Derived views ───
        "tags.list" => to_json(&dashboard.tags()),
        "collections.list" => to_json(&dashboard.collections()),
        "stats.summary" => to_json(&dashboard.stats()),
        "analytics.summary" => to_json(&dashboard.analytics()),

        // ─── Settings ───
        "settings.get" => to_json(&dashboard.preferences()),
        "settings.set" => {
            let mut prefs = dashboard.preferences();
            if let Some(v) = params.get("realtimeEnabled").and_then(|v| v.as_bool()) {
                prefs.realtime_enabled = v;
            }
            if let Some(v) = params.get("faviconsEnabled").and_then(|v| v.as_bool()) {
                prefs.favicons_enabled = v;
            }
            dashboard.apply_preferences(prefs).map_err(|e| e.to_string())?;
            to_json(&prefs)
        }

        // ─── Notifications ───
        "toasts.list" => to_json(&dashboard.toasts().active()),
        "toasts.dismiss" => {
            let id = str_param(params, "id").ok_or("missing id")?;
            dashboard.toasts().dismiss(id);
            Ok(json!({"ok": true}))
        }

        _ => Err(format!("unknown method: {}", method)),
    }
}
