// LinkNest Preferences Store
// Per-device preference record kept in a small JSON key-value file, the
// desktop counterpart of browser local storage. The record lives under
// `PREFERENCES_KEY`; other keys in the file are preserved on write.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use serde_json::{Map, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::platform;
use crate::types::errors::PreferencesError;
use crate::types::preferences::{LocalPreferences, PREFERENCES_KEY};

/// Trait defining the preferences store interface.
pub trait PreferencesStoreTrait {
    fn load(&self) -> LocalPreferences;
    fn get(&self) -> LocalPreferences;
    fn update(&self, prefs: LocalPreferences) -> Result<(), PreferencesError>;
    fn set_realtime_enabled(&self, enabled: bool) -> Result<(), PreferencesError>;
    fn set_favicons_enabled(&self, enabled: bool) -> Result<(), PreferencesError>;
    fn storage_path(&self) -> &Path;
}

/// What the file looked like the last time it was read or written.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DiskState {
    modified: Option<SystemTime>,
    content: Option<String>,
}

/// File-backed preferences with change notification.
#[derive(Clone)]
pub struct PreferencesStore {
    path: PathBuf,
    tx: Arc<watch::Sender<LocalPreferences>>,
    last_seen: Arc<Mutex<Option<DiskState>>>,
}

impl PreferencesStore {
    /// Creates a store. Without an override the file lives in the platform
    /// config directory as `local-storage.json`.
    pub fn new(path_override: Option<PathBuf>) -> Self {
        let path = path_override
            .unwrap_or_else(|| platform::get_config_dir().join("local-storage.json"));
        let (tx, _) = watch::channel(LocalPreferences::default());
        let store = Self {
            path,
            tx: Arc::new(tx),
            last_seen: Arc::new(Mutex::new(None)),
        };
        store.load();
        store
    }

    /// Receiver notified whenever the record changes, locally or on disk.
    pub fn watch(&self) -> watch::Receiver<LocalPreferences> {
        self.tx.subscribe()
    }

    fn disk_state(&self) -> DiskState {
        DiskState {
            modified: fs::metadata(&self.path).and_then(|m| m.modified()).ok(),
            content: fs::read_to_string(&self.path).ok(),
        }
    }

    fn remember(&self, state: DiskState) {
        if let Ok(mut guard) = self.last_seen.lock() {
            *guard = Some(state);
        }
    }

    fn publish(&self, prefs: LocalPreferences) {
        self.tx.send_if_modified(|current| {
            if *current == prefs {
                false
            } else {
                *current = prefs;
                true
            }
        });
    }

    /// Re-reads the file if its timestamp or contents differ from the last
    /// read and notifies observers when the record differs. Returns whether
    /// the file changed.
    pub fn reload_if_changed(&self) -> bool {
        let state = self.disk_state();
        let changed = match self.last_seen.lock() {
            Ok(guard) => guard.as_ref() != Some(&state),
            Err(_) => true,
        };
        if changed {
            debug!(path = %self.path.display(), "preferences file changed on disk");
            self.apply(state);
        }
        changed
    }

    /// Polls the file every `period`, picking up writes from other processes.
    pub fn spawn_poller(&self, period: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                store.reload_if_changed();
            }
        })
    }

    fn apply(&self, state: DiskState) -> LocalPreferences {
        let prefs = match parse_storage(state.content.as_deref()) {
            Ok(map) => record_from(&map),
            Err(e) => {
                warn!(error = %e, "preferences storage unreadable, using defaults");
                LocalPreferences::default()
            }
        };
        self.remember(state);
        self.publish(prefs);
        prefs
    }
}

/// Parses the whole storage file. A missing or blank file is an empty map;
/// anything that is not a JSON object is an error.
fn parse_storage(content: Option<&str>) -> Result<Map<String, Value>, PreferencesError> {
    let text = match content {
        Some(text) if !text.trim().is_empty() => text,
        _ => return Ok(Map::new()),
    };
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(PreferencesError::InvalidStorage(format!(
            "found {}",
            json_kind(&other)
        ))),
        Err(e) => Err(PreferencesError::InvalidStorage(e.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The record is stored as a JSON string, like a local-storage value. An
/// inline object is accepted too.
fn record_from(map: &Map<String, Value>) -> LocalPreferences {
    match map.get(PREFERENCES_KEY) {
        Some(Value::String(raw)) => LocalPreferences::parse_lenient(Some(raw.as_str())),
        Some(value @ Value::Object(_)) => {
            serde_json::from_value(value.clone()).unwrap_or_default()
        }
        _ => LocalPreferences::default(),
    }
}

impl PreferencesStoreTrait for PreferencesStore {
    /// Reads the record from disk. Missing or malformed data yields defaults.
    fn load(&self) -> LocalPreferences {
        let state = self.disk_state();
        self.apply(state)
    }

    fn get(&self) -> LocalPreferences {
        *self.tx.borrow()
    }

    /// Persists the record and notifies observers. A storage file that is not
    /// a JSON object is never overwritten.
    fn update(&self, prefs: LocalPreferences) -> Result<(), PreferencesError> {
        let current = fs::read_to_string(&self.path).ok();
        let mut map = parse_storage(current.as_deref())?;
        let record = serde_json::to_string(&prefs)
            .map_err(|e| PreferencesError::SerializationError(e.to_string()))?;
        map.insert(PREFERENCES_KEY.to_string(), Value::String(record));

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                PreferencesError::IoError(format!("Failed to create storage directory: {}", e))
            })?;
        }
        let json = serde_json::to_string_pretty(&map)
            .map_err(|e| PreferencesError::SerializationError(e.to_string()))?;
        if let Err(e) = fs::write(&self.path, json) {
            warn!(error = %e, "failed to persist preferences");
            return Err(PreferencesError::IoError(format!(
                "Failed to write storage file: {}",
                e
            )));
        }
        self.remember(self.disk_state());
        self.publish(prefs);
        Ok(())
    }

    fn set_realtime_enabled(&self, enabled: bool) -> Result<(), PreferencesError> {
        let mut prefs = self.get();
        prefs.realtime_enabled = enabled;
        self.update(prefs)
    }

    fn set_favicons_enabled(&self, enabled: bool) -> Result<(), PreferencesError> {
        let mut prefs = self.get();
        prefs.favicons_enabled = enabled;
        self.update(prefs)
    }

    fn storage_path(&self) -> &Path {
        &self.path
    }
}
