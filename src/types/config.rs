use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::ConfigError;

/// How the mutation layer applies an edit remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EditStrategy {
    /// Use an atomic update when the store supports one, otherwise recreate.
    #[default]
    Auto,
    /// Single remote update call.
    AtomicUpdate,
    /// Delete the row, then insert it again under the same id and creation time.
    DeleteThenReinsert,
}

/// What a realtime insert does when the id is already cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateInsertPolicy {
    /// Drop the event and keep the cached copy.
    #[default]
    KeepExisting,
    /// Replace the cached copy in place with the event payload.
    TakeLatest,
}

/// Tunables of the synchronization layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_refetch_debounce_ms")]
    pub refetch_debounce_ms: u64,
    #[serde(default = "default_toast_ttl_ms")]
    pub toast_ttl_ms: u64,
    #[serde(default)]
    pub edit_strategy: EditStrategy,
    #[serde(default)]
    pub duplicate_insert_policy: DuplicateInsertPolicy,
    /// How often the preferences file is checked for writes by other processes.
    #[serde(default = "default_preferences_poll_ms")]
    pub preferences_poll_ms: u64,
}

fn default_refetch_debounce_ms() -> u64 {
    600
}

fn default_toast_ttl_ms() -> u64 {
    3200
}

fn default_preferences_poll_ms() -> u64 {
    1000
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            refetch_debounce_ms: default_refetch_debounce_ms(),
            toast_ttl_ms: default_toast_ttl_ms(),
            edit_strategy: EditStrategy::default(),
            duplicate_insert_policy: DuplicateInsertPolicy::default(),
            preferences_poll_ms: default_preferences_poll_ms(),
        }
    }
}

impl SyncConfig {
    pub fn refetch_debounce(&self) -> Duration {
        Duration::from_millis(self.refetch_debounce_ms)
    }

    pub fn toast_ttl(&self) -> Duration {
        Duration::from_millis(self.toast_ttl_ms)
    }

    pub fn preferences_poll(&self) -> Duration {
        Duration::from_millis(self.preferences_poll_ms)
    }

    /// Loads the config from a JSON file. A missing file yields defaults;
    /// a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("Failed to read config file: {}", e)))?;
        serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseError(format!("Failed to parse config file: {}", e)))
    }
}
