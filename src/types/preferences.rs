use serde::{Deserialize, Serialize};

/// Storage key the preference record lives under.
pub const PREFERENCES_KEY: &str = "linknest.settings";

/// Per-device user preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalPreferences {
    #[serde(default = "default_true")]
    pub realtime_enabled: bool,
    #[serde(default = "default_true")]
    pub favicons_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for LocalPreferences {
    fn default() -> Self {
        Self {
            realtime_enabled: true,
            favicons_enabled: true,
        }
    }
}

impl LocalPreferences {
    /// Parses a stored record, falling back to defaults on any failure.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw {
            Some(text) if !text.trim().is_empty() => {
                serde_json::from_str(text).unwrap_or_default()
            }
            _ => Self::default(),
        }
    }
}
