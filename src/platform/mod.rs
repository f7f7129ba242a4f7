// LinkNest platform paths
// Config and data locations per OS. `LINKNEST_DATA_DIR` overrides the data
// directory everywhere, which the RPC binary and tests rely on.

use std::env;
use std::path::PathBuf;

const APP_DIR: &str = "linknest";

fn home() -> PathBuf {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(env::temp_dir)
}

/// Directory holding `sync.json` and the local preference storage.
///
/// - **Linux**: `$XDG_CONFIG_HOME/linknest` or `~/.config/linknest`
/// - **macOS**: `~/Library/Application Support/LinkNest`
/// - **Windows**: `%APPDATA%/LinkNest`
pub fn get_config_dir() -> PathBuf {
    if cfg!(target_os = "macos") {
        home().join("Library").join("Application Support").join("LinkNest")
    } else if cfg!(target_os = "windows") {
        env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(home)
            .join("LinkNest")
    } else {
        env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| home().join(".config"))
            .join(APP_DIR)
    }
}

/// Directory holding the SQLite bookmark database.
pub fn get_data_dir() -> PathBuf {
    if let Some(dir) = env::var_os("LINKNEST_DATA_DIR") {
        return PathBuf::from(dir);
    }
    if cfg!(target_os = "macos") || cfg!(target_os = "windows") {
        get_config_dir()
    } else {
        env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| home().join(".local").join("share"))
            .join(APP_DIR)
    }
}
