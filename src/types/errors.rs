use thiserror::Error;

// === ValidationError ===

/// Rejected user input for a bookmark form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Title is empty after trimming.
    #[error("Title is required.")]
    EmptyTitle,
    /// URL is empty after trimming.
    #[error("URL is required.")]
    EmptyUrl,
    /// URL does not parse as http/https. Carries the normalized input.
    #[error("Please enter a valid URL.")]
    InvalidUrl(String),
}

// === StoreError ===

/// Errors reported by a remote store implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No row matched the (id, owner) scope.
    #[error("Bookmark not found: {0}")]
    NotFound(String),
    /// There is no authenticated session.
    #[error("Not authenticated")]
    Unauthenticated,
    /// The store refused the operation (constraint, policy, bad payload).
    #[error("Store rejected operation: {0}")]
    Rejected(String),
    /// Network or protocol failure talking to the store.
    #[error("Store transport error: {0}")]
    Transport(String),
    /// The store answered with something that is not a bookmark row.
    #[error("Store decode error: {0}")]
    Decode(String),
    /// The operation is not offered by this store.
    #[error("Operation not supported: {0}")]
    Unsupported(String),
    /// Local database failure.
    #[error("Bookmark database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            StoreError::Decode(e.to_string())
        } else {
            StoreError::Transport(e.to_string())
        }
    }
}

// === SyncError ===

/// Errors surfaced by the synchronization layer to its callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// No usable session for the operation.
    #[error("Authentication error: {0}")]
    Auth(String),
    /// The store rejected a mutation; local state has been rolled back.
    #[error("Remote error: {0}")]
    Remote(StoreError),
    /// A realtime event could not be applied.
    #[error("Realtime stream error: {0}")]
    Stream(String),
    /// A full load of the bookmark list failed.
    #[error("Could not load bookmarks: {0}")]
    Load(String),
    /// A delete is already in flight for the given id.
    #[error("Delete already in progress: {0}")]
    DeleteInProgress(String),
    /// An edit is already in flight for the given id.
    #[error("Edit already in progress: {0}")]
    EditInProgress(String),
    /// The target bookmark is not in the local cache.
    #[error("Bookmark not in cache: {0}")]
    NotInCache(String),
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unauthenticated => SyncError::Auth(e.to_string()),
            other => SyncError::Remote(other),
        }
    }
}

// === PreferencesError ===

/// Errors related to persisting local preferences.
#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("Preferences IO error: {0}")]
    IoError(String),
    #[error("Preferences serialization error: {0}")]
    SerializationError(String),
    /// The storage file exists but is not a JSON object; it is left untouched.
    #[error("Preferences storage is not a JSON object: {0}")]
    InvalidStorage(String),
}

// === ConfigError ===

/// Errors related to loading the sync configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config IO error: {0}")]
    IoError(String),
    #[error("Config parse error: {0}")]
    ParseError(String),
    #[error("Missing config value: {0}")]
    Missing(String),
}
