//! Store error type.

use thiserror::Error;

use crate::adapter::PersistenceError;
use crate::codec::CodecError;

/// Error type for store operations.
///
/// Every variant that concerns a single entry carries the offending key,
/// rendered as lossy UTF-8.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("error setting value for key '{key}': {source}")]
    Set {
        key: String,
        #[source]
        source: CodecError,
    },

    #[error("error getting value for key '{key}': {source}")]
    Get {
        key: String,
        #[source]
        source: CodecError,
    },

    #[error("key '{key}' not found")]
    NotFound { key: String },

    /// The in-memory mutation was applied; mirroring it failed.
    #[error(
        "error persisting{}: {source}",
        .key.as_ref().map(|k| format!(" key '{k}'")).unwrap_or_default()
    )]
    Persistence {
        key: Option<String>,
        #[source]
        source: PersistenceError,
    },

    /// Every entry was loaded into memory; some were not persisted.
    #[error(
        "loaded {loaded} entries but {failed} failed to persist, first at key '{key}': {source}"
    )]
    LoadPersistence {
        loaded: usize,
        failed: usize,
        key: String,
        #[source]
        source: PersistenceError,
    },

    #[error("error opening persistence adapter: {0}")]
    Adapter(#[from] PersistenceError),

    #[error("error hydrating store from adapter: {0}")]
    Hydration(#[source] PersistenceError),

    #[error("error dumping to file: {0}")]
    Dump(#[source] std::io::Error),

    #[error("error loading from file: {0}")]
    LoadIo(#[source] std::io::Error),

    #[error("error loading from file, line {line}: {reason}")]
    Load { line: usize, reason: String },
}

impl StoreError {
    /// Whether the key was missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this is a persistence failure after a successful in-memory
    /// mutation.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence { .. } | Self::LoadPersistence { .. })
    }
}
