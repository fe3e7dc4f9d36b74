//! Persistence error taxonomy.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::key::display_key;
use crate::storage::StorageError;

/// The adapter call an error or event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Init,
    Create,
    Update,
    Delete,
    Clear,
    ReadAll,
    Shutdown,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Clear => "clear",
            Self::ReadAll => "read_all",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for adapter calls.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to initialize backing store at {}: {source}", path.display())]
    Init {
        path: PathBuf,
        #[source]
        source: StorageError,
    },

    #[error("{operation} failed: key '{key}' already exists")]
    DuplicateKey { operation: Operation, key: String },

    #[error("{operation} failed: {source}")]
    Io {
        operation: Operation,
        #[source]
        source: StorageError,
    },

    #[error("{operation} rejected: write queue is full")]
    QueueFull { operation: Operation },

    #[error("{operation} rejected: adapter is closed")]
    Closed { operation: Operation },

    #[error("shutdown timed out after {0:?} with writes still pending")]
    ShutdownTimeout(Duration),

    #[error("writer thread panicked")]
    WorkerPanic,
}

impl PersistenceError {
    /// Classify a storage failure for `operation` on `key`.
    pub(crate) fn from_storage(
        operation: Operation,
        key: Option<&[u8]>,
        source: impl Into<StorageError>,
    ) -> Self {
        let source = source.into();
        match key {
            Some(key) if operation == Operation::Create && source.is_constraint_violation() => {
                Self::DuplicateKey {
                    operation,
                    key: display_key(key),
                }
            }
            _ => Self::Io { operation, source },
        }
    }

    /// The operation this error belongs to, if any.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::Init { .. } => Some(Operation::Init),
            Self::DuplicateKey { operation, .. }
            | Self::Io { operation, .. }
            | Self::QueueFull { operation }
            | Self::Closed { operation } => Some(*operation),
            Self::ShutdownTimeout(_) | Self::WorkerPanic => Some(Operation::Shutdown),
            Self::InvalidArgument(_) => None,
        }
    }
}
