//! Synchronous SQLite adapter.
//!
//! Every call acquires a pooled connection, executes exactly one statement
//! in autocommit mode, and releases the connection when the guard drops.
//! The caller blocks for the whole round trip.

use std::path::{Path, PathBuf};

use super::{Entries, Operation, PersistenceAdapter, PersistenceError};
use crate::storage::schema::{
    self, clear_entries, db_path, delete_entry, insert_entry, table_name, update_entry,
    validate_store_name,
};
use crate::storage::{ConnectionPool, StorageError};

/// Connections kept by a sync adapter; calls are serialized by the store.
const POOL_SIZE: u32 = 2;

/// Adapter that performs each mutation inline on the calling thread.
pub struct SyncAdapter {
    pool: ConnectionPool,
    table: String,
    path: PathBuf,
}

impl SyncAdapter {
    /// Open (creating if needed) the database for store `name` under
    /// `data_dir` and ensure its table exists.
    ///
    /// # Errors
    ///
    /// [`PersistenceError::InvalidArgument`] for an unusable name, before any
    /// I/O; [`PersistenceError::Init`] if the file cannot be opened or the
    /// table cannot be created.
    pub fn open(name: &str, data_dir: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        validate_store_name(name).map_err(PersistenceError::InvalidArgument)?;
        let path = db_path(data_dir.as_ref(), name);
        let table = table_name(name);

        // A plain connection first: r2d2 retries failed connects until its
        // timeout, a direct open fails immediately.
        let init = |path: &Path| -> Result<ConnectionPool, StorageError> {
            let conn = rusqlite::Connection::open(path)?;
            schema::apply_pragmas(&conn)?;
            schema::initialize_schema(&conn, &table)?;
            drop(conn);
            ConnectionPool::new(path, POOL_SIZE)
        };
        let pool = init(&path).map_err(|source| PersistenceError::Init {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(path = %path.display(), table = %table, "Sync adapter ready");
        Ok(Self { pool, table, path })
    }

    /// Path of the backing database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn run<F>(&self, operation: Operation, key: Option<&[u8]>, statement: F) -> Result<(), PersistenceError>
    where
        F: FnOnce(&rusqlite::Connection) -> rusqlite::Result<()>,
    {
        let result = self
            .pool
            .get()
            .and_then(|conn| statement(&*conn).map_err(StorageError::from));
        result.map_err(|e| PersistenceError::from_storage(operation, key, e))
    }
}

impl PersistenceAdapter for SyncAdapter {
    fn create(&self, key: &[u8], value: &[u8]) -> Result<(), PersistenceError> {
        self.run(Operation::Create, Some(key), |conn| {
            insert_entry(conn, &self.table, key, value)
        })
    }

    fn update(&self, key: &[u8], value: &[u8]) -> Result<(), PersistenceError> {
        self.run(Operation::Update, Some(key), |conn| {
            update_entry(conn, &self.table, key, value)
        })
    }

    fn delete(&self, key: &[u8]) -> Result<(), PersistenceError> {
        self.run(Operation::Delete, Some(key), |conn| {
            delete_entry(conn, &self.table, key)
        })
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        self.run(Operation::Clear, None, |conn| clear_entries(conn, &self.table))
    }

    fn read_all(&self) -> Result<Entries<'_>, PersistenceError> {
        Ok(Box::new(self.pool.entries(&self.table).map(|row| {
            row.map_err(|e| PersistenceError::from_storage(Operation::ReadAll, None, e))
        })))
    }
}
