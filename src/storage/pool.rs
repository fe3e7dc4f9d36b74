//! Pooled SQLite connections and the lazy entry reader.
//!
//! Uses r2d2 with r2d2_sqlite. A pooled connection is acquired per
//! statement and handed back when the guard drops, on success or error.

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;
use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::schema::{apply_pragmas, read_page, Row};

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Rows fetched per page by [`PagedEntries`].
pub const DEFAULT_PAGE_SIZE: usize = 256;

/// Error type for pool and statement failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Whether this is a uniqueness (primary key) violation.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::Database(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

/// Pool of SQLite connections to one database file.
#[derive(Clone)]
pub struct ConnectionPool {
    pool: Pool<SqliteConnectionManager>,
}

impl ConnectionPool {
    /// Create a new pool for the given database path.
    ///
    /// # Arguments
    ///
    /// * `db_path` - Path to the SQLite database file
    /// * `max_size` - Maximum number of connections in the pool
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created (r2d2 opens one
    /// connection eagerly, so an unreachable file fails here).
    pub fn new<P: AsRef<Path>>(db_path: P, max_size: u32) -> Result<Self, StorageError> {
        let manager = SqliteConnectionManager::file(db_path).with_flags(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        );

        let pool = Pool::builder()
            .max_size(max_size.max(1))
            .connection_timeout(CONNECTION_TIMEOUT)
            .connection_customizer(Box::new(ConnectionCustomizer))
            .build(manager)?;

        Ok(Self { pool })
    }

    /// Get a connection from the pool.
    pub fn get(&self) -> Result<PooledConnection<SqliteConnectionManager>, StorageError> {
        Ok(self.pool.get()?)
    }

    /// Lazily enumerate every row of `table`.
    pub fn entries(&self, table: &str) -> PagedEntries {
        PagedEntries::new(self.clone(), table.to_string(), DEFAULT_PAGE_SIZE)
    }
}

/// Connection customizer that applies the store pragmas.
#[derive(Debug)]
struct ConnectionCustomizer;

impl r2d2::CustomizeConnection<rusqlite::Connection, rusqlite::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
        apply_pragmas(conn)
    }
}

/// One-shot, finite iterator over the rows of a store table.
///
/// Rows are fetched a page at a time by rowid; no connection is held
/// between pages. After the first error the iterator is exhausted.
pub struct PagedEntries {
    pool: ConnectionPool,
    table: String,
    page_size: usize,
    after: i64,
    buffered: VecDeque<Row>,
    done: bool,
}

impl PagedEntries {
    fn new(pool: ConnectionPool, table: String, page_size: usize) -> Self {
        Self {
            pool,
            table,
            page_size: page_size.max(1),
            after: 0,
            buffered: VecDeque::new(),
            done: false,
        }
    }

    /// Use a different page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn fetch(&mut self) -> Result<(), StorageError> {
        let conn = self.pool.get()?;
        let (rows, last) = read_page(&conn, &self.table, self.after, self.page_size)?;
        if rows.len() < self.page_size {
            self.done = true;
        }
        if let Some(last) = last {
            self.after = last;
        }
        self.buffered.extend(rows);
        Ok(())
    }
}

impl Iterator for PagedEntries {
    type Item = Result<Row, StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffered.is_empty() && !self.done {
            if let Err(e) = self.fetch() {
                self.done = true;
                return Some(Err(e));
            }
        }
        self.buffered.pop_front().map(Ok)
    }
}
