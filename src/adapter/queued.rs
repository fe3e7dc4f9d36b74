//! Queued asynchronous SQLite adapter.
//!
//! Mutations are enqueued and return immediately; a dedicated writer thread
//! executes them in FIFO order, batching each burst into one transaction.
//!
//! State machine:
//! - `Idle`: no pending work, no open transaction
//! - `Draining`: the writer holds a transaction and is executing items
//! - `Stopped`: the writer exited; further mutations fail with `Closed`
//!
//! Per-item failures cannot reach the enqueueing caller. They are counted
//! and published on the adapter's [`EventBus`].

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use super::burst::BurstConfig;
use super::events::{AdapterEvent, EventBus};
use super::worker::{QueueItem, Shared, Worker};
use super::{Entries, Operation, PersistenceAdapter, PersistenceError};
use crate::storage::schema::{self, db_path, table_name, validate_store_name};
use crate::storage::{ConnectionPool, StorageError};

/// Lifecycle state of a [`QueuedAsyncAdapter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AdapterState {
    Idle = 0,
    Draining = 1,
    Stopped = 2,
}

impl AdapterState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

/// What an enqueue does when a bounded queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Wait for the writer to make room.
    #[default]
    Block,
    /// Fail with [`PersistenceError::QueueFull`].
    Reject,
}

impl FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "block" => Ok(Self::Block),
            "reject" => Ok(Self::Reject),
            _ => Err(format!("unknown overflow policy: {s}")),
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Block => "block",
            Self::Reject => "reject",
        })
    }
}

/// Configuration for a [`QueuedAsyncAdapter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Queue capacity; `None` for an unbounded queue
    pub capacity: Option<usize>,
    /// Behavior of enqueue when a bounded queue is full
    pub overflow: OverflowPolicy,
    /// Burst sizing and idle window
    pub burst: BurstConfig,
    /// How long shutdown waits for the queue to drain
    pub shutdown_timeout: Duration,
    /// Buffered events per subscriber
    pub event_capacity: usize,
    /// Connections available to `read_all`
    pub reader_pool_size: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: Some(10_000),
            overflow: OverflowPolicy::Block,
            burst: BurstConfig::default(),
            shutdown_timeout: Duration::from_secs(5),
            event_capacity: 1024,
            reader_pool_size: 2,
        }
    }
}

impl QueueConfig {
    /// Check the configuration before any I/O.
    pub fn validate(&self) -> Result<(), PersistenceError> {
        if self.capacity == Some(0) {
            return Err(PersistenceError::InvalidArgument(
                "queue capacity must be at least 1".into(),
            ));
        }
        if self.burst.max_burst_size == 0 {
            return Err(PersistenceError::InvalidArgument(
                "max burst size must be at least 1".into(),
            ));
        }
        if self.burst.idle_timeout.is_zero() {
            return Err(PersistenceError::InvalidArgument(
                "idle timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Totals reported when the writer has stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShutdownReport {
    /// Items the writer took off the queue and executed
    pub executed: u64,
    /// Items that failed to execute or were lost to a failed commit
    pub failed: u64,
}

/// Adapter that defers every mutation to a single writer thread.
pub struct QueuedAsyncAdapter {
    sender: RwLock<Option<Sender<QueueItem>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    done: Receiver<()>,
    shared: Arc<Shared>,
    events: EventBus,
    reader: ConnectionPool,
    table: String,
    path: PathBuf,
    config: QueueConfig,
}

impl QueuedAsyncAdapter {
    /// Open the database for store `name` under `data_dir`, ensure its table
    /// exists and start the writer thread.
    ///
    /// # Errors
    ///
    /// [`PersistenceError::InvalidArgument`] for an unusable name or config,
    /// before any I/O; [`PersistenceError::Init`] if the database cannot be
    /// opened or the table cannot be created.
    pub fn open(name: &str, data_dir: impl AsRef<Path>, config: QueueConfig) -> Result<Self, PersistenceError> {
        validate_store_name(name).map_err(PersistenceError::InvalidArgument)?;
        config.validate()?;
        let path = db_path(data_dir.as_ref(), name);
        let table = table_name(name);

        let init = |path: &Path| -> Result<(rusqlite::Connection, ConnectionPool), StorageError> {
            let conn = rusqlite::Connection::open(path)?;
            schema::apply_pragmas(&conn)?;
            schema::initialize_schema(&conn, &table)?;
            let reader = ConnectionPool::new(path, config.reader_pool_size)?;
            Ok((conn, reader))
        };
        let (conn, reader) = init(&path).map_err(|source| PersistenceError::Init {
            path: path.clone(),
            source,
        })?;

        let (tx, rx) = match config.capacity {
            Some(capacity) => channel::bounded(capacity),
            None => channel::unbounded(),
        };
        let (done_tx, done_rx) = channel::bounded(0);
        let shared = Arc::new(Shared::default());
        let events = EventBus::new(config.event_capacity);

        let worker = Worker::new(
            conn,
            table.clone(),
            rx,
            config.burst,
            Arc::clone(&shared),
            events.clone(),
            done_tx,
        );
        let handle = std::thread::Builder::new()
            .name(format!("snorkels-writer-{name}"))
            .spawn(move || worker.run())
            .map_err(|e| PersistenceError::Init {
                path: path.clone(),
                source: StorageError::Io(e),
            })?;

        tracing::debug!(
            path = %path.display(),
            table = %table,
            capacity = ?config.capacity,
            overflow = %config.overflow,
            "Queued adapter ready"
        );

        Ok(Self {
            sender: RwLock::new(Some(tx)),
            worker: Mutex::new(Some(handle)),
            done: done_rx,
            shared,
            events,
            reader,
            table,
            path,
            config,
        })
    }

    /// Path of the backing database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AdapterState {
        self.shared.state()
    }

    /// Subscribe to late outcomes: committed bursts and failures.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<AdapterEvent> {
        self.events.subscribe()
    }

    /// Items that failed to execute or were lost to a failed commit so far.
    pub fn failure_count(&self) -> u64 {
        self.shared.failed()
    }

    /// Items waiting in the queue.
    pub fn pending(&self) -> usize {
        self.sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, Sender::len)
    }

    /// Stop accepting mutations, wait for the writer to drain and commit the
    /// queue, and report totals.
    ///
    /// Safe to call more than once.
    ///
    /// # Errors
    ///
    /// [`PersistenceError::ShutdownTimeout`] if the queue did not drain within
    /// the configured bound; [`PersistenceError::WorkerPanic`] if the writer
    /// thread panicked.
    pub fn close(&self) -> Result<ShutdownReport, PersistenceError> {
        let sender = self
            .sender
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sender) = sender {
            tracing::debug!(table = %self.table, pending = sender.len(), "Closing write queue");
        }

        if let Err(RecvTimeoutError::Timeout) = self.done.recv_timeout(self.config.shutdown_timeout) {
            tracing::error!(
                table = %self.table,
                timeout = ?self.config.shutdown_timeout,
                "Writer did not drain in time"
            );
            return Err(PersistenceError::ShutdownTimeout(self.config.shutdown_timeout));
        }

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.join().map_err(|_| PersistenceError::WorkerPanic)?;
        }

        Ok(ShutdownReport {
            executed: self.shared.executed(),
            failed: self.shared.failed(),
        })
    }

    fn enqueue(&self, item: QueueItem) -> Result<(), PersistenceError> {
        let operation = item.operation();
        let guard = self.sender.read().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = guard.as_ref() else {
            return Err(PersistenceError::Closed { operation });
        };

        match self.config.overflow {
            OverflowPolicy::Block => sender
                .send(item)
                .map_err(|_| PersistenceError::Closed { operation }),
            OverflowPolicy::Reject => sender.try_send(item).map_err(|e| match e {
                TrySendError::Full(_) => PersistenceError::QueueFull { operation },
                TrySendError::Disconnected(_) => PersistenceError::Closed { operation },
            }),
        }
    }
}

impl PersistenceAdapter for QueuedAsyncAdapter {
    fn create(&self, key: &[u8], value: &[u8]) -> Result<(), PersistenceError> {
        self.enqueue(QueueItem::Create {
            key: key.to_vec(),
            value: value.to_vec(),
        })
    }

    fn update(&self, key: &[u8], value: &[u8]) -> Result<(), PersistenceError> {
        self.enqueue(QueueItem::Update {
            key: key.to_vec(),
            value: value.to_vec(),
        })
    }

    fn delete(&self, key: &[u8]) -> Result<(), PersistenceError> {
        self.enqueue(QueueItem::Delete { key: key.to_vec() })
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        self.enqueue(QueueItem::Clear)
    }

    /// Reads committed rows directly, bypassing the queue.
    fn read_all(&self) -> Result<Entries<'_>, PersistenceError> {
        Ok(Box::new(self.reader.entries(&self.table).map(|row| {
            row.map_err(|e| PersistenceError::from_storage(Operation::ReadAll, None, e))
        })))
    }

    fn shutdown(&self) -> Result<(), PersistenceError> {
        let report = self.close()?;
        tracing::info!(
            table = %self.table,
            executed = report.executed,
            failed = report.failed,
            "Queued adapter stopped"
        );
        Ok(())
    }
}

impl Drop for QueuedAsyncAdapter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(table = %self.table, error = %e, "Queued adapter dropped uncleanly");
        }
    }
}

impl fmt::Debug for QueuedAsyncAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedAsyncAdapter")
            .field("path", &self.path)
            .field("state", &self.state())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config() -> QueueConfig {
        QueueConfig {
            burst: BurstConfig::test_config(),
            ..QueueConfig::default()
        }
    }

    #[test]
    fn test_starts_idle_and_stops() {
        let temp_dir = TempDir::new().unwrap();
        let adapter = QueuedAsyncAdapter::open("cache", temp_dir.path(), test_config()).unwrap();
        assert_eq!(adapter.state(), AdapterState::Idle);

        let report = adapter.close().unwrap();
        assert_eq!(report, ShutdownReport::default());
        assert_eq!(adapter.state(), AdapterState::Stopped);
    }

    #[test]
    fn test_enqueue_after_close_fails() {
        let temp_dir = TempDir::new().unwrap();
        let adapter = QueuedAsyncAdapter::open("cache", temp_dir.path(), test_config()).unwrap();
        adapter.close().unwrap();

        let err = adapter.create(b"k", b"v").unwrap_err();
        assert!(matches!(err, PersistenceError::Closed { operation: Operation::Create }));
        // Second close is a no-op
        adapter.close().unwrap();
    }

    #[test]
    fn test_invalid_config_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config = QueueConfig {
            capacity: Some(0),
            ..test_config()
        };
        let err = QueuedAsyncAdapter::open("cache", temp_dir.path(), config).unwrap_err();
        assert!(matches!(err, PersistenceError::InvalidArgument(_)));
    }

    #[test]
    fn test_close_drains_queue() {
        let temp_dir = TempDir::new().unwrap();
        let adapter = QueuedAsyncAdapter::open("cache", temp_dir.path(), test_config()).unwrap();

        for i in 0..50u8 {
            adapter.create(&[i], &[i]).unwrap();
        }
        let report = adapter.close().unwrap();
        assert_eq!(report.executed, 50);
        assert_eq!(report.failed, 0);

        let rows: Vec<_> = adapter.read_all().unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 50);
    }

    #[test]
    fn test_overflow_policy_parse() {
        assert_eq!("reject".parse::<OverflowPolicy>().unwrap(), OverflowPolicy::Reject);
        assert_eq!("Block".parse::<OverflowPolicy>().unwrap(), OverflowPolicy::Block);
        assert!("drop".parse::<OverflowPolicy>().is_err());
    }
}
