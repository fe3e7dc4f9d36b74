//! Configuration for opening a store.
//!
//! Supports:
//! - CLI arguments via clap (flatten [`StoreConfig`] into a parser)
//! - Environment variable overrides (`SNORKELS_*`)
//! - Sensible defaults for quick start

use clap::{Args, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::adapter::{
    BurstConfig, OverflowPolicy, PersistenceAdapter, PersistenceError, QueueConfig,
    QueuedAsyncAdapter, SyncAdapter,
};
use crate::codec::CompLevel;
use crate::key::Encoding;
use crate::storage::schema::validate_store_name;
use crate::storage::StorageError;
use crate::store::{Store, StoreError};

/// Which persistence adapter to bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AdapterKind {
    /// In-memory only
    None,
    /// Execute each mutation inline
    Sync,
    /// Queue mutations for a background writer
    Queued,
}

/// Settings for a store and its adapter.
#[derive(Args, Debug, Clone)]
pub struct StoreConfig {
    /// Store name, used as table and file name
    #[arg(short, long, env = "SNORKELS_NAME", default_value = "default")]
    pub name: String,

    /// Directory holding the store database
    #[arg(short, long, env = "SNORKELS_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Compression level (-1 for default, 0 none .. 9 maximum)
    #[arg(long, env = "SNORKELS_COMP_LEVEL", default_value_t = -1, allow_hyphen_values = true)]
    pub comp_level: i32,

    /// Encoding for textual keys and values (utf-8, ascii)
    #[arg(long, env = "SNORKELS_ENCODING", default_value = "utf-8")]
    pub encoding: Encoding,

    /// Persistence adapter
    #[arg(long, env = "SNORKELS_ADAPTER", value_enum, default_value_t = AdapterKind::Sync)]
    pub adapter: AdapterKind,

    /// Write queue capacity for the queued adapter (0 = unbounded)
    #[arg(long, env = "SNORKELS_QUEUE_CAPACITY", default_value_t = 10_000)]
    pub queue_capacity: usize,

    /// What a full queue does: block or reject
    #[arg(long, env = "SNORKELS_OVERFLOW", default_value = "block")]
    pub overflow: OverflowPolicy,

    /// Idle window before the writer commits a burst
    #[arg(long, env = "SNORKELS_IDLE_TIMEOUT_MS", default_value_t = 100)]
    pub idle_timeout_ms: u64,

    /// Maximum mutations per burst transaction
    #[arg(long, env = "SNORKELS_MAX_BURST_SIZE", default_value_t = 500)]
    pub max_burst_size: usize,

    /// How long shutdown waits for queued writes to land
    #[arg(long, env = "SNORKELS_SHUTDOWN_TIMEOUT_MS", default_value_t = 5_000)]
    pub shutdown_timeout_ms: u64,

    /// Size of the reader connection pool
    #[arg(long, env = "SNORKELS_READER_POOL_SIZE", default_value_t = 2)]
    pub reader_pool_size: u32,
}

impl StoreConfig {
    /// Create a default configuration for testing.
    pub fn test_config(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            idle_timeout_ms: 5,
            ..Self::default()
        }
    }

    /// Queue settings derived from this configuration.
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            capacity: (self.queue_capacity > 0).then_some(self.queue_capacity),
            overflow: self.overflow,
            burst: BurstConfig::from_config(self.max_burst_size, self.idle_timeout_ms),
            shutdown_timeout: Duration::from_millis(self.shutdown_timeout_ms),
            reader_pool_size: self.reader_pool_size,
            ..QueueConfig::default()
        }
    }

    /// Validate every setting, build the adapter and open the store.
    ///
    /// All validation happens before any file is touched.
    pub fn open(&self) -> Result<Store, StoreError> {
        let level = CompLevel::try_from(self.comp_level)
            .map_err(|e| StoreError::InvalidArgument(e.to_string()))?;
        validate_store_name(&self.name).map_err(StoreError::InvalidArgument)?;
        let queue = self.queue_config();
        if self.adapter == AdapterKind::Queued {
            queue.validate().map_err(StoreError::Adapter)?;
        }

        let builder = Store::builder(&self.name)
            .comp_level(level)
            .encoding(self.encoding);
        let builder = match self.open_adapter(queue)? {
            Some(adapter) => builder.boxed_adapter(adapter),
            None => builder,
        };
        builder.build()
    }

    fn open_adapter(
        &self,
        queue: QueueConfig,
    ) -> Result<Option<Box<dyn PersistenceAdapter>>, StoreError> {
        let adapter: Box<dyn PersistenceAdapter> = match self.adapter {
            AdapterKind::None => return Ok(None),
            AdapterKind::Sync => {
                self.ensure_data_dir()?;
                Box::new(SyncAdapter::open(&self.name, &self.data_dir)?)
            }
            AdapterKind::Queued => {
                self.ensure_data_dir()?;
                Box::new(QueuedAsyncAdapter::open(&self.name, &self.data_dir, queue)?)
            }
        };
        tracing::info!(
            store = %self.name,
            adapter = ?self.adapter,
            data_dir = %self.data_dir.display(),
            "Persistence adapter opened"
        );
        Ok(Some(adapter))
    }

    fn ensure_data_dir(&self) -> Result<(), PersistenceError> {
        std::fs::create_dir_all(&self.data_dir).map_err(|e| PersistenceError::Init {
            path: self.data_dir.clone(),
            source: StorageError::Io(e),
        })
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "default".into(),
            data_dir: PathBuf::from("./data"),
            comp_level: -1,
            encoding: Encoding::Utf8,
            adapter: AdapterKind::Sync,
            queue_capacity: 10_000,
            overflow: OverflowPolicy::Block,
            idle_timeout_ms: 100,
            max_burst_size: 500,
            shutdown_timeout_ms: 5_000,
            reader_pool_size: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.adapter, AdapterKind::Sync);
        assert_eq!(config.queue_config().capacity, Some(10_000));
    }

    #[test]
    fn test_zero_capacity_means_unbounded() {
        let config = StoreConfig {
            queue_capacity: 0,
            ..StoreConfig::default()
        };
        assert_eq!(config.queue_config().capacity, None);
    }

    #[test]
    fn test_bad_level_fails_before_io() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig {
            comp_level: 12,
            ..StoreConfig::test_config(temp_dir.path().join("data"))
        };
        assert!(matches!(config.open(), Err(StoreError::InvalidArgument(_))));
        assert!(!temp_dir.path().join("data").exists());
    }

    #[test]
    fn test_bad_name_fails_before_io() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig {
            name: "../escape".into(),
            ..StoreConfig::test_config(temp_dir.path().join("data"))
        };
        assert!(matches!(config.open(), Err(StoreError::InvalidArgument(_))));
        assert!(!temp_dir.path().join("data").exists());
    }

    #[test]
    fn test_open_each_adapter_kind() {
        let temp_dir = TempDir::new().unwrap();
        for kind in [AdapterKind::None, AdapterKind::Sync, AdapterKind::Queued] {
            let config = StoreConfig {
                adapter: kind,
                ..StoreConfig::test_config(temp_dir.path().to_path_buf())
            };
            let store = config.open().unwrap();
            store.set("k", "v").unwrap();
            store.shutdown().unwrap();
        }
    }
}
