//! The in-memory compressed key-value store.
//!
//! Keys and values are normalized to bytes with the store's encoding, values
//! are compressed before they enter the map, and every mutation is mirrored
//! to the bound [`PersistenceAdapter`], if any, while the map lock is held.
//! That fixes the adapter's call order to the order mutations were applied.

mod dump;
pub mod error;

pub use error::StoreError;

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::adapter::{PersistenceAdapter, PersistenceError};
use crate::codec::{self, CompLevel};
use crate::key::{display_key, Encoding, Input};

type Map = HashMap<Vec<u8>, Vec<u8>>;

/// Size summary of a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub name: String,
    pub keys: usize,
    /// Total bytes of keys and compressed values
    pub bytes: usize,
}

impl StoreStats {
    /// `bytes` in KiB, rounded to the nearest integer.
    pub fn kib(&self) -> u64 {
        (self.bytes as f64 / 1024.0).round() as u64
    }
}

/// Builder for [`Store`].
pub struct StoreBuilder {
    name: String,
    level: CompLevel,
    encoding: Encoding,
    adapter: Option<Box<dyn PersistenceAdapter>>,
}

impl StoreBuilder {
    /// Compression level for values.
    #[must_use]
    pub fn comp_level(mut self, level: CompLevel) -> Self {
        self.level = level;
        self
    }

    /// Encoding for textual keys and values.
    #[must_use]
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Bind a persistence adapter.
    #[must_use]
    pub fn adapter(self, adapter: impl PersistenceAdapter + 'static) -> Self {
        self.boxed_adapter(Box::new(adapter))
    }

    /// Bind an already boxed persistence adapter.
    #[must_use]
    pub fn boxed_adapter(mut self, adapter: Box<dyn PersistenceAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Build the store, hydrating it from the adapter if one is bound.
    ///
    /// Hydrated values are taken as already compressed and inserted as-is;
    /// the adapter sees no `create` calls for them.
    pub fn build(self) -> Result<Store, StoreError> {
        if self.name.is_empty() {
            return Err(StoreError::InvalidArgument("store name cannot be empty".into()));
        }

        let mut entries = Map::new();
        if let Some(adapter) = &self.adapter {
            for row in adapter.read_all().map_err(StoreError::Hydration)? {
                let (key, value) = row.map_err(StoreError::Hydration)?;
                entries.insert(key, value);
            }
            tracing::info!(store = %self.name, keys = entries.len(), "Store hydrated");
        }

        Ok(Store {
            name: self.name,
            level: self.level,
            encoding: self.encoding,
            entries: Mutex::new(entries),
            adapter: self.adapter,
        })
    }
}

/// In-memory key-value store holding compressed values.
///
/// `Store` is `Sync`; share it between threads with `Arc`. Every call takes
/// the map lock for its whole duration, adapter call included.
pub struct Store {
    name: String,
    level: CompLevel,
    encoding: Encoding,
    entries: Mutex<Map>,
    adapter: Option<Box<dyn PersistenceAdapter>>,
}

impl Store {
    /// Start building a store called `name`.
    pub fn builder(name: impl Into<String>) -> StoreBuilder {
        StoreBuilder {
            name: name.into(),
            level: CompLevel::default(),
            encoding: Encoding::default(),
            adapter: None,
        }
    }

    /// A store with default settings and no adapter.
    pub fn new(name: impl Into<String>) -> Result<Self, StoreError> {
        Self::builder(name).build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn comp_level(&self) -> CompLevel {
        self.level
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// The adapter receives `create` for a new key and `update` for an
    /// existing one. If the adapter call fails the in-memory write stands
    /// and [`StoreError::Persistence`] is returned.
    pub fn set<'k, 'v>(
        &self,
        key: impl Into<Input<'k>>,
        value: impl Into<Input<'v>>,
    ) -> Result<(), StoreError> {
        let key = self.normalize(key.into(), "key")?;
        let value = self.normalize(value.into(), "value")?;
        let packed = codec::compress(&value, self.level).map_err(|source| {
            self.fail(StoreError::Set {
                key: display_key(&key),
                source,
            })
        })?;

        let mut entries = self.lock();
        let failure = self.put(&mut entries, key.clone(), packed);
        drop(entries);

        match failure {
            Some(source) => Err(self.fail(StoreError::Persistence {
                key: Some(display_key(&key)),
                source,
            })),
            None => Ok(()),
        }
    }

    /// Fetch and decompress the value stored under `key`.
    pub fn get<'k>(&self, key: impl Into<Input<'k>>) -> Result<Vec<u8>, StoreError> {
        let key = self.normalize(key.into(), "key")?;
        let packed = self.lock().get(&key).cloned();
        let Some(packed) = packed else {
            return Err(self.fail(StoreError::NotFound {
                key: display_key(&key),
            }));
        };
        codec::decompress(&packed).map_err(|source| {
            self.fail(StoreError::Get {
                key: display_key(&key),
                source,
            })
        })
    }

    /// Remove `key`, then mirror the removal to the adapter.
    pub fn delete<'k>(&self, key: impl Into<Input<'k>>) -> Result<(), StoreError> {
        let key = self.normalize(key.into(), "key")?;
        let mut entries = self.lock();
        if entries.remove(&key).is_none() {
            drop(entries);
            return Err(self.fail(StoreError::NotFound {
                key: display_key(&key),
            }));
        }
        if let Some(adapter) = &self.adapter {
            adapter.delete(&key).map_err(|source| {
                self.fail(StoreError::Persistence {
                    key: Some(display_key(&key)),
                    source,
                })
            })?;
        }
        Ok(())
    }

    /// Snapshot of the current keys, in no particular order.
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.lock().keys().cloned().collect()
    }

    /// Remove every entry, then mirror the clear to the adapter.
    pub fn clear(&self) -> Result<(), StoreError> {
        let mut entries = self.lock();
        entries.clear();
        if let Some(adapter) = &self.adapter {
            adapter
                .clear()
                .map_err(|source| self.fail(StoreError::Persistence { key: None, source }))?;
        }
        Ok(())
    }

    pub fn contains_key<'k>(&self, key: impl Into<Input<'k>>) -> Result<bool, StoreError> {
        let key = self.normalize(key.into(), "key")?;
        Ok(self.lock().contains_key(&key))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Key count and byte size of the store.
    pub fn stats(&self) -> StoreStats {
        let entries = self.lock();
        let bytes = entries.iter().map(|(k, v)| k.len() + v.len()).sum();
        StoreStats {
            name: self.name.clone(),
            keys: entries.len(),
            bytes,
        }
    }

    /// Write every entry to `path` as `hex(key):hex(compressed value)` lines,
    /// sorted by key. Returns the number of entries written.
    pub fn dump(&self, path: impl AsRef<Path>) -> Result<usize, StoreError> {
        let path = path.as_ref();
        let mut snapshot: Vec<(Vec<u8>, Vec<u8>)> = self
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        snapshot.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        let written = dump::write_entries(
            path,
            snapshot.iter().map(|(k, v)| (k.as_slice(), v.as_slice())),
        )
        .map_err(|e| self.fail(StoreError::Dump(e)))?;
        tracing::debug!(store = %self.name, path = %path.display(), entries = written, "Store dumped");
        Ok(written)
    }

    /// Load entries written by [`Store::dump`], as if each were `set`.
    ///
    /// A missing file loads nothing. A malformed line, or a value that does
    /// not decompress, fails with [`StoreError::Load`] before the store is
    /// touched. Otherwise every entry lands in memory; if the adapter
    /// rejects some of them the load still completes and
    /// [`StoreError::LoadPersistence`] reports how many failed. Returns the
    /// number of entries loaded.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<usize, StoreError> {
        let path = path.as_ref();
        let rows = match dump::read_entries(path) {
            Ok(Some(rows)) => rows,
            Ok(None) => {
                tracing::debug!(store = %self.name, path = %path.display(), "No dump file, nothing to load");
                return Ok(0);
            }
            Err(dump::ReadError::Io(e)) => return Err(self.fail(StoreError::LoadIo(e))),
            Err(dump::ReadError::Malformed(m)) => {
                return Err(self.fail(StoreError::Load {
                    line: m.line,
                    reason: m.reason,
                }))
            }
        };

        for (line, (_, value)) in &rows {
            if let Err(e) = codec::decompress(value) {
                return Err(self.fail(StoreError::Load {
                    line: *line,
                    reason: e.to_string(),
                }));
            }
        }

        let loaded = rows.len();
        let mut failed = 0;
        let mut first_failure = None;
        let mut entries = self.lock();
        for (_, (key, value)) in rows {
            let shown = display_key(&key);
            if let Some(source) = self.put(&mut entries, key, value) {
                failed += 1;
                first_failure.get_or_insert((shown, source));
            }
        }
        drop(entries);

        if let Some((key, source)) = first_failure {
            return Err(self.fail(StoreError::LoadPersistence {
                loaded,
                failed,
                key,
                source,
            }));
        }
        tracing::debug!(store = %self.name, path = %path.display(), entries = loaded, "Store loaded");
        Ok(loaded)
    }

    /// Shut down the bound adapter, flushing any queued writes.
    pub fn shutdown(&self) -> Result<(), StoreError> {
        match &self.adapter {
            Some(adapter) => adapter
                .shutdown()
                .map_err(|source| self.fail(StoreError::Persistence { key: None, source })),
            None => Ok(()),
        }
    }

    /// Insert a compressed value under the held lock and mirror it as
    /// `create` or `update`. The map is written even if the adapter fails.
    fn put(&self, entries: &mut Map, key: Vec<u8>, packed: Vec<u8>) -> Option<PersistenceError> {
        let persisted = match &self.adapter {
            Some(adapter) if entries.contains_key(&key) => adapter.update(&key, &packed),
            Some(adapter) => adapter.create(&key, &packed),
            None => Ok(()),
        };
        entries.insert(key, packed);
        persisted.err()
    }

    fn normalize(&self, input: Input<'_>, what: &str) -> Result<Vec<u8>, StoreError> {
        input
            .to_bytes(self.encoding)
            .map_err(|e| self.fail(StoreError::InvalidArgument(format!("{what}: {e}"))))
    }

    fn lock(&self) -> MutexGuard<'_, Map> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fail(&self, err: StoreError) -> StoreError {
        match &err {
            StoreError::NotFound { .. } => tracing::debug!(store = %self.name, error = %err, "Store error"),
            _ => tracing::error!(store = %self.name, error = %err, "Store error"),
        }
        err
    }
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        write!(
            f,
            "KeyValueStore(name={}, keys={}, size={}KiB)",
            stats.name,
            stats.keys,
            stats.kib()
        )
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.name)
            .field("level", &self.level)
            .field("encoding", &self.encoding)
            .field("keys", &self.len())
            .field("adapter", &self.adapter.is_some())
            .finish()
    }
}
