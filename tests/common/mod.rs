//! Test utilities for Snorkels integration tests.
//!
//! Provides:
//! - Temporary data directory fixtures
//! - Store configuration helpers
//! - Polling helper for background writer outcomes

#![allow(dead_code)]

use std::path::PathBuf;
use std::time::{Duration, Instant};

use snorkels::{AdapterKind, Store, StoreConfig};
use tempfile::TempDir;

/// Test fixture that manages a temporary data directory.
///
/// The directory is automatically cleaned up when the fixture is dropped.
pub struct TestFixture {
    /// Temporary directory for test databases
    pub temp_dir: TempDir,
    /// Data directory handed to adapters
    pub data_dir: PathBuf,
}

impl TestFixture {
    /// Create a new test fixture with a temporary data directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let data_dir = temp_dir.path().join("data");
        Self { temp_dir, data_dir }
    }

    /// Store configuration with a short idle window, using `adapter`.
    pub fn config(&self, name: &str, adapter: AdapterKind) -> StoreConfig {
        StoreConfig {
            name: name.into(),
            adapter,
            ..StoreConfig::test_config(self.data_dir.clone())
        }
    }

    /// Open a store named `name` backed by the sync adapter.
    pub fn sync_store(&self, name: &str) -> Store {
        self.config(name, AdapterKind::Sync)
            .open()
            .expect("failed to open sync store")
    }

    /// Path for a scratch file inside the fixture.
    pub fn file(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for a condition to become true with timeout.
///
/// Returns `true` if the condition was met, `false` if the timeout expired.
pub fn wait_for<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_uses_temp_dir() {
        let fixture = TestFixture::new();
        assert!(fixture.data_dir.starts_with(fixture.temp_dir.path()));
    }
}
