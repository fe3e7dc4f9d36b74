//! Burst bookkeeping for the queued writer.
//!
//! A burst is the run of queued mutations executed under one transaction.
//! It ends when either:
//! - No new item arrived within the idle window (`idle_timeout`)
//! - The burst reached `max_burst_size` items

use std::time::{Duration, Instant};

/// Configuration for burst commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurstConfig {
    /// Maximum number of items executed in one transaction
    pub max_burst_size: usize,
    /// How long the writer waits for another item before committing
    pub idle_timeout: Duration,
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            max_burst_size: 500,
            idle_timeout: Duration::from_millis(100),
        }
    }
}

impl BurstConfig {
    /// Create a BurstConfig from application config values.
    pub fn from_config(max_burst_size: usize, idle_timeout_ms: u64) -> Self {
        Self {
            max_burst_size: max_burst_size.max(1),
            idle_timeout: Duration::from_millis(idle_timeout_ms),
        }
    }

    /// Create a test config with a short idle window.
    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            max_burst_size: 100,
            idle_timeout: Duration::from_millis(5),
        }
    }
}

/// Tracks the burst currently held open by the writer.
#[derive(Debug)]
pub struct Burst {
    config: BurstConfig,
    items: usize,
    failed: usize,
    last_item: Option<Instant>,
}

impl Burst {
    /// Start a new, empty burst.
    pub fn new(config: BurstConfig) -> Self {
        Self {
            config,
            items: 0,
            failed: 0,
            last_item: None,
        }
    }

    /// Record an executed item.
    ///
    /// Returns true if the burst is now full and should be committed.
    pub fn record(&mut self, succeeded: bool) -> bool {
        self.items += 1;
        if !succeeded {
            self.failed += 1;
        }
        self.last_item = Some(Instant::now());
        self.is_full()
    }

    /// Check if the burst reached its size cap.
    pub fn is_full(&self) -> bool {
        self.items >= self.config.max_burst_size
    }

    /// Time left in the idle window since the last item.
    ///
    /// Returns the full window for an empty burst and `Duration::ZERO` once
    /// the window has elapsed.
    pub fn time_until_idle(&self) -> Duration {
        match self.last_item {
            None => self.config.idle_timeout,
            Some(last) => self.config.idle_timeout.saturating_sub(last.elapsed()),
        }
    }

    /// Number of items executed in this burst.
    pub fn len(&self) -> usize {
        self.items
    }

    /// Number of items whose statement failed.
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Check if the burst is empty.
    pub fn is_empty(&self) -> bool {
        self.items == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_size_trigger() {
        let config = BurstConfig {
            max_burst_size: 3,
            idle_timeout: Duration::from_secs(10),
        };
        let mut burst = Burst::new(config);

        assert!(!burst.record(true));
        assert!(!burst.record(false));
        assert!(burst.record(true)); // Now full

        assert_eq!(burst.len(), 3);
        assert_eq!(burst.failed(), 1);
    }

    #[test]
    fn test_idle_window_elapses() {
        let config = BurstConfig {
            max_burst_size: 100,
            idle_timeout: Duration::from_millis(10),
        };
        let mut burst = Burst::new(config);
        assert!(burst.is_empty());
        assert_eq!(burst.time_until_idle(), Duration::from_millis(10));

        burst.record(true);
        assert!(burst.time_until_idle() > Duration::ZERO);

        // Wait out the window
        std::thread::sleep(Duration::from_millis(15));
        assert_eq!(burst.time_until_idle(), Duration::ZERO);
    }

    #[test]
    fn test_from_config_clamps_size() {
        let config = BurstConfig::from_config(0, 20);
        assert_eq!(config.max_burst_size, 1);
        assert_eq!(config.idle_timeout, Duration::from_millis(20));
    }
}
