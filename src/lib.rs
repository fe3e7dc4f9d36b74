//! Snorkels: an in-process key-value store with compressed values and
//! pluggable persistence.
//!
//! Values are zlib-compressed on the way in and decompressed on the way out.
//! A store can be bound to a [`PersistenceAdapter`] that mirrors every
//! mutation to SQLite, either inline or through a background writer.
//!
//! # Architecture
//!
//! - **In-memory first**: Reads never touch disk; the map is authoritative
//! - **Ordered mirroring**: Adapter calls follow the order mutations applied
//! - **Durable**: SQLite WAL with `synchronous=FULL`
//! - **Burst commits**: The queued adapter groups writes into transactions
//!
//! # Modules
//!
//! - [`adapter`]: Persistence adapter trait and SQLite adapters
//! - [`codec`]: zlib compression levels and helpers
//! - [`config`]: CLI and environment configuration
//! - [`key`]: Text/bytes input normalization
//! - [`observability`]: Tracing setup
//! - [`storage`]: SQLite schema and connection pool
//! - [`store`]: The store itself

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions,    // store::StoreError is fine
    clippy::must_use_candidate,         // Not all functions need #[must_use]
    clippy::missing_errors_doc,         // Error docs can be verbose
    clippy::missing_panics_doc,         // Panic docs can be verbose
    clippy::needless_raw_string_hashes, // r#""# is fine for SQL
    clippy::cast_possible_truncation,   // Size math stays well inside u64
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

pub mod adapter;
pub mod codec;
pub mod config;
pub mod key;
pub mod observability;
pub mod storage;
pub mod store;

pub use adapter::{
    AdapterEvent, AdapterState, PersistenceAdapter, PersistenceError, QueueConfig,
    QueuedAsyncAdapter, SyncAdapter,
};
pub use codec::CompLevel;
pub use config::{AdapterKind, StoreConfig};
pub use key::{Encoding, Input};
pub use store::{Store, StoreBuilder, StoreError, StoreStats};
