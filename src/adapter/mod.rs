//! Persistence adapters that mirror store mutations to a backing store.
//!
//! The [`PersistenceAdapter`] contract is four mutations plus one read:
//! - [`SyncAdapter`]: executes each call inline on the caller's thread
//! - [`QueuedAsyncAdapter`]: enqueues calls for a dedicated writer thread
//!   that commits them in bursts
//!
//! New backing stores are added by implementing the same trait.

pub mod burst;
pub mod error;
pub mod events;
pub mod queued;
pub mod sync;
mod worker;

pub use burst::BurstConfig;
pub use error::{Operation, PersistenceError};
pub use events::{AdapterEvent, EventBus};
pub use queued::{AdapterState, OverflowPolicy, QueueConfig, QueuedAsyncAdapter, ShutdownReport};
pub use sync::SyncAdapter;

use crate::storage::Row;
use std::sync::Arc;

/// Lazy, finite, one-shot sequence of durable `(key, compressed value)` rows.
pub type Entries<'a> = Box<dyn Iterator<Item = Result<Row, PersistenceError>> + Send + 'a>;

/// A durable mirror of store mutations.
///
/// Calls arrive in the order the store applied the mutations. Delivery is
/// at most once; the store never retries.
pub trait PersistenceAdapter: Send + Sync {
    /// Persist a key that did not exist before.
    fn create(&self, key: &[u8], value: &[u8]) -> Result<(), PersistenceError>;

    /// Overwrite the value of an existing key.
    fn update(&self, key: &[u8], value: &[u8]) -> Result<(), PersistenceError>;

    /// Remove a key.
    fn delete(&self, key: &[u8]) -> Result<(), PersistenceError>;

    /// Remove every key.
    fn clear(&self) -> Result<(), PersistenceError>;

    /// Enumerate every durable entry. Used once, to hydrate a new store.
    fn read_all(&self) -> Result<Entries<'_>, PersistenceError>;

    /// Flush outstanding work and release background resources.
    ///
    /// Mutations issued after shutdown fail with [`PersistenceError::Closed`]
    /// for adapters that have background state.
    fn shutdown(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
}

macro_rules! forward_adapter {
    ($($ptr:ident),*) => {$(
        impl<A: PersistenceAdapter + ?Sized> PersistenceAdapter for $ptr<A> {
            fn create(&self, key: &[u8], value: &[u8]) -> Result<(), PersistenceError> {
                (**self).create(key, value)
            }

            fn update(&self, key: &[u8], value: &[u8]) -> Result<(), PersistenceError> {
                (**self).update(key, value)
            }

            fn delete(&self, key: &[u8]) -> Result<(), PersistenceError> {
                (**self).delete(key)
            }

            fn clear(&self) -> Result<(), PersistenceError> {
                (**self).clear()
            }

            fn read_all(&self) -> Result<Entries<'_>, PersistenceError> {
                (**self).read_all()
            }

            fn shutdown(&self) -> Result<(), PersistenceError> {
                (**self).shutdown()
            }
        }
    )*};
}

forward_adapter!(Box, Arc);
