//! SQLite storage layer shared by the persistence adapters.
//!
//! Provides:
//! - Table layout, pragmas and per-operation statements
//! - Pooled connections with scoped acquisition
//! - Lazy, paged enumeration of stored rows

pub mod pool;
pub mod schema;

pub use pool::{ConnectionPool, PagedEntries, StorageError};
pub use schema::Row;
