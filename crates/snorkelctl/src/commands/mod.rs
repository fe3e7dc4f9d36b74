//! Command implementations.

pub mod entries;
pub mod file;
pub mod stats;
