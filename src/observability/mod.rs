//! Observability infrastructure.
//!
//! Provides structured logging via tracing-subscriber.

pub mod tracing;
