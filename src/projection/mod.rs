//! Event projection: turns ledger events into view mutations.
//!
//! [`ProjectionEngine`] applies one event at a time and commits the
//! resulting collections atomically. It never retries; callers inspect
//! [`ProjectionError::retry_class`] and decide.

pub mod engine;
pub mod error;

pub use engine::{EngineSettings, ProjectionEngine};
pub use error::{Outcome, ProjectionError, RetryClass, SkipReason};
