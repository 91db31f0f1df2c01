//! Bulk object-storage deletion engine.
//!
//! Deletes every key under a set of prefixes with bounded concurrency:
//! - Lazy enumeration across prefixes, deduplicated, throttled by a bounded
//!   work queue
//! - A fixed-size worker pool issuing per-key delete calls through the
//!   provider-agnostic [`KeyStore`] capability
//! - Per-key outcome classification with bounded retry + exponential backoff
//!   for transient failures
//! - Exactly-once terminal accounting into a [`RunSummary`]
//! - Graceful cancellation that finishes in-flight calls and reports queued
//!   keys as skipped

pub mod aggregator;
pub mod config;
pub mod enumerator;
pub mod error;
pub mod outcome;
pub mod scheduler;
pub mod store;

mod queue;

// Re-export commonly used types
pub use aggregator::{OutcomeAggregator, RunSummary};
pub use config::SweepConfig;
pub use enumerator::KeyEnumerator;
pub use error::{SweepError, SweepResult};
pub use outcome::Outcome;
pub use scheduler::{CancellationHandle, DeletionScheduler};
pub use store::{DeleteResult, EnumerationError, Key, KeyStore, ObjectStoreAdapter};
