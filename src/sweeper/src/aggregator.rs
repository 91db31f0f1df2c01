//! Shared outcome accounting for one deletion run.
//!
//! The aggregator is the only shared mutable state besides the work queue:
//! counters live in atomics, the failure lists behind a mutex, all hanging
//! off one `Arc` so worker handles are plain clones.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::SweepError;
use crate::outcome::Outcome;
use crate::store::{EnumerationError, Key};

/// Collects per-key terminal outcomes as workers resolve them.
#[derive(Debug, Clone)]
pub struct OutcomeAggregator {
    inner: Arc<AggregatorInner>,
}

#[derive(Debug)]
struct AggregatorInner {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    deleted: AtomicUsize,
    not_found: AtomicUsize,
    transient_failures: AtomicUsize,
    skipped: AtomicUsize,
    permanent_failures: Mutex<Vec<(Key, String)>>,
    enumeration_errors: Mutex<Vec<EnumerationError>>,
    sealed: AtomicBool,
    partial: AtomicBool,
}

impl Default for OutcomeAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl OutcomeAggregator {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(AggregatorInner {
                run_id: Uuid::new_v4(),
                started_at: Utc::now(),
                deleted: AtomicUsize::new(0),
                not_found: AtomicUsize::new(0),
                transient_failures: AtomicUsize::new(0),
                skipped: AtomicUsize::new(0),
                permanent_failures: Mutex::new(Vec::new()),
                enumeration_errors: Mutex::new(Vec::new()),
                sealed: AtomicBool::new(false),
                partial: AtomicBool::new(false),
            }),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.inner.run_id
    }

    /// Record the classification of one delete attempt. Terminal outcomes
    /// must arrive exactly once per key; retryable ones count as transient
    /// diagnostics and may repeat for the same key.
    pub async fn record(&self, key: &Key, outcome: Outcome) {
        match outcome {
            Outcome::Deleted => {
                self.inner.deleted.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::NotFound => {
                self.inner.not_found.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Retryable(_) => {
                self.inner.transient_failures.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Permanent(cause) => {
                self.inner
                    .permanent_failures
                    .lock()
                    .await
                    .push((key.clone(), cause));
            }
        }
    }

    /// Record keys surrendered to cancellation without a delete attempt.
    pub fn record_skipped(&self, count: usize) {
        self.inner.skipped.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a prefix whose listing aborted. The affected keys were never
    /// enumerated, so the run is partial whatever else happens.
    pub async fn record_enumeration_error(&self, error: EnumerationError) {
        self.inner.partial.store(true, Ordering::Relaxed);
        self.inner.enumeration_errors.lock().await.push(error);
    }

    /// Mark the run drained. Called by the scheduler once the queue is empty
    /// and no attempt is in flight; `cut_short` is true when the run was
    /// cancelled or timed out.
    pub fn seal(&self, cut_short: bool) {
        if cut_short {
            self.inner.partial.store(true, Ordering::Relaxed);
        }
        self.inner.sealed.store(true, Ordering::Relaxed);
    }

    /// Keys confirmed absent so far: deleted plus already gone.
    pub fn deleted_count(&self) -> usize {
        self.inner.deleted.load(Ordering::Relaxed) + self.inner.not_found.load(Ordering::Relaxed)
    }

    pub fn skipped_count(&self) -> usize {
        self.inner.skipped.load(Ordering::Relaxed)
    }

    /// Produce the final report. Errors until the scheduler confirms the
    /// queue drained via [`seal`](Self::seal).
    pub async fn finalize(&self) -> Result<RunSummary, SweepError> {
        if !self.inner.sealed.load(Ordering::Relaxed) {
            return Err(SweepError::RunInProgress);
        }

        Ok(RunSummary {
            run_id: self.inner.run_id,
            started_at: self.inner.started_at,
            completed_at: Utc::now(),
            deleted: self.inner.deleted.load(Ordering::Relaxed),
            not_found: self.inner.not_found.load(Ordering::Relaxed),
            transient_failures: self.inner.transient_failures.load(Ordering::Relaxed),
            skipped_count: self.inner.skipped.load(Ordering::Relaxed),
            permanent_failures: self.inner.permanent_failures.lock().await.clone(),
            enumeration_errors: self.inner.enumeration_errors.lock().await.clone(),
            partial: self.inner.partial.load(Ordering::Relaxed),
        })
    }
}

/// Final aggregate report of one deletion run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Keys removed by a delete call.
    pub deleted: usize,
    /// Keys already absent when attempted. Count toward `deleted_count`.
    pub not_found: usize,
    /// Transient failures absorbed by retries. Diagnostic only; keys that
    /// later succeeded still count as deleted.
    pub transient_failures: usize,
    /// Keys surrendered to cancellation without a terminal attempt.
    pub skipped_count: usize,
    /// Keys that failed for good, with causes, in resolution order.
    pub permanent_failures: Vec<(Key, String)>,
    /// Prefixes whose listing aborted before the end.
    pub enumeration_errors: Vec<EnumerationError>,
    /// True when the run was cancelled, timed out, or lost a prefix listing.
    pub partial: bool,
}

impl RunSummary {
    /// Keys confirmed absent: deleted plus already gone.
    pub fn deleted_count(&self) -> usize {
        self.deleted + self.not_found
    }

    pub fn duration(&self) -> Duration {
        (self.completed_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    /// Log the run summary.
    pub fn log(&self) {
        let duration = self.duration();
        let rate = if duration.as_secs_f64() > 0.0 {
            self.deleted_count() as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        tracing::info!(run_id = %self.run_id, "=== Deletion Run Summary ===");
        tracing::info!(
            "Deleted {} objects ({} already gone) in {:.2}s ({:.1} objects/s)",
            self.deleted_count(),
            self.not_found,
            duration.as_secs_f64(),
            rate
        );
        tracing::info!(
            "Failures: {} permanent, {} transient (retried), {} skipped",
            self.permanent_failures.len(),
            self.transient_failures,
            self.skipped_count
        );
        for (key, cause) in &self.permanent_failures {
            tracing::warn!(key = %key, cause = %cause, "Failed to delete key");
        }
        for error in &self.enumeration_errors {
            tracing::warn!(prefix = %error.prefix, cause = %error.cause, "Prefix enumeration aborted");
        }
        if self.partial {
            tracing::warn!("Run ended early; results are partial");
        }
    }
}
