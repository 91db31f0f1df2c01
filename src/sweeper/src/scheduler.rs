//! Bounded worker-pool scheduler driving enumerated keys to terminal
//! outcomes.

use std::sync::Arc;

use futures::stream::BoxStream;
use tokio::sync::broadcast;
use tokio::time::{Duration, Instant};
use tokio_stream::StreamExt;

use crate::aggregator::{OutcomeAggregator, RunSummary};
use crate::config::SweepConfig;
use crate::error::SweepError;
use crate::outcome::{self, Outcome};
use crate::queue::{CancelReason, WorkItem, WorkQueue};
use crate::store::{DeleteResult, EnumerationError, Key, KeyStore};

/// Requests a graceful stop of a run: in-flight calls finish, everything
/// still queued is reported as skipped.
#[derive(Clone)]
pub struct CancellationHandle {
    queue: Arc<WorkQueue>,
}

impl CancellationHandle {
    pub async fn cancel(&self) {
        if self.queue.cancel(CancelReason::Operator).await {
            tracing::info!("Cancellation requested; letting in-flight deletes finish");
        }
    }
}

/// The engine core. One scheduler drives one run; build a fresh one per
/// sweep.
pub struct DeletionScheduler {
    store: Arc<dyn KeyStore>,
    config: SweepConfig,
    queue: Arc<WorkQueue>,
}

impl DeletionScheduler {
    /// Fails when the configuration is invalid.
    pub fn new(store: Arc<dyn KeyStore>, config: SweepConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let queue = Arc::new(WorkQueue::new(config.queue_max_depth));
        Ok(Self {
            store,
            config,
            queue,
        })
    }

    /// Handle for stopping this scheduler's run, valid before and during
    /// [`run`](Self::run).
    pub fn cancellation(&self) -> CancellationHandle {
        CancellationHandle {
            queue: Arc::clone(&self.queue),
        }
    }

    /// Drive every key in `keys` to a terminal outcome and report.
    ///
    /// Returns once the queue is empty and no worker holds an in-flight
    /// item. Cancellation still returns `Ok` with `partial` set; a run
    /// timeout returns an error carrying the partial summary.
    pub async fn run(
        &self,
        keys: BoxStream<'static, Result<Key, EnumerationError>>,
    ) -> Result<RunSummary, SweepError> {
        let aggregator = OutcomeAggregator::new();

        tracing::info!(
            run_id = %aggregator.run_id(),
            max_workers = self.config.max_workers,
            max_attempts = self.config.max_attempts,
            queue_max_depth = self.config.queue_max_depth,
            dry_run = self.config.dry_run,
            "Starting deletion run"
        );

        let watchdog = self.config.run_timeout.map(|timeout| {
            let queue = Arc::clone(&self.queue);
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                if queue.cancel(CancelReason::Timeout).await {
                    tracing::warn!(timeout = ?timeout, "Run timeout exceeded; aborting");
                }
            })
        });

        let seeder = {
            let queue = Arc::clone(&self.queue);
            let aggregator = aggregator.clone();
            tokio::spawn(async move {
                let mut keys = keys;
                while let Some(entry) = keys.next().await {
                    match entry {
                        Ok(key) => {
                            if !queue.push_seed(key).await {
                                tracing::debug!("Enumeration stopped by cancellation");
                                break;
                            }
                        }
                        Err(error) => {
                            tracing::warn!(
                                prefix = %error.prefix,
                                cause = %error.cause,
                                "Prefix enumeration aborted"
                            );
                            aggregator.record_enumeration_error(error).await;
                        }
                    }
                }
                queue.close_intake().await;
            })
        };

        let mut workers = Vec::with_capacity(self.config.max_workers);
        for worker_id in 0..self.config.max_workers {
            workers.push(tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&self.store),
                Arc::clone(&self.queue),
                aggregator.clone(),
                self.config.clone(),
                self.queue.shutdown_rx(),
            )));
        }

        let seeded = seeder.await;
        if seeded.is_err() {
            // A lost seeder can never close intake; release the workers.
            self.queue.cancel(CancelReason::Operator).await;
        }
        for worker in workers {
            worker
                .await
                .map_err(|e| SweepError::Internal(format!("worker task failed: {e}")))?;
        }
        seeded.map_err(|e| SweepError::Internal(format!("enumeration task failed: {e}")))?;

        if let Some(watchdog) = watchdog {
            watchdog.abort();
        }

        // Keys queued but never attempted surrender as skipped.
        let leftovers = self.queue.drain_remaining().await;
        if !leftovers.is_empty() {
            for item in &leftovers {
                tracing::debug!(key = %item.key, "Skipped queued key");
            }
            aggregator.record_skipped(leftovers.len());
        }

        let cancel_reason = self.queue.cancel_reason().await;
        aggregator.seal(cancel_reason.is_some());
        let summary = aggregator.finalize().await?;

        tracing::info!(
            run_id = %summary.run_id,
            deleted = summary.deleted_count(),
            permanent_failures = summary.permanent_failures.len(),
            skipped = summary.skipped_count,
            partial = summary.partial,
            "Deletion run complete"
        );

        match cancel_reason {
            Some(CancelReason::Timeout) => Err(SweepError::Timeout {
                timeout: self.config.run_timeout.unwrap_or_default(),
                summary,
            }),
            _ => Ok(summary),
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    store: Arc<dyn KeyStore>,
    queue: Arc<WorkQueue>,
    aggregator: OutcomeAggregator,
    config: SweepConfig,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    while let Some(item) = queue.next_item().await {
        // Wait out the backoff window; cancellation cuts the wait short.
        if item.eligible_at > Instant::now() {
            tokio::select! {
                _ = tokio::time::sleep_until(item.eligible_at) => {}
                _ = shutdown_rx.recv() => {}
            }
        }
        if queue.is_cancelled().await {
            // The call was never issued; the key is surrendered, not failed.
            aggregator.record_skipped(1);
            queue.task_done().await;
            continue;
        }

        let result = execute_delete(store.as_ref(), &item.key, &config).await;

        match outcome::classify(&result) {
            terminal @ (Outcome::Deleted | Outcome::NotFound) => {
                tracing::debug!(worker_id, key = %item.key, attempt = item.attempt, "Deleted key");
                aggregator.record(&item.key, terminal).await;
                queue.task_done().await;
            }
            Outcome::Retryable(cause) => {
                aggregator
                    .record(&item.key, Outcome::Retryable(cause.clone()))
                    .await;
                if item.attempt + 1 < config.max_attempts {
                    let delay =
                        backoff_delay(config.backoff_base, item.attempt, config.backoff_cap);
                    tracing::debug!(
                        worker_id,
                        key = %item.key,
                        attempt = item.attempt,
                        cause = %cause,
                        delay_ms = delay.as_millis() as u64,
                        "Transient failure; requeueing"
                    );
                    let retry = WorkItem {
                        key: item.key,
                        attempt: item.attempt + 1,
                        eligible_at: Instant::now() + delay,
                    };
                    if !queue.push_retry(retry).await {
                        // Cancelled while requeueing: the key ran out of
                        // run, not out of budget.
                        aggregator.record_skipped(1);
                    }
                } else {
                    tracing::warn!(
                        worker_id,
                        key = %item.key,
                        attempts = config.max_attempts,
                        cause = %cause,
                        "Retry budget exhausted"
                    );
                    aggregator
                        .record(
                            &item.key,
                            Outcome::Permanent(outcome::RETRY_BUDGET_EXHAUSTED.to_string()),
                        )
                        .await;
                    queue.task_done().await;
                }
            }
            Outcome::Permanent(cause) => {
                tracing::warn!(worker_id, key = %item.key, cause = %cause, "Failed to delete key");
                aggregator
                    .record(&item.key, Outcome::Permanent(cause))
                    .await;
                queue.task_done().await;
            }
        }
    }
    tracing::debug!(worker_id, "Worker finished");
}

async fn execute_delete(store: &dyn KeyStore, key: &Key, config: &SweepConfig) -> DeleteResult {
    if config.dry_run {
        tracing::debug!(key = %key, "[DRY-RUN] Would delete key");
        return DeleteResult::Ok;
    }
    match config.delete_timeout {
        Some(timeout) => match tokio::time::timeout(timeout, store.delete_key(key)).await {
            Ok(result) => result,
            Err(_) => DeleteResult::Timeout,
        },
        None => store.delete_key(key).await,
    }
}

/// Exponential backoff: base doubled per attempt, saturating, capped.
fn backoff_delay(base: Duration, attempt: u32, cap: Duration) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumerator::KeyEnumerator;
    use crate::store::ObjectStoreAdapter;
    use object_store::memory::InMemory;

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let base = Duration::from_millis(100);
        let cap = Duration::from_secs(5);
        assert_eq!(backoff_delay(base, 0, cap), Duration::from_millis(100));
        assert_eq!(backoff_delay(base, 1, cap), Duration::from_millis(200));
        assert_eq!(backoff_delay(base, 2, cap), Duration::from_millis(400));
        assert_eq!(backoff_delay(base, 3, cap), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_respects_cap() {
        let base = Duration::from_millis(100);
        let cap = Duration::from_secs(5);
        assert_eq!(backoff_delay(base, 10, cap), cap);
        // Absurd attempt counts must saturate instead of overflowing.
        assert_eq!(backoff_delay(base, u32::MAX, cap), cap);
    }

    #[tokio::test]
    async fn test_empty_enumeration_completes_cleanly() {
        let store: Arc<dyn KeyStore> =
            Arc::new(ObjectStoreAdapter::new(Arc::new(InMemory::new())));
        let scheduler = DeletionScheduler::new(Arc::clone(&store), SweepConfig::default()).unwrap();
        let enumerator = KeyEnumerator::new(store, Vec::new());

        let summary = scheduler.run(enumerator.into_stream()).await.unwrap();
        assert_eq!(summary.deleted_count(), 0);
        assert_eq!(summary.skipped_count, 0);
        assert!(summary.permanent_failures.is_empty());
        assert!(!summary.partial);
    }
}
