//! Engine error surface.

use std::time::Duration;

use thiserror::Error;

use crate::aggregator::RunSummary;

pub type SweepResult<T> = Result<T, SweepError>;

#[derive(Debug, Error)]
pub enum SweepError {
    /// The run outlived its configured deadline and was aborted. The summary
    /// carries everything the run accomplished before the cutoff.
    #[error("run exceeded {timeout:?} and was aborted")]
    Timeout {
        timeout: Duration,
        summary: RunSummary,
    },

    /// A summary was requested before the queue drained.
    #[error("run still in progress")]
    RunInProgress,

    /// A scheduler task failed to join.
    #[error("internal task failure: {0}")]
    Internal(String),
}
