//! Bounded work queue shared by the enumeration seeder and the delete
//! workers.
//!
//! Seeding respects `max_depth` so a fast listing cannot outrun slow deletes;
//! retry pushes hand back a slot they already own and bypass the limit. The
//! queue also carries the run's cancellation state, since every party that
//! must observe a cancel already watches the queue.

use std::collections::VecDeque;

use tokio::sync::{Mutex, Notify, broadcast};
use tokio::time::Instant;

use crate::store::Key;

/// One queued delete attempt.
#[derive(Debug, Clone)]
pub(crate) struct WorkItem {
    pub key: Key,
    /// Zero-based attempt counter; incremented on every requeue.
    pub attempt: u32,
    /// Earliest moment a worker may issue the delete call.
    pub eligible_at: Instant,
}

impl WorkItem {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            attempt: 0,
            eligible_at: Instant::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CancelReason {
    Operator,
    Timeout,
}

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<WorkItem>,
    /// Items popped but not yet resolved (terminal outcome or requeue).
    in_flight: usize,
    intake_closed: bool,
    cancelled: Option<CancelReason>,
}

impl QueueState {
    fn drained(&self) -> bool {
        self.items.is_empty() && self.intake_closed && self.in_flight == 0
    }
}

pub(crate) struct WorkQueue {
    state: Mutex<QueueState>,
    /// Signaled when an item arrives or the run reaches a terminal state.
    ready: Notify,
    /// Signaled when a seeded slot frees up.
    space: Notify,
    /// Fired once on cancellation; lets backoff sleeps end early.
    shutdown: broadcast::Sender<()>,
    max_depth: usize,
}

impl WorkQueue {
    pub fn new(max_depth: usize) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            state: Mutex::new(QueueState::default()),
            ready: Notify::new(),
            space: Notify::new(),
            shutdown,
            max_depth,
        }
    }

    /// Receiver that fires when the run is cancelled. Used to cut backoff
    /// sleeps short.
    pub fn shutdown_rx(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }

    /// Seed a key from enumeration, waiting until the queue has room.
    /// Returns false if the run was cancelled before the key was accepted.
    pub async fn push_seed(&self, key: Key) -> bool {
        loop {
            {
                let mut state = self.state.lock().await;
                if state.cancelled.is_some() {
                    return false;
                }
                if state.items.len() < self.max_depth {
                    state.items.push_back(WorkItem::new(key));
                    drop(state);
                    self.ready.notify_one();
                    return true;
                }
            }
            self.space.notified().await;
        }
    }

    /// Requeue a retry. Never blocks: the caller hands back the slot it
    /// popped, so depth stays bounded by `max_depth` plus the worker count.
    /// The slot is released either way; returns false when the run was
    /// cancelled and the item was not accepted.
    pub async fn push_retry(&self, item: WorkItem) -> bool {
        let mut state = self.state.lock().await;
        state.in_flight -= 1;
        if state.cancelled.is_some() {
            return false;
        }
        state.items.push_back(item);
        drop(state);
        self.ready.notify_one();
        true
    }

    /// Pop the next item, waiting while the queue is empty but work may still
    /// arrive. Returns None once the run is cancelled or fully drained.
    pub async fn next_item(&self) -> Option<WorkItem> {
        loop {
            {
                let mut state = self.state.lock().await;
                if state.cancelled.is_some() {
                    drop(state);
                    // Chain the wake-up to any worker that raced past the
                    // notify_waiters call below.
                    self.ready.notify_one();
                    return None;
                }
                if let Some(item) = state.items.pop_front() {
                    state.in_flight += 1;
                    drop(state);
                    self.space.notify_one();
                    return Some(item);
                }
                if state.drained() {
                    drop(state);
                    self.ready.notify_one();
                    return None;
                }
            }
            self.ready.notified().await;
        }
    }

    /// Mark one popped item as resolved with a terminal outcome.
    pub async fn task_done(&self) {
        let mut state = self.state.lock().await;
        state.in_flight -= 1;
        if state.drained() {
            drop(state);
            self.ready.notify_waiters();
            self.ready.notify_one();
        }
    }

    /// No further seeds will arrive.
    pub async fn close_intake(&self) {
        let mut state = self.state.lock().await;
        state.intake_closed = true;
        drop(state);
        // Wake waiting workers so they can observe the drained condition.
        self.ready.notify_waiters();
        self.ready.notify_one();
    }

    /// Request a stop. Idempotent; only the first call wins and returns true.
    pub async fn cancel(&self, reason: CancelReason) -> bool {
        let mut state = self.state.lock().await;
        if state.cancelled.is_some() {
            return false;
        }
        state.cancelled = Some(reason);
        drop(state);
        let _ = self.shutdown.send(());
        self.ready.notify_waiters();
        self.ready.notify_one();
        self.space.notify_waiters();
        self.space.notify_one();
        true
    }

    pub async fn cancel_reason(&self) -> Option<CancelReason> {
        self.state.lock().await.cancelled
    }

    pub async fn is_cancelled(&self) -> bool {
        self.state.lock().await.cancelled.is_some()
    }

    /// Remove and return everything still queued. Meaningful once the
    /// workers have stopped.
    pub async fn drain_remaining(&self) -> Vec<WorkItem> {
        let mut state = self.state.lock().await;
        state.items.drain(..).collect()
    }

    #[cfg(test)]
    pub async fn depth(&self) -> usize {
        self.state.lock().await.items.len()
    }
}
