//! Background work owned by the serving loop.
//!
//! - [`DeletionScheduler`] deletes sensitive replies after a delay
//! - [`TokenSweeper`] periodically drops expired tokens and idle rate windows
//!
//! Both are cancellable so shutdown does not leak timers.

use crate::{MessageId, Responder};
use lifeline_security::{ConfirmationManager, Principal, SlidingWindowLimiter};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

/// Tracks delayed-deletion tasks so they can be cancelled together.
#[derive(Debug, Default)]
pub struct DeletionScheduler {
    tasks: Mutex<HashMap<u64, JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl DeletionScheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delete `message` after `after`. Must be called inside a tokio runtime.
    ///
    /// Returns the task id.
    #[instrument(skip(self, responder), fields(principal = %principal, message = %message))]
    pub fn schedule(
        &self,
        responder: Arc<dyn Responder>,
        principal: Principal,
        message: MessageId,
        after: Duration,
    ) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            match responder.delete(principal, message).await {
                Ok(()) => debug!(%principal, %message, "Deleted sensitive reply"),
                Err(e) => warn!(%principal, %message, error = %e, "Failed to delete sensitive reply"),
            }
        });

        let mut tasks = self.tasks.lock();
        tasks.retain(|_, task| !task.is_finished());
        tasks.insert(id, handle);
        debug!(id, delay_secs = after.as_secs(), "Scheduled reply deletion");
        id
    }

    /// Number of deletions still waiting to run.
    pub fn pending(&self) -> usize {
        let mut tasks = self.tasks.lock();
        tasks.retain(|_, task| !task.is_finished());
        tasks.len()
    }

    /// Cancel a single pending deletion. Returns whether it was still pending.
    pub fn cancel(&self, id: u64) -> bool {
        match self.tasks.lock().remove(&id) {
            Some(task) if !task.is_finished() => {
                task.abort();
                true
            }
            _ => false,
        }
    }

    /// Abort every pending deletion. Returns how many were aborted.
    pub fn shutdown(&self) -> usize {
        let tasks: Vec<_> = self.tasks.lock().drain().map(|(_, task)| task).collect();
        let mut aborted = 0;
        for task in tasks {
            if !task.is_finished() {
                task.abort();
                aborted += 1;
            }
        }
        if aborted > 0 {
            info!(aborted, "Cancelled pending reply deletions");
        }
        aborted
    }
}

/// Periodic cleanup of confirmation tokens and rate-limit windows.
#[derive(Debug, Clone)]
pub struct TokenSweeper {
    confirm: Arc<ConfirmationManager>,
    limiter: Arc<SlidingWindowLimiter>,
    interval: Duration,
}

impl TokenSweeper {
    /// Create a sweeper running every `interval`.
    pub fn new(
        confirm: Arc<ConfirmationManager>,
        limiter: Arc<SlidingWindowLimiter>,
        interval: Duration,
    ) -> Self {
        Self {
            confirm,
            limiter,
            interval,
        }
    }

    /// Sweep interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one sweep. Returns `(tokens, windows)` removed.
    pub fn sweep_once(&self) -> (usize, usize) {
        let tokens = self.confirm.sweep();
        let windows = self.limiter.prune();
        if tokens > 0 || windows > 0 {
            debug!(tokens, windows, "Sweep removed stale entries");
        }
        (tokens, windows)
    }

    /// Sweep every interval until `shutdown` becomes `true` or its sender is dropped.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_secs = self.interval.as_secs(), "Token sweeper started");

            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep_once();
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }

            info!("Token sweeper stopped");
        })
    }
}
