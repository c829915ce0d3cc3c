use std::panic::{self, AssertUnwindSafe};
use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicUsize, Ordering},
};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, error, warn};
use thiserror::Error;

use crate::config::ProcessorConfig;
use crate::publisher::{EventPublisher, PublishOptions};
use crate::record::Batch;
use crate::stats::ProcessorStats;

/// Why a batch was refused by [`SendExecutor::try_send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejected {
    #[error("batch publishing queue of size {capacity} is full")]
    QueueFull { capacity: usize },
    #[error("batch sender pool is shut down")]
    ShutDown,
}

/// What to do with a batch the executor refused.
///
/// The policy runs on the submitting thread (the dispatcher), so it must not
/// block.
pub trait RejectionPolicy: Send + Sync {
    fn rejected(&self, batch: Batch, reason: Rejected);
}

/// Default policy: log a warning and let the batch go.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAndDrop;

impl RejectionPolicy for LogAndDrop {
    fn rejected(&self, batch: Batch, reason: Rejected) {
        warn!("Failed publish batch {batch}, as {reason}");
    }
}

impl<F> RejectionPolicy for F
where
    F: Fn(Batch, Rejected) + Send + Sync,
{
    fn rejected(&self, batch: Batch, reason: Rejected) {
        self(batch, reason)
    }
}

/// State every sender thread needs.
struct Shared {
    publisher: Arc<dyn EventPublisher>,
    stats: Arc<ProcessorStats>,
    live: AtomicUsize,
    core: usize,
    keep_alive: Duration,
}

impl Shared {
    /// Claim a worker slot if fewer than `limit` threads are alive.
    fn reserve(&self, limit: usize) -> bool {
        self.live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            })
            .is_ok()
    }

    /// Give up an idle worker's slot, but never below the base pool size.
    fn retire_idle(&self) -> bool {
        let core = self.core;
        self.live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n > core).then(|| n - 1)
            })
            .is_ok()
    }

    fn send(&self, batch: Batch) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> anyhow::Result<()> {
            let body = batch.to_json().context("failed to serialize batch")?;
            self.publisher
                .publish(&body, &batch.category, PublishOptions::INTERNAL)
        }));

        match outcome {
            Ok(Ok(())) => {
                self.stats.record_sent();
                debug!("Sent {batch}");
            }
            Ok(Err(err)) => {
                self.stats.record_failed();
                error!("Failed to send single batch for unknown reason ({batch}): {err:#}");
            }
            Err(_) => {
                self.stats.record_failed();
                error!("Failed to send single batch for unknown reason ({batch}): publisher panicked");
            }
        }
    }
}

/// Handles that exist only while the executor accepts work.
struct OpenState {
    tasks: Sender<Batch>,
    // Each worker holds a clone; the receiver disconnects once all are gone.
    alive: Sender<()>,
}

/// Bounded pool of batch sender threads.
///
/// Up to `workers` threads are kept around; when the task queue is full the
/// pool bursts up to `2 * workers` threads, and burst threads exit after
/// `worker_keep_alive` without work. When that is exhausted too, the batch
/// goes to the [`RejectionPolicy`]. Submitting never blocks.
pub struct SendExecutor {
    open: Mutex<Option<OpenState>>,
    tasks_rx: Receiver<Batch>,
    alive_rx: Receiver<()>,
    shared: Arc<Shared>,
    max_workers: usize,
    capacity: usize,
    policy: Box<dyn RejectionPolicy>,
    next_thread_id: AtomicUsize,
}

impl SendExecutor {
    pub fn new(
        config: &ProcessorConfig,
        publisher: Arc<dyn EventPublisher>,
        stats: Arc<ProcessorStats>,
        policy: Box<dyn RejectionPolicy>,
    ) -> Self {
        let (tasks, tasks_rx) = channel::bounded(config.send_queue_capacity);
        let (alive, alive_rx) = channel::bounded(0);

        Self {
            open: Mutex::new(Some(OpenState { tasks, alive })),
            tasks_rx,
            alive_rx,
            shared: Arc::new(Shared {
                publisher,
                stats,
                live: AtomicUsize::new(0),
                core: config.workers,
                keep_alive: config.worker_keep_alive,
            }),
            max_workers: config.max_workers(),
            capacity: config.send_queue_capacity,
            policy,
            next_thread_id: AtomicUsize::new(0),
        }
    }

    /// Hand a batch to the pool without blocking.
    ///
    /// On rejection the batch has already been passed to the policy; the
    /// returned reason is informational.
    pub fn try_send(&self, batch: Batch) -> Result<(), Rejected> {
        let guard = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(open) = guard.as_ref() else {
            drop(guard);
            return self.reject(batch, Rejected::ShutDown);
        };

        if self.shared.reserve(self.shared.core) {
            self.spawn_worker(batch, open.alive.clone());
            return Ok(());
        }

        match open.tasks.try_send(batch) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(batch)) => {
                if self.shared.reserve(self.max_workers) {
                    self.spawn_worker(batch, open.alive.clone());
                    Ok(())
                } else {
                    drop(guard);
                    self.reject(
                        batch,
                        Rejected::QueueFull {
                            capacity: self.capacity,
                        },
                    )
                }
            }
            Err(TrySendError::Disconnected(batch)) => {
                drop(guard);
                self.reject(batch, Rejected::ShutDown)
            }
        }
    }

    /// Stop accepting batches. Queued and running sends still complete.
    pub fn shutdown(&self) {
        let was_open = self
            .open
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some();

        if was_open {
            debug!(
                "Batch sender pool shutting down with {} queued batches",
                self.queued()
            );
        }
    }

    /// Wait until every sender thread has exited after [`Self::shutdown`].
    ///
    /// Returns false if the timeout elapsed first (or the pool was never shut
    /// down).
    pub fn await_termination(&self, timeout: Duration) -> bool {
        matches!(
            self.alive_rx.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }

    pub fn live_workers(&self) -> usize {
        self.shared.live.load(Ordering::Acquire)
    }

    /// Batches accepted but not yet picked up by a sender thread.
    pub fn queued(&self) -> usize {
        self.tasks_rx.len()
    }

    fn reject(&self, batch: Batch, reason: Rejected) -> Result<(), Rejected> {
        self.policy.rejected(batch, reason);
        self.shared.stats.record_rejected();
        Err(reason)
    }

    /// Start a sender thread whose first task is `first`. The caller has
    /// already reserved a slot for it.
    fn spawn_worker(&self, first: Batch, alive: Sender<()>) {
        let id = self.next_thread_id.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::clone(&self.shared);
        let rx = self.tasks_rx.clone();

        let spawned = thread::Builder::new()
            .name(format!("batch-sender-{id}"))
            .spawn(move || {
                let _alive = alive;
                worker_loop(&shared, &rx, first);
            });

        if let Err(err) = spawned {
            // The batch went down with the closure.
            self.shared.live.fetch_sub(1, Ordering::AcqRel);
            self.shared.stats.record_rejected();
            error!("Failed to spawn batch sender thread, batch dropped: {err}");
        }
    }
}

fn worker_loop(shared: &Shared, rx: &Receiver<Batch>, first: Batch) {
    shared.send(first);

    loop {
        match rx.recv_timeout(shared.keep_alive) {
            Ok(batch) => shared.send(batch),
            Err(RecvTimeoutError::Timeout) => {
                if shared.retire_idle() {
                    debug!("Idle batch sender exiting");
                    return;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    shared.live.fetch_sub(1, Ordering::AcqRel);
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
