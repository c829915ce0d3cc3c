use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use crossbeam::channel::{self, Receiver, Sender};
use herald_protocol::ProcessorStatus;
use log::{error, info};

use crate::config::ProcessorConfig;
use crate::dispatcher::{Dispatcher, run};
use crate::executor::{LogAndDrop, RejectionPolicy, SendExecutor};
use crate::intake::{Submitter, intake_queue};
use crate::publisher::EventPublisher;
use crate::record::{IncomingRecord, Payload};
use crate::stats::ProcessorStats;

pub const DISPATCH_THREAD_NAME: &str = "processor-dispatch";

struct Running {
    // Dropping this interrupts the dispatcher.
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

/// Groups submitted events by category into batches and publishes them
/// from a bounded pool of sender threads.
///
/// Delivery is best effort: events are dropped when the intake queue is
/// full, when the send pool is saturated, or when the publisher fails.
pub struct Processor {
    config: ProcessorConfig,
    submitter: Submitter,
    intake: Option<Receiver<IncomingRecord>>,
    executor: Arc<SendExecutor>,
    stats: Arc<ProcessorStats>,
    running: Option<Running>,
}

impl Processor {
    pub fn new(config: ProcessorConfig, publisher: Arc<dyn EventPublisher>) -> Self {
        Self::with_rejection_policy(config, publisher, Box::new(LogAndDrop))
    }

    pub fn with_rejection_policy(
        config: ProcessorConfig,
        publisher: Arc<dyn EventPublisher>,
        policy: Box<dyn RejectionPolicy>,
    ) -> Self {
        let stats = Arc::new(ProcessorStats::default());
        let (submitter, intake) = intake_queue(config.intake_queue_capacity, Arc::clone(&stats));
        let executor = Arc::new(SendExecutor::new(
            &config,
            publisher,
            Arc::clone(&stats),
            policy,
        ));

        Self {
            config,
            submitter,
            intake: Some(intake),
            executor,
            stats,
            running: None,
        }
    }

    /// Queue an event for `key`. Never blocks; drops the event (with a
    /// warning) when the intake queue is full.
    pub fn submit(&self, key: impl Into<String>, payload: Payload) {
        self.submitter.submit(key, payload);
    }

    /// A handle producers on other threads can submit through.
    pub fn submitter(&self) -> Submitter {
        self.submitter.clone()
    }

    pub fn stats(&self) -> ProcessorStatus {
        self.stats.snapshot()
    }

    /// Shared counters, for observers that outlive a borrow of the processor.
    pub fn stats_handle(&self) -> Arc<ProcessorStats> {
        Arc::clone(&self.stats)
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Spawn the dispatcher thread. A processor can only be started once.
    pub fn start(&mut self) -> Result<()> {
        let intake = self
            .intake
            .take()
            .ok_or_else(|| anyhow!("processor was already started"))?;
        let (stop, stop_rx) = channel::bounded(1);

        let executor = Arc::clone(&self.executor);
        let stats = Arc::clone(&self.stats);
        let dispatcher = Dispatcher::new(&self.config, Instant::now(), move |batch| {
            stats.record_flushed();
            // Rejections are already reported by the executor's policy.
            let _ = executor.try_send(batch);
        });

        let handle = thread::Builder::new()
            .name(DISPATCH_THREAD_NAME.into())
            .spawn(move || run(dispatcher, intake, stop_rx))
            .context("Failed to spawn dispatcher thread")?;

        info!(
            "Processor started: max_batch_size={}, timeout={:?}, workers={}..{}",
            self.config.max_batch_size,
            self.config.batch_collection_timeout,
            self.config.workers,
            self.config.max_workers(),
        );

        self.running = Some(Running { stop, handle });
        Ok(())
    }

    /// Interrupt the dispatcher, wait for it to flush what it holds, then
    /// stop the send pool from taking new batches.
    ///
    /// Sends already queued keep running; see [`Self::await_termination`].
    pub fn stop(&mut self) {
        if let Some(Running { stop, handle }) = self.running.take() {
            drop(stop);
            if handle.join().is_err() {
                error!("Dispatcher thread panicked during shutdown");
            }
        }
        self.executor.shutdown();
    }

    /// Wait for in-flight sends after [`Self::stop`]. Returns false on
    /// timeout.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        self.executor.await_termination(timeout)
    }
}

impl Drop for Processor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;
