use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, select};
use log::{debug, error, info};

use crate::accumulator::Accumulator;
use crate::config::ProcessorConfig;
use crate::record::{Batch, IncomingRecord};

/// Shortest wait between two evaluations of the open batches.
pub const MIN_WAIT: Duration = Duration::from_millis(1);

/// Batch assembly state owned by the dispatcher thread.
///
/// Time is always passed in, so the trigger logic can be driven with
/// synthetic instants. Every batch that leaves goes through `flush`.
pub struct Dispatcher<F>
where
    F: FnMut(Batch),
{
    accumulator: Accumulator,
    /// Earliest instant at which open batches must be looked at again.
    next_wake: Instant,
    timeout: Duration,
    max_batch_size: usize,
    flush: F,
}

impl<F> Dispatcher<F>
where
    F: FnMut(Batch),
{
    pub fn new(config: &ProcessorConfig, now: Instant, flush: F) -> Self {
        Self {
            accumulator: Accumulator::new(),
            next_wake: now + config.batch_collection_timeout,
            timeout: config.batch_collection_timeout,
            max_batch_size: config.max_batch_size,
            flush,
        }
    }

    /// How long the loop may block waiting for the next record.
    pub fn wait_for(&self, now: Instant) -> Duration {
        self.next_wake.saturating_duration_since(now).max(MIN_WAIT)
    }

    pub fn next_wake(&self) -> Instant {
        self.next_wake
    }

    pub fn accumulator(&self) -> &Accumulator {
        &self.accumulator
    }

    /// Fold a record into its key's batch. Returns true if that made the
    /// batch full and it was flushed.
    pub fn add(&mut self, record: IncomingRecord, now: Instant) -> bool {
        let IncomingRecord { key, payload } = record;

        let size = self
            .accumulator
            .get_or_create(&key, now + self.timeout)
            .push(payload);

        if size < self.max_batch_size {
            return false;
        }
        if let Some(batch) = self.accumulator.remove(&key) {
            (self.flush)(batch);
        }
        true
    }

    /// Post-receive step: sweep when the set of batches changed or the
    /// wake-up time has passed.
    pub fn tick(&mut self, flushed: bool, now: Instant) {
        if flushed || now > self.next_wake {
            self.sweep(now);
        }
    }

    /// Flush every batch past its deadline and move `next_wake` to the
    /// earliest remaining deadline (or one full timeout away).
    pub fn sweep(&mut self, now: Instant) {
        let mut next_wake = now + self.timeout;

        let expired: Vec<Batch> = self
            .accumulator
            .extract_if(|open| {
                if open.deadline() < now {
                    true
                } else {
                    next_wake = next_wake.min(open.deadline());
                    false
                }
            })
            .collect();

        self.next_wake = next_wake;

        for batch in expired {
            debug!("Deadline reached for {batch}");
            (self.flush)(batch);
        }
    }

    /// Drain whatever is still queued, then flush every open batch no
    /// matter its size or age.
    ///
    /// Drained records still honor the size trigger. A panicking flush
    /// loses only the batch it was given.
    pub fn shutdown(&mut self, intake: &Receiver<IncomingRecord>) {
        let now = Instant::now();

        let mut drained = 0usize;
        for record in intake.try_iter() {
            let key = record.key.clone();
            if panic::catch_unwind(AssertUnwindSafe(|| self.add(record, now))).is_err() {
                error!("Flush panicked while draining a record for {key}");
            }
            drained += 1;
        }

        let leftover: Vec<Batch> = self.accumulator.drain().collect();
        let open = leftover.len();
        for batch in leftover {
            let label = batch.to_string();
            if panic::catch_unwind(AssertUnwindSafe(|| (self.flush)(batch))).is_err() {
                error!("Flush panicked for {label} during shutdown");
            }
        }
        self.accumulator.clear();

        info!("Dispatcher shut down: drained {drained} queued records, flushed {open} open batches");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopExit {
    Stopped,
    IntakeClosed,
}

/// Body of the dispatcher thread.
///
/// Runs until `stop` yields or disconnects, then runs the shutdown sequence
/// exactly once. A panic inside the loop is logged and still followed by the
/// shutdown sequence.
pub(crate) fn run<F>(
    mut dispatcher: Dispatcher<F>,
    intake: Receiver<IncomingRecord>,
    stop: Receiver<()>,
) where
    F: FnMut(Batch),
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        dispatch_loop(&mut dispatcher, &intake, &stop)
    }));

    match outcome {
        Ok(LoopExit::Stopped) => info!("Was interrupted while dispatching batches"),
        Ok(LoopExit::IntakeClosed) => info!("Intake queue closed, stopping dispatch"),
        Err(_) => error!("Dispatcher loop panicked, flushing what is left"),
    }

    dispatcher.shutdown(&intake);
}

fn dispatch_loop<F>(
    dispatcher: &mut Dispatcher<F>,
    intake: &Receiver<IncomingRecord>,
    stop: &Receiver<()>,
) -> LoopExit
where
    F: FnMut(Batch),
{
    loop {
        let wait = dispatcher.wait_for(Instant::now());

        let received = select! {
            recv(stop) -> _ => return LoopExit::Stopped,
            recv(intake) -> msg => match msg {
                Ok(record) => Some(record),
                Err(_) => return LoopExit::IntakeClosed,
            },
            default(wait) => None,
        };

        let now = Instant::now();
        let flushed = match received {
            Some(record) => dispatcher.add(record, now),
            None => false,
        };
        dispatcher.tick(flushed, now);
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
