use std::sync::Arc;

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use log::warn;

use crate::record::{IncomingRecord, Payload};
use crate::stats::ProcessorStats;

/// Producer side of the intake queue.
///
/// Cheap to clone; every clone feeds the same bounded queue. Submitting never
/// blocks and never fails from the caller's point of view: when the queue is
/// full (or the dispatcher is gone) the record is dropped with a warning.
#[derive(Clone)]
pub struct Submitter {
    tx: Sender<IncomingRecord>,
    stats: Arc<ProcessorStats>,
}

impl Submitter {
    pub fn submit(&self, key: impl Into<String>, payload: Payload) {
        match self.tx.try_send(IncomingRecord::new(key, payload)) {
            Ok(()) => self.stats.record_accepted(),
            Err(TrySendError::Full(rec)) => {
                self.stats.record_intake_dropped();
                warn!(
                    "Rejecting events to be queued for {} due to queue overload",
                    rec.key
                );
            }
            Err(TrySendError::Disconnected(rec)) => {
                self.stats.record_intake_dropped();
                warn!(
                    "Rejecting events to be queued for {}: dispatcher is stopped",
                    rec.key
                );
            }
        }
    }
}

/// Create the bounded intake queue.
pub(crate) fn intake_queue(
    capacity: usize,
    stats: Arc<ProcessorStats>,
) -> (Submitter, Receiver<IncomingRecord>) {
    let (tx, rx) = channel::bounded(capacity);
    (Submitter { tx, stats }, rx)
}

#[cfg(test)]
#[path = "intake_tests.rs"]
mod tests;
