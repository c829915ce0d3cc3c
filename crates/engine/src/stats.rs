use std::sync::atomic::{AtomicU64, Ordering};

use herald_protocol::ProcessorStatus;

/// Counters shared by producers, the dispatcher and the sender threads.
///
/// Everything here is observational; nothing in the pipeline reads these to
/// make decisions.
#[derive(Debug, Default)]
pub struct ProcessorStats {
    accepted: AtomicU64,
    intake_dropped: AtomicU64,
    batches_flushed: AtomicU64,
    batches_sent: AtomicU64,
    send_rejected: AtomicU64,
    send_failed: AtomicU64,
}

impl ProcessorStats {
    pub(crate) fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_intake_dropped(&self) {
        self.intake_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flushed(&self) {
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sent(&self) {
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.send_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.send_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProcessorStatus {
        ProcessorStatus {
            accepted: self.accepted.load(Ordering::Relaxed),
            intake_dropped: self.intake_dropped.load(Ordering::Relaxed),
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            send_rejected: self.send_rejected.load(Ordering::Relaxed),
            send_failed: self.send_failed.load(Ordering::Relaxed),
        }
    }
}
