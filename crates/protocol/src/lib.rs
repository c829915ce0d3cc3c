pub mod codec;

use serde::{Deserialize, Serialize};

/// A single event to be batched under `category`.
///
/// The payload travels as JSON text; the daemon parses it before queuing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub category: String,
    pub payload: String,
}

/// Counters reported by a running daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorStatus {
    /// Records accepted into the intake queue.
    pub accepted: u64,
    /// Records dropped because the intake queue was full or closed.
    pub intake_dropped: u64,
    /// Batches handed over for sending.
    pub batches_flushed: u64,
    /// Batches the downstream publisher accepted.
    pub batches_sent: u64,
    /// Batches refused by the send queue.
    pub send_rejected: u64,
    /// Batches the downstream publisher failed on.
    pub send_failed: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub enum DaemonRequest {
    Submit(SubmitRequest),
    Ping,
    Status,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DaemonResponse {
    Accepted,
    Pong,
    Status(ProcessorStatus),
    Error(String),
}
