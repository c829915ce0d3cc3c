use std::time::Duration;

pub const DEFAULT_BATCH_COLLECTION_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;
pub const DEFAULT_WORKERS: usize = 1;
/// Idle time after which a burst sender thread exits.
pub const DEFAULT_WORKER_KEEP_ALIVE: Duration = Duration::from_secs(10);
pub const DEFAULT_SEND_QUEUE_CAPACITY: usize = 100;
pub const DEFAULT_INTAKE_QUEUE_CAPACITY: usize = 10_000;

/// Tuning for a [`crate::Processor`].
///
/// Values are taken as already validated; zero sizes are not rejected here.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Longest time a batch stays open after its first record arrived.
    pub batch_collection_timeout: Duration,
    /// Record count at which a batch is flushed immediately.
    pub max_batch_size: usize,
    /// Base number of sender threads. The pool bursts up to twice this.
    pub workers: usize,
    pub worker_keep_alive: Duration,
    pub send_queue_capacity: usize,
    pub intake_queue_capacity: usize,
}

impl ProcessorConfig {
    pub fn max_workers(&self) -> usize {
        self.workers * 2
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            batch_collection_timeout: DEFAULT_BATCH_COLLECTION_TIMEOUT,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            workers: DEFAULT_WORKERS,
            worker_keep_alive: DEFAULT_WORKER_KEEP_ALIVE,
            send_queue_capacity: DEFAULT_SEND_QUEUE_CAPACITY,
            intake_queue_capacity: DEFAULT_INTAKE_QUEUE_CAPACITY,
        }
    }
}
