use anyhow::Result;

/// Checks the downstream publisher may run on a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishOptions {
    pub check_authorization: bool,
    pub validate: bool,
}

impl PublishOptions {
    /// Options for batches produced by the processor itself: the events
    /// originate inside the process, so neither check applies.
    pub const INTERNAL: Self = Self {
        check_authorization: false,
        validate: false,
    };
}

/// Downstream bulk-publish call.
///
/// `batch` is the JSON array of the batch's payloads. Errors are logged by
/// the caller and the batch is dropped; implementations should not retry on
/// the processor's behalf.
pub trait EventPublisher: Send + Sync + 'static {
    fn publish(&self, batch: &str, category: &str, options: PublishOptions) -> Result<()>;
}
