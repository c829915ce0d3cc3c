mod accumulator;
mod config;
mod dispatcher;
mod executor;
mod intake;
mod processor;
mod publisher;
mod record;
mod stats;

#[cfg(test)]
mod testing;

pub use accumulator::{Accumulator, OpenBatch};
pub use config::*;
pub use dispatcher::{Dispatcher, MIN_WAIT};
pub use executor::{LogAndDrop, Rejected, RejectionPolicy, SendExecutor};
pub use intake::Submitter;
pub use processor::{DISPATCH_THREAD_NAME, Processor};
pub use publisher::{EventPublisher, PublishOptions};
pub use record::{Batch, IncomingRecord, Payload};
pub use stats::ProcessorStats;
