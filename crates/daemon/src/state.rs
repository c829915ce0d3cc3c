use std::sync::Arc;

use herald_engine::{Processor, ProcessorStats, Submitter};
use herald_protocol::{DaemonResponse, SubmitRequest};
use log::debug;
use serde_json::Value;

use crate::config::DaemonConfig;

/// What client handlers share: a way in to the processor and its counters.
pub struct DaemonState {
    pub config: DaemonConfig,
    submitter: Submitter,
    stats: Arc<ProcessorStats>,
}

impl DaemonState {
    pub fn new(config: DaemonConfig, processor: &Processor) -> Self {
        Self {
            config,
            submitter: processor.submitter(),
            stats: processor.stats_handle(),
        }
    }

    /// Queue one event. Only an unparsable payload is reported back; queue
    /// overflow is the processor's business.
    pub fn submit(&self, req: SubmitRequest) -> DaemonResponse {
        match serde_json::from_str::<Value>(&req.payload) {
            Ok(payload) => {
                self.submitter.submit(req.category, payload);
                DaemonResponse::Accepted
            }
            Err(e) => {
                debug!("Rejecting malformed payload for {}: {e}", req.category);
                DaemonResponse::Error(format!("invalid JSON payload for {}: {e}", req.category))
            }
        }
    }

    pub fn status(&self) -> DaemonResponse {
        DaemonResponse::Status(self.stats.snapshot())
    }
}
