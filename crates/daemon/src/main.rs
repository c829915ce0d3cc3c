use std::sync::Arc;

mod config;
mod journal;
mod rpc;
mod state;

use config::DaemonConfig;
use herald_engine::Processor;
use herald_runtime::logging;
use journal::JournalPublisher;
use state::DaemonState;

use log::{info, warn};

fn main() -> anyhow::Result<()> {
    logging::init().ok();

    let config = DaemonConfig::from_env()?;

    info!(
        "Starting herald daemon: socket={}, journal={}",
        config.socket_path.display(),
        config
            .journal_path
            .as_deref()
            .map_or_else(|| "<stdout>".to_string(), |p| p.display().to_string()),
    );

    let publisher = Arc::new(JournalPublisher::open(config.journal_path.as_deref())?);
    let mut processor = Processor::new(config.processor.clone(), publisher);
    processor.start()?;

    let state = Arc::new(DaemonState::new(config, &processor));
    let served = rpc::run_rpc_server(Arc::clone(&state));

    // Flush whatever is still open before leaving, even if serving failed.
    processor.stop();
    if !processor.await_termination(state.config.shutdown_grace) {
        warn!(
            "Batch senders still busy after {:?}; exiting anyway",
            state.config.shutdown_grace
        );
    }

    served
}
