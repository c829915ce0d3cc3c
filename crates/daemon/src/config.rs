use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, ensure};
use clap::Parser;
use herald_engine::{
    DEFAULT_BATCH_COLLECTION_TIMEOUT, DEFAULT_INTAKE_QUEUE_CAPACITY, DEFAULT_MAX_BATCH_SIZE,
    DEFAULT_SEND_QUEUE_CAPACITY, DEFAULT_WORKER_KEEP_ALIVE, DEFAULT_WORKERS, ProcessorConfig,
};
use herald_runtime::default_socket_path;

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    // Unix domain socket path
    pub socket_path: PathBuf,
    // Journal file for published batches; stdout when unset
    pub journal_path: Option<PathBuf>,
    pub processor: ProcessorConfig,
    /// How long to wait for in-flight sends on shutdown.
    pub shutdown_grace: Duration,
}

#[derive(Debug, Parser)]
#[command(name = "herald-daemon", about = "Herald event batching daemon")]
pub struct Cli {
    /// Path to Unix domain socket (optional override)
    #[arg(long)]
    pub socket_path: Option<PathBuf>,

    /// Append published batches to this file instead of stdout
    #[arg(long)]
    pub journal: Option<PathBuf>,

    /// Longest time a batch collects events before it is published
    #[arg(long, default_value_t = DEFAULT_BATCH_COLLECTION_TIMEOUT.as_millis() as u64)]
    pub batch_timeout_ms: u64,

    /// Number of events that makes a batch publish immediately
    #[arg(long, default_value_t = DEFAULT_MAX_BATCH_SIZE)]
    pub batch_size: usize,

    /// Base number of sender threads (bursts up to twice this)
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Idle time after which burst sender threads exit
    #[arg(long, default_value_t = DEFAULT_WORKER_KEEP_ALIVE.as_millis() as u64)]
    pub worker_keep_alive_ms: u64,

    /// Batches waiting for a sender thread before new ones are dropped
    #[arg(long, default_value_t = DEFAULT_SEND_QUEUE_CAPACITY)]
    pub batch_queue: usize,

    /// Events waiting for the dispatcher before new ones are dropped
    #[arg(long, default_value_t = DEFAULT_INTAKE_QUEUE_CAPACITY)]
    pub events_queue_size: usize,

    /// Time to wait for in-flight sends when shutting down
    #[arg(long, default_value_t = 5_000)]
    pub shutdown_grace_ms: u64,
}

impl DaemonConfig {
    pub fn from_args(args: &Cli) -> Result<Self> {
        ensure!(args.batch_timeout_ms > 0, "--batch-timeout-ms must be positive");
        ensure!(args.batch_size > 0, "--batch-size must be positive");
        ensure!(args.workers > 0, "--workers must be positive");
        ensure!(args.batch_queue > 0, "--batch-queue must be positive");
        ensure!(args.events_queue_size > 0, "--events-queue-size must be positive");
        ensure!(args.worker_keep_alive_ms > 0, "--worker-keep-alive-ms must be positive");
        ensure!(args.shutdown_grace_ms > 0, "--shutdown-grace-ms must be positive");

        let processor = ProcessorConfig {
            batch_collection_timeout: Duration::from_millis(args.batch_timeout_ms),
            max_batch_size: args.batch_size,
            workers: args.workers,
            worker_keep_alive: Duration::from_millis(args.worker_keep_alive_ms),
            send_queue_capacity: args.batch_queue,
            intake_queue_capacity: args.events_queue_size,
        };

        Ok(Self {
            socket_path: args.socket_path.clone().unwrap_or_else(default_socket_path),
            journal_path: args.journal.clone(),
            processor,
            shutdown_grace: Duration::from_millis(args.shutdown_grace_ms),
        })
    }

    pub fn from_env() -> Result<Self> {
        let args = Cli::parse();
        Self::from_args(&args)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
