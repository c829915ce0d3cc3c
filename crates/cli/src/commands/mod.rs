pub mod send;
pub mod status;

use std::os::unix::net::UnixStream;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use herald_protocol::codec::{read_message, write_message};
use herald_protocol::{DaemonRequest, DaemonResponse};
use herald_runtime::default_socket_path;

pub use send::SendArgs;
pub use status::{PingArgs, StatusArgs};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit events under a category.
    ///
    /// Example:
    ///   herald send kpi.login '{"user":"42"}'
    ///   tail -f events.ndjson | herald send kpi.access
    Send(SendArgs),

    /// Show the daemon's counters.
    Status(StatusArgs),

    /// Check that the daemon is reachable.
    Ping(PingArgs),
}

#[derive(Debug, Args)]
pub struct DaemonOptions {
    /// Path to the daemon's Unix socket (optional override)
    #[arg(long)]
    pub socket_path: Option<PathBuf>,
}

impl DaemonOptions {
    pub fn connect(&self) -> Result<UnixStream> {
        let path = self
            .socket_path
            .clone()
            .unwrap_or_else(default_socket_path);

        UnixStream::connect(&path).with_context(|| {
            format!(
                "Failed to connect to herald daemon at {} (is it running?)",
                path.display()
            )
        })
    }
}

/// One request/response round trip.
pub fn request(stream: &mut UnixStream, req: &DaemonRequest) -> Result<DaemonResponse> {
    write_message(stream, req).context("Failed to send request to daemon")?;
    read_message(stream).context("Failed to read daemon response")
}
