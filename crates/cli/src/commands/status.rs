use std::process::ExitCode;

use anyhow::{Result, bail};
use clap::Args;
use herald_protocol::{DaemonRequest, DaemonResponse, ProcessorStatus};
use log::error;

use crate::commands::{DaemonOptions, request};

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Print the counters as a JSON object
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub daemon: DaemonOptions,
}

#[derive(Debug, Args)]
pub struct PingArgs {
    #[command(flatten)]
    pub daemon: DaemonOptions,
}

pub fn run(args: StatusArgs) -> ExitCode {
    report("status", show_status(args))
}

pub fn run_ping(args: PingArgs) -> ExitCode {
    report("ping", ping(args))
}

fn report(command: &str, result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("[error] {e:#}");
            eprintln!("[{command}] {e:#}");
            ExitCode::from(2)
        }
    }
}

fn show_status(args: StatusArgs) -> Result<()> {
    let mut stream = args.daemon.connect()?;

    let status = match request(&mut stream, &DaemonRequest::Status)? {
        DaemonResponse::Status(s) => s,
        DaemonResponse::Error(msg) => bail!("daemon error: {msg}"),
        other => bail!("unexpected response from daemon: {other:?}"),
    };

    if args.json {
        println!("{}", serde_json::to_string(&status)?);
    } else {
        print!("{}", format_status(&status));
    }
    Ok(())
}

fn ping(args: PingArgs) -> Result<()> {
    let mut stream = args.daemon.connect()?;

    match request(&mut stream, &DaemonRequest::Ping)? {
        DaemonResponse::Pong => {
            println!("pong");
            Ok(())
        }
        other => bail!("unexpected response from daemon: {other:?}"),
    }
}

fn format_status(s: &ProcessorStatus) -> String {
    let rows = [
        ("accepted", s.accepted),
        ("intake dropped", s.intake_dropped),
        ("batches flushed", s.batches_flushed),
        ("batches sent", s.batches_sent),
        ("send rejected", s.send_rejected),
        ("send failed", s.send_failed),
    ];

    rows.iter()
        .map(|(label, value)| format!("{:<16} {}\n", format!("{label}:"), value))
        .collect()
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
