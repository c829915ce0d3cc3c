use std::io::{self, BufRead};
use std::process::ExitCode;

use anyhow::{Result, bail};
use clap::Args;
use herald_protocol::{DaemonRequest, DaemonResponse, SubmitRequest};
use log::error;

use crate::commands::{DaemonOptions, request};

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Category the events are batched under
    pub category: String,

    /// JSON payload of a single event; NDJSON is read from stdin when omitted
    pub payload: Option<String>,

    #[command(flatten)]
    pub daemon: DaemonOptions,
}

pub fn run(args: SendArgs) -> ExitCode {
    match execute(args) {
        Ok(code) => code,
        Err(e) => {
            error!("[error] {e:#}");
            eprintln!("[send] {e:#}");
            ExitCode::from(2)
        }
    }
}

fn execute(args: SendArgs) -> Result<ExitCode> {
    let mut stream = args.daemon.connect()?;

    let payloads: Vec<(usize, String)> = match args.payload {
        Some(p) => vec![(1, p)],
        None => payload_lines(io::stdin().lock())?,
    };

    let mut accepted = 0usize;
    let mut failed = 0usize;

    for (line_no, payload) in payloads {
        let req = DaemonRequest::Submit(SubmitRequest {
            category: args.category.clone(),
            payload,
        });

        match request(&mut stream, &req)? {
            DaemonResponse::Accepted => accepted += 1,
            DaemonResponse::Error(msg) => {
                failed += 1;
                eprintln!("[send] line {line_no}: {msg}");
            }
            other => bail!("unexpected response from daemon: {other:?}"),
        }
    }

    eprintln!("[send] {accepted} events queued for {}", args.category);

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

/// Non-blank lines with their 1-based line numbers.
fn payload_lines(reader: impl BufRead) -> Result<Vec<(usize, String)>> {
    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            out.push((idx + 1, trimmed.to_string()));
        }
    }
    Ok(out)
}

#[cfg(test)]
#[path = "send_tests.rs"]
mod tests;
