use std::process::ExitCode;

use clap::Parser;

mod commands;

use commands::Command;
use herald_runtime::logging;

#[derive(Debug, Parser)]
#[command(name = "herald", version, about = "Send events to the herald batching daemon")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

fn main() -> ExitCode {
    logging::init().ok();

    let cli = Cli::parse();
    match cli.command {
        Command::Send(args) => commands::send::run(args),
        Command::Status(args) => commands::status::run(args),
        Command::Ping(args) => commands::status::run_ping(args),
    }
}
