use std::sync::OnceLock;
use std::thread;

use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::config::PROGRAM_LOG_LEVEL;

/// Process logger: one line per record on stderr.
///
/// Lines carry the emitting thread's name, since most of the interesting
/// activity happens on the dispatcher and batch-sender threads.
pub struct Logger {
    level: Level,
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("{}", format_line(record));
        }
    }

    fn flush(&self) {}
}

fn format_line(record: &Record<'_>) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
    let current = thread::current();
    let thread_name = current.name().unwrap_or("unnamed");

    format!(
        "{} {:<5} ({}) [{}] {}",
        timestamp,
        record.level(),
        thread_name,
        record.target(),
        record.args()
    )
}

fn get_level_from_env() -> Level {
    std::env::var(PROGRAM_LOG_LEVEL)
        .ok()
        .and_then(|s| s.parse::<LevelFilter>().ok())
        .and_then(|filter| filter.to_level())
        .unwrap_or(Level::Warn)
}

/// Install the process logger with the level taken from `HERALD_LOG_LEVEL`.
pub fn init() -> Result<(), SetLoggerError> {
    init_with_level(get_level_from_env())
}

/// Install the process logger with an explicit level.
///
/// Only the first call installs anything; later calls are no-ops.
pub fn init_with_level(level: Level) -> Result<(), SetLoggerError> {
    static LOGGER: OnceLock<Logger> = OnceLock::new();

    // The max level must follow the level the logger was actually built
    // with, not whatever a later caller passes in.
    let init_call = LOGGER.get().is_none();
    let logger = LOGGER.get_or_init(|| Logger { level });

    if init_call {
        log::set_logger(logger)?;
        log::set_max_level(logger.level.to_level_filter());
    }

    Ok(())
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
