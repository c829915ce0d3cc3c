use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result, bail};
use herald_engine::{EventPublisher, PublishOptions};
use serde_json::Value;

/// Publisher that appends each batch as one JSON line:
/// `{"category":"..","events":[..]}`.
pub struct JournalPublisher {
    out: Mutex<Box<dyn Write + Send>>,
}

impl JournalPublisher {
    /// Append to `path`, or write to stdout when no path is given.
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::from_writer(io::stdout()));
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create journal directory {}", parent.display())
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open journal at {}", path.display()))?;

        Ok(Self::from_writer(file))
    }

    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(writer)),
        }
    }
}

impl EventPublisher for JournalPublisher {
    fn publish(&self, batch: &str, category: &str, options: PublishOptions) -> Result<()> {
        if options.validate {
            match serde_json::from_str::<Value>(batch) {
                Ok(Value::Array(_)) => {}
                Ok(_) => bail!("batch for {category} is not a JSON array"),
                Err(e) => bail!("batch for {category} is not valid JSON: {e}"),
            }
        }

        // `batch` is already a serialized array; splice it in as is.
        let line = format!("{{\"category\":{},\"events\":{}}}\n", Value::from(category), batch);

        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        out.write_all(line.as_bytes())?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
