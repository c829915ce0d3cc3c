//! Test doubles shared by the engine's unit tests.

use std::time::Duration;

use anyhow::{Result, bail};
use crossbeam::channel::{self, Receiver, Sender};

use crate::publisher::{EventPublisher, PublishOptions};
use crate::record::Payload;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug)]
pub struct Published {
    pub category: String,
    pub items: Vec<Payload>,
    pub options: PublishOptions,
}

/// Publisher that forwards every successful batch to a channel.
///
/// Categories starting with `fail` return an error and categories starting
/// with `panic` panic. When gated, every call blocks until the gate sender
/// is dropped.
pub struct RecordingPublisher {
    tx: Sender<Published>,
    gate: Option<Receiver<()>>,
}

impl RecordingPublisher {
    pub fn new() -> (Self, Receiver<Published>) {
        let (tx, rx) = channel::unbounded();
        (Self { tx, gate: None }, rx)
    }

    pub fn gated() -> (Self, Receiver<Published>, Sender<()>) {
        let (tx, rx) = channel::unbounded();
        let (gate_tx, gate_rx) = channel::unbounded();
        let publisher = Self {
            tx,
            gate: Some(gate_rx),
        };
        (publisher, rx, gate_tx)
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, batch: &str, category: &str, options: PublishOptions) -> Result<()> {
        if let Some(gate) = &self.gate {
            let _ = gate.recv();
        }
        if category.starts_with("fail") {
            bail!("downstream rejected {category}");
        }
        if category.starts_with("panic") {
            panic!("downstream blew up on {category}");
        }

        let items: Vec<Payload> = serde_json::from_str(batch)?;
        let _ = self.tx.send(Published {
            category: category.to_string(),
            items,
            options,
        });
        Ok(())
    }
}

/// Collect exactly `n` published batches or panic.
pub fn collect(rx: &Receiver<Published>, n: usize) -> Vec<Published> {
    (0..n)
        .map(|i| {
            rx.recv_timeout(RECV_TIMEOUT)
                .unwrap_or_else(|e| panic!("batch {i} of {n} not published: {e}"))
        })
        .collect()
}
