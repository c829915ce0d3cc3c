use std::fmt;

/// Opaque event body. Batches go downstream as a JSON array of these.
pub type Payload = serde_json::Value;

/// One event handed over by a producer, waiting in the intake queue.
#[derive(Debug)]
pub struct IncomingRecord {
    pub key: String,
    pub payload: Payload,
}

impl IncomingRecord {
    pub fn new(key: impl Into<String>, payload: Payload) -> Self {
        Self {
            key: key.into(),
            payload,
        }
    }
}

/// A flushed batch: every payload collected for `category`, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub category: String,
    pub items: Vec<Payload>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Wire form expected by the publisher.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.items)
    }
}

impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Batch to {} of size {}", self.category, self.items.len())
    }
}
