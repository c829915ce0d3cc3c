use std::time::Instant;

use hashbrown::HashMap;

use crate::record::{Batch, Payload};

/// A batch still collecting records for one key.
#[derive(Debug)]
pub struct OpenBatch {
    items: Vec<Payload>,
    deadline: Instant,
}

impl OpenBatch {
    fn new(deadline: Instant) -> Self {
        Self {
            items: Vec::new(),
            deadline,
        }
    }

    /// Append a payload and return the new size.
    pub fn push(&mut self, payload: Payload) -> usize {
        self.items.push(payload);
        self.items.len()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    fn into_batch(self, category: String) -> Batch {
        Batch {
            category,
            items: self.items,
        }
    }
}

/// Open batches keyed by category.
///
/// Not synchronized: the dispatcher thread is the only owner.
#[derive(Debug, Default)]
pub struct Accumulator {
    batches: HashMap<String, OpenBatch>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the open batch for `key`, creating one that closes at
    /// `deadline` if none exists. An existing batch keeps its deadline.
    pub fn get_or_create(&mut self, key: &str, deadline: Instant) -> &mut OpenBatch {
        self.batches
            .entry_ref(key)
            .or_insert_with(|| OpenBatch::new(deadline))
    }

    pub fn get(&self, key: &str) -> Option<&OpenBatch> {
        self.batches.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Batch> {
        self.batches
            .remove_entry(key)
            .map(|(category, open)| open.into_batch(category))
    }

    /// Remove and yield every batch for which `pred` returns true.
    ///
    /// Batches are only visited as the iterator is advanced, so callers that
    /// rely on side effects in `pred` must exhaust it.
    pub fn extract_if<'a, F>(&'a mut self, mut pred: F) -> impl Iterator<Item = Batch> + 'a
    where
        F: FnMut(&OpenBatch) -> bool + 'a,
    {
        self.batches
            .extract_if(move |_, open| pred(&*open))
            .map(|(category, open)| open.into_batch(category))
    }

    /// Remove and yield every open batch.
    pub fn drain(&mut self) -> impl Iterator<Item = Batch> + '_ {
        self.batches
            .drain()
            .map(|(category, open)| open.into_batch(category))
    }

    pub fn clear(&mut self) {
        self.batches.clear();
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

#[cfg(test)]
#[path = "accumulator_tests.rs"]
mod tests;
