//! The retry queue's backing set.
//!
//! Records that failed with a retryable outcome accumulate here during a
//! pass, deduplicated by cell key, and are re-dispatched by later passes.
//! The set only ever shrinks when a pass produces a hit for a key, which is
//! what makes the retry loop's zero-hit termination law sound.

use crate::resolver::outcome::{CellKey, CellRecord};
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct PendingSet {
    records: Vec<CellRecord>,
    keys: HashSet<CellKey>,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record awaiting a future pass. Duplicate keys are dropped so a
    /// record retried across many passes appears once.
    pub fn insert(&mut self, record: CellRecord) {
        if self.keys.insert(record.key) {
            self.records.push(record);
        }
    }

    /// Removes the record for a key that finally resolved.
    pub fn remove(&mut self, key: &CellKey) {
        if self.keys.remove(key) {
            self.records.retain(|record| record.key != *key);
        }
    }

    pub fn contains(&self, key: &CellKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Snapshot of the current content, in insertion order, for one retry
    /// pass to sweep while hits mutate the live set.
    pub fn snapshot(&self) -> Vec<CellRecord> {
        self.records.clone()
    }
}
