//! StateStore - In-memory mirror of console parameter values
//!
//! A plain map from [`Address`] to the last value observed for it. It is
//! owned by the sync actor, which is the only writer; the actor reports every
//! `set` to the change aggregator.

use super::types::{Address, StoredEntry, Value};
use std::collections::HashMap;
use tokio::time::Instant;

/// Mirror of the console's parameters, keyed by address
#[derive(Debug, Default)]
pub struct StateStore {
    entries: HashMap<Address, StoredEntry>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last-known value for an address
    pub fn get(&self, address: &str) -> Option<&Value> {
        self.entries.get(address).map(|entry| &entry.value)
    }

    /// Full entry, including the time it was last updated
    pub fn entry(&self, address: &str) -> Option<&StoredEntry> {
        self.entries.get(address)
    }

    /// Record a value, returning the one it replaced
    ///
    /// Always succeeds; the value shape is not validated.
    pub fn set(&mut self, address: Address, value: Value, now: Instant) -> Option<Value> {
        let entry = StoredEntry {
            address: address.clone(),
            value,
            last_updated: now,
        };
        self.entries.insert(address, entry).map(|previous| previous.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry (reconnect)
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
