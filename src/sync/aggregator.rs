//! ChangeAggregator - debounced batching of changed addresses
//!
//! Every inbound message marks its address dirty. A batch is released once
//! no new address has been marked for `wait`, or at the latest `max_wait`
//! after the first mark of the batch, so continuous churn cannot starve
//! downstream consumers.

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::Instant;

use crate::state::Address;

/// Addresses that changed since the previous flush
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    pub addresses: HashSet<Address>,
}

impl ChangeBatch {
    pub fn contains(&self, address: &str) -> bool {
        self.addresses.contains(address)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

pub struct ChangeAggregator {
    wait: Duration,
    max_wait: Duration,
    dirty: HashSet<Address>,
    first_call_at: Option<Instant>,
    last_call_at: Option<Instant>,
}

impl ChangeAggregator {
    /// `max_wait` is raised to `wait` if configured below it
    pub fn new(wait: Duration, max_wait: Duration) -> Self {
        Self {
            wait,
            max_wait: max_wait.max(wait),
            dirty: HashSet::new(),
            first_call_at: None,
            last_call_at: None,
        }
    }

    /// Mark `address` dirty
    ///
    /// Returns the batch right away when the current batch has already been
    /// open for `max_wait`.
    pub fn notify(&mut self, address: Address, now: Instant) -> Option<ChangeBatch> {
        let first = *self.first_call_at.get_or_insert(now);
        self.last_call_at = Some(now);
        self.dirty.insert(address);

        if now.saturating_duration_since(first) >= self.max_wait {
            return self.flush();
        }
        None
    }

    /// When the open batch is due, if any
    pub fn deadline(&self) -> Option<Instant> {
        let first = self.first_call_at?;
        let last = self.last_call_at.unwrap_or(first);
        Some((last + self.wait).min(first + self.max_wait))
    }

    /// Release the batch if its deadline has passed
    pub fn poll(&mut self, now: Instant) -> Option<ChangeBatch> {
        match self.deadline() {
            Some(deadline) if deadline <= now => self.flush(),
            _ => None,
        }
    }

    /// Release the open batch regardless of timing
    pub fn flush(&mut self) -> Option<ChangeBatch> {
        self.first_call_at = None;
        self.last_call_at = None;
        if self.dirty.is_empty() {
            return None;
        }
        Some(ChangeBatch {
            addresses: std::mem::take(&mut self.dirty),
        })
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Discard the open batch without emitting it
    pub fn clear(&mut self) {
        self.dirty.clear();
        self.first_call_at = None;
        self.last_call_at = None;
    }
}
