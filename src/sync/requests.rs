//! RequestCoordinator - "ensure this value is loaded" bookkeeping
//!
//! The console has no request ids: a query is a value-less message and the
//! answer is any later inbound message on the same address. This module keeps
//! at most one outstanding query per address, bounds how many are in flight,
//! and reports queries whose answer never came.
//!
//! It performs no I/O and owns no timers. The actor sends a query for every
//! address this module admits, and sleeps until [`next_deadline`].
//!
//! [`next_deadline`]: RequestCoordinator::next_deadline

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use tokio::time::Instant;

use crate::state::Address;

/// Outcome of an `ensure_loaded` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A slot was free; the caller must send the query now
    Send,
    /// All slots busy; the query waits its turn
    Queued,
    /// Already pending or queued; nothing to do
    AlreadyRequested,
}

/// A query that was sent and is awaiting any inbound message on its address
#[derive(Debug, Clone, Copy)]
struct PendingQuery {
    created_at: Instant,
    deadline: Instant,
}

/// A query whose timeout elapsed without a matching message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expired {
    pub address: Address,
    pub waited: Duration,
}

pub struct RequestCoordinator {
    timeout: Duration,
    max_in_flight: usize,
    pending: HashMap<Address, PendingQuery>,
    queue: VecDeque<Address>,
    queued: HashSet<Address>,
}

impl RequestCoordinator {
    /// `max_in_flight` is raised to at least 1
    pub fn new(timeout: Duration, max_in_flight: usize) -> Self {
        Self {
            timeout,
            max_in_flight: max_in_flight.max(1),
            pending: HashMap::new(),
            queue: VecDeque::new(),
            queued: HashSet::new(),
        }
    }

    /// Request a fresh value for `address` unless one is already on its way
    pub fn ensure_loaded(&mut self, address: Address, now: Instant) -> Admission {
        if self.pending.contains_key(&address) || self.queued.contains(&address) {
            return Admission::AlreadyRequested;
        }

        if self.pending.len() < self.max_in_flight {
            self.record_pending(address, now);
            Admission::Send
        } else {
            self.queued.insert(address.clone());
            self.queue.push_back(address);
            Admission::Queued
        }
    }

    /// Clear the pending query for `address` after a matching inbound message
    ///
    /// Returns false when nothing was pending (unsolicited push, or a
    /// duplicate answer).
    pub fn resolve(&mut self, address: &str) -> bool {
        self.pending.remove(address).is_some()
    }

    /// Remove every query whose deadline has passed
    pub fn expire(&mut self, now: Instant) -> Vec<Expired> {
        let overdue: Vec<Address> = self
            .pending
            .iter()
            .filter(|(_, query)| query.deadline <= now)
            .map(|(address, _)| address.clone())
            .collect();

        overdue
            .into_iter()
            .filter_map(|address| {
                self.pending.remove(&address).map(|query| Expired {
                    waited: now.saturating_duration_since(query.created_at),
                    address,
                })
            })
            .collect()
    }

    /// Move queued addresses into free slots
    ///
    /// Every returned address is now pending and must be sent by the caller.
    pub fn admit(&mut self, now: Instant) -> Vec<Address> {
        let mut admitted = Vec::new();
        while self.pending.len() < self.max_in_flight {
            let Some(address) = self.queue.pop_front() else {
                break;
            };
            self.queued.remove(&address);
            self.record_pending(address.clone(), now);
            admitted.push(address);
        }
        admitted
    }

    /// Earliest timeout among pending queries
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|query| query.deadline).min()
    }

    pub fn is_pending(&self, address: &str) -> bool {
        self.pending.contains_key(address)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    /// Forget every pending and queued query without reporting failures
    pub fn clear(&mut self) {
        self.pending.clear();
        self.queue.clear();
        self.queued.clear();
    }

    fn record_pending(&mut self, address: Address, now: Instant) {
        self.pending.insert(
            address,
            PendingQuery {
                created_at: now,
                deadline: now + self.timeout,
            },
        );
    }
}
