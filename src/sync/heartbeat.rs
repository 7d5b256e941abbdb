//! SubscriptionManager - keeps the console's push subscription alive
//!
//! The console forgets a subscriber after a fixed idle window, so the
//! subscribe command is re-sent on an interval shorter than that window.
//! A lost heartbeat heals itself on the next one.

use std::time::Duration;

use tokio::time::Instant;

pub struct SubscriptionManager {
    interval: Duration,
    next_due: Option<Instant>,
    sent: u64,
}

impl SubscriptionManager {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            next_due: None,
            sent: 0,
        }
    }

    /// Arm the heartbeat; returns true when the caller must subscribe now
    ///
    /// Starting an already running heartbeat does nothing.
    pub fn start(&mut self, now: Instant) -> bool {
        if self.is_running() {
            return false;
        }
        self.next_due = Some(now + self.interval);
        self.sent += 1;
        true
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    /// Returns true when a heartbeat is due and re-arms the timer
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if due <= now => {
                let next = due + self.interval;
                self.next_due = Some(if next > now { next } else { now + self.interval });
                self.sent += 1;
                true
            }
            _ => false,
        }
    }

    /// Number of subscribe commands issued since creation
    pub fn sent_count(&self) -> u64 {
        self.sent
    }
}
