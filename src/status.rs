//! Connection status derived from query failures
//!
//! The sync core reports failures per address. A dead console makes every
//! pending query fail, so the monitor folds that stream into one link
//! status and notifies listeners only when the kind of status changes.
//! A failure that arrived while the console was sending other messages is
//! an unknown address, not a lost link, and counts as activity.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::sync::RequestFailed;

/// Link status towards the console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Replies are arriving
    Connected,
    /// Some queries went unanswered since the last inbound traffic
    Degraded { consecutive_failures: u32 },
    /// Too many consecutive failures without any inbound traffic
    Unreachable,
}

impl ConnectionStatus {
    fn same_kind(&self, other: &ConnectionStatus) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Degraded {
                consecutive_failures,
            } => write!(f, "degraded ({} failed queries)", consecutive_failures),
            ConnectionStatus::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// Type alias for connection status callbacks
pub type StatusCallback = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;

pub struct LinkMonitor {
    unreachable_after: u32,
    consecutive_failures: u32,
    status: ConnectionStatus,
    callbacks: Vec<StatusCallback>,
}

impl LinkMonitor {
    /// `unreachable_after` consecutive failures mark the console unreachable
    pub fn new(unreachable_after: u32) -> Self {
        Self {
            unreachable_after: unreachable_after.max(1),
            consecutive_failures: 0,
            status: ConnectionStatus::Connected,
            callbacks: Vec::new(),
        }
    }

    /// Register a callback invoked on every status change
    pub fn on_status_change(&mut self, callback: StatusCallback) {
        self.callbacks.push(callback);
    }

    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Count one unanswered query
    ///
    /// Returns the new status when its kind changed.
    pub fn record_failure(&mut self, failure: &RequestFailed) -> Option<ConnectionStatus> {
        if failure.traffic_seen {
            debug!(addr = %failure.address, "No reply for address while the console is answering");
            return self.record_activity();
        }

        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        let next = if self.consecutive_failures >= self.unreachable_after {
            ConnectionStatus::Unreachable
        } else {
            ConnectionStatus::Degraded {
                consecutive_failures: self.consecutive_failures,
            }
        };

        let changed = self.transition(next);
        if let Some(ConnectionStatus::Unreachable) = changed {
            warn!(
                "🔌 Console unreachable ({} consecutive query timeouts, last {})",
                self.consecutive_failures, failure.address
            );
        } else if changed.is_some() {
            warn!(
                "Console link degraded: {} did not answer within {:?}",
                failure.address, failure.waited
            );
        }
        changed
    }

    /// Inbound traffic arrived; the console is alive
    pub fn record_activity(&mut self) -> Option<ConnectionStatus> {
        self.consecutive_failures = 0;
        let changed = self.transition(ConnectionStatus::Connected);
        if changed.is_some() {
            info!("✅ Console link restored");
        }
        changed
    }

    fn transition(&mut self, next: ConnectionStatus) -> Option<ConnectionStatus> {
        let changed = !self.status.same_kind(&next);
        self.status = next;
        if !changed {
            return None;
        }
        for callback in &self.callbacks {
            callback(self.status.clone());
        }
        Some(self.status.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;

    fn failure(address: &str) -> RequestFailed {
        RequestFailed {
            address: address.into(),
            waited: Duration::from_millis(200),
            traffic_seen: false,
        }
    }

    #[test]
    fn test_failures_degrade_then_mark_unreachable() {
        let mut monitor = LinkMonitor::new(3);
        assert_eq!(monitor.status(), &ConnectionStatus::Connected);

        assert_eq!(
            monitor.record_failure(&failure("/a")),
            Some(ConnectionStatus::Degraded {
                consecutive_failures: 1
            })
        );
        assert_eq!(monitor.record_failure(&failure("/b")), None);
        assert_eq!(
            monitor.status(),
            &ConnectionStatus::Degraded {
                consecutive_failures: 2
            }
        );
        assert_eq!(
            monitor.record_failure(&failure("/c")),
            Some(ConnectionStatus::Unreachable)
        );
        assert_eq!(monitor.record_failure(&failure("/d")), None);
    }

    #[test]
    fn test_activity_restores_connected() {
        let mut monitor = LinkMonitor::new(2);
        monitor.record_failure(&failure("/a"));
        monitor.record_failure(&failure("/b"));

        assert_eq!(monitor.record_activity(), Some(ConnectionStatus::Connected));
        assert_eq!(monitor.consecutive_failures(), 0);
        assert_eq!(monitor.record_activity(), None);
    }

    #[test]
    fn test_callbacks_fire_once_per_change() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut monitor = LinkMonitor::new(5);
        let sink = Arc::clone(&seen);
        monitor.on_status_change(Arc::new(move |status| sink.lock().push(status)));

        for address in ["/a", "/b", "/c"] {
            monitor.record_failure(&failure(address));
        }
        monitor.record_activity();

        assert_eq!(
            *seen.lock(),
            vec![
                ConnectionStatus::Degraded {
                    consecutive_failures: 1
                },
                ConnectionStatus::Connected,
            ]
        );
    }

    #[test]
    fn test_threshold_of_one_skips_degraded() {
        let mut monitor = LinkMonitor::new(0);
        assert_eq!(
            monitor.record_failure(&failure("/a")),
            Some(ConnectionStatus::Unreachable)
        );
    }

    #[test]
    fn test_failure_with_traffic_counts_as_activity() {
        let mut monitor = LinkMonitor::new(2);
        monitor.record_failure(&failure("/a"));

        let unknown = RequestFailed {
            traffic_seen: true,
            ..failure("/bad")
        };
        assert_eq!(monitor.record_failure(&unknown), Some(ConnectionStatus::Connected));
        assert_eq!(monitor.consecutive_failures(), 0);
        for _ in 0..10 {
            assert_eq!(monitor.record_failure(&unknown), None);
        }
        assert_eq!(monitor.status(), &ConnectionStatus::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_addresses_do_not_mark_answering_console_unreachable() {
        use crate::config::SyncConfig;
        use crate::state::Value;
        use crate::sync::SyncActor;
        use crate::transport::{ConsoleTransport, InboundMessage};

        let transport = Arc::new(ConsoleTransport::new("test"));
        let handle = SyncActor::spawn(&SyncConfig::default(), transport);
        let mut changes = handle.subscribe_changes();
        let mut failures = handle.subscribe_failures();

        let mut monitor = LinkMonitor::new(5);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        monitor.on_status_change(Arc::new(move |status| sink.lock().push(status)));

        handle.ensure_loaded("/ch/01/mix/fader");
        for i in 1..=5 {
            handle.ensure_loaded(format!("/bad/{i}"));
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        handle.on_message(InboundMessage::new("/ch/01/mix/fader", Value::Float(0.5)));
        tokio::time::sleep(Duration::from_millis(600)).await;

        while let Ok(_batch) = changes.try_recv() {
            monitor.record_activity();
        }
        let mut failed = 0;
        while let Ok(failure) = failures.try_recv() {
            assert!(failure.traffic_seen, "{} reported as link loss", failure.address);
            monitor.record_failure(&failure);
            failed += 1;
        }

        assert_eq!(failed, 5);
        assert_eq!(monitor.status(), &ConnectionStatus::Connected);
        assert!(seen.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_console_becomes_unreachable() {
        use crate::config::SyncConfig;
        use crate::sync::SyncActor;
        use crate::transport::ConsoleTransport;

        let transport = Arc::new(ConsoleTransport::new("test"));
        let handle = SyncActor::spawn(&SyncConfig::default(), transport);
        let mut failures = handle.subscribe_failures();
        let mut monitor = LinkMonitor::new(5);

        for i in 1..=6 {
            handle.ensure_loaded(format!("/ch/{i:02}/mix/fader"));
        }
        tokio::time::sleep(Duration::from_millis(600)).await;

        while let Ok(failure) = failures.try_recv() {
            assert!(!failure.traffic_seen);
            monitor.record_failure(&failure);
        }
        assert_eq!(monitor.status(), &ConnectionStatus::Unreachable);
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionStatus::Connected.to_string(), "connected");
        assert_eq!(
            ConnectionStatus::Degraded {
                consecutive_failures: 2
            }
            .to_string(),
            "degraded (2 failed queries)"
        );
    }
}
