//! Console transport - logs all outbound commands instead of sending them
//!
//! This is useful for:
//! - Running the gateway without a console on the network (`--dry-run`)
//! - Checking fade step sequences in logs
//! - Asserting on exact outbound traffic in tests

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{OutboundCommand, Transport};
use crate::error::TransportError;

/// An outbound command and when it was issued
#[derive(Debug, Clone, PartialEq)]
pub struct SentCommand {
    pub at: Instant,
    pub command: OutboundCommand,
}

pub struct ConsoleTransport {
    name: String,
    /// Log each command at info (dry runs) instead of debug
    verbose: bool,
    /// Keep sent commands in memory for inspection
    recording: bool,
    sent: Mutex<Vec<SentCommand>>,
    exec_count: AtomicUsize,
}

impl ConsoleTransport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            verbose: false,
            recording: false,
            sent: Mutex::new(Vec::new()),
            exec_count: AtomicUsize::new(0),
        }
    }

    /// Log every command at info level
    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    /// Keep every sent command so `sent`/`sent_to` can return it
    pub fn recording(mut self) -> Self {
        self.recording = true;
        self
    }

    /// Everything recorded so far, oldest first
    pub fn sent(&self) -> Vec<SentCommand> {
        self.sent.lock().clone()
    }

    /// Recorded commands sent to one address, oldest first
    pub fn sent_to(&self, address: &str) -> Vec<OutboundCommand> {
        self.sent
            .lock()
            .iter()
            .filter(|s| s.command.address.as_str() == address)
            .map(|s| s.command.clone())
            .collect()
    }

    /// Commands sent so far, recorded or not
    pub fn sent_count(&self) -> usize {
        self.exec_count.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
        self.exec_count.store(0, Ordering::Relaxed);
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, command: OutboundCommand) -> Result<(), TransportError> {
        let exec_num = self.exec_count.fetch_add(1, Ordering::Relaxed) + 1;
        if self.recording {
            self.sent.lock().push(SentCommand {
                at: Instant::now(),
                command: command.clone(),
            });
        }

        let payload = command
            .value
            .as_ref()
            .map(|v| format!("{} ({})", v, v.type_tag()))
            .unwrap_or_else(|| "(query)".to_string());

        if self.verbose {
            info!(
                "🎚️  [{}] {} → {} {} [#{}]",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                self.name,
                command.address,
                payload,
                exec_num
            );
        } else {
            debug!(
                transport = self.name,
                addr = %command.address,
                payload = payload,
                exec_count = exec_num,
                "ConsoleTransport send"
            );
        }
        Ok(())
    }
}
