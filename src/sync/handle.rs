//! SyncHandle - Public API for the SyncActor
//!
//! Provides an ergonomic async interface for interacting with the SyncActor
//! through message passing. Fire-and-forget methods for hot paths, and
//! async methods with oneshot channels for reads.

use tokio::sync::{broadcast, mpsc, oneshot};

use super::aggregator::ChangeBatch;
use super::commands::{RequestFailed, SyncCommand, SyncStats};
use super::transition::TransitionRequest;
use crate::state::{Address, StoredEntry, Value};
use crate::transport::InboundMessage;

/// Handle for interacting with the SyncActor
///
/// This is the whole surface available to the automation layer. All methods
/// are non-blocking for the caller.
///
/// # Fire-and-forget
/// - `on_message` - Feed one inbound console message
/// - `ensure_loaded` - Make sure a query for an address is in flight
/// - `run_transition` - Start or replace a fade
/// - `set` - Absolute set plus confirmation query
///
/// # Reads (async with response)
/// - `get` / `get_entry` - Mirrored value of one address
/// - `stats` - Actor counters
///
/// # Events
/// - `subscribe_changes` - Debounced batches of changed addresses
/// - `subscribe_failures` - Queries that timed out
#[derive(Clone)]
pub struct SyncHandle {
    cmd_tx: mpsc::UnboundedSender<SyncCommand>,
    changes_tx: broadcast::Sender<ChangeBatch>,
    failures_tx: broadcast::Sender<RequestFailed>,
}

impl SyncHandle {
    pub(super) fn new(
        cmd_tx: mpsc::UnboundedSender<SyncCommand>,
        changes_tx: broadcast::Sender<ChangeBatch>,
        failures_tx: broadcast::Sender<RequestFailed>,
    ) -> Self {
        Self {
            cmd_tx,
            changes_tx,
            failures_tx,
        }
    }

    // =========================================================================
    // Hot path methods (fire-and-forget, no await)
    // =========================================================================

    /// Apply an inbound console message
    pub fn on_message(&self, msg: InboundMessage) {
        let _ = self.cmd_tx.send(SyncCommand::Inbound(msg));
    }

    /// Query `address` unless a query for it is already pending or queued
    ///
    /// Does not wait for the answer: watch `subscribe_changes` for the value
    /// and `subscribe_failures` for timeouts. Retrying is up to the caller.
    pub fn ensure_loaded(&self, address: impl Into<Address>) {
        let _ = self.cmd_tx.send(SyncCommand::EnsureLoaded {
            address: address.into(),
        });
    }

    /// Fade `request.address` towards `request.to`
    ///
    /// Replaces any fade already running on the address.
    pub fn run_transition(&self, request: TransitionRequest) {
        let _ = self.cmd_tx.send(SyncCommand::RunTransition(request));
    }

    /// Set an absolute value, then query it back so the mirror follows
    pub fn set(&self, address: impl Into<Address>, value: Value) {
        let _ = self.cmd_tx.send(SyncCommand::Set {
            address: address.into(),
            value,
        });
    }

    // =========================================================================
    // Query methods (async with response)
    // =========================================================================

    /// Last-known value of `address`
    ///
    /// Returns None if nothing was received for it yet, or the actor is gone.
    pub async fn get(&self, address: impl Into<Address>) -> Option<Value> {
        let (response_tx, response_rx) = oneshot::channel();
        let cmd = SyncCommand::Get {
            address: address.into(),
            response: response_tx,
        };

        if self.cmd_tx.send(cmd).is_err() {
            return None;
        }

        response_rx.await.ok().flatten()
    }

    /// Last-known entry of `address`, with its update time
    pub async fn get_entry(&self, address: impl Into<Address>) -> Option<StoredEntry> {
        let (response_tx, response_rx) = oneshot::channel();
        let cmd = SyncCommand::GetEntry {
            address: address.into(),
            response: response_tx,
        };

        if self.cmd_tx.send(cmd).is_err() {
            return None;
        }

        response_rx.await.ok().flatten()
    }

    /// Actor counters; also a barrier for all previously sent commands
    pub async fn stats(&self) -> Option<SyncStats> {
        let (response_tx, response_rx) = oneshot::channel();
        if self.cmd_tx.send(SyncCommand::Stats { response: response_tx }).is_err() {
            return None;
        }
        response_rx.await.ok()
    }

    // =========================================================================
    // Event streams
    // =========================================================================

    pub fn subscribe_changes(&self) -> broadcast::Receiver<ChangeBatch> {
        self.changes_tx.subscribe()
    }

    pub fn subscribe_failures(&self) -> broadcast::Receiver<RequestFailed> {
        self.failures_tx.subscribe()
    }

    // =========================================================================
    // Lifecycle methods
    // =========================================================================

    /// Arm the subscription heartbeat (subscribes immediately)
    pub fn start(&self) {
        let _ = self.cmd_tx.send(SyncCommand::Start);
    }

    /// Stop the heartbeat and drop pending queries and running fades
    pub fn stop(&self) {
        let _ = self.cmd_tx.send(SyncCommand::Stop);
    }

    /// Stop and clear the state mirror (call before re-starting after a reconnect)
    pub fn reset(&self) {
        let _ = self.cmd_tx.send(SyncCommand::Reset);
    }

    /// Check if the actor is still alive
    pub fn is_alive(&self) -> bool {
        !self.cmd_tx.is_closed()
    }

    /// Signal the actor to shut down gracefully
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(SyncCommand::Shutdown);
    }
}
