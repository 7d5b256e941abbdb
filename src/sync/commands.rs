//! Command and event types for the sync actor
//!
//! Commands are divided into two categories:
//! - **Fire-and-forget**: inbound messages, load requests, fades, lifecycle
//! - **Request-response**: reads that answer over a oneshot channel

use std::time::Duration;

use tokio::sync::oneshot;

use super::transition::TransitionRequest;
use crate::state::{Address, StoredEntry, Value};
use crate::transport::InboundMessage;

/// Commands for the sync actor
#[derive(Debug)]
pub enum SyncCommand {
    // -------------------------------------------------------------------------
    // Fire-and-forget
    // -------------------------------------------------------------------------
    /// A message arrived from the console (reply, push, or anything else)
    Inbound(InboundMessage),

    /// Make sure a query for this address is in flight
    EnsureLoaded { address: Address },

    /// Absolute set followed by a confirmation query
    Set { address: Address, value: Value },

    /// Start (or replace) a fade
    RunTransition(TransitionRequest),

    // -------------------------------------------------------------------------
    // Request-response
    // -------------------------------------------------------------------------
    Get {
        address: Address,
        response: oneshot::Sender<Option<Value>>,
    },

    GetEntry {
        address: Address,
        response: oneshot::Sender<Option<StoredEntry>>,
    },

    Stats {
        response: oneshot::Sender<SyncStats>,
    },

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------
    /// Arm the subscription heartbeat
    Start,

    /// Stop the heartbeat and drop queries, fades and the open batch
    Stop,

    /// Stop, then clear the state mirror
    Reset,

    /// Terminate the actor
    Shutdown,
}

/// Emitted when a query got no answer within the request timeout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFailed {
    pub address: Address,
    pub waited: Duration,
    /// Some other message arrived while this query was waiting, so the
    /// console is up and only this address went unanswered
    pub traffic_seen: bool,
}

/// Point-in-time counters of the sync actor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub entries: usize,
    pub pending_queries: usize,
    pub queued_queries: usize,
    pub active_transitions: usize,
    pub dirty: usize,
    pub heartbeat_running: bool,
    pub heartbeats_sent: u64,
    pub messages_applied: u64,
}
