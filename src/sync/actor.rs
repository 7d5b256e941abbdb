//! SyncActor - single-loop owner of all synchronization state
//!
//! Owns the state mirror, query bookkeeping, dirty set, fades and the
//! subscription heartbeat, and processes commands sequentially. Components
//! never spawn timers of their own: each exposes its next deadline and the
//! run loop sleeps until the earliest one.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         SyncActor                            │
//! │  store ── requests ── aggregator ── transitions ── heartbeat │
//! │     ▲                      │                          │      │
//! │     │ commands             │ ChangeBatch               │ send │
//! │  command_rx           changes_tx                  transport  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Inbound messages are applied strictly as: store, then pending query,
//! then dirty set. A consumer that reads the store after a query resolves
//! therefore sees the value that resolved it.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::aggregator::{ChangeAggregator, ChangeBatch};
use super::commands::{RequestFailed, SyncCommand, SyncStats};
use super::handle::SyncHandle;
use super::heartbeat::SubscriptionManager;
use super::requests::{Admission, RequestCoordinator};
use super::transition::{FadePlan, TransitionEngine, TransitionRequest};
use crate::config::SyncConfig;
use crate::state::{Address, StateStore, Value};
use crate::transport::{InboundMessage, OutboundCommand, Transport};

/// Buffered change batches per subscriber before it lags
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Buffered failure signals per subscriber before it lags
const FAILURE_CHANNEL_CAPACITY: usize = 1024;

pub struct SyncActor {
    store: StateStore,
    requests: RequestCoordinator,
    aggregator: ChangeAggregator,
    transitions: TransitionEngine,
    heartbeat: SubscriptionManager,

    /// Address whose value-less command arms the console's push updates
    subscribe_address: Address,

    transport: Arc<dyn Transport>,
    command_rx: mpsc::UnboundedReceiver<SyncCommand>,
    changes_tx: broadcast::Sender<ChangeBatch>,
    failures_tx: broadcast::Sender<RequestFailed>,

    /// Counter for tracking total inbound messages applied
    message_count: u64,
    last_inbound: Option<Instant>,
}

impl SyncActor {
    /// Spawn a new SyncActor and return a handle for interacting with it
    ///
    /// The heartbeat is not armed until [`SyncHandle::start`] is called.
    pub fn spawn(config: &SyncConfig, transport: Arc<dyn Transport>) -> SyncHandle {
        let (cmd_tx, command_rx) = mpsc::unbounded_channel();
        let (changes_tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let (failures_tx, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);

        let actor = SyncActor {
            store: StateStore::new(),
            requests: RequestCoordinator::new(config.request_timeout(), config.request_concurrency),
            aggregator: ChangeAggregator::new(config.debounce_wait(), config.debounce_max_wait()),
            transitions: TransitionEngine::new(config.fade_tick()),
            heartbeat: SubscriptionManager::new(config.heartbeat_interval()),
            subscribe_address: Address::new(&config.subscribe_address),
            transport,
            command_rx,
            changes_tx: changes_tx.clone(),
            failures_tx: failures_tx.clone(),
            message_count: 0,
            last_inbound: None,
        };

        tokio::spawn(actor.run());

        info!(
            "SyncActor spawned (fade tick {}ms, timeout {}ms, concurrency {})",
            config.fade_tick_ms, config.request_timeout_ms, config.request_concurrency
        );

        SyncHandle::new(cmd_tx, changes_tx, failures_tx)
    }

    /// Main run loop for the actor
    ///
    /// Runs until `Shutdown` is received or every handle is dropped.
    async fn run(mut self) {
        debug!("SyncActor run loop started (transport: {})", self.transport.name());

        loop {
            let timeout_at = self.requests.next_deadline();
            let tick_at = self.transitions.next_tick();
            let flush_at = self.aggregator.deadline();
            let heartbeat_at = self.heartbeat.next_due();

            tokio::select! {
                cmd = self.command_rx.recv() => {
                    let Some(cmd) = cmd else {
                        debug!("All sync handles dropped");
                        break;
                    };
                    trace!(?cmd, "Processing command");
                    if !self.handle_command(cmd).await {
                        break;
                    }
                }
                _ = sleep_until(timeout_at) => self.on_request_timeouts().await,
                _ = sleep_until(tick_at) => self.on_transition_tick().await,
                _ = sleep_until(flush_at) => self.on_flush_due(),
                _ = sleep_until(heartbeat_at) => self.on_heartbeat_due().await,
            }
        }

        info!(
            "SyncActor stopped ({} messages applied, {} entries mirrored)",
            self.message_count,
            self.store.len()
        );
    }

    /// Returns false when the actor must exit
    async fn handle_command(&mut self, cmd: SyncCommand) -> bool {
        let now = Instant::now();
        match cmd {
            SyncCommand::Inbound(msg) => self.handle_inbound(msg, now).await,
            SyncCommand::EnsureLoaded { address } => self.handle_ensure_loaded(address, now).await,
            SyncCommand::Set { address, value } => self.handle_set(address, value, now).await,
            SyncCommand::RunTransition(request) => self.handle_transition(request, now).await,

            SyncCommand::Get { address, response } => {
                let _ = response.send(self.store.get(address.as_str()).cloned());
            }
            SyncCommand::GetEntry { address, response } => {
                let _ = response.send(self.store.entry(address.as_str()).cloned());
            }
            SyncCommand::Stats { response } => {
                let _ = response.send(self.stats());
            }

            SyncCommand::Start => {
                if self.heartbeat.start(now) {
                    info!("📡 Subscribing to console updates via {}", self.subscribe_address);
                    self.send(OutboundCommand::query(self.subscribe_address.clone())).await;
                }
            }
            SyncCommand::Stop => self.stop_all(),
            SyncCommand::Reset => {
                self.stop_all();
                let dropped = self.store.len();
                self.store.clear();
                info!("State mirror reset ({} entries dropped)", dropped);
            }
            SyncCommand::Shutdown => {
                info!("SyncActor shutting down");
                self.stop_all();
                return false;
            }
        }
        true
    }

    async fn handle_inbound(&mut self, msg: InboundMessage, now: Instant) {
        let InboundMessage { address, value } = msg;
        self.message_count += 1;
        self.last_inbound = Some(now);

        let previous = self.store.set(address.clone(), value, now);
        trace!(addr = %address, ?previous, "Applied inbound value");

        if self.requests.resolve(address.as_str()) {
            trace!(addr = %address, "Query resolved");
            self.admit_queued(now).await;
        }

        if let Some(batch) = self.aggregator.notify(address, now) {
            self.publish(batch);
        }
    }

    async fn handle_ensure_loaded(&mut self, address: Address, now: Instant) {
        match self.requests.ensure_loaded(address.clone(), now) {
            Admission::Send => self.send(OutboundCommand::query(address)).await,
            Admission::Queued => trace!(addr = %address, "Query queued (concurrency limit)"),
            Admission::AlreadyRequested => trace!(addr = %address, "Query already in flight"),
        }
    }

    async fn handle_set(&mut self, address: Address, value: Value, now: Instant) {
        if self.transitions.cancel(address.as_str()) {
            debug!(addr = %address, "Manual set cancelled running fade");
        }
        self.send(OutboundCommand::set(address.clone(), value)).await;
        self.handle_ensure_loaded(address, now).await;
    }

    async fn handle_transition(&mut self, mut request: TransitionRequest, now: Instant) {
        if request.from.is_none() {
            request.from = self.store.get(request.address.as_str()).cloned();
        }
        let address = request.address.clone();
        let (algorithm, curve, duration) = (request.algorithm, request.curve, request.duration);

        match self.transitions.start(request, now) {
            FadePlan::Snap(value) => {
                debug!(addr = %address, %value, "Fade snapped to target");
                self.send(OutboundCommand::set(address, value)).await;
            }
            FadePlan::Scheduled { steps } => {
                debug!(
                    addr = %address,
                    steps,
                    %algorithm,
                    %curve,
                    duration_ms = duration.as_millis() as u64,
                    "Fade scheduled"
                );
            }
        }
    }

    async fn on_request_timeouts(&mut self) {
        let now = Instant::now();
        for expired in self.requests.expire(now) {
            let sent_at = now.checked_sub(expired.waited).unwrap_or(now);
            let traffic_seen = self.last_inbound.is_some_and(|at| at >= sent_at);
            debug!(
                addr = %expired.address,
                waited_ms = expired.waited.as_millis() as u64,
                traffic_seen,
                "Query timed out"
            );
            let _ = self.failures_tx.send(RequestFailed {
                address: expired.address,
                waited: expired.waited,
                traffic_seen,
            });
        }
        self.admit_queued(now).await;
    }

    async fn on_transition_tick(&mut self) {
        let now = Instant::now();
        for (address, value) in self.transitions.tick(now) {
            self.send(OutboundCommand::set(address, value)).await;
        }
    }

    fn on_flush_due(&mut self) {
        if let Some(batch) = self.aggregator.poll(Instant::now()) {
            self.publish(batch);
        }
    }

    async fn on_heartbeat_due(&mut self) {
        if self.heartbeat.poll(Instant::now()) {
            trace!("Subscription heartbeat");
            self.send(OutboundCommand::query(self.subscribe_address.clone())).await;
        }
    }

    async fn admit_queued(&mut self, now: Instant) {
        for address in self.requests.admit(now) {
            self.send(OutboundCommand::query(address)).await;
        }
    }

    fn publish(&self, batch: ChangeBatch) {
        debug!("Publishing change batch ({} addresses)", batch.len());
        // No receivers is fine: nobody is interested yet
        let _ = self.changes_tx.send(batch);
    }

    /// Drop queries, fades, the open batch and the heartbeat; keep the mirror
    fn stop_all(&mut self) {
        let (pending, queued) = (self.requests.pending_count(), self.requests.queued_count());
        let fades = self.transitions.active_count();

        self.heartbeat.stop();
        self.requests.clear();
        self.transitions.clear();
        self.aggregator.clear();

        info!(
            "Sync stopped ({} pending / {} queued queries dropped, {} fades cancelled)",
            pending, queued, fades
        );
    }

    async fn send(&self, command: OutboundCommand) {
        let address = command.address.clone();
        if let Err(e) = self.transport.send(command).await {
            warn!("Failed to send {} via {}: {}", address, self.transport.name(), e);
        }
    }

    fn stats(&self) -> SyncStats {
        SyncStats {
            entries: self.store.len(),
            pending_queries: self.requests.pending_count(),
            queued_queries: self.requests.queued_count(),
            active_transitions: self.transitions.active_count(),
            dirty: self.aggregator.dirty_count(),
            heartbeat_running: self.heartbeat.is_running(),
            heartbeats_sent: self.heartbeat.sent_count(),
            messages_applied: self.message_count,
        }
    }
}

/// Sleep until `deadline`, or forever when there is none
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
