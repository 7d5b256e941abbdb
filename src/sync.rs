//! Sync module - device-state synchronization and fade engine
//!
//! Keeps a local mirror of console parameters over a fire-and-forget
//! datagram protocol: deduplicated "ask and wait" queries with timeouts,
//! debounced change batches, interpolated fades, and the push subscription
//! heartbeat. Everything runs on one actor task; see [`SyncHandle`].

mod actor;
mod aggregator;
mod commands;
mod handle;
mod heartbeat;
mod requests;
mod transition;

#[cfg(test)]
mod tests;

pub use actor::SyncActor;
pub use aggregator::{ChangeAggregator, ChangeBatch};
pub use commands::{RequestFailed, SyncStats};
pub use handle::SyncHandle;
pub use heartbeat::SubscriptionManager;
pub use requests::{Admission, Expired, RequestCoordinator};
pub use transition::{compute_steps, FadePlan, TransitionEngine, TransitionRequest};
