//! State module - local mirror of console parameter values
//!
//! The store is the single source of truth for "what do we currently believe
//! the console's parameter is". Only the sync actor mutates it.

mod store;
mod types;

pub use store::StateStore;
pub use types::{Address, StoredEntry, Value};
