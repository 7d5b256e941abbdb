//! OSC console gateway
//!
//! Mirrors the parameters of a digital mixing console that speaks OSC over
//! UDP, and drives it with absolute sets and interpolated fades.
//!
//! The core lives in [`sync`]: one actor owns the state mirror, the query
//! bookkeeping, the change debouncer, the fade engine and the subscription
//! heartbeat. Everything else is plumbing around it.

pub mod config;
pub mod easing;
pub mod error;
pub mod sniffer;
pub mod state;
pub mod status;
pub mod sync;
pub mod transport;

pub use config::AppConfig;
pub use easing::{Algorithm, Curve};
pub use error::{EasingParseError, TransportError};
pub use state::{Address, StoredEntry, Value};
pub use status::{ConnectionStatus, LinkMonitor, StatusCallback};
pub use sync::{ChangeBatch, RequestFailed, SyncActor, SyncHandle, SyncStats, TransitionRequest};
pub use transport::{ConsoleTransport, InboundMessage, OutboundCommand, Transport, UdpTransport};
