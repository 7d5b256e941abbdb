//! Console transports (UDP/OSC, logging console)
//!
//! A transport only sends. Inbound traffic is delivered separately as a
//! stream of [`InboundMessage`]s which the caller feeds to the sync actor;
//! every inbound message is treated the same whether it answers a query or
//! is an unsolicited push.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::state::{Address, Value};

pub mod console;
pub mod osc;
pub mod udp;

pub use console::ConsoleTransport;
pub use udp::UdpTransport;

/// One outbound command
///
/// Without a value the console treats it as a query and replies with the
/// current value; with a value it is an absolute set.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundCommand {
    pub address: Address,
    pub value: Option<Value>,
}

impl OutboundCommand {
    pub fn query(address: Address) -> Self {
        Self {
            address,
            value: None,
        }
    }

    pub fn set(address: Address, value: Value) -> Self {
        Self {
            address,
            value: Some(value),
        }
    }

    pub fn is_query(&self) -> bool {
        self.value.is_none()
    }
}

/// One inbound message, already reduced to a single typed value
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub address: Address,
    pub value: Value,
}

impl InboundMessage {
    pub fn new(address: impl Into<Address>, value: Value) -> Self {
        Self {
            address: address.into(),
            value,
        }
    }
}

/// Transport trait - outbound half of the console connection
///
/// Sends are fire-and-forget: `Ok` means the datagram left, not that the
/// console received it.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport name for logs (e.g., "udp", "console")
    fn name(&self) -> &str;

    async fn send(&self, command: OutboundCommand) -> Result<(), TransportError>;
}
