//! Typed errors for the transport layer and easing name parsing
//!
//! Application-level code wraps these in `anyhow` with context.

use thiserror::Error;

/// Errors raised while talking to the console
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to encode OSC packet for {address}: {reason}")]
    Encode { address: String, reason: String },

    #[error("failed to decode OSC datagram ({len} bytes): {reason}")]
    Decode { len: usize, reason: String },

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}

/// Unknown easing name in a fade request
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EasingParseError {
    #[error("unknown easing algorithm '{0}'")]
    Algorithm(String),

    #[error("unknown easing curve '{0}'")]
    Curve(String),
}
