//! Console parameter type definitions
//!
//! Defines the core types for representing console addresses, typed values
//! and the entries held by the [`StateStore`](super::StateStore).

use std::borrow::Borrow;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tokio::time::Instant;

/// Hierarchical path identifying one console parameter (e.g. `/ch/01/mix/fader`)
///
/// Cheap to clone: the path is shared behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(Arc<str>);

impl Address {
    /// Create an address from any string-like path
    pub fn new(path: impl AsRef<str>) -> Self {
        Self(Arc::from(path.as_ref()))
    }

    /// Borrow the path
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for Address {
    fn from(path: String) -> Self {
        Self(Arc::from(path))
    }
}

impl Borrow<str> for Address {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Parameter value as tagged by the console
///
/// Booleans travel as `Int(0)` / `Int(1)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 32-bit integer argument
    Int(i32),
    /// 32-bit float argument (faders, sends, etc.)
    Float(f32),
    /// String argument (names, labels)
    Text(String),
}

impl Value {
    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(f64::from(*i)),
            Value::Float(f) => Some(f64::from(*f)),
            Value::Text(_) => None,
        }
    }

    /// Extract the string payload if available
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret the value as a boolean switch (non-zero is on)
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Int(i) => Some(*i != 0),
            Value::Float(f) => Some(*f != 0.0),
            Value::Text(_) => None,
        }
    }

    /// Short type tag, used in logs and sniffer output
    pub fn type_tag(&self) -> char {
        match self {
            Value::Int(_) => 'i',
            Value::Float(_) => 'f',
            Value::Text(_) => 's',
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{:.4}", v),
            Value::Text(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Int(i32::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

/// Parse a literal typed on the command line
///
/// Integers become `Int`, other numbers `Float`, anything else `Text`.
impl FromStr for Value {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(i) = s.parse::<i32>() {
            return Ok(Value::Int(i));
        }
        if let Ok(f) = s.parse::<f32>() {
            return Ok(Value::Float(f));
        }
        Ok(Value::Text(s.to_string()))
    }
}

/// Last-known value of one address, stored in the StateStore
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub address: Address,
    pub value: Value,
    /// When the value was last applied from an inbound message
    pub last_updated: Instant,
}
