//! TransitionEngine - interpolated parameter fades
//!
//! The console only accepts absolute values, so a fade is precomputed as a
//! list of absolute steps and one step per address is sent on every shared
//! tick. Starting a fade on an address replaces whatever was scheduled for
//! it; that replacement is the only cancellation mechanism.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::time::Instant;

use crate::easing::{ease, Algorithm, Curve};
use crate::state::{Address, Value};

/// A fade request as received from the automation host
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRequest {
    pub address: Address,
    /// Starting value; `None` falls back to the mirrored value
    pub from: Option<Value>,
    pub to: Value,
    pub duration: Duration,
    pub algorithm: Algorithm,
    pub curve: Curve,
}

impl TransitionRequest {
    pub fn new(address: impl Into<Address>, to: Value, duration: Duration) -> Self {
        Self {
            address: address.into(),
            from: None,
            to,
            duration,
            algorithm: Algorithm::Linear,
            curve: Curve::EaseInOut,
        }
    }

    pub fn from_value(mut self, from: Value) -> Self {
        self.from = Some(from);
        self
    }

    pub fn easing(mut self, algorithm: Algorithm, curve: Curve) -> Self {
        self.algorithm = algorithm;
        self.curve = curve;
        self
    }
}

/// What the engine decided to do with a request
#[derive(Debug, Clone, PartialEq)]
pub enum FadePlan {
    /// Send this value now; nothing is scheduled
    Snap(Value),
    /// Steps were scheduled and will be emitted on the next ticks
    Scheduled { steps: usize },
}

pub struct TransitionEngine {
    tick: Duration,
    active: HashMap<Address, VecDeque<Value>>,
    next_tick: Option<Instant>,
}

impl TransitionEngine {
    pub fn new(tick: Duration) -> Self {
        Self {
            tick: tick.max(Duration::from_millis(1)),
            active: HashMap::new(),
            next_tick: None,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick
    }

    /// Plan a fade, superseding any fade already running on the address
    ///
    /// `from` must already be resolved against the store by the caller.
    pub fn start(&mut self, request: TransitionRequest, now: Instant) -> FadePlan {
        let steps = request.from.as_ref().and_then(|from| {
            compute_steps(
                from,
                &request.to,
                request.duration,
                self.tick,
                request.algorithm,
                request.curve,
            )
        });

        match steps {
            Some(steps) => {
                let count = steps.len();
                self.active.insert(request.address, steps.into());
                if self.next_tick.is_none() {
                    self.next_tick = Some(now + self.tick);
                }
                FadePlan::Scheduled { steps: count }
            }
            None => {
                self.cancel(request.address.as_str());
                FadePlan::Snap(request.to)
            }
        }
    }

    /// Drop the fade running on `address`, if any
    pub fn cancel(&mut self, address: &str) -> bool {
        let removed = self.active.remove(address).is_some();
        if self.active.is_empty() {
            self.next_tick = None;
        }
        removed
    }

    /// Due time of the shared tick; `None` while nothing is fading
    pub fn next_tick(&self) -> Option<Instant> {
        self.next_tick
    }

    /// Pop one step from every active fade
    pub fn tick(&mut self, now: Instant) -> Vec<(Address, Value)> {
        let mut out = Vec::with_capacity(self.active.len());
        self.active.retain(|address, steps| {
            if let Some(value) = steps.pop_front() {
                out.push((address.clone(), value));
            }
            !steps.is_empty()
        });

        self.next_tick = if self.active.is_empty() {
            None
        } else {
            let scheduled = self.next_tick.unwrap_or(now) + self.tick;
            Some(if scheduled > now { scheduled } else { now + self.tick })
        };
        out
    }

    pub fn is_active(&self, address: &str) -> bool {
        self.active.contains_key(address)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Cancel every fade
    pub fn clear(&mut self) {
        self.active.clear();
        self.next_tick = None;
    }
}

/// Absolute values for each tick of a fade, ending exactly on `to`
///
/// Returns `None` when the fade should snap instead: a non-numeric endpoint,
/// or fewer than two ticks in `duration`.
pub fn compute_steps(
    from: &Value,
    to: &Value,
    duration: Duration,
    tick: Duration,
    algorithm: Algorithm,
    curve: Curve,
) -> Option<Vec<Value>> {
    let start = from.as_f64()?;
    let end = to.as_f64()?;

    let tick_ns = tick.as_nanos().max(1);
    let count = duration.as_nanos().div_ceil(tick_ns);
    if count < 2 {
        return None;
    }
    let count = usize::try_from(count).ok()?;

    let steps = (1..=count)
        .map(|i| {
            if i == count {
                return to.clone();
            }
            let fraction = ease(algorithm, curve, i as f64 / count as f64);
            let value = start + (end - start) * fraction;
            match to {
                Value::Int(_) => Value::Int(value.round() as i32),
                _ => Value::Float(value as f32),
            }
        })
        .collect();
    Some(steps)
}
