//! Easing functions for parameter fades
//!
//! Maps elapsed fraction `k` in `[0, 1]` to value fraction. Every
//! algorithm returns 0 at `k = 0` and 1 at `k = 1` (within float error);
//! elastic and back overshoot in between.
//!
//! Algorithm and curve names parse with `FromStr` (`cubic`, `in-out`, ...);
//! the binary's `--easing`/`--curve` options go through it.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use crate::error::EasingParseError;

/// Shape of the easing function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Algorithm {
    #[default]
    Linear,
    Quadratic,
    Cubic,
    Quartic,
    Quintic,
    Sinusoidal,
    Exponential,
    Circular,
    Elastic,
    Back,
    Bounce,
}

/// Phase of the easing function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Curve {
    EaseIn,
    EaseOut,
    #[default]
    EaseInOut,
}

impl Algorithm {
    pub fn all() -> &'static [Algorithm] {
        &[
            Algorithm::Linear,
            Algorithm::Quadratic,
            Algorithm::Cubic,
            Algorithm::Quartic,
            Algorithm::Quintic,
            Algorithm::Sinusoidal,
            Algorithm::Exponential,
            Algorithm::Circular,
            Algorithm::Elastic,
            Algorithm::Back,
            Algorithm::Bounce,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Linear => "linear",
            Algorithm::Quadratic => "quadratic",
            Algorithm::Cubic => "cubic",
            Algorithm::Quartic => "quartic",
            Algorithm::Quintic => "quintic",
            Algorithm::Sinusoidal => "sinusoidal",
            Algorithm::Exponential => "exponential",
            Algorithm::Circular => "circular",
            Algorithm::Elastic => "elastic",
            Algorithm::Back => "back",
            Algorithm::Bounce => "bounce",
        }
    }
}

impl Curve {
    pub fn all() -> &'static [Curve] {
        &[Curve::EaseIn, Curve::EaseOut, Curve::EaseInOut]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Curve::EaseIn => "in",
            Curve::EaseOut => "out",
            Curve::EaseInOut => "in-out",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = EasingParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Algorithm::all()
            .iter()
            .copied()
            .find(|a| a.as_str() == lower)
            .ok_or_else(|| EasingParseError::Algorithm(s.to_string()))
    }
}

impl FromStr for Curve {
    type Err = EasingParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in" | "ease-in" => Ok(Curve::EaseIn),
            "out" | "ease-out" => Ok(Curve::EaseOut),
            "in-out" | "inout" | "ease-in-out" => Ok(Curve::EaseInOut),
            _ => Err(EasingParseError::Curve(s.to_string())),
        }
    }
}

/// Evaluate the easing function at `k` (clamped to `[0, 1]`)
pub fn ease(algorithm: Algorithm, curve: Curve, k: f64) -> f64 {
    let k = k.clamp(0.0, 1.0);
    match (algorithm, curve) {
        (Algorithm::Linear, _) => k,

        (_, Curve::EaseIn) => ease_in(algorithm, k),
        (_, Curve::EaseOut) => 1.0 - ease_in(algorithm, 1.0 - k),
        (_, Curve::EaseInOut) => {
            if k < 0.5 {
                0.5 * ease_in(algorithm, k * 2.0)
            } else {
                0.5 * (1.0 - ease_in(algorithm, 2.0 - k * 2.0)) + 0.5
            }
        }
    }
}

/// Ease-in shape of each algorithm; out and in-out are derived by reflection
fn ease_in(algorithm: Algorithm, k: f64) -> f64 {
    match algorithm {
        Algorithm::Linear => k,
        Algorithm::Quadratic => k.powi(2),
        Algorithm::Cubic => k.powi(3),
        Algorithm::Quartic => k.powi(4),
        Algorithm::Quintic => k.powi(5),
        Algorithm::Sinusoidal => 1.0 - (k * PI / 2.0).cos(),
        Algorithm::Exponential => {
            if k == 0.0 {
                0.0
            } else {
                1024f64.powf(k - 1.0)
            }
        }
        Algorithm::Circular => 1.0 - (1.0 - k * k).sqrt(),
        Algorithm::Elastic => {
            if k == 0.0 || k == 1.0 {
                k
            } else {
                -(2f64.powf(10.0 * (k - 1.0))) * ((k - 1.1) * 5.0 * PI).sin()
            }
        }
        Algorithm::Back => {
            const S: f64 = 1.701_58;
            k * k * ((S + 1.0) * k - S)
        }
        Algorithm::Bounce => 1.0 - bounce_out(1.0 - k),
    }
}

fn bounce_out(k: f64) -> f64 {
    const N: f64 = 7.5625;
    const D: f64 = 2.75;
    if k < 1.0 / D {
        N * k * k
    } else if k < 2.0 / D {
        let k = k - 1.5 / D;
        N * k * k + 0.75
    } else if k < 2.5 / D {
        let k = k - 2.25 / D;
        N * k * k + 0.9375
    } else {
        let k = k - 2.625 / D;
        N * k * k + 0.984_375
    }
}
