//! Confidence normalization
//!
//! The vision model is asked for a percentage but answers on whatever scale it
//! likes: fractions (`0.85`), percentages (`85`), basis points (`8500`) or
//! nonsense. Everything is mapped onto a [`Confidence`], an integer
//! percentage that can only hold values in `[10, 100]`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Integer confidence percentage, always within `[10, 100]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub struct Confidence(u8);

impl Confidence {
    /// Lowest representable confidence. A verdict is never paired with zero.
    pub const MIN: Confidence = Confidence(10);

    /// Highest representable confidence
    pub const MAX: Confidence = Confidence(100);

    /// Build a confidence from a whole percentage, clamping into range
    pub fn from_percent(percent: u8) -> Self {
        Self(percent.clamp(Self::MIN.0, Self::MAX.0))
    }

    /// The percentage value
    pub fn percent(self) -> u8 {
        self.0
    }

    /// The value on a 0-1 scale
    pub fn as_fraction(self) -> f32 {
        f32::from(self.0) / 100.0
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Self::MIN
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl From<Confidence> for u8 {
    fn from(value: Confidence) -> Self {
        value.0
    }
}

impl TryFrom<u8> for Confidence {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (Self::MIN.0..=Self::MAX.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(format!("confidence {} outside [10, 100]", value))
        }
    }
}

/// Normalize an untyped confidence value from a model reply.
///
/// Only JSON numbers are considered numeric. Anything else, including a
/// missing value, yields [`Confidence::MIN`].
pub fn normalize_confidence(value: Option<&Value>) -> Confidence {
    match value.and_then(Value::as_f64) {
        Some(score) => normalize_score(score),
        None => Confidence::MIN,
    }
}

/// Normalize a numeric confidence of unknown scale.
///
/// Applied in order:
/// - NaN → 10
/// - `>= 1000` → divided by 100, capped at 100
/// - `(0, 1]` → multiplied by 100
/// - `(100, 1000)` → 100
/// - otherwise → rounded
///
/// The outcome of every branch is clamped to `[10, 100]`.
pub fn normalize_score(score: f64) -> Confidence {
    if score.is_nan() {
        return Confidence::MIN;
    }

    let percent = if score >= 1000.0 {
        (score / 100.0).round().min(100.0)
    } else if score > 0.0 && score <= 1.0 {
        (score * 100.0).round()
    } else if score > 100.0 {
        100.0
    } else {
        score.round()
    };

    Confidence(percent.clamp(10.0, 100.0) as u8)
}
