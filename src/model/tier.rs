//! Qualitative accuracy tiers
//!
//! Tiers are never stored on a record; they are recomputed from the metrics
//! wherever they are shown or exported.

use super::Metrics;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lower bound (exclusive) of the Elite tier
pub const ELITE_THRESHOLD: f64 = 0.8;

/// Lower bound (exclusive) of the Strong tier
pub const STRONG_THRESHOLD: f64 = 0.6;

/// Accuracy bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    /// accuracy <= 0.6 (also NaN)
    Weak,
    /// 0.6 < accuracy <= 0.8
    Strong,
    /// accuracy > 0.8
    Elite,
}

impl Tier {
    /// Bucket a raw accuracy value.
    #[must_use]
    pub fn from_accuracy(accuracy: f64) -> Self {
        if accuracy > ELITE_THRESHOLD {
            Self::Elite
        } else if accuracy > STRONG_THRESHOLD {
            Self::Strong
        } else {
            Self::Weak
        }
    }

    /// Display label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Elite => "Elite",
            Self::Strong => "Strong",
            Self::Weak => "Weak",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a metrics triple by its accuracy.
#[must_use]
pub fn classify(metrics: &Metrics) -> Tier {
    Tier::from_accuracy(metrics.accuracy())
}
