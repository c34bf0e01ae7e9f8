//! Held-out evaluation metrics

use serde::{Deserialize, Serialize};

/// Accuracy / error / cost triple computed once at training time.
///
/// - `accuracy`: coefficient of determination (R²). Usually in `0..=1`, but a
///   fit worse than predicting the mean goes negative and is kept as is.
/// - `error`: root-mean-squared error, in target units.
/// - `cost`: mean absolute error, in target units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    accuracy: f64,
    error: f64,
    cost: f64,
}

impl Metrics {
    /// Create a metrics triple.
    #[must_use]
    pub const fn new(accuracy: f64, error: f64, cost: f64) -> Self {
        Self {
            accuracy,
            error,
            cost,
        }
    }

    /// Compare predictions against held-out truth.
    ///
    /// Slices must have equal, non-zero length; callers guarantee this.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn evaluate(truth: &[f64], predicted: &[f64]) -> Self {
        debug_assert_eq!(truth.len(), predicted.len());
        let n = truth.len().min(predicted.len());
        if n == 0 {
            return Self::new(f64::NAN, f64::NAN, f64::NAN);
        }
        let truth = &truth[..n];
        let predicted = &predicted[..n];
        let count = n as f64;

        let mean = truth.iter().sum::<f64>() / count;
        let mut ss_res = 0.0;
        let mut ss_tot = 0.0;
        let mut abs_sum = 0.0;
        for (t, p) in truth.iter().zip(predicted) {
            let residual = t - p;
            ss_res += residual * residual;
            ss_tot += (t - mean) * (t - mean);
            abs_sum += residual.abs();
        }

        Self {
            accuracy: r_squared(ss_res, ss_tot),
            error: (ss_res / count).sqrt(),
            cost: abs_sum / count,
        }
    }

    /// Coefficient of determination.
    #[must_use]
    pub const fn accuracy(&self) -> f64 {
        self.accuracy
    }

    /// Root-mean-squared error.
    #[must_use]
    pub const fn error(&self) -> f64 {
        self.error
    }

    /// Mean absolute error.
    #[must_use]
    pub const fn cost(&self) -> f64 {
        self.cost
    }
}

/// Constant truth has no variance to explain: a perfect fit scores 1, anything else 0.
fn r_squared(ss_res: f64, ss_tot: f64) -> f64 {
    if ss_tot == 0.0 {
        if ss_res == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - ss_res / ss_tot
    }
}
