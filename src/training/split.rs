//! Deterministic train/test partition
//!
//! Row indices are shuffled with a seeded `StdRng` (Fisher-Yates via
//! `SliceRandom::shuffle`) and the first `ceil(test_fraction * n)` become the
//! held-out set. Same seed and row count, same partition.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Row indices of the two partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    /// Rows used for fitting
    pub train: Vec<usize>,
    /// Rows held out for evaluation
    pub test: Vec<usize>,
}

/// Held-out size for `n` rows, leaving at least one row on each side.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn test_size(n: usize, test_fraction: f64) -> usize {
    if n < 2 {
        return 0;
    }
    ((n as f64) * test_fraction).ceil().clamp(1.0, (n - 1) as f64) as usize
}

/// Partition `n` rows.
#[must_use]
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> TrainTestSplit {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = test_size(n, test_fraction);
    let train = indices.split_off(n_test);
    tracing::debug!(
        train = train.len(),
        test = indices.len(),
        seed,
        "train/test split"
    );
    TrainTestSplit {
        train,
        test: indices,
    }
}
