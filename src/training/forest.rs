//! Regression capability: bagged regression-tree ensemble
//!
//! The pipeline only sees the [`Regressor`] / [`Predictor`] seam. The
//! bundled implementation is a random forest:
//!
//! - each estimator is a CART regression tree (variance-reduction splits)
//!   grown on a bootstrap sample of the training rows
//! - estimator `i` draws its bootstrap from `StdRng::seed_from_u64(seed + i)`
//! - trees are fitted in parallel with rayon and collected in index order,
//!   so predictions (the mean over trees, summed in order) are
//!   bit-reproducible for a given seed regardless of thread scheduling

use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::fmt;
use std::sync::Arc;

/// Row-major feature matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl FeatureMatrix {
    /// Build from row vectors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if rows have different lengths
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(Error::InvalidInput(format!(
                    "row {i} has {} values, expected {cols}",
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// Row count.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Column count.
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// One row.
    #[must_use]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    #[inline]
    fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }
}

/// A fitted model that maps feature rows to predictions.
pub trait Predictor: fmt::Debug + Send + Sync {
    /// Predict one value per row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] on a column-count mismatch
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>>;

    /// Human-readable description stored in persisted model documents.
    fn summary(&self) -> String;
}

/// Something that can be fitted to a feature matrix and target vector.
pub trait Regressor: Send + Sync {
    /// Fit and return the predictor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TrainingFailed`] if the data cannot be fitted
    fn fit(&self, features: &FeatureMatrix, target: &[f64]) -> Result<Arc<dyn Predictor>>;
}

/// Random forest hyper-parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomForestRegressor {
    n_estimators: usize,
    seed: u64,
    max_depth: Option<usize>,
    min_samples_split: usize,
}

impl RandomForestRegressor {
    /// Create an ensemble of `n_estimators` trees seeded from `seed`.
    #[must_use]
    pub const fn new(n_estimators: usize, seed: u64) -> Self {
        Self {
            n_estimators,
            seed,
            max_depth: None,
            min_samples_split: 2,
        }
    }

    /// Limit tree depth.
    #[must_use]
    pub const fn max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Minimum rows in a node before it may split (at least 2).
    #[must_use]
    pub const fn min_samples_split(mut self, n: usize) -> Self {
        self.min_samples_split = if n < 2 { 2 } else { n };
        self
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&self, features: &FeatureMatrix, target: &[f64]) -> Result<Arc<dyn Predictor>> {
        if self.n_estimators == 0 {
            return Err(Error::TrainingFailed(
                "ensemble needs at least one estimator".to_string(),
            ));
        }
        if features.rows() == 0 || features.cols() == 0 {
            return Err(Error::TrainingFailed(format!(
                "cannot fit a {}x{} feature matrix",
                features.rows(),
                features.cols()
            )));
        }
        if features.rows() != target.len() {
            return Err(Error::TrainingFailed(format!(
                "{} feature rows but {} target values",
                features.rows(),
                target.len()
            )));
        }
        if let Some(bad) = features
            .data
            .iter()
            .chain(target)
            .find(|v| !v.is_finite())
        {
            return Err(Error::TrainingFailed(format!(
                "non-finite value {bad} in training data"
            )));
        }

        let trees: Vec<RegressionTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(i as u64));
                let n = features.rows();
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::grow(features, target, sample, self.max_depth, self.min_samples_split)
            })
            .collect();

        Ok(Arc::new(FittedForest {
            trees,
            n_features: features.cols(),
            params: *self,
        }))
    }
}

/// Ensemble of fitted trees; predicts the mean of its members.
#[derive(Debug)]
pub struct FittedForest {
    trees: Vec<RegressionTree>,
    n_features: usize,
    params: RandomForestRegressor,
}

impl FittedForest {
    /// Number of trees.
    #[must_use]
    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }
}

impl Predictor for FittedForest {
    #[allow(clippy::cast_precision_loss)]
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
        if features.cols() != self.n_features {
            return Err(Error::InvalidInput(format!(
                "model expects {} features, got {}",
                self.n_features,
                features.cols()
            )));
        }
        let count = self.trees.len() as f64;
        Ok((0..features.rows())
            .map(|r| {
                let row = features.row(r);
                self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / count
            })
            .collect())
    }

    fn summary(&self) -> String {
        let nodes: usize = self.trees.iter().map(|t| t.nodes.len()).sum();
        let depth = self
            .params
            .max_depth
            .map_or_else(|| "None".to_string(), |d| d.to_string());
        format!(
            "RandomForestRegressor(n_estimators={}, random_state={}, max_depth={depth}, \
             min_samples_split={}, n_features_in={}, total_nodes={nodes})",
            self.trees.len(),
            self.params.seed,
            self.params.min_samples_split,
            self.n_features,
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Arena-allocated CART regression tree.
#[derive(Debug)]
struct RegressionTree {
    nodes: Vec<Node>,
}

struct Candidate {
    feature: usize,
    threshold: f64,
    score: f64,
}

impl RegressionTree {
    fn grow(
        x: &FeatureMatrix,
        y: &[f64],
        sample: Vec<usize>,
        max_depth: Option<usize>,
        min_samples_split: usize,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        // (node slot, rows, depth); slot 0 is the root
        tree.nodes.push(Node::Leaf { value: 0.0 });
        let mut stack = vec![(0usize, sample, 0usize)];

        while let Some((slot, rows, depth)) = stack.pop() {
            let mean = mean_of(y, &rows);
            let can_split = rows.len() >= min_samples_split
                && max_depth.map_or(true, |d| depth < d)
                && !is_constant(y, &rows);
            let best = if can_split { best_split(x, y, &rows) } else { None };

            match best {
                Some(Candidate {
                    feature, threshold, ..
                }) => {
                    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
                        rows.iter().partition(|&&r| x.get(r, feature) <= threshold);
                    let left = tree.nodes.len();
                    tree.nodes.push(Node::Leaf { value: 0.0 });
                    let right = tree.nodes.len();
                    tree.nodes.push(Node::Leaf { value: 0.0 });
                    tree.nodes[slot] = Node::Split {
                        feature,
                        threshold,
                        left,
                        right,
                    };
                    stack.push((right, right_rows, depth + 1));
                    stack.push((left, left_rows, depth + 1));
                }
                None => tree.nodes[slot] = Node::Leaf { value: mean },
            }
        }
        tree
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => idx = if row[feature] <= threshold { left } else { right },
            }
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean_of(y: &[f64], rows: &[usize]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    rows.iter().map(|&r| y[r]).sum::<f64>() / rows.len() as f64
}

fn is_constant(y: &[f64], rows: &[usize]) -> bool {
    rows.first()
        .map_or(true, |&first| rows.iter().all(|&r| y[r] == y[first]))
}

/// Best variance-reduction split over all features.
///
/// Maximizes `sum_l²/n_l + sum_r²/n_r`, which is equivalent to minimizing
/// the children's summed squared error. Ties keep the earliest candidate.
#[allow(clippy::cast_precision_loss)]
fn best_split(x: &FeatureMatrix, y: &[f64], rows: &[usize]) -> Option<Candidate> {
    let n = rows.len();
    let total: f64 = rows.iter().map(|&r| y[r]).sum();
    let parent_score = total * total / n as f64;
    let mut best: Option<Candidate> = None;
    let mut order = rows.to_vec();

    for feature in 0..x.cols() {
        order.sort_by(|&a, &b| x.get(a, feature).total_cmp(&x.get(b, feature)));
        let mut left_sum = 0.0;
        for i in 0..n - 1 {
            left_sum += y[order[i]];
            let here = x.get(order[i], feature);
            let next = x.get(order[i + 1], feature);
            if here == next {
                continue;
            }
            let n_left = (i + 1) as f64;
            let n_right = (n - i - 1) as f64;
            let right_sum = total - left_sum;
            let score = left_sum * left_sum / n_left + right_sum * right_sum / n_right;
            if score > parent_score + 1e-12 && best.as_ref().map_or(true, |b| score > b.score) {
                let mut threshold = here + (next - here) / 2.0;
                // midpoint can round up to `next` for adjacent floats
                if threshold >= next {
                    threshold = here;
                }
                best = Some(Candidate {
                    feature,
                    threshold,
                    score,
                });
            }
        }
    }
    best
}
