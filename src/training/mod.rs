//! Training pipeline
//!
//! `train(table, config)` turns a dataset into a [`ModelRecord`]:
//!
//! 1. **Select**: numeric columns in column order; the last one is the
//!    target, the rest are features. Callers wanting another target reorder
//!    columns first. Fewer than two numeric columns fails with
//!    [`Error::InsufficientFeatures`].
//! 2. **Clean**: rows without a target value are dropped
//!    ([`Error::EmptyTrainingSet`] if fewer than two remain). Missing feature
//!    cells are filled with the training-partition mean of their column.
//! 3. **Split**: seeded 80/20 partition ([`split`]).
//! 4. **Fit**: the configured [`Regressor`] (a seeded random forest by
//!    default). Any failure becomes [`Error::TrainingFailed`].
//! 5. **Evaluate**: R², RMSE and MAE on the held-out rows.
//!
//! The pipeline never touches the registry; the caller registers the record.
//!
//! Jidoka: same table + same config ⇒ bit-identical metrics.

pub mod forest;
pub mod split;
pub mod worker;

use crate::config::TrainingConfig;
use crate::model::{Metrics, ModelRecord};
use crate::table::TableHandle;
use crate::{Error, Result};
use forest::{FeatureMatrix, RandomForestRegressor, Regressor};
use split::train_test_split;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Column roles chosen by the ordinal convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSelection {
    /// All numeric columns except the last
    pub features: Vec<String>,
    /// Last numeric column
    pub target: String,
}

/// Pick features and target from a table's numeric columns.
///
/// # Errors
///
/// Returns [`Error::InsufficientFeatures`] with fewer than 2 numeric columns
pub fn select_columns(table: &TableHandle) -> Result<ColumnSelection> {
    let numeric = table.numeric_columns();
    match numeric.split_last() {
        Some((target, features)) if !features.is_empty() => Ok(ColumnSelection {
            features: features.iter().map(|s| (*s).to_string()).collect(),
            target: (*target).to_string(),
        }),
        _ => Err(Error::InsufficientFeatures {
            found: numeric.len(),
        }),
    }
}

/// Train with the default random forest.
///
/// # Errors
///
/// See [`TrainingPipeline::train`]
pub fn train(table: &TableHandle, config: &TrainingConfig) -> Result<ModelRecord> {
    TrainingPipeline::new(config.clone()).train(table)
}

/// Stateless train/evaluate procedure bound to a configuration.
pub struct TrainingPipeline {
    config: TrainingConfig,
    regressor: Arc<dyn Regressor>,
}

impl TrainingPipeline {
    /// Pipeline with a random forest built from `config`.
    #[must_use]
    pub fn new(config: TrainingConfig) -> Self {
        let regressor = RandomForestRegressor::new(config.n_estimators, config.seed)
            .max_depth(config.max_depth)
            .min_samples_split(config.min_samples_split);
        Self {
            config,
            regressor: Arc::new(regressor),
        }
    }

    /// Pipeline with a caller-supplied regression capability.
    #[must_use]
    pub fn with_regressor(config: TrainingConfig, regressor: Arc<dyn Regressor>) -> Self {
        Self { config, regressor }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Select, clean, split, fit and evaluate.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the configuration is out of range
    /// - [`Error::InsufficientFeatures`] with fewer than 2 numeric columns
    /// - [`Error::EmptyTrainingSet`] with fewer than 2 rows that have a target
    /// - [`Error::TrainingFailed`] if fitting or prediction fails
    pub fn train(&self, table: &TableHandle) -> Result<ModelRecord> {
        self.config.validate()?;
        let selection = select_columns(table)?;
        info!(
            dataset = table.name(),
            target = %selection.target,
            features = selection.features.len(),
            "training started"
        );

        let target_values = table.numeric_values(&selection.target)?;
        let feature_values = selection
            .features
            .iter()
            .map(|name| table.numeric_values(name))
            .collect::<Result<Vec<_>>>()?;

        // Rows that have a target; everything below indexes into this list.
        let usable: Vec<usize> = target_values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|_| i))
            .collect();
        if usable.len() < 2 {
            return Err(Error::EmptyTrainingSet);
        }
        debug!(
            dropped = table.num_rows() - usable.len(),
            "rows without target dropped"
        );

        let split = train_test_split(usable.len(), self.config.test_fraction, self.config.seed);
        let train_rows: Vec<usize> = split.train.iter().map(|&i| usable[i]).collect();
        let test_rows: Vec<usize> = split.test.iter().map(|&i| usable[i]).collect();
        let fill = column_means(&feature_values, &train_rows);

        let x_train = build_matrix(&feature_values, &train_rows, &fill)?;
        let x_test = build_matrix(&feature_values, &test_rows, &fill)?;
        let y_train: Vec<f64> = train_rows.iter().filter_map(|&r| target_values[r]).collect();
        let y_test: Vec<f64> = test_rows.iter().filter_map(|&r| target_values[r]).collect();

        let started = Instant::now();
        let estimator = self.regressor.fit(&x_train, &y_train).map_err(into_training_failed)?;
        let predicted = estimator.predict(&x_test).map_err(into_training_failed)?;
        let metrics = Metrics::evaluate(&y_test, &predicted);
        let elapsed = started.elapsed().as_secs_f64();

        info!(
            dataset = table.name(),
            accuracy = metrics.accuracy(),
            error = metrics.error(),
            cost = metrics.cost(),
            seconds = elapsed,
            "training finished"
        );

        Ok(ModelRecord::builder(
            table.name(),
            selection.target,
            selection.features,
            metrics,
        )
        .training_duration_secs(elapsed)
        .params(self.config.clone())
        .estimator(estimator)
        .build())
    }
}

fn into_training_failed(e: Error) -> Error {
    match e {
        Error::TrainingFailed(_) => e,
        other => Error::TrainingFailed(other.to_string()),
    }
}

/// Per-column mean over `rows`, ignoring missing cells (0 if all missing).
#[allow(clippy::cast_precision_loss)]
fn column_means(columns: &[Vec<Option<f64>>], rows: &[usize]) -> Vec<f64> {
    columns
        .iter()
        .map(|col| {
            let (sum, count) = rows
                .iter()
                .filter_map(|&r| col[r])
                .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
            if count == 0 {
                0.0
            } else {
                sum / count as f64
            }
        })
        .collect()
}

fn build_matrix(columns: &[Vec<Option<f64>>], rows: &[usize], fill: &[f64]) -> Result<FeatureMatrix> {
    let data: Vec<Vec<f64>> = rows
        .iter()
        .map(|&r| {
            columns
                .iter()
                .zip(fill)
                .map(|(col, &mean)| col[r].unwrap_or(mean))
                .collect()
        })
        .collect();
    FeatureMatrix::from_rows(&data)
}
