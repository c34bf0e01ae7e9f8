//! Trained model records
//!
//! ## Schema Overview
//!
//! ```text
//! ModelRecord ──> Metrics ──> Tier (computed on demand)
//!      │
//!      └──> source dataset (by name only, may no longer exist)
//! ```
//!
//! A record keeps the name of the dataset it was trained on, never a live
//! reference. Removing the dataset leaves the record intact; resolving the
//! name against the registry may then return nothing.

mod metrics;
pub mod tier;

pub use metrics::Metrics;
pub use tier::{classify, Tier};

use crate::config::TrainingConfig;
use crate::training::forest::Predictor;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Algorithm label written on every record produced by the pipeline
pub const RANDOM_FOREST_LABEL: &str = "RandomForest";

/// Summary stored in place of an estimator that is not retained
pub const UNSERIALIZABLE_SUMMARY: &str = "estimator not serializable";

/// Metadata and evaluation results for one trained regressor.
///
/// Immutable after creation except for the `active` flag, which the
/// registry updates copy-on-write.
#[derive(Debug, Clone)]
pub struct ModelRecord {
    name: String,
    source_dataset: String,
    target_column: String,
    feature_columns: Vec<String>,
    metrics: Metrics,
    algorithm_label: String,
    created_at: DateTime<Utc>,
    training_duration_secs: f64,
    params: TrainingConfig,
    active: bool,
    estimator: Option<Arc<dyn Predictor>>,
}

impl ModelRecord {
    /// Start a record; only the training pipeline creates these.
    pub(crate) fn builder(
        source_dataset: impl Into<String>,
        target_column: impl Into<String>,
        feature_columns: Vec<String>,
        metrics: Metrics,
    ) -> ModelRecordBuilder {
        ModelRecordBuilder::new(source_dataset, target_column, feature_columns, metrics)
    }

    /// Registry key.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the dataset the model was trained on.
    #[must_use]
    pub fn source_dataset(&self) -> &str {
        &self.source_dataset
    }

    /// Predicted column.
    #[must_use]
    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    /// Input columns, in column order.
    #[must_use]
    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    /// Held-out evaluation.
    #[must_use]
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Tier of the current metrics (recomputed on each call).
    #[must_use]
    pub fn tier(&self) -> Tier {
        classify(&self.metrics)
    }

    /// Algorithm label, e.g. `RandomForest`.
    #[must_use]
    pub fn algorithm_label(&self) -> &str {
        &self.algorithm_label
    }

    /// Creation time.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Wall-clock seconds spent fitting and evaluating.
    #[must_use]
    pub const fn training_duration_secs(&self) -> f64 {
        self.training_duration_secs
    }

    /// Parameters the model was trained with.
    #[must_use]
    pub const fn params(&self) -> &TrainingConfig {
        &self.params
    }

    /// Whether the model is marked active.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Fitted estimator, if retained in memory.
    #[must_use]
    pub fn estimator(&self) -> Option<&Arc<dyn Predictor>> {
        self.estimator.as_ref()
    }

    /// Human-readable estimator description used in persisted documents.
    #[must_use]
    pub fn summary(&self) -> String {
        self.estimator
            .as_ref()
            .map_or_else(|| UNSERIALIZABLE_SUMMARY.to_string(), |e| e.summary())
    }

    pub(crate) fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub(crate) fn with_active(&self, active: bool) -> Self {
        Self {
            active,
            ..self.clone()
        }
    }
}

/// Builder for [`ModelRecord`].
#[derive(Debug)]
pub(crate) struct ModelRecordBuilder {
    record: ModelRecord,
}

impl ModelRecordBuilder {
    fn new(
        source_dataset: impl Into<String>,
        target_column: impl Into<String>,
        feature_columns: Vec<String>,
        metrics: Metrics,
    ) -> Self {
        let source_dataset = source_dataset.into();
        Self {
            record: ModelRecord {
                name: format!("Model_{source_dataset}"),
                source_dataset,
                target_column: target_column.into(),
                feature_columns,
                metrics,
                algorithm_label: RANDOM_FOREST_LABEL.to_string(),
                created_at: Utc::now(),
                training_duration_secs: 0.0,
                params: TrainingConfig::default(),
                active: true,
                estimator: None,
            },
        }
    }

    pub(crate) fn training_duration_secs(mut self, secs: f64) -> Self {
        self.record.training_duration_secs = secs;
        self
    }

    pub(crate) fn params(mut self, params: TrainingConfig) -> Self {
        self.record.params = params;
        self
    }

    pub(crate) fn estimator(mut self, estimator: Arc<dyn Predictor>) -> Self {
        self.record.estimator = Some(estimator);
        self
    }

    pub(crate) fn build(self) -> ModelRecord {
        self.record
    }
}

/// One bar of a model comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonEntry {
    /// Model name
    pub name: String,
    /// Held-out R²
    pub accuracy: f64,
    /// Tier of `accuracy`
    pub tier: Tier,
}

/// Default number of models shown side by side
pub const DEFAULT_COMPARISON_LIMIT: usize = 6;

/// Side-by-side accuracy of up to `limit` models, in registry order.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] with fewer than two models
pub fn compare_models(models: &[Arc<ModelRecord>], limit: usize) -> Result<Vec<ComparisonEntry>> {
    if models.len() < 2 {
        return Err(Error::InvalidInput(format!(
            "comparison needs at least 2 models, registry has {}",
            models.len()
        )));
    }
    Ok(models
        .iter()
        .take(limit)
        .map(|m| ComparisonEntry {
            name: m.name().to_string(),
            accuracy: m.metrics().accuracy(),
            tier: m.tier(),
        })
        .collect())
}


#[cfg(test)]
mod tests {
    use super::test_support::record;
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let r = record("Ores", 0.9);
        assert_eq!(r.name(), "Model_Ores");
        assert_eq!(r.source_dataset(), "Ores");
        assert_eq!(r.algorithm_label(), RANDOM_FOREST_LABEL);
        assert!(r.is_active());
        assert!(r.estimator().is_none());
        assert_eq!(r.summary(), UNSERIALIZABLE_SUMMARY);
        assert_eq!(r.tier(), Tier::Elite);
    }

    #[test]
    fn test_with_active_copies() {
        let r = record("Ores", 0.7);
        let inactive = r.with_active(false);
        assert!(r.is_active());
        assert!(!inactive.is_active());
        assert_eq!(inactive.metrics(), r.metrics());
    }

    #[test]
    fn test_compare_requires_two() {
        let one = vec![Arc::new(record("a", 0.5))];
        assert!(compare_models(&one, DEFAULT_COMPARISON_LIMIT).is_err());
    }

    #[test]
    fn test_compare_limits_and_orders() {
        let models: Vec<_> = (0..8)
            .map(|i| Arc::new(record(&format!("d{i}"), f64::from(i) / 10.0).with_name(format!("m{i}"))))
            .collect();
        let entries = compare_models(&models, DEFAULT_COMPARISON_LIMIT).unwrap();
        assert_eq!(entries.len(), 6);
        assert_eq!(entries[0].name, "m0");
        assert_eq!(entries[5].name, "m5");
        assert_eq!(entries[5].tier, Tier::Weak);
    }
}
