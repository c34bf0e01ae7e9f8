//! Integration tests for the training pipeline and registry contract
//!
//! Covers:
//! 1. Ordinal column selection and end-to-end metrics
//! 2. Reproducibility (same table + same config = same metrics)
//! 3. Precondition failures leave the registry untouched
//! 4. Name collision and no-cascade removal semantics
//!
//! Toyota Way: Jidoka (Built-in Quality)

use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datamine::config::TrainingConfig;
use datamine::model::{classify, Tier};
use datamine::table::samples::{golem_table, mining_table};
use datamine::{train, Error, Registry, TableHandle, TrainingPipeline};
use std::sync::Arc;

fn config(n_estimators: usize) -> TrainingConfig {
    TrainingConfig {
        n_estimators,
        ..TrainingConfig::default()
    }
}

/// `[a, b, c]` numeric, 100 rows, `c = 2a - b + 5`
#[allow(clippy::cast_precision_loss)]
fn abc_table() -> TableHandle {
    let schema = Schema::new(vec![
        Field::new("a", DataType::Float64, false),
        Field::new("b", DataType::Float64, false),
        Field::new("c", DataType::Float64, false),
    ]);
    let a: Vec<f64> = (0..100).map(|i| f64::from(i % 23)).collect();
    let b: Vec<f64> = (0..100).map(|i| f64::from((i * 13) % 19)).collect();
    let c: Vec<f64> = a.iter().zip(&b).map(|(a, b)| 2.0 * a - b + 5.0).collect();
    let batch = RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(Float64Array::from(a)),
            Arc::new(Float64Array::from(b)),
            Arc::new(Float64Array::from(c)),
        ],
    )
    .unwrap();
    TableHandle::new("abc", batch)
}

// ============================================================================
// Pipeline
// ============================================================================

#[test]
fn test_end_to_end_abc() {
    let record = train(&abc_table(), &config(100)).unwrap();

    assert_eq!(record.feature_columns(), ["a", "b"]);
    assert_eq!(record.target_column(), "c");
    assert_eq!(record.algorithm_label(), "RandomForest");
    assert!(record.metrics().error() >= 0.0);
    assert!(record.metrics().cost() >= 0.0);
    assert!(
        record.metrics().cost() <= record.metrics().error() + 1e-12,
        "MAE never exceeds RMSE"
    );
    // A noise-free linear target is easy for the ensemble.
    assert!(record.metrics().accuracy() > 0.8, "{:?}", record.metrics());
    assert_eq!(record.tier(), Tier::Elite);
}

#[test]
fn test_training_is_reproducible() {
    let table = abc_table();
    let first = train(&table, &config(20)).unwrap();
    let second = train(&table, &config(20)).unwrap();
    assert_eq!(first.metrics(), second.metrics());
    assert_eq!(
        first.metrics().accuracy().to_bits(),
        second.metrics().accuracy().to_bits()
    );
}

#[test]
fn test_seed_changes_metrics() {
    let table = abc_table();
    let base = train(&table, &config(10)).unwrap();
    let other = TrainingPipeline::new(TrainingConfig {
        seed: 7,
        ..config(10)
    })
    .train(&table)
    .unwrap();
    assert_ne!(base.metrics(), other.metrics());
}

#[test]
fn test_mining_sample_target_is_value() {
    let record = train(&mining_table().unwrap(), &config(10)).unwrap();
    assert_eq!(record.feature_columns(), ["depth", "quantity"]);
    assert_eq!(record.target_column(), "value");
    assert_eq!(record.source_dataset(), "Mining 2026");
}

#[test]
fn test_golem_sample_trains() {
    let record = train(&golem_table().unwrap(), &config(5)).unwrap();
    assert_eq!(record.target_column(), "damage_taken");
    assert_eq!(record.feature_columns().len(), 4);
    assert!(record.metrics().error().is_finite());
}

#[test]
fn test_one_numeric_column_leaves_registry_unchanged() {
    let schema = Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, false),
    ]);
    let batch = RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 3, 4])),
            Arc::new(StringArray::from(vec!["a", "b", "c", "d"])),
        ],
    )
    .unwrap();
    let registry = Registry::new();
    registry
        .add_dataset("narrow", TableHandle::new("narrow", batch))
        .unwrap();

    let table = registry.dataset("narrow").unwrap();
    let err = train(&table, &config(5)).unwrap_err();
    assert!(matches!(err, Error::InsufficientFeatures { found: 1 }));
    assert!(err.is_recoverable());
    assert!(registry.snapshot().models.is_empty());
}

// ============================================================================
// Tiers
// ============================================================================

#[test]
fn test_tier_boundaries() {
    let expected = [
        (0.59, Tier::Weak),
        (0.6, Tier::Weak),
        (0.60001, Tier::Strong),
        (0.8, Tier::Strong),
        (0.80001, Tier::Elite),
    ];
    for (accuracy, tier) in expected {
        let metrics = datamine::Metrics::new(accuracy, 0.0, 0.0);
        assert_eq!(classify(&metrics), tier, "accuracy {accuracy}");
    }
}

// ============================================================================
// Registry
// ============================================================================

#[test]
fn test_duplicate_dataset_names_both_kept() {
    let registry = Registry::new();
    let ores = abc_table();
    let first = registry.add_dataset("X", ores.clone()).unwrap();
    let second = registry.add_dataset("X", mining_table().unwrap()).unwrap();

    assert_ne!(first, second);
    let kept = registry.dataset(&first).unwrap();
    assert_eq!(kept.num_rows(), ores.num_rows());
    assert_eq!(kept.batch(), ores.batch());
    assert_eq!(registry.dataset(&second).unwrap().num_rows(), 1000);
}

#[test]
fn test_remove_absent_model_is_harmless() {
    let registry = Registry::new();
    let record = train(&abc_table(), &config(5)).unwrap();
    registry.add_model("m", record).unwrap();

    assert!(matches!(
        registry.remove_model("ghost"),
        Err(Error::NotFound { .. })
    ));
    assert_eq!(registry.model_names(), vec!["m"]);
}

#[test]
fn test_dataset_removal_does_not_cascade() {
    let registry = Registry::new();
    registry.add_dataset("abc", abc_table()).unwrap();
    let record = train(&registry.dataset("abc").unwrap(), &config(5)).unwrap();
    let name = registry.add_model(&registry.next_model_name("abc"), record).unwrap();
    let before = registry.model(&name).unwrap();

    registry.remove_dataset("abc").unwrap();

    let after = registry.model(&name).unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(after.source_dataset(), "abc");
    assert!(registry.dataset(after.source_dataset()).is_none());
}
