//! Training pipeline benchmarks
//!
//! Measures the full select/split/fit/evaluate path on the built-in sample
//! datasets, and the ensemble fit alone at a few sizes.
//!
//! Toyota Way: Genchi Genbutsu (measure, don't guess)
//!
//! Run with: cargo bench --bench training

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use datamine::config::TrainingConfig;
use datamine::table::samples::{golem_table, mining_table};
use datamine::training::forest::{FeatureMatrix, RandomForestRegressor, Regressor};
use datamine::training::TrainingPipeline;

/// Benchmark the pipeline on both sample datasets (quick ensemble)
fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_quick");
    group.sample_size(10);
    let pipeline = TrainingPipeline::new(TrainingConfig::quick());

    for table in [mining_table(), golem_table()].into_iter().flatten() {
        group.bench_with_input(
            BenchmarkId::new("train", table.name()),
            &table,
            |b, table| {
                b.iter(|| pipeline.train(black_box(table)));
            },
        );
    }

    group.finish();
}

/// Benchmark ensemble fitting as the ensemble grows
#[allow(clippy::cast_precision_loss)]
fn bench_forest_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("forest_fit");
    group.sample_size(10);

    let rows: Vec<Vec<f64>> = (0..2_000)
        .map(|i| vec![(i % 37) as f64, ((i * 7) % 101) as f64, (i % 5) as f64])
        .collect();
    let target: Vec<f64> = rows.iter().map(|r| 2.0 * r[0] - r[1] + 0.5 * r[2]).collect();
    let features = FeatureMatrix::from_rows(&rows).expect("rectangular rows");

    for n_estimators in [10, 50, 100] {
        let forest = RandomForestRegressor::new(n_estimators, 42);
        group.bench_with_input(
            BenchmarkId::new("estimators", n_estimators),
            &n_estimators,
            |b, _| {
                b.iter(|| forest.fit(black_box(&features), black_box(&target)));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_pipeline, bench_forest_fit);
criterion_main!(benches);
