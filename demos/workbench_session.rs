//! Workbench Session: Load, Train, Compare, Save
//!
//! Walks through a complete session on the built-in sample datasets:
//! registry, synchronous and background training, tiers, model comparison,
//! a full save and a short autosave run.
//!
//! Toyota Way: Jidoka - the same session always prints the same metrics
//!
//! Run with: cargo run --example workbench_session [output-dir]

use anyhow::{Context, Result};
use datamine::config::WorkbenchConfig;
use datamine::model::DEFAULT_COMPARISON_LIMIT;
use datamine::{logging, StatusUpdate, Workbench};
use std::path::PathBuf;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init().context("installing log subscriber")?;

    let out_dir = std::env::args()
        .nth(1)
        .map_or_else(|| std::env::temp_dir().join("datamine_demo"), PathBuf::from);
    let config = WorkbenchConfig::builder()
        .workspace_name("Demo Workspace")
        .n_estimators(50)
        .backup_dir(out_dir.join("backup"))
        .build()?
        .with_env_overrides()?;
    let mut bench = Workbench::new(config, tokio::runtime::Handle::current())?;

    println!("=== Datamine Workbench Session ===\n");

    println!("=== Step 1: Load sample datasets ===");
    for name in bench.load_samples()? {
        let profile = bench.profile(&name)?;
        println!(
            "  {name}: {} rows x {} columns, {:.1}% complete ({} numeric, {} categorical, {} temporal)",
            profile.rows,
            profile.columns,
            profile.completeness_percent,
            profile.numeric_columns,
            profile.categorical_columns,
            profile.temporal_columns
        );
    }

    println!("\n=== Step 2: Train on the calling thread ===");
    let model = bench.train("Mining 2026")?;
    let record = bench
        .registry()
        .model(&model)
        .context("model vanished after training")?;
    println!(
        "  {model}: target '{}' from {:?}",
        record.target_column(),
        record.feature_columns()
    );
    println!(
        "  R² = {:.4}, RMSE = {:.3}, MAE = {:.3} -> {}",
        record.metrics().accuracy(),
        record.metrics().error(),
        record.metrics().cost(),
        record.tier()
    );

    println!("\n=== Step 3: Background jobs ===");
    let training = bench.submit_training("Iron Golems")?;
    let analysis = bench.submit_analysis("Iron Golems")?;
    println!("  submitted {training} (train) and {analysis} (analyze)");
    let mut remaining = 2;
    while remaining > 0 {
        let Some(update) = bench.next_update().await else {
            break;
        };
        println!("  {update}");
        if let StatusUpdate::Analyzed { report, .. } = &update {
            for summary in &report.summaries {
                println!(
                    "    {:<20} mean {:>10.3}  std {:>10.3}  median {:>10.3}",
                    summary.column, summary.mean, summary.std, summary.p50
                );
            }
        }
        if update.is_final() {
            remaining -= 1;
        }
    }

    println!("\n=== Step 4: Compare models ===");
    for entry in bench.compare_models(DEFAULT_COMPARISON_LIMIT)? {
        println!("  {:<24} {:>7.4}  {}", entry.name, entry.accuracy, entry.tier);
    }

    println!("\n=== Step 5: Save workspace ===");
    let report = bench.save_all(&out_dir)?;
    println!(
        "  {} datasets, {} models saved in {:.2?} (manifest: {})",
        report.datasets_saved,
        report.models_saved,
        report.elapsed,
        report.manifest_path.display()
    );
    for failure in &report.failures {
        println!("  failed: {} ({})", failure.item, failure.cause);
    }
    let stats = bench.export_statistics("Mining 2026", &out_dir)?;
    println!("  statistics: {}", stats.display());

    println!("\n=== Step 6: Autosave ===");
    let autosave = bench.start_autosave()?;
    println!(
        "  backing up to {} every {:?}",
        autosave.backup_dir().display(),
        bench.config().autosave.interval()
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    let ticks = autosave.shutdown().await;
    println!("  autosave stopped after {ticks} tick(s)");

    let summary = bench.summary();
    println!(
        "\nDone: {} datasets, {} models, {} rows, {} columns",
        summary.datasets, summary.models, summary.total_rows, summary.total_columns
    );
    Ok(())
}
