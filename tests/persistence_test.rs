//! Integration tests for loading, saving and autosave
//!
//! Tests the complete storage round trip:
//! 1. Load Parquet / CSV files into the registry
//! 2. Save N datasets + M models, reload the dataset files
//! 3. Background autosave writes new files on every tick and stops cleanly

use arrow::array::{Float32Array, Int32Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datamine::config::{TrainingConfig, WorkbenchConfig};
use datamine::persistence::autosave;
use datamine::persistence::{
    Manifest, ModelDocument, DATASETS_DIR, MANIFEST_FILE, MODELS_DIR, REPORTS_DIR,
};
use datamine::table::loader::load_table;
use datamine::{Error, Workbench};
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::runtime::Handle;

/// Write a 1,000-row Parquet file in two row groups
#[allow(clippy::cast_precision_loss)]
fn create_test_parquet<P: AsRef<Path>>(path: P) -> Result<(), Box<dyn std::error::Error>> {
    let schema = Schema::new(vec![
        Field::new("id", DataType::Int32, false),
        Field::new("value", DataType::Float32, false),
        Field::new("category", DataType::Utf8, false),
    ]);
    let num_rows: i32 = 1_000;
    let batch = RecordBatch::try_new(
        Arc::new(schema.clone()),
        vec![
            Arc::new(Int32Array::from_iter_values(0..num_rows)),
            Arc::new(Float32Array::from_iter_values(
                (0..num_rows).map(|i| (i as f32) * 1.5),
            )),
            Arc::new(StringArray::from_iter_values(
                (0..num_rows).map(|i| format!("category_{}", i % 10)),
            )),
        ],
    )?;

    let file = File::create(path.as_ref())?;
    let props = WriterProperties::builder()
        .set_max_row_group_size(500)
        .build();
    let mut writer = ArrowWriter::try_new(file, Arc::new(schema), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn workbench(backup: &Path) -> Workbench {
    let config = WorkbenchConfig::builder()
        .workspace_name("Test Workspace")
        .training(TrainingConfig {
            n_estimators: 5,
            ..TrainingConfig::default()
        })
        .backup_dir(backup)
        .build()
        .unwrap();
    Workbench::new(config, Handle::current()).unwrap()
}

fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir).map(Iterator::count).unwrap_or(0)
}

// ============================================================================
// Loader
// ============================================================================

#[tokio::test]
async fn test_load_parquet_into_registry() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("ore_prices.parquet");
    create_test_parquet(&path).unwrap();

    let bench = workbench(tmp.path());
    let name = bench.load_file(&path).unwrap();
    assert_eq!(name, "Ore Prices");

    let table = bench.registry().dataset(&name).unwrap();
    assert_eq!(table.num_rows(), 1_000);
    assert_eq!(table.numeric_columns(), vec!["id", "value"]);

    // Loading the same file again registers a second, disambiguated dataset.
    let again = bench.load_file(&path).unwrap();
    assert_ne!(again, name);
    assert_eq!(bench.summary().datasets, 2);
}

#[tokio::test]
async fn test_unsupported_file_adds_nothing() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("ledger.xlsx");
    fs::write(&path, b"PK\x03\x04").unwrap();

    let bench = workbench(tmp.path());
    assert!(matches!(
        bench.load_file(&path),
        Err(Error::UnsupportedFormat(_))
    ));
    assert_eq!(bench.summary().datasets, 0);
}

// ============================================================================
// User save
// ============================================================================

#[tokio::test]
async fn test_save_round_trip() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("workspace");
    let bench = workbench(tmp.path());
    bench.load_samples().unwrap();
    bench.train("Mining 2026").unwrap();
    bench.train("Mining 2026").unwrap();
    bench.train("Iron Golems").unwrap();

    let report = bench.save_all(&out).unwrap();
    assert_eq!(report.datasets_saved, 2);
    assert_eq!(report.models_saved, 3);
    assert!(report.is_complete());

    assert_eq!(count_files(&out.join(DATASETS_DIR)), 2);
    assert_eq!(count_files(&out.join(MODELS_DIR)), 3);
    assert_eq!(count_files(&out.join(REPORTS_DIR)), 2);
    let manifest: Manifest =
        serde_json::from_slice(&fs::read(out.join(MANIFEST_FILE)).unwrap()).unwrap();
    assert_eq!(manifest.workspace_name, "Test Workspace");
    assert_eq!(manifest.dataset_count, 2);
    assert_eq!(manifest.model_count, 3);

    // Saved CSVs load back with the same shape.
    for entry in fs::read_dir(out.join(DATASETS_DIR)).unwrap() {
        let path = entry.unwrap().path();
        let reloaded = load_table(&path).unwrap();
        let expected = if path.to_string_lossy().contains("Mining") {
            bench.registry().dataset("Mining 2026").unwrap()
        } else {
            bench.registry().dataset("Iron Golems").unwrap()
        };
        assert_eq!(reloaded.num_rows(), expected.num_rows());
        assert_eq!(reloaded.num_columns(), expected.num_columns());
    }

    for entry in fs::read_dir(out.join(MODELS_DIR)).unwrap() {
        let doc: ModelDocument = serde_json::from_slice(&fs::read(entry.unwrap().path()).unwrap()).unwrap();
        let record = bench.registry().model(&doc.name).unwrap();
        assert_eq!(doc.dataset, record.source_dataset());
        assert_eq!(doc.metrics, *record.metrics());
        assert_eq!(doc.tier, record.tier());
        assert!(doc.model_summary.starts_with("RandomForestRegressor("));
    }
}

#[tokio::test]
async fn test_exports_written() {
    let tmp = TempDir::new().unwrap();
    let bench = workbench(tmp.path());
    bench.load_samples().unwrap();

    let stats = bench.export_statistics("Iron Golems", tmp.path()).unwrap();
    let report = bench.export_report("Iron Golems", tmp.path()).unwrap();
    assert!(stats.exists() && report.exists());
    assert!(matches!(
        bench.export_report("missing", tmp.path()),
        Err(Error::NotFound { .. })
    ));
}

// ============================================================================
// Autosave
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_autosave_writes_backups_and_shuts_down() {
    let tmp = TempDir::new().unwrap();
    let backup = tmp.path().join("backup");
    let bench = workbench(&backup);
    bench.load_samples().unwrap();
    bench.train("Mining 2026").unwrap();

    let handle = autosave::spawn(
        Arc::clone(bench.registry()),
        backup.clone(),
        Duration::from_millis(50),
        &Handle::current(),
    )
    .unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    let ticks = handle.shutdown().await;

    assert!(ticks >= 2, "expected at least two ticks, got {ticks}");
    // Two datasets + one models file per tick, never overwritten.
    assert_eq!(count_files(&backup), usize::try_from(ticks).unwrap() * 3);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(count_files(&backup), usize::try_from(ticks).unwrap() * 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_start_autosave_uses_configured_directory() {
    let tmp = TempDir::new().unwrap();
    let backup = tmp.path().join("configured");
    let bench = workbench(&backup);
    let handle = bench.start_autosave().unwrap();
    assert_eq!(handle.backup_dir(), backup.as_path());
    assert_eq!(handle.shutdown().await, 0);
}
