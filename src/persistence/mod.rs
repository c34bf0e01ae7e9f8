//! Durable storage of registry snapshots
//!
//! ## User-initiated save
//!
//! ```text
//! <dir>/
//!   datasets/dataset_<name>_<YYYYmmdd_HHMMSS>.csv   one per dataset
//!   models/model_<name>_<YYYYmmdd_HHMMSS>.json      one per model
//!   reports/report_<name>_<YYYYmmdd_HHMMSS>.txt     one per saved dataset
//!   manifest.json                                   counts + generation seed
//! ```
//!
//! Item names are sanitized to alphanumerics, spaces, hyphens and
//! underscores. Files are opened create-new, so an existing file is never
//! overwritten; a clash gets a `_<n>` suffix. That includes the manifest, so
//! a second save into the same directory writes `manifest_2.json`. One failing item is logged and
//! listed in the report, and the remaining items are still written.
//!
//! The fitted estimator is not persisted; model documents carry its
//! human-readable summary instead.
//!
//! Background autosave lives in [`autosave`]; report exports in [`export`].

pub mod autosave;
pub mod export;

use crate::model::{Metrics, ModelRecord, Tier};
use crate::registry::RegistrySnapshot;
use crate::table::TableHandle;
use crate::{Error, Result};
use arrow::csv::WriterBuilder;
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Local, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Sub-directory for dataset files
pub const DATASETS_DIR: &str = "datasets";

/// Sub-directory for model documents
pub const MODELS_DIR: &str = "models";

/// Sub-directory for per-dataset text reports
pub const REPORTS_DIR: &str = "reports";

/// Manifest file name of the first save into a directory
pub const MANIFEST_FILE: &str = "manifest.json";

const MANIFEST_STEM: &str = "manifest";

/// Program identifier written into manifests
pub const CREATED_BY: &str = "datamine";

/// Upper bound (exclusive) of the manifest generation seed
pub const MANIFEST_SEED_BOUND: u32 = 1_000_000;

/// Keep alphanumerics, spaces, hyphens and underscores; trim the ends.
///
/// An empty result means the name has no usable characters.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Local time formatted for file names.
#[must_use]
pub fn file_timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Open `<dir>/<stem>.<ext>` create-new, trying `<stem>_<n>.<ext>` on clash.
pub(crate) fn create_unique(dir: &Path, stem: &str, ext: &str) -> io::Result<(File, PathBuf)> {
    let mut attempt = 1usize;
    loop {
        let file_name = if attempt == 1 {
            format!("{stem}.{ext}")
        } else {
            format!("{stem}_{attempt}.{ext}")
        };
        let path = dir.join(file_name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((file, path)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}

/// Write a batch as UTF-8 CSV with a header row.
pub(crate) fn write_csv(batch: &RecordBatch, file: File) -> Result<()> {
    let mut writer = WriterBuilder::new().with_header(true).build(BufWriter::new(file));
    writer.write(batch)?;
    writer.into_inner().flush()?;
    Ok(())
}

/// Serialize `value` as pretty JSON into `file`.
pub(crate) fn write_json<T: Serialize>(value: &T, file: File) -> Result<()> {
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, value)?;
    out.flush()?;
    Ok(())
}

/// Wrap any failure of one item as [`Error::Serialization`].
pub(crate) fn item_error(item: &str, e: Error) -> Error {
    match e {
        Error::Serialization { .. } => e,
        other => Error::Serialization {
            item: item.to_string(),
            cause: other.to_string(),
        },
    }
}

/// Sanitized name or a serialization failure for an unusable one.
pub(crate) fn clean_item_name(item: &str) -> Result<String> {
    let clean = sanitize_name(item);
    if clean.is_empty() {
        Err(Error::Serialization {
            item: item.to_string(),
            cause: "name has no characters usable in a file name".to_string(),
        })
    } else {
        Ok(clean)
    }
}

/// Training parameters as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamsDocument {
    /// Ensemble size
    pub n_estimators: usize,
    /// Split and estimator seed
    pub seed: u64,
    /// Held-out fraction
    pub test_fraction: f64,
}

/// Persisted form of a [`ModelRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDocument {
    /// Model name
    pub name: String,
    /// Source dataset name
    pub dataset: String,
    /// Target column
    pub target: String,
    /// Feature columns
    pub features: Vec<String>,
    /// Accuracy / error / cost
    pub metrics: Metrics,
    /// Tier at save time
    pub tier: Tier,
    /// Creation time (RFC 3339)
    pub created: DateTime<Utc>,
    /// Algorithm label
    pub algorithm: String,
    /// Training duration in seconds
    pub training_time: f64,
    /// Training parameters
    pub params: ParamsDocument,
    /// Active flag
    pub active: bool,
    /// Estimator description (the estimator itself is not stored)
    pub model_summary: String,
}

impl From<&ModelRecord> for ModelDocument {
    fn from(record: &ModelRecord) -> Self {
        Self {
            name: record.name().to_string(),
            dataset: record.source_dataset().to_string(),
            target: record.target_column().to_string(),
            features: record.feature_columns().to_vec(),
            metrics: *record.metrics(),
            tier: record.tier(),
            created: record.created_at(),
            algorithm: record.algorithm_label().to_string(),
            training_time: record.training_duration_secs(),
            params: ParamsDocument {
                n_estimators: record.params().n_estimators,
                seed: record.params().seed,
                test_fraction: record.params().test_fraction,
            },
            active: record.is_active(),
            model_summary: record.summary(),
        }
    }
}

/// One item that could not be saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveFailure {
    /// Dataset or model name
    pub item: String,
    /// Error message
    pub cause: String,
}

impl From<Error> for SaveFailure {
    fn from(e: Error) -> Self {
        match e {
            Error::Serialization { item, cause } => Self { item, cause },
            other => Self {
                item: String::new(),
                cause: other.to_string(),
            },
        }
    }
}

/// Provenance block of a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorInfo {
    /// Crate version
    pub version: String,
    /// Program identifier
    pub created_by: String,
    /// Random traceability seed, below [`MANIFEST_SEED_BOUND`]
    pub seed: u32,
}

/// Written once per full save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Workspace label
    pub workspace_name: String,
    /// Save time (RFC 3339)
    pub saved_at: DateTime<Utc>,
    /// Datasets in the snapshot
    pub dataset_count: usize,
    /// Models in the snapshot
    pub model_count: usize,
    /// Datasets written
    pub datasets_saved: usize,
    /// Models written
    pub models_saved: usize,
    /// Dataset reports written
    #[serde(default)]
    pub reports_saved: usize,
    /// Items that failed
    pub failures: Vec<SaveFailure>,
    /// Provenance
    pub generator: GeneratorInfo,
}

/// Outcome of [`save_all`].
#[derive(Debug, Clone)]
pub struct SaveReport {
    /// Datasets written
    pub datasets_saved: usize,
    /// Models written
    pub models_saved: usize,
    /// Dataset reports written
    pub reports_saved: usize,
    /// Items that failed, in processing order
    pub failures: Vec<SaveFailure>,
    /// Wall-clock time of the whole save
    pub elapsed: Duration,
    /// Where the manifest was written
    pub manifest_path: PathBuf,
}

impl SaveReport {
    /// True when every item was written.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Save one dataset as `dataset_<name>_<ts>.csv` under `dir`.
///
/// # Errors
///
/// Returns [`Error::Serialization`] naming the dataset
pub fn save_dataset(table: &TableHandle, dir: &Path, timestamp: &str) -> Result<PathBuf> {
    let write = || -> Result<PathBuf> {
        let clean = clean_item_name(table.name())?;
        let (file, path) = create_unique(dir, &format!("dataset_{clean}_{timestamp}"), "csv")?;
        if let Err(e) = write_csv(table.batch(), file) {
            let _ = fs::remove_file(&path);
            return Err(e);
        }
        Ok(path)
    };
    write().map_err(|e| item_error(table.name(), e))
}

/// Save one model document as `model_<name>_<ts>.json` under `dir`.
///
/// # Errors
///
/// Returns [`Error::Serialization`] naming the model
pub fn save_model(record: &ModelRecord, dir: &Path, timestamp: &str) -> Result<PathBuf> {
    let write = || -> Result<PathBuf> {
        let clean = clean_item_name(record.name())?;
        let (file, path) = create_unique(dir, &format!("model_{clean}_{timestamp}"), "json")?;
        if let Err(e) = write_json(&ModelDocument::from(record), file) {
            let _ = fs::remove_file(&path);
            return Err(e);
        }
        Ok(path)
    };
    write().map_err(|e| item_error(record.name(), e))
}

/// Write every dataset and model of `snapshot` under `dir`, then the manifest.
///
/// # Errors
///
/// Returns an error only if the directories or the manifest cannot be
/// written; per-item failures are reported in [`SaveReport::failures`].
pub fn save_all(snapshot: &RegistrySnapshot, dir: &Path, workspace_name: &str) -> Result<SaveReport> {
    let started = Instant::now();
    let timestamp = file_timestamp();
    let datasets_dir = dir.join(DATASETS_DIR);
    let models_dir = dir.join(MODELS_DIR);
    let reports_dir = dir.join(REPORTS_DIR);
    fs::create_dir_all(&datasets_dir)?;
    fs::create_dir_all(&models_dir)?;
    fs::create_dir_all(&reports_dir)?;

    let mut failures = Vec::new();
    let mut datasets_saved = 0;
    let mut reports_saved = 0;
    for table in &snapshot.datasets {
        match save_dataset(table, &datasets_dir, &timestamp) {
            Ok(path) => {
                datasets_saved += 1;
                info!(dataset = table.name(), path = %path.display(), "dataset saved");
                match export::export_report(table, &reports_dir) {
                    Ok(_) => reports_saved += 1,
                    Err(e) => {
                        warn!(dataset = table.name(), error = %e, "report not saved");
                        failures.push(SaveFailure::from(e));
                    }
                }
            }
            Err(e) => {
                warn!(dataset = table.name(), error = %e, "dataset not saved");
                failures.push(SaveFailure::from(e));
            }
        }
    }

    let mut models_saved = 0;
    for record in &snapshot.models {
        match save_model(record, &models_dir, &timestamp) {
            Ok(path) => {
                models_saved += 1;
                info!(model = record.name(), path = %path.display(), "model saved");
            }
            Err(e) => {
                warn!(model = record.name(), error = %e, "model not saved");
                failures.push(SaveFailure::from(e));
            }
        }
    }

    let manifest = Manifest {
        workspace_name: workspace_name.to_string(),
        saved_at: Utc::now(),
        dataset_count: snapshot.datasets.len(),
        model_count: snapshot.models.len(),
        datasets_saved,
        models_saved,
        reports_saved,
        failures: failures.clone(),
        generator: GeneratorInfo {
            version: env!("CARGO_PKG_VERSION").to_string(),
            created_by: CREATED_BY.to_string(),
            seed: rand::thread_rng().gen_range(0..MANIFEST_SEED_BOUND),
        },
    };
    let (file, manifest_path) = create_unique(dir, MANIFEST_STEM, "json")?;
    write_json(&manifest, file)?;

    let elapsed = started.elapsed();
    info!(
        datasets = datasets_saved,
        models = models_saved,
        failures = failures.len(),
        seconds = elapsed.as_secs_f64(),
        "workspace saved"
    );
    Ok(SaveReport {
        datasets_saved,
        models_saved,
        reports_saved,
        failures,
        elapsed,
        manifest_path,
    })
}
