//! Dataset report exports
//!
//! - `analysis_<name>_<ts>.csv`: descriptive statistics, one row per
//!   statistic and one column per numeric column
//! - `report_<name>_<ts>.txt`: dimensions, column list, column types and
//!   per-column null counts

use super::{clean_item_name, create_unique, file_timestamp, item_error, write_csv};
use crate::table::stats::{describe, ColumnSummary};
use crate::table::TableHandle;
use crate::Result;
use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::Local;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Row labels of the statistics CSV, in order
pub const STATISTIC_LABELS: [&str; 8] = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];

#[allow(clippy::cast_precision_loss)]
fn statistic_column(summary: &ColumnSummary) -> Vec<f64> {
    vec![
        summary.count as f64,
        summary.mean,
        summary.std,
        summary.min,
        summary.p25,
        summary.p50,
        summary.p75,
        summary.max,
    ]
}

/// Descriptive statistics as a record batch (`statistic` + one column per
/// numeric column).
///
/// # Errors
///
/// Returns error if a numeric column cannot be read
pub fn describe_batch(table: &TableHandle) -> Result<RecordBatch> {
    let summaries = describe(table)?;
    let mut fields = vec![Field::new("statistic", DataType::Utf8, false)];
    let mut arrays: Vec<ArrayRef> = vec![Arc::new(StringArray::from(STATISTIC_LABELS.to_vec()))];
    for summary in &summaries {
        fields.push(Field::new(&summary.column, DataType::Float64, true));
        arrays.push(Arc::new(Float64Array::from(statistic_column(summary))));
    }
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

/// Write the statistics CSV for `table` into `dir`.
///
/// # Errors
///
/// Returns [`crate::Error::Serialization`] naming the dataset
pub fn export_describe_csv(table: &TableHandle, dir: &Path) -> Result<PathBuf> {
    let write = || -> Result<PathBuf> {
        let clean = clean_item_name(table.name())?;
        let batch = describe_batch(table)?;
        std::fs::create_dir_all(dir)?;
        let stem = format!("analysis_{clean}_{}", file_timestamp());
        let (file, path) = create_unique(dir, &stem, "csv")?;
        write_csv(&batch, file)?;
        Ok(path)
    };
    let path = write().map_err(|e| item_error(table.name(), e))?;
    info!(dataset = table.name(), path = %path.display(), "statistics exported");
    Ok(path)
}

/// Plain-text statistical report.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn render_report(table: &TableHandle) -> String {
    let batch = table.batch();
    let rows = table.num_rows();
    let mut out = String::new();
    let _ = writeln!(out, "STATISTICAL REPORT - {}", table.name());
    let _ = writeln!(out, "Generated: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "{}", "=".repeat(60));
    let _ = writeln!(out, "Dimensions: {rows} rows, {} columns", table.num_columns());
    let names: Vec<&str> = table.columns().iter().map(|c| c.name()).collect();
    let _ = writeln!(out, "Columns: {}", names.join(", "));

    let _ = writeln!(out, "Data types:");
    for (spec, field) in table.columns().iter().zip(batch.schema().fields()) {
        let _ = writeln!(
            out,
            "   - {}: {} ({})",
            spec.name(),
            field.data_type(),
            spec.kind().as_str()
        );
    }

    let _ = writeln!(out, "\nNull values:");
    for (spec, column) in table.columns().iter().zip(batch.columns()) {
        let nulls = column.null_count();
        if nulls > 0 {
            let percent = nulls as f64 / rows as f64 * 100.0;
            let _ = writeln!(out, "   - {}: {nulls} ({percent:.2}%)", spec.name());
        }
    }
    out
}

/// Write the text report for `table` into `dir`.
///
/// # Errors
///
/// Returns [`crate::Error::Serialization`] naming the dataset
pub fn export_report(table: &TableHandle, dir: &Path) -> Result<PathBuf> {
    let write = || -> Result<PathBuf> {
        let clean = clean_item_name(table.name())?;
        std::fs::create_dir_all(dir)?;
        let stem = format!("report_{clean}_{}", file_timestamp());
        let (mut file, path) = create_unique(dir, &stem, "txt")?;
        file.write_all(render_report(table).as_bytes())?;
        Ok(path)
    };
    let path = write().map_err(|e| item_error(table.name(), e))?;
    info!(dataset = table.name(), path = %path.display(), "report exported");
    Ok(path)
}
