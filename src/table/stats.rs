//! Dataset profiling and descriptive statistics
//!
//! Quartiles use linear interpolation between closest ranks, and the standard
//! deviation is the sample (n - 1) estimate.

use super::{ColumnKind, TableHandle};
use crate::Result;
use serde::{Deserialize, Serialize};

/// Shape and completeness of one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetProfile {
    /// Dataset name
    pub name: String,
    /// Row count
    pub rows: usize,
    /// Column count
    pub columns: usize,
    /// Null cells across all columns
    pub null_cells: usize,
    /// Null cells as a percentage of all cells
    pub null_percent: f64,
    /// Non-null cells as a percentage of all cells
    pub completeness_percent: f64,
    /// In-memory size of the column buffers
    pub memory_bytes: usize,
    /// Numeric column count
    pub numeric_columns: usize,
    /// Categorical column count
    pub categorical_columns: usize,
    /// Temporal column count
    pub temporal_columns: usize,
}

/// Descriptive statistics for one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    /// Column name
    pub column: String,
    /// Non-null values
    pub count: usize,
    /// Arithmetic mean
    pub mean: f64,
    /// Sample standard deviation (`NaN` with fewer than 2 values)
    pub std: f64,
    /// Minimum
    pub min: f64,
    /// First quartile
    pub p25: f64,
    /// Median
    pub p50: f64,
    /// Third quartile
    pub p75: f64,
    /// Maximum
    pub max: f64,
}

/// Profile a dataset.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn profile(table: &TableHandle) -> DatasetProfile {
    let cells = table.num_rows() * table.num_columns();
    let null_cells = table.null_count();
    let null_percent = if cells == 0 {
        0.0
    } else {
        null_cells as f64 / cells as f64 * 100.0
    };
    DatasetProfile {
        name: table.name().to_string(),
        rows: table.num_rows(),
        columns: table.num_columns(),
        null_cells,
        null_percent,
        completeness_percent: 100.0 - null_percent,
        memory_bytes: table.batch().get_array_memory_size(),
        numeric_columns: table.count_kind(ColumnKind::Numeric),
        categorical_columns: table.count_kind(ColumnKind::Categorical),
        temporal_columns: table.count_kind(ColumnKind::Temporal),
    }
}

/// Summaries for every numeric column, in column order.
///
/// Columns with no values report a count of 0 and `NaN` statistics.
///
/// # Errors
///
/// Returns error if a numeric column cannot be read as `f64`
pub fn describe(table: &TableHandle) -> Result<Vec<ColumnSummary>> {
    table
        .numeric_columns()
        .into_iter()
        .map(|name| {
            let mut values: Vec<f64> = table.numeric_values(name)?.into_iter().flatten().collect();
            values.sort_by(f64::total_cmp);
            Ok(summarize(name, &values))
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn summarize(column: &str, sorted: &[f64]) -> ColumnSummary {
    let count = sorted.len();
    let mean = if count == 0 {
        f64::NAN
    } else {
        sorted.iter().sum::<f64>() / count as f64
    };
    let std = if count < 2 {
        f64::NAN
    } else {
        let ss: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (count - 1) as f64).sqrt()
    };
    ColumnSummary {
        column: column.to_string(),
        count,
        mean,
        std,
        min: sorted.first().copied().unwrap_or(f64::NAN),
        p25: quantile(sorted, 0.25),
        p50: quantile(sorted, 0.5),
        p75: quantile(sorted, 0.75),
        max: sorted.last().copied().unwrap_or(f64::NAN),
    }
}

/// Linear-interpolated quantile of an ascending slice.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = pos - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}
