//! Datasets (Arrow-backed)
//!
//! A [`TableHandle`] is one named dataset: an Arrow [`RecordBatch`] plus a
//! typed schema computed once at construction. Column kinds are never
//! re-inferred afterwards; callers read them from [`TableHandle::columns`].
//!
//! Tables are immutable. Replacing a dataset means building a new handle.
//! Cloning shares the column buffers, which keeps registry snapshots cheap.

pub mod loader;
pub mod samples;
pub mod stats;

use crate::{Error, Result};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute;
use arrow::datatypes::{DataType, Float64Type, SchemaRef};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

/// Declared column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Integer, float or decimal values
    Numeric,
    /// Strings, booleans and anything else non-numeric
    Categorical,
    /// Dates, times, timestamps and durations
    Temporal,
}

impl ColumnKind {
    /// Classify an Arrow data type.
    #[must_use]
    pub const fn from_data_type(data_type: &DataType) -> Self {
        match data_type {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float16
            | DataType::Float32
            | DataType::Float64
            | DataType::Decimal128(_, _)
            | DataType::Decimal256(_, _) => Self::Numeric,
            DataType::Date32
            | DataType::Date64
            | DataType::Time32(_)
            | DataType::Time64(_)
            | DataType::Timestamp(_, _)
            | DataType::Duration(_)
            | DataType::Interval(_) => Self::Temporal,
            _ => Self::Categorical,
        }
    }

    /// Lowercase label used in reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Categorical => "categorical",
            Self::Temporal => "temporal",
        }
    }
}

/// Name and declared kind of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    name: String,
    kind: ColumnKind,
}

impl ColumnSpec {
    /// Create a column spec.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared kind.
    #[must_use]
    pub const fn kind(&self) -> ColumnKind {
        self.kind
    }

    /// Whether the column is numeric.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self.kind, ColumnKind::Numeric)
    }
}

/// One named dataset.
#[derive(Debug, Clone)]
pub struct TableHandle {
    name: String,
    columns: Vec<ColumnSpec>,
    batch: RecordBatch,
}

impl TableHandle {
    /// Wrap a record batch, deriving the typed schema from its fields.
    #[must_use]
    pub fn new(name: impl Into<String>, batch: RecordBatch) -> Self {
        let columns = batch
            .schema()
            .fields()
            .iter()
            .map(|field| {
                ColumnSpec::new(
                    field.name().clone(),
                    ColumnKind::from_data_type(field.data_type()),
                )
            })
            .collect();
        Self {
            name: name.into(),
            columns,
            batch,
        }
    }

    /// Concatenate decoded batches into a single table.
    ///
    /// # Errors
    ///
    /// Returns error if the batches do not share `schema`
    pub fn from_batches(
        name: impl Into<String>,
        schema: SchemaRef,
        batches: &[RecordBatch],
    ) -> Result<Self> {
        let batch = compute::concat_batches(&schema, batches)?;
        Ok(Self::new(name, batch))
    }

    /// Same data under a different name.
    #[must_use]
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: self.columns.clone(),
            batch: self.batch.clone(),
        }
    }

    /// Dataset name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordered column specs.
    #[must_use]
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Underlying Arrow data.
    #[must_use]
    pub const fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Number of columns.
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Numeric column names in column order.
    #[must_use]
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_numeric())
            .map(ColumnSpec::name)
            .collect()
    }

    /// Count columns of a given kind.
    #[must_use]
    pub fn count_kind(&self, kind: ColumnKind) -> usize {
        self.columns.iter().filter(|c| c.kind() == kind).count()
    }

    /// Column array by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the column does not exist
    pub fn column(&self, name: &str) -> Result<&ArrayRef> {
        self.batch.column_by_name(name).ok_or_else(|| {
            Error::InvalidInput(format!("column '{name}' not found in '{}'", self.name))
        })
    }

    /// Values of a numeric column as `f64`. Nulls and NaN become `None`.
    ///
    /// # Errors
    ///
    /// Returns error if the column is missing or not numeric
    pub fn numeric_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let spec = self
            .columns
            .iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| {
                Error::InvalidInput(format!("column '{name}' not found in '{}'", self.name))
            })?;
        if !spec.is_numeric() {
            return Err(Error::InvalidInput(format!(
                "column '{name}' is {}, not numeric",
                spec.kind().as_str()
            )));
        }
        let casted = compute::cast(self.column(name)?, &DataType::Float64)?;
        let values = casted.as_primitive::<Float64Type>();
        Ok(values
            .iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect())
    }

    /// Total null cells across all columns.
    #[must_use]
    pub fn null_count(&self) -> usize {
        self.batch.columns().iter().map(|c| c.null_count()).sum()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::TableHandle;
    use arrow::array::{Float64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    /// `a`, `b` numeric, `label` categorical, `c` numeric with `c = 3a + 2b + 1`.
    #[allow(clippy::cast_precision_loss)]
    pub fn linear_table(name: &str, rows: usize) -> TableHandle {
        let schema = Arc::new(Schema::new(vec![
            Field::new("a", DataType::Float64, true),
            Field::new("b", DataType::Float64, true),
            Field::new("label", DataType::Utf8, false),
            Field::new("c", DataType::Float64, true),
        ]));
        let a: Vec<f64> = (0..rows).map(|i| (i % 17) as f64).collect();
        let b: Vec<f64> = (0..rows).map(|i| ((i * 7) % 11) as f64).collect();
        let c: Vec<f64> = a.iter().zip(&b).map(|(a, b)| 3.0 * a + 2.0 * b + 1.0).collect();
        let label = StringArray::from_iter_values((0..rows).map(|i| format!("row_{}", i % 3)));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Float64Array::from(a)),
                Arc::new(Float64Array::from(b)),
                Arc::new(label),
                Arc::new(Float64Array::from(c)),
            ],
        )
        .unwrap();
        TableHandle::new(name, batch)
    }
}
