//! Tabular loader
//!
//! Decodes a file into a [`TableHandle`]. The format is chosen from the file
//! extension:
//!
//! | Extension | Format | Decoder |
//! |---|---|---|
//! | `.csv` | delimited text | `arrow::csv` (header row, inferred schema) |
//! | `.json`, `.ndjson` | structured records | `arrow::json` (array or one object per line) |
//! | `.parquet` | columnar binary | `parquet::arrow` |
//! | `.xlsx`, `.xls` | spreadsheet | rejected, no decoder available |

use super::TableHandle;
use crate::{Error, Result};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;
use std::sync::Arc;

/// Declared input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularFormat {
    /// Comma-separated text with a header row
    DelimitedText,
    /// Excel workbook
    Spreadsheet,
    /// JSON records
    StructuredRecord,
    /// Apache Parquet
    ColumnarBinary,
}

impl TabularFormat {
    /// Detect the format from a path's extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] for unknown extensions
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(Self::DelimitedText),
            "xlsx" | "xls" => Ok(Self::Spreadsheet),
            "json" | "ndjson" => Ok(Self::StructuredRecord),
            "parquet" => Ok(Self::ColumnarBinary),
            _ => Err(Error::UnsupportedFormat(format!(
                "'.{ext}' ({})",
                path.display()
            ))),
        }
    }
}

/// Load a file as a dataset named after the file (see [`dataset_name_from_path`]).
///
/// # Errors
///
/// Returns [`Error::UnsupportedFormat`] or [`Error::DecodeError`]
pub fn load_table<P: AsRef<Path>>(path: P) -> Result<TableHandle> {
    let path = path.as_ref();
    let name = dataset_name_from_path(path);
    let (schema, batches) = match TabularFormat::from_path(path)? {
        TabularFormat::DelimitedText => read_csv(path)?,
        TabularFormat::StructuredRecord => read_json(path)?,
        TabularFormat::ColumnarBinary => read_parquet(path)?,
        TabularFormat::Spreadsheet => {
            return Err(Error::UnsupportedFormat(format!(
                "spreadsheet decoding is not available ({})",
                path.display()
            )))
        }
    };
    TableHandle::from_batches(name, schema, &batches)
        .map_err(|e| Error::DecodeError(format!("{}: {e}", path.display())))
}

/// Derive a display name: stem before the first `.`, underscores to spaces,
/// title case (`mining_data.csv` → `Mining Data`).
#[must_use]
pub fn dataset_name_from_path(path: &Path) -> String {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let stem = file_name.split('.').next().unwrap_or_default();
    title_case(&stem.replace('_', " "))
}

fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_alpha = false;
    for ch in text.chars() {
        if prev_alpha {
            out.extend(ch.to_lowercase());
        } else {
            out.extend(ch.to_uppercase());
        }
        prev_alpha = ch.is_alphabetic();
    }
    out
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| Error::DecodeError(format!("failed to open {}: {e}", path.display())))
}

fn decode_err(path: &Path, e: impl std::fmt::Display) -> Error {
    Error::DecodeError(format!("{}: {e}", path.display()))
}

fn read_csv(path: &Path) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    use arrow::csv::reader::Format;
    use arrow::csv::ReaderBuilder;

    let (schema, _) = Format::default()
        .with_header(true)
        .infer_schema(open(path)?, None)
        .map_err(|e| decode_err(path, e))?;
    let schema = Arc::new(schema);

    let reader = ReaderBuilder::new(Arc::clone(&schema))
        .with_header(true)
        .build(open(path)?)
        .map_err(|e| decode_err(path, e))?;
    let batches = reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| decode_err(path, e))?;
    Ok((schema, batches))
}

/// Accepts a top-level array of objects or newline-delimited objects.
fn read_json(path: &Path) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    let mut text = String::new();
    BufReader::new(open(path)?)
        .read_to_string(&mut text)
        .map_err(|e| decode_err(path, e))?;
    let ndjson = if text.trim_start().starts_with('[') {
        array_to_ndjson(&text).map_err(|e| decode_err(path, e))?
    } else {
        text
    };
    decode_ndjson(ndjson.as_bytes()).map_err(|e| decode_err(path, e))
}

fn array_to_ndjson(text: &str) -> Result<String> {
    let records: Vec<serde_json::Value> = serde_json::from_str(text)?;
    let mut out = String::with_capacity(text.len());
    for record in &records {
        if !record.is_object() {
            return Err(Error::DecodeError(
                "JSON array elements must be objects".to_string(),
            ));
        }
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}

fn decode_ndjson(bytes: &[u8]) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    use arrow::json::reader::infer_json_schema_from_seekable;
    use arrow::json::ReaderBuilder;

    let mut cursor = Cursor::new(bytes);
    let (schema, _) = infer_json_schema_from_seekable(&mut cursor, None)?;
    let schema = Arc::new(schema);
    let reader = ReaderBuilder::new(Arc::clone(&schema)).build(Cursor::new(bytes))?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok((schema, batches))
}

fn read_parquet(path: &Path) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    let builder = ParquetRecordBatchReaderBuilder::try_new(open(path)?)
        .map_err(|e| Error::DecodeError(format!("Failed to parse Parquet file: {e}")))?;
    let schema = Arc::clone(builder.schema());
    let reader = builder
        .build()
        .map_err(|e| Error::DecodeError(format!("Failed to create Parquet reader: {e}")))?;

    let mut batches = Vec::new();
    for batch in reader {
        let batch = batch
            .map_err(|e| Error::DecodeError(format!("Failed to read record batch: {e}")))?;
        batches.push(batch);
    }
    Ok((schema, batches))
}
