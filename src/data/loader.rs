use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Int64Type};
use arrow::util::display::array_value_to_string;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{CellValue, KnownColumn, Table};
use super::remote::RemoteTable;

/// Raw cells of one row before a schema is inferred.
pub type RawRow = Vec<(String, CellValue)>;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Where the feedback table comes from.
#[derive(Debug, Clone)]
pub enum Source {
    File(PathBuf),
    Remote(RemoteTable),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::File(path) => write!(f, "file {}", path.display()),
            Source::Remote(remote) => write!(f, "remote table '{}'", remote.table_name()),
        }
    }
}

impl Source {
    /// Materialise the full table and check the columns the filters need.
    pub async fn load(&self) -> Result<Table> {
        let table = match self {
            Source::File(path) => {
                let path = path.clone();
                tokio::task::spawn_blocking(move || load_file(&path))
                    .await
                    .context("file loader task failed")??
            }
            Source::Remote(remote) => Table::from_rows(remote.fetch_all().await?),
        };
        ensure_required_columns(&table).with_context(|| format!("loading {self}"))?;
        log::info!(
            "loaded {} rows with {} columns from {self}",
            table.len(),
            table.columns().len()
        );
        Ok(table)
    }
}

/// Every known column must be present for the filters to work.
pub fn ensure_required_columns(table: &Table) -> Result<()> {
    for col in KnownColumn::ALL {
        table.require(col.name())?;
    }
    Ok(())
}

/// Load a feedback table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – one column per field (recommended)
/// * `.json`    – `[{ "AI_Model": ..., ... }, ...]` or `{ "value": [...] }`
/// * `.csv`     – header row with column names
pub fn load_file(path: &Path) -> Result<Table> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let rows = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("reading {}", path.display()))?;

    Ok(Table::from_rows(rows))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, either a bare array (`df.to_json(orient='records')`)
/// or wrapped in the `value` envelope the table store returns.
fn load_json(path: &Path) -> Result<Vec<RawRow>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;
    json_records(&root)
}

pub(crate) fn json_records(root: &JsonValue) -> Result<Vec<RawRow>> {
    let records = match root {
        JsonValue::Array(records) => records,
        JsonValue::Object(obj) => obj
            .get("value")
            .and_then(JsonValue::as_array)
            .context("Expected a 'value' array in JSON object")?,
        _ => bail!("Expected top-level JSON array or object"),
    };

    records
        .iter()
        .enumerate()
        .map(|(i, rec)| -> Result<RawRow> {
            let obj = rec
                .as_object()
                .with_context(|| format!("Row {i} is not a JSON object"))?;
            Ok(obj
                .iter()
                .map(|(key, val)| (key.clone(), json_to_cell(val)))
                .collect())
        })
        .collect()
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Null,
        other => CellValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one record per line.
/// Known columns are read as text; other columns get a type guess.
fn load_csv(path: &Path) -> Result<Vec<RawRow>> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(name, value)| {
                let cell = if KnownColumn::from_name(name).is_some() {
                    text_cell(value)
                } else {
                    guess_cell_type(value)
                };
                (name.clone(), cell)
            })
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

fn text_cell(s: &str) -> CellValue {
    if s.is_empty() {
        CellValue::Null
    } else {
        CellValue::String(s.to_string())
    }
}

fn guess_cell_type(s: &str) -> CellValue {
    if s.is_empty() {
        return CellValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return CellValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return CellValue::Float(f);
    }
    if s == "true" || s == "false" {
        return CellValue::Bool(s == "true");
    }
    CellValue::String(s.to_string())
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet export of the feedback table.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<Vec<RawRow>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        let names: Vec<&String> = schema.fields().iter().map(|f| f.name()).collect();

        for row in 0..batch.num_rows() {
            let cells = names
                .iter()
                .zip(batch.columns())
                .map(|(name, col)| {
                    extract_cell(col, row)
                        .with_context(|| format!("Row {row}: failed to read '{name}'"))
                        .map(|cell| ((*name).clone(), cell))
                })
                .collect::<Result<RawRow>>()?;
            rows.push(cells);
        }
    }

    Ok(rows)
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(col: &Arc<dyn Array>, row: usize) -> Result<CellValue> {
    if col.is_null(row) {
        return Ok(CellValue::Null);
    }
    let cell = match col.data_type() {
        DataType::Utf8 => CellValue::String(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => CellValue::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => CellValue::Integer(col.as_primitive::<Int32Type>().value(row) as i64),
        DataType::Int64 => CellValue::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::Float32 => CellValue::Float(col.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Float64 => CellValue::Float(col.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => CellValue::Bool(col.as_boolean().value(row)),
        DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64 => {
            CellValue::DateTime(array_value_to_string(&**col, row)?)
        }
        _ => CellValue::String(array_value_to_string(&**col, row)?),
    };
    Ok(cell)
}
