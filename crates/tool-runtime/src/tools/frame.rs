//! Tabular file loading and text rendering shared by the data tools.

use std::collections::HashMap;
use std::fs::File;
use std::io::Seek;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, AsArray};
use arrow::compute::{cast, concat_batches};
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, Float64Type, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::tool::ToolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Csv,
    Parquet,
}

impl DataFormat {
    pub fn detect(path: &str) -> Option<Self> {
        let lower = path.to_ascii_lowercase();
        if lower.ends_with(".csv") {
            Some(Self::Csv)
        } else if lower.ends_with(".parquet") {
            Some(Self::Parquet)
        } else {
            None
        }
    }
}

fn failed(path: &Path) -> impl Fn(String) -> ToolError + '_ {
    move |msg| ToolError::ExecutionFailed(format!("failed to read '{}': {msg}", path.display()))
}

/// Read a CSV or Parquet file into one batch, keeping at most `limit` rows.
pub fn read_frame(path: &Path, format: DataFormat, limit: Option<usize>) -> Result<RecordBatch, ToolError> {
    let fail = failed(path);
    let mut file = File::open(path).map_err(|e| fail(e.to_string()))?;

    let (schema, reader): (SchemaRef, Box<dyn Iterator<Item = Result<RecordBatch, arrow::error::ArrowError>>>) =
        match format {
            DataFormat::Csv => {
                let csv_format = Format::default().with_header(true);
                let (schema, _) = csv_format
                    .infer_schema(&mut file, None)
                    .map_err(|e| fail(e.to_string()))?;
                file.rewind().map_err(|e| fail(e.to_string()))?;
                let schema = Arc::new(schema);
                let reader = ReaderBuilder::new(schema.clone())
                    .with_format(csv_format)
                    .build(file)
                    .map_err(|e| fail(e.to_string()))?;
                (schema, Box::new(reader))
            }
            DataFormat::Parquet => {
                let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| fail(e.to_string()))?;
                let schema = builder.schema().clone();
                let reader = builder.build().map_err(|e| fail(e.to_string()))?;
                (schema, Box::new(reader))
            }
        };

    let mut batches = Vec::new();
    let mut rows = 0usize;
    for batch in reader {
        let batch = batch.map_err(|e| fail(e.to_string()))?;
        rows += batch.num_rows();
        batches.push(batch);
        if limit.is_some_and(|n| rows >= n) {
            break;
        }
    }

    let frame = concat_batches(&schema, &batches).map_err(|e| fail(e.to_string()))?;
    Ok(match limit {
        Some(n) if n < frame.num_rows() => frame.slice(0, n),
        _ => frame,
    })
}

/// `(rows, columns)`
pub fn shape(frame: &RecordBatch) -> String {
    format!("({}, {})", frame.num_rows(), frame.num_columns())
}

/// Column index, name, non-null count and dtype.
pub fn info(frame: &RecordBatch) -> String {
    let rows = frame.num_rows();
    let headers = ["#", "Column", "Non-Null Count", "Dtype"].map(String::from).to_vec();
    let body: Vec<Vec<String>> = frame
        .schema()
        .fields()
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let col = frame.column(i);
            vec![
                i.to_string(),
                field.name().clone(),
                format!("{} non-null", col.len() - col.null_count()),
                field.data_type().to_string(),
            ]
        })
        .collect();
    format!(
        "RangeIndex: {rows} entries\nData columns (total {} columns):\n{}",
        frame.num_columns(),
        render_table(&headers, &body)
    )
}

/// First `n` rows as an ASCII table.
pub fn head(frame: &RecordBatch, n: usize) -> Result<String, ToolError> {
    let slice = frame.slice(0, n.min(frame.num_rows()));
    arrow::util::pretty::pretty_format_batches(&[slice])
        .map(|t| t.to_string())
        .map_err(|e| ToolError::ExecutionFailed(format!("failed to format rows: {e}")))
}

/// Statistics of one column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnStats {
    Numeric {
        count: usize,
        mean: f64,
        std: f64,
        min: f64,
        q25: f64,
        q50: f64,
        q75: f64,
        max: f64,
    },
    Categorical {
        count: usize,
        unique: usize,
        top: Option<String>,
        freq: usize,
    },
}

/// Linear-interpolated quantile of sorted values.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

pub fn column_stats(array: &dyn Array) -> Result<ColumnStats, ToolError> {
    let to_err = |e: arrow::error::ArrowError| ToolError::ExecutionFailed(format!("failed to summarize column: {e}"));

    if array.data_type().is_numeric() {
        let floats = cast(array, &DataType::Float64).map_err(to_err)?;
        let mut values: Vec<f64> = floats
            .as_primitive::<Float64Type>()
            .iter()
            .flatten()
            .filter(|v| !v.is_nan())
            .collect();
        values.sort_by(|a, b| a.total_cmp(b));

        let count = values.len();
        let mean = if count == 0 { f64::NAN } else { values.iter().sum::<f64>() / count as f64 };
        let std = if count < 2 {
            f64::NAN
        } else {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64).sqrt()
        };
        return Ok(ColumnStats::Numeric {
            count,
            mean,
            std,
            min: values.first().copied().unwrap_or(f64::NAN),
            q25: quantile(&values, 0.25),
            q50: quantile(&values, 0.5),
            q75: quantile(&values, 0.75),
            max: values.last().copied().unwrap_or(f64::NAN),
        });
    }

    let strings = cast(array, &DataType::Utf8).map_err(to_err)?;
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut count = 0usize;
    for value in strings.as_string::<i32>().iter().flatten() {
        count += 1;
        *counts.entry(value).or_default() += 1;
    }
    let top = counts
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(v, n)| (v.to_string(), *n));

    Ok(ColumnStats::Categorical {
        count,
        unique: counts.len(),
        freq: top.as_ref().map(|t| t.1).unwrap_or(0),
        top: top.map(|t| t.0),
    })
}

fn fmt_num(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else {
        format!("{v:.6}")
    }
}

/// Descriptive statistics table: one row per statistic, one column per field.
pub fn describe(frame: &RecordBatch) -> Result<String, ToolError> {
    let schema = frame.schema();
    let stats: Vec<ColumnStats> = (0..frame.num_columns())
        .map(|i| column_stats(frame.column(i).as_ref()))
        .collect::<Result<_, _>>()?;

    let any_categorical = stats.iter().any(|s| matches!(s, ColumnStats::Categorical { .. }));
    let any_numeric = stats.iter().any(|s| matches!(s, ColumnStats::Numeric { .. }));

    let mut row_names = vec!["count"];
    if any_categorical {
        row_names.extend(["unique", "top", "freq"]);
    }
    if any_numeric {
        row_names.extend(["mean", "std", "min", "25%", "50%", "75%", "max"]);
    }

    let nan = || "NaN".to_string();
    let rows: Vec<Vec<String>> = row_names
        .iter()
        .map(|&stat| {
            let mut row = vec![stat.to_string()];
            for s in &stats {
                let cell = match (s, stat) {
                    (ColumnStats::Numeric { count, .. }, "count") => count.to_string(),
                    (ColumnStats::Categorical { count, .. }, "count") => count.to_string(),
                    (ColumnStats::Categorical { unique, .. }, "unique") => unique.to_string(),
                    (ColumnStats::Categorical { top, .. }, "top") => top.clone().unwrap_or_else(nan),
                    (ColumnStats::Categorical { freq, .. }, "freq") => freq.to_string(),
                    (ColumnStats::Numeric { mean, .. }, "mean") => fmt_num(*mean),
                    (ColumnStats::Numeric { std, .. }, "std") => fmt_num(*std),
                    (ColumnStats::Numeric { min, .. }, "min") => fmt_num(*min),
                    (ColumnStats::Numeric { q25, .. }, "25%") => fmt_num(*q25),
                    (ColumnStats::Numeric { q50, .. }, "50%") => fmt_num(*q50),
                    (ColumnStats::Numeric { q75, .. }, "75%") => fmt_num(*q75),
                    (ColumnStats::Numeric { max, .. }, "max") => fmt_num(*max),
                    _ => nan(),
                };
                row.push(cell);
            }
            row
        })
        .collect();

    let mut headers = vec![String::new()];
    headers.extend(schema.fields().iter().map(|f| f.name().clone()));
    Ok(render_table(&headers, &rows))
}

/// Null count per column, one line each.
pub fn missing_values(frame: &RecordBatch) -> String {
    let rows: Vec<Vec<String>> = frame
        .schema()
        .fields()
        .iter()
        .enumerate()
        .map(|(i, f)| vec![f.name().clone(), frame.column(i).null_count().to_string()])
        .collect();
    render_rows(&rows)
}

/// Left-aligned text table with a header row.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut all = Vec::with_capacity(rows.len() + 1);
    all.push(headers.to_vec());
    all.extend(rows.iter().cloned());
    render_rows(&all)
}

fn render_rows(rows: &[Vec<String>]) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..columns)
        .map(|c| rows.iter().filter_map(|r| r.get(c)).map(|s| s.chars().count()).max().unwrap_or(0))
        .collect();
    rows.iter()
        .map(|r| {
            r.iter()
                .enumerate()
                .map(|(c, cell)| format!("{cell:<width$}", width = widths[c]))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}
