use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDate};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::RecommendError;

pub mod signature;

use signature::DatasetSignature;

pub const DEFAULT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Non-numeric columns whose distinct-value ratio falls below this are
/// classified as categorical.
const CATEGORICAL_RATIO: f64 = 0.05;

/// Separator sniffing looks at the first kibibyte only.
const SNIFF_WINDOW: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    Datetime,
    Boolean,
    Categorical,
    Text,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Datetime => "datetime",
            ColumnType::Boolean => "boolean",
            ColumnType::Categorical => "categorical",
            ColumnType::Text => "text",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    kind: ColumnType,
    values: Vec<Value>,
}

impl Column {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ColumnType {
        self.kind
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|value| value.is_null()).count()
    }

    pub fn distinct_count(&self) -> usize {
        self.values
            .iter()
            .filter(|value| !value.is_null())
            .map(display_cell)
            .collect::<HashSet<String>>()
            .len()
    }

    pub fn numeric_values(&self) -> Vec<f64> {
        self.values.iter().filter_map(Value::as_f64).collect()
    }
}

/// An in-memory tabular dataset: ordered columns, row-major origin,
/// per-column type classification inferred at load time.
#[derive(Debug, Clone)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetStats {
    pub rows: usize,
    pub columns: usize,
    pub column_names: Vec<String>,
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    pub missing_values: IndexMap<String, usize>,
    pub total_missing: usize,
}

impl Dataset {
    pub fn from_csv_path(path: &Path) -> Result<Self, RecommendError> {
        let metadata = fs::metadata(path)
            .map_err(|err| RecommendError::Dataset(format!("{}: {err}", path.display())))?;
        if metadata.len() > DEFAULT_MAX_FILE_BYTES {
            return Err(RecommendError::Dataset(format!(
                "file too large, maximum size is {} MB",
                DEFAULT_MAX_FILE_BYTES / (1024 * 1024)
            )));
        }
        let bytes = fs::read(path)
            .map_err(|err| RecommendError::Dataset(format!("{}: {err}", path.display())))?;
        Self::from_csv_bytes(&bytes)
    }

    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self, RecommendError> {
        if bytes.len() as u64 > DEFAULT_MAX_FILE_BYTES {
            return Err(RecommendError::Dataset(format!(
                "file too large, maximum size is {} MB",
                DEFAULT_MAX_FILE_BYTES / (1024 * 1024)
            )));
        }
        let text = String::from_utf8_lossy(bytes);
        let separator = detect_separator(&text);
        Self::from_csv_text(&text, separator)
    }

    pub fn from_csv_text(text: &str, separator: u8) -> Result<Self, RecommendError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(separator)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|err| RecommendError::Dataset(format!("CSV parsing error: {err}")))?
            .iter()
            .map(|header| header.trim().to_string())
            .collect();
        if headers.len() < 2 {
            return Err(RecommendError::Dataset(
                "CSV must have at least 2 columns".to_string(),
            ));
        }

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        let mut rows = 0usize;
        for record in reader.records() {
            let record = record
                .map_err(|err| RecommendError::Dataset(format!("CSV parsing error: {err}")))?;
            for (idx, column) in cells.iter_mut().enumerate() {
                column.push(record.get(idx).unwrap_or("").to_string());
            }
            rows += 1;
        }
        if rows == 0 {
            return Err(RecommendError::Dataset("CSV file is empty".to_string()));
        }

        let columns = headers
            .into_iter()
            .zip(cells)
            .map(|(name, raw)| classify_column(name, &raw, rows))
            .collect();
        Ok(Self { columns, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.name.clone()).collect()
    }

    pub fn column_info(&self) -> IndexMap<String, ColumnType> {
        self.columns
            .iter()
            .map(|column| (column.name.clone(), column.kind))
            .collect()
    }

    pub fn numeric_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|column| column.kind.is_numeric())
            .map(|column| column.name.clone())
            .collect()
    }

    pub fn categorical_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|column| matches!(column.kind, ColumnType::Categorical | ColumnType::Text))
            .map(|column| column.name.clone())
            .collect()
    }

    pub fn signature(&self) -> DatasetSignature {
        DatasetSignature {
            columns: self.column_names(),
            rows: self.rows,
            cols: self.columns.len(),
        }
    }

    /// Row objects in column order, suitable for inline chart data.
    pub fn records(&self) -> Vec<Map<String, Value>> {
        (0..self.rows)
            .map(|row| {
                self.columns
                    .iter()
                    .map(|column| (column.name.clone(), column.values[row].clone()))
                    .collect()
            })
            .collect()
    }

    /// Plain-text preview of the first `n` rows, padded per column.
    pub fn sample_preview(&self, n: usize) -> String {
        let shown = n.min(self.rows);
        let widths: Vec<usize> = self
            .columns
            .iter()
            .map(|column| {
                column
                    .values
                    .iter()
                    .take(shown)
                    .map(|value| display_cell(value).len())
                    .chain(std::iter::once(column.name.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut lines = Vec::with_capacity(shown + 1);
        let header = self
            .columns
            .iter()
            .zip(&widths)
            .map(|(column, width)| format!("{:width$}", column.name, width = width))
            .collect::<Vec<String>>()
            .join("  ");
        lines.push(header.trim_end().to_string());
        for row in 0..shown {
            let line = self
                .columns
                .iter()
                .zip(&widths)
                .map(|(column, width)| {
                    format!("{:width$}", display_cell(&column.values[row]), width = width)
                })
                .collect::<Vec<String>>()
                .join("  ");
            lines.push(line.trim_end().to_string());
        }
        lines.join("\n")
    }

    pub fn statistics(&self) -> DatasetStats {
        let missing_values: IndexMap<String, usize> = self
            .columns
            .iter()
            .map(|column| (column.name.clone(), column.missing_count()))
            .collect();
        let total_missing = missing_values.values().sum();
        DatasetStats {
            rows: self.rows,
            columns: self.columns.len(),
            column_names: self.column_names(),
            numeric_columns: self.numeric_columns(),
            categorical_columns: self.categorical_columns(),
            missing_values,
            total_missing,
        }
    }
}

/// Most frequent of `,` `;` tab `|` in the sniff window; comma wins when
/// nothing matches.
pub fn detect_separator(text: &str) -> u8 {
    let window: String = text.chars().take(SNIFF_WINDOW).collect();
    let candidates = [b',', b';', b'\t', b'|'];
    let mut best = b',';
    let mut best_count = 0usize;
    for candidate in candidates {
        let count = window.bytes().filter(|byte| *byte == candidate).count();
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    best
}

fn classify_column(name: String, raw: &[String], rows: usize) -> Column {
    let non_empty: Vec<&str> = raw
        .iter()
        .map(String::as_str)
        .filter(|cell| !cell.is_empty())
        .collect();

    if non_empty.is_empty() {
        return Column {
            name,
            kind: ColumnType::Text,
            values: raw.iter().map(|_| Value::Null).collect(),
        };
    }

    if non_empty.iter().all(|cell| cell.parse::<i64>().is_ok()) {
        let values = raw
            .iter()
            .map(|cell| match cell.parse::<i64>() {
                Ok(parsed) => Value::Number(parsed.into()),
                Err(_) => Value::Null,
            })
            .collect();
        return Column {
            name,
            kind: ColumnType::Integer,
            values,
        };
    }

    if non_empty.iter().all(|cell| parse_float(cell).is_some()) {
        let values = raw
            .iter()
            .map(|cell| match parse_float(cell).and_then(Number::from_f64) {
                Some(number) => Value::Number(number),
                None => Value::Null,
            })
            .collect();
        return Column {
            name,
            kind: ColumnType::Float,
            values,
        };
    }

    if non_empty.iter().all(|cell| parse_bool(cell).is_some()) {
        let values = raw
            .iter()
            .map(|cell| match parse_bool(cell) {
                Some(parsed) => Value::Bool(parsed),
                None => Value::Null,
            })
            .collect();
        return Column {
            name,
            kind: ColumnType::Boolean,
            values,
        };
    }

    if non_empty.iter().all(|cell| is_datetime(cell)) {
        let values = string_values(raw);
        return Column {
            name,
            kind: ColumnType::Datetime,
            values,
        };
    }

    let distinct: HashSet<&str> = non_empty.iter().copied().collect();
    let kind = if (distinct.len() as f64) / (rows as f64) < CATEGORICAL_RATIO {
        ColumnType::Categorical
    } else {
        ColumnType::Text
    };
    Column {
        name,
        kind,
        values: string_values(raw),
    }
}

fn string_values(raw: &[String]) -> Vec<Value> {
    raw.iter()
        .map(|cell| {
            if cell.is_empty() {
                Value::Null
            } else {
                Value::String(cell.clone())
            }
        })
        .collect()
}

fn parse_float(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok().filter(|value| value.is_finite())
}

fn parse_bool(cell: &str) -> Option<bool> {
    if cell.eq_ignore_ascii_case("true") {
        Some(true)
    } else if cell.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn is_datetime(cell: &str) -> bool {
    DateTime::parse_from_rfc3339(cell).is_ok()
        || NaiveDate::parse_from_str(cell, "%Y-%m-%d").is_ok()
}

fn display_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
