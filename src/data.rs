use serde_json::Value;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

use crate::error::{ChartError, Result};

/// Cell spellings treated as "no value".
pub const MISSING_MARKERS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

pub fn is_missing(raw: &str) -> bool {
    MISSING_MARKERS.contains(&raw.trim())
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Text(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    /// Classify raw cells. A column is numeric only when it has at least one
    /// value and every non-missing cell parses as a float. Any spelling that
    /// parses to NaN (`NAN`, `-nan`) is missing too.
    pub fn from_raw(name: String, cells: Vec<String>) -> Self {
        let parsed: Option<Vec<Option<f64>>> = cells
            .iter()
            .map(|cell| {
                if is_missing(cell) {
                    Some(None)
                } else {
                    cell.trim()
                        .parse::<f64>()
                        .ok()
                        .map(|v| (!v.is_nan()).then_some(v))
                }
            })
            .collect();

        let data = match parsed {
            Some(values) if values.iter().any(Option::is_some) => ColumnData::Numeric(values),
            _ => ColumnData::Text(cells),
        };
        Self { name, data }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.data, ColumnData::Numeric(_))
    }

    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cell rendered back to text; missing numeric cells come out empty.
    pub fn display(&self, row: usize) -> String {
        match &self.data {
            ColumnData::Numeric(v) => v
                .get(row)
                .copied()
                .flatten()
                .map(|n| n.to_string())
                .unwrap_or_default(),
            ColumnData::Text(v) => v.get(row).cloned().unwrap_or_default(),
        }
    }
}

/// An immutable, column-oriented table loaded from one upload.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    /// Build from a header and row-major string cells.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        if headers.is_empty() {
            return Err(ChartError::Parse("input has no header row".to_string()));
        }

        let mut seen = HashSet::new();
        for header in &headers {
            if header.trim().is_empty() {
                return Err(ChartError::Parse("empty column name in header".to_string()));
            }
            if !seen.insert(header.as_str()) {
                return Err(ChartError::Parse(format!(
                    "duplicate column name '{header}'"
                )));
            }
        }

        let width = headers.len();
        let mut cells: Vec<Vec<String>> = vec![Vec::with_capacity(rows.len()); width];
        for (row_idx, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(ChartError::Parse(format!(
                    "row {} has {} fields, expected {}",
                    row_idx + 1,
                    row.len(),
                    width
                )));
            }
            for (col, value) in cells.iter_mut().zip(row) {
                col.push(value);
            }
        }

        let row_count = cells.first().map(Vec::len).unwrap_or(0);
        let columns: Vec<Column> = headers
            .into_iter()
            .zip(cells)
            .map(|(name, raw)| Column::from_raw(name, raw))
            .collect();

        debug!(
            columns = columns.len(),
            rows = row_count,
            numeric = columns.iter().filter(|c| c.is_numeric()).count(),
            "loaded table"
        );

        Ok(Self { columns, row_count })
    }

    /// Parse delimited text with a header row.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Self::new(headers, rows)
    }

    pub fn from_csv_str(text: &str) -> Result<Self> {
        Self::from_reader(text.as_bytes())
    }

    /// Load a file, choosing JSON for a `.json` extension and CSV otherwise.
    pub fn from_path(path: &Path) -> Result<Self> {
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let file = File::open(path)?;
        if is_json {
            let value: Value = serde_json::from_reader(file)?;
            Self::from_json(&value)
        } else {
            Self::from_reader(file)
        }
    }

    /// Create a table from a JSON array of objects.
    pub fn from_json(value: &Value) -> Result<Self> {
        let array = value
            .as_array()
            .ok_or_else(|| ChartError::Parse("input must be a JSON array of objects".to_string()))?;

        let first = array
            .first()
            .ok_or_else(|| ChartError::Parse("input array is empty".to_string()))?
            .as_object()
            .ok_or_else(|| ChartError::Parse("items in array must be objects".to_string()))?;

        let headers: Vec<String> = first.keys().cloned().collect();

        let mut rows = Vec::with_capacity(array.len());
        for item in array {
            let obj = item
                .as_object()
                .ok_or_else(|| ChartError::Parse("items in array must be objects".to_string()))?;

            let mut row = Vec::with_capacity(headers.len());
            for header in &headers {
                let cell = match obj.get(header) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Number(n)) => n.to_string(),
                    Some(Value::Bool(b)) => b.to_string(),
                    Some(Value::Null) | None => String::new(),
                    Some(_) => {
                        return Err(ChartError::Parse(format!(
                            "unsupported value type for field '{header}'"
                        )))
                    }
                };
                row.push(cell);
            }
            rows.push(row);
        }

        Self::new(headers, rows)
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Names of numeric columns, in original order.
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_numeric())
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Values of a numeric column, `None` if absent or not numeric.
    pub fn numeric_values(&self, name: &str) -> Option<&[Option<f64>]> {
        match &self.column(name)?.data {
            ColumnData::Numeric(v) => Some(v),
            ColumnData::Text(_) => None,
        }
    }

    /// First `n` rows as display strings, for previews.
    pub fn head(&self, n: usize) -> Vec<Vec<String>> {
        (0..self.row_count.min(n))
            .map(|row| self.columns.iter().map(|c| c.display(row)).collect())
            .collect()
    }
}
