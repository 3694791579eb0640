use thiserror::Error;

use crate::ir::ColumnRole;

pub type Result<T> = std::result::Result<T, ChartError>;

/// Every way a load or render attempt can fail.
///
/// All variants are terminal for the attempt that produced them; nothing is
/// substituted with a default chart.
#[derive(Debug, Error)]
pub enum ChartError {
    #[error("failed to parse table: {0}")]
    Parse(String),

    #[error("dataset must contain at least {required} numeric columns (found {found})")]
    InsufficientColumns { required: usize, found: usize },

    #[error("unknown chart type '{0}'")]
    UnknownChartType(String),

    #[error("chart '{chart}' requires a column bound to role {role}")]
    MissingRole { chart: String, role: ColumnRole },

    #[error("column '{0}' not found")]
    ColumnNotFound(String),

    #[error("column '{column}' bound to role {role} is not numeric")]
    ColumnNotNumeric { column: String, role: ColumnRole },

    #[error("column '{column}' bound to role {role} has a non-finite value {value} at row {row}")]
    NonFiniteValue {
        column: String,
        role: ColumnRole,
        row: usize,
        value: f64,
    },

    #[error("ambiguous pivot: cell (x={x}, y={y}) has conflicting values {first} and {second}")]
    AmbiguousPivot {
        x: f64,
        y: f64,
        first: f64,
        second: f64,
    },

    #[error("sparse pivot: no row for cell (x={x}, y={y})")]
    SparsePivot { x: f64, y: f64 },

    #[error("cannot scale sizes: maximum value is {max}")]
    DegenerateScale { max: f64 },

    #[error("no rows left after dropping missing values in the selected columns")]
    EmptySelection,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for ChartError {
    fn from(err: csv::Error) -> Self {
        match err.kind() {
            csv::ErrorKind::UnequalLengths {
                pos,
                expected_len,
                len,
            } => {
                let line = pos.as_ref().map(|p| p.line()).unwrap_or_default();
                ChartError::Parse(format!(
                    "row at line {line} has {len} fields, expected {expected_len}"
                ))
            }
            _ => ChartError::Parse(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ChartError {
    fn from(err: serde_json::Error) -> Self {
        ChartError::Parse(err.to_string())
    }
}
