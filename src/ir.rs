use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::registry::ChartKind;

// =============================================================================
// Request side
// =============================================================================

/// A geometric slot a chart type binds to a data column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnRole {
    X,
    Y,
    Z,
    Size,
    Color,
}

impl ColumnRole {
    pub const ALL: [ColumnRole; 5] = [
        ColumnRole::X,
        ColumnRole::Y,
        ColumnRole::Z,
        ColumnRole::Size,
        ColumnRole::Color,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnRole::X => "x",
            ColumnRole::Y => "y",
            ColumnRole::Z => "z",
            ColumnRole::Size => "size",
            ColumnRole::Color => "color",
        }
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

impl FromStr for ColumnRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColumnRole::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown column role '{s}'"))
    }
}

/// User selection: a chart type plus named role bindings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChartRequest {
    pub chart_type: String,
    pub bindings: BTreeMap<ColumnRole, String>,
}

impl ChartRequest {
    pub fn new(chart_type: impl Into<String>) -> Self {
        Self {
            chart_type: chart_type.into(),
            bindings: BTreeMap::new(),
        }
    }

    /// Convenience for the common three-axis selection.
    pub fn xyz(
        chart_type: impl Into<String>,
        x: impl Into<String>,
        y: impl Into<String>,
        z: impl Into<String>,
    ) -> Self {
        Self::new(chart_type)
            .bind(ColumnRole::X, x)
            .bind(ColumnRole::Y, y)
            .bind(ColumnRole::Z, z)
    }

    pub fn bind(mut self, role: ColumnRole, column: impl Into<String>) -> Self {
        self.bindings.insert(role, column.into());
        self
    }

    pub fn column_for(&self, role: ColumnRole) -> Option<&str> {
        self.bindings.get(&role).map(String::as_str)
    }
}

// =============================================================================
// Result side
// =============================================================================

/// Z values reshaped onto the cross product of distinct X and Y.
///
/// `z[i][j]` is the value at `(x[j], y[i])`: rows follow Y, columns follow X.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grid {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<Vec<f64>>,
}

impl Grid {
    pub fn shape(&self) -> (usize, usize) {
        (self.y.len(), self.x.len())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "layout", rename_all = "lowercase")]
pub enum Geometry {
    /// Parallel per-row sequences.
    Points { x: Vec<f64>, y: Vec<f64>, z: Vec<f64> },
    /// Pivoted surface grid.
    Grid(Grid),
}

/// How marker or surface color is chosen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", content = "value", rename_all = "lowercase")]
pub enum ColorSpec {
    /// Every mark shares one named color.
    Fixed(String),
    /// Per-row values mapped through the colorscale.
    Mapped(Vec<f64>),
    /// Colored by the geometry's own Z through the colorscale.
    ByValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyleHints {
    pub colorscale: Option<String>,
    pub marker_size: Option<f64>,
    pub opacity: Option<f64>,
    pub show_scale: bool,
    pub radius: Option<f64>,
    pub bins: Option<usize>,
}

impl Default for StyleHints {
    fn default() -> Self {
        Self {
            colorscale: None,
            marker_size: None,
            opacity: None,
            show_scale: true,
            radius: None,
            bins: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Margin {
    pub l: u32,
    pub r: u32,
    pub b: u32,
    pub t: u32,
}

impl Default for Margin {
    fn default() -> Self {
        Self { l: 0, r: 0, b: 0, t: 40 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisTitles {
    pub x: String,
    pub y: String,
    pub z: String,
}

/// The structured chart handed to a rendering surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartDescription {
    pub kind: ChartKind,
    pub title: String,
    pub geometry: Geometry,
    /// Per-row marker sizes, already normalised.
    pub sizes: Option<Vec<f64>>,
    pub color: ColorSpec,
    pub style: StyleHints,
    pub axes: AxisTitles,
    pub margin: Margin,
}
