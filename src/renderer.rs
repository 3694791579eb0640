use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

use crate::data::Table;
use crate::error::{ChartError, Result};
use crate::ir::{
    AxisTitles, ChartDescription, ChartRequest, ColorSpec, ColumnRole, Geometry, Margin,
    StyleHints,
};
use crate::pivot::pivot;
use crate::registry::{ChartKind, ChartRegistry};
use crate::scale::{normalize_sizes, BUBBLE_SIZE_MAX};

/// Fewest numeric columns a table needs before any chart can be drawn.
pub const MIN_NUMERIC_COLUMNS: usize = 3;

const VIRIDIS: &str = "Viridis";
const SCATTER_MARKER_SIZE: f64 = 5.0;
const DENSITY_RADIUS: f64 = 10.0;
const HISTOGRAM_BINS: usize = 10;

/// Columns bound to a chart's roles, with incomplete rows removed and the
/// layout (rows or pivoted grid) already applied.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundColumns {
    pub kind: ChartKind,
    pub axes: AxisTitles,
    pub geometry: Geometry,
    pub size: Option<Vec<f64>>,
    pub color: Option<Vec<f64>>,
}

impl BoundColumns {
    fn describe(
        self,
        color: ColorSpec,
        style: StyleHints,
        sizes: Option<Vec<f64>>,
    ) -> ChartDescription {
        ChartDescription {
            kind: self.kind,
            title: self.kind.label().to_string(),
            geometry: self.geometry,
            sizes,
            color,
            style,
            axes: self.axes,
            margin: Margin::default(),
        }
    }

    fn row_z(&self) -> &[f64] {
        match &self.geometry {
            Geometry::Points { z, .. } => z,
            Geometry::Grid(_) => &[],
        }
    }

    fn take_color(&mut self) -> ColorSpec {
        self.color
            .take()
            .map(ColorSpec::Mapped)
            .unwrap_or(ColorSpec::ByValue)
    }
}

/// Render a request against the shared registry.
pub fn render(table: &Table, request: &ChartRequest) -> Result<ChartDescription> {
    render_with(ChartRegistry::global(), table, request)
}

pub fn render_with(
    registry: &ChartRegistry,
    table: &Table,
    request: &ChartRequest,
) -> Result<ChartDescription> {
    let found = table.numeric_columns().len();
    if found < MIN_NUMERIC_COLUMNS {
        return Err(ChartError::InsufficientColumns {
            required: MIN_NUMERIC_COLUMNS,
            found,
        });
    }

    let spec = registry.resolve(&request.chart_type)?;
    debug!(chart = spec.label(), "resolved chart type");

    for &role in spec.required {
        if request.column_for(role).is_none() {
            return Err(ChartError::MissingRole {
                chart: spec.label().to_string(),
                role,
            });
        }
    }

    let mut sources: BTreeMap<ColumnRole, &[Option<f64>]> = BTreeMap::new();
    for (&role, column) in &request.bindings {
        if !spec.accepts(role) {
            warn!(chart = spec.label(), %role, column = %column, "ignoring role not used by chart");
            continue;
        }
        let values = table.numeric_values(column).ok_or_else(|| {
            if table.column(column).is_some() {
                ChartError::ColumnNotNumeric {
                    column: column.clone(),
                    role,
                }
            } else {
                ChartError::ColumnNotFound(column.clone())
            }
        })?;
        trace!(%role, column = %column, "bound column");
        sources.insert(role, values);
    }

    let complete: Vec<usize> = (0..table.row_count())
        .filter(|&row| sources.values().all(|values| values[row].is_some()))
        .collect();
    let dropped = table.row_count() - complete.len();
    if dropped > 0 {
        debug!(dropped, "dropped rows with missing values");
    }
    if complete.is_empty() {
        return Err(ChartError::EmptySelection);
    }
    for (&role, values) in &sources {
        let bad = complete
            .iter()
            .find_map(|&row| values[row].filter(|v| !v.is_finite()).map(|v| (row, v)));
        if let Some((row, value)) = bad {
            return Err(ChartError::NonFiniteValue {
                column: request.column_for(role).unwrap_or_default().to_string(),
                role,
                row,
                value,
            });
        }
    }

    let take = |role: ColumnRole| -> Option<Vec<f64>> {
        sources
            .get(&role)
            .map(|values| complete.iter().filter_map(|&row| values[row]).collect())
    };
    let require = |role: ColumnRole| -> Result<Vec<f64>> {
        take(role).ok_or_else(|| ChartError::MissingRole {
            chart: spec.label().to_string(),
            role,
        })
    };

    let x = require(ColumnRole::X)?;
    let y = require(ColumnRole::Y)?;
    let z = require(ColumnRole::Z)?;

    let geometry = if spec.needs_pivot() {
        Geometry::Grid(pivot(&x, &y, &z)?)
    } else {
        Geometry::Points { x, y, z }
    };

    let title_of = |role: ColumnRole| request.column_for(role).unwrap_or_default().to_string();
    let bound = BoundColumns {
        kind: spec.kind,
        axes: AxisTitles {
            x: title_of(ColumnRole::X),
            y: title_of(ColumnRole::Y),
            z: title_of(ColumnRole::Z),
        },
        geometry,
        size: take(ColumnRole::Size),
        color: take(ColumnRole::Color),
    };

    (spec.renderer)(bound)
}

// =============================================================================
// Per-chart descriptions
// =============================================================================

pub fn describe_scatter(mut bound: BoundColumns) -> Result<ChartDescription> {
    let color = bound.take_color();
    let style = StyleHints {
        colorscale: Some(VIRIDIS.to_string()),
        marker_size: Some(SCATTER_MARKER_SIZE),
        ..StyleHints::default()
    };
    Ok(bound.describe(color, style, None))
}

pub fn describe_surface(bound: BoundColumns) -> Result<ChartDescription> {
    Ok(bound.describe(ColorSpec::ByValue, StyleHints::default(), None))
}

pub fn describe_wireframe(bound: BoundColumns) -> Result<ChartDescription> {
    let style = StyleHints {
        colorscale: Some("gray".to_string()),
        opacity: Some(0.5),
        show_scale: false,
        ..StyleHints::default()
    };
    Ok(bound.describe(ColorSpec::ByValue, style, None))
}

pub fn describe_contour(bound: BoundColumns) -> Result<ChartDescription> {
    let style = StyleHints {
        colorscale: Some(VIRIDIS.to_string()),
        ..StyleHints::default()
    };
    Ok(bound.describe(ColorSpec::ByValue, style, None))
}

pub fn describe_mesh(bound: BoundColumns) -> Result<ChartDescription> {
    let style = StyleHints {
        opacity: Some(0.5),
        ..StyleHints::default()
    };
    Ok(bound.describe(ColorSpec::Fixed("lightblue".to_string()), style, None))
}

/// Marker size follows SIZE when bound, otherwise Z.
pub fn describe_bubble(mut bound: BoundColumns) -> Result<ChartDescription> {
    let sizes = match bound.size.take() {
        Some(size) => normalize_sizes(&size, BUBBLE_SIZE_MAX)?,
        None => normalize_sizes(bound.row_z(), BUBBLE_SIZE_MAX)?,
    };
    let color = bound.take_color();
    let style = StyleHints {
        colorscale: Some(VIRIDIS.to_string()),
        ..StyleHints::default()
    };
    Ok(bound.describe(color, style, Some(sizes)))
}

pub fn describe_bar(mut bound: BoundColumns) -> Result<ChartDescription> {
    let color = bound.take_color();
    let style = StyleHints {
        colorscale: Some(VIRIDIS.to_string()),
        ..StyleHints::default()
    };
    Ok(bound.describe(color, style, None))
}

pub fn describe_histogram(bound: BoundColumns) -> Result<ChartDescription> {
    let style = StyleHints {
        colorscale: Some(VIRIDIS.to_string()),
        bins: Some(HISTOGRAM_BINS),
        ..StyleHints::default()
    };
    Ok(bound.describe(ColorSpec::ByValue, style, None))
}

/// X and Y are read as latitude and longitude, Z as intensity.
pub fn describe_density(bound: BoundColumns) -> Result<ChartDescription> {
    let style = StyleHints {
        colorscale: Some(VIRIDIS.to_string()),
        radius: Some(DENSITY_RADIUS),
        ..StyleHints::default()
    };
    Ok(bound.describe(ColorSpec::ByValue, style, None))
}
