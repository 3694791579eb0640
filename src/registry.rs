use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::error::{ChartError, Result};
use crate::ir::{ChartDescription, ColumnRole};
use crate::renderer::{self, BoundColumns};

const XYZ: &[ColumnRole] = &[ColumnRole::X, ColumnRole::Y, ColumnRole::Z];

/// Chart types on the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Scatter,
    Surface,
    Wireframe,
    Contour,
    Mesh,
    Bubble,
    Bar,
    Histogram,
    Density,
}

impl ChartKind {
    pub fn label(self) -> &'static str {
        match self {
            ChartKind::Scatter => "Scatter Plot",
            ChartKind::Surface => "Surface Plot",
            ChartKind::Wireframe => "Wireframe Plot",
            ChartKind::Contour => "Contour Plot",
            ChartKind::Mesh => "Mesh Plot",
            ChartKind::Bubble => "Bubble Chart",
            ChartKind::Bar => "3D Bar Chart",
            ChartKind::Histogram => "3D Histogram",
            ChartKind::Density => "Density Plot",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            ChartKind::Scatter => "scatter",
            ChartKind::Surface => "surface",
            ChartKind::Wireframe => "wireframe",
            ChartKind::Contour => "contour",
            ChartKind::Mesh => "mesh",
            ChartKind::Bubble => "bubble",
            ChartKind::Bar => "bar",
            ChartKind::Histogram => "histogram",
            ChartKind::Density => "density",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether bound columns reach the renderer as raw rows or as a pivoted grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataLayout {
    Rows,
    Pivot,
}

pub type RenderFn = fn(BoundColumns) -> Result<ChartDescription>;

/// Static descriptor of one chart type.
#[derive(Clone)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub required: &'static [ColumnRole],
    pub optional: &'static [ColumnRole],
    pub layout: DataLayout,
    pub renderer: RenderFn,
}

impl ChartSpec {
    pub fn label(&self) -> &'static str {
        self.kind.label()
    }

    pub fn needs_pivot(&self) -> bool {
        self.layout == DataLayout::Pivot
    }

    pub fn accepts(&self, role: ColumnRole) -> bool {
        self.required.contains(&role) || self.optional.contains(&role)
    }
}

impl fmt::Debug for ChartSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChartSpec")
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

static GLOBAL: Lazy<ChartRegistry> = Lazy::new(ChartRegistry::builtin);

/// Lookup table from chart identifier to its [`ChartSpec`].
///
/// Keys are the menu label and the short slug, matched case-insensitively.
#[derive(Debug)]
pub struct ChartRegistry {
    specs: Vec<ChartSpec>,
    index: HashMap<String, usize>,
}

impl ChartRegistry {
    /// Shared registry, built on first use and read-only afterwards.
    pub fn global() -> &'static ChartRegistry {
        &GLOBAL
    }

    pub fn builtin() -> Self {
        let specs = vec![
            ChartSpec {
                kind: ChartKind::Scatter,
                required: XYZ,
                optional: &[ColumnRole::Color],
                layout: DataLayout::Rows,
                renderer: renderer::describe_scatter,
            },
            ChartSpec {
                kind: ChartKind::Surface,
                required: XYZ,
                optional: &[],
                layout: DataLayout::Pivot,
                renderer: renderer::describe_surface,
            },
            ChartSpec {
                kind: ChartKind::Wireframe,
                required: XYZ,
                optional: &[],
                layout: DataLayout::Pivot,
                renderer: renderer::describe_wireframe,
            },
            ChartSpec {
                kind: ChartKind::Contour,
                required: XYZ,
                optional: &[],
                layout: DataLayout::Rows,
                renderer: renderer::describe_contour,
            },
            ChartSpec {
                kind: ChartKind::Mesh,
                required: XYZ,
                optional: &[],
                layout: DataLayout::Rows,
                renderer: renderer::describe_mesh,
            },
            ChartSpec {
                kind: ChartKind::Bubble,
                required: XYZ,
                optional: &[ColumnRole::Size, ColumnRole::Color],
                layout: DataLayout::Rows,
                renderer: renderer::describe_bubble,
            },
            ChartSpec {
                kind: ChartKind::Bar,
                required: XYZ,
                optional: &[ColumnRole::Color],
                layout: DataLayout::Rows,
                renderer: renderer::describe_bar,
            },
            ChartSpec {
                kind: ChartKind::Histogram,
                required: XYZ,
                optional: &[],
                layout: DataLayout::Rows,
                renderer: renderer::describe_histogram,
            },
            ChartSpec {
                kind: ChartKind::Density,
                required: XYZ,
                optional: &[],
                layout: DataLayout::Rows,
                renderer: renderer::describe_density,
            },
        ];
        Self::from_specs(specs)
    }

    pub fn from_specs(specs: Vec<ChartSpec>) -> Self {
        let mut index = HashMap::with_capacity(specs.len() * 2);
        for (i, spec) in specs.iter().enumerate() {
            index.insert(spec.kind.label().to_lowercase(), i);
            index.insert(spec.kind.slug().to_string(), i);
        }
        debug!(charts = specs.len(), "chart registry initialised");
        Self { specs, index }
    }

    pub fn resolve(&self, chart_type: &str) -> Result<&ChartSpec> {
        self.index
            .get(&chart_type.trim().to_lowercase())
            .map(|&i| &self.specs[i])
            .ok_or_else(|| ChartError::UnknownChartType(chart_type.to_string()))
    }

    /// Menu labels in display order.
    pub fn menu(&self) -> Vec<&'static str> {
        self.specs.iter().map(ChartSpec::label).collect()
    }

    pub fn specs(&self) -> &[ChartSpec] {
        &self.specs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_order() {
        let menu = ChartRegistry::global().menu();
        assert_eq!(
            menu,
            vec![
                "Scatter Plot",
                "Surface Plot",
                "Wireframe Plot",
                "Contour Plot",
                "Mesh Plot",
                "Bubble Chart",
                "3D Bar Chart",
                "3D Histogram",
                "Density Plot",
            ]
        );
    }

    #[test]
    fn test_resolve_by_label_and_slug() {
        let registry = ChartRegistry::global();
        assert_eq!(registry.resolve("Surface Plot").unwrap().kind, ChartKind::Surface);
        assert_eq!(registry.resolve("surface").unwrap().kind, ChartKind::Surface);
        assert_eq!(registry.resolve("  3d bar chart ").unwrap().kind, ChartKind::Bar);
    }

    #[test]
    fn test_resolve_unknown() {
        let err = ChartRegistry::global().resolve("Tesseract Plot").unwrap_err();
        assert!(matches!(err, ChartError::UnknownChartType(ref name) if name == "Tesseract Plot"));
    }

    #[test]
    fn test_pivot_flags() {
        let registry = ChartRegistry::global();
        let pivoted: Vec<ChartKind> = registry
            .specs()
            .iter()
            .filter(|s| s.needs_pivot())
            .map(|s| s.kind)
            .collect();
        assert_eq!(pivoted, vec![ChartKind::Surface, ChartKind::Wireframe]);
    }

    #[test]
    fn test_every_chart_requires_xyz() {
        for spec in ChartRegistry::global().specs() {
            assert_eq!(spec.required, XYZ, "{}", spec.label());
        }
    }

    #[test]
    fn test_optional_roles() {
        let bubble = ChartRegistry::global().resolve("bubble").unwrap();
        assert!(bubble.accepts(ColumnRole::Size));
        assert!(bubble.accepts(ColumnRole::Color));
        let surface = ChartRegistry::global().resolve("surface").unwrap();
        assert!(!surface.accepts(ColumnRole::Size));
    }

    #[test]
    fn test_registry_shared_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| ChartRegistry::global().resolve("mesh").map(|s| s.kind).ok()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), Some(ChartKind::Mesh));
        }
    }
}
