use anyhow::{Context, Result};
use image::ImageEncoder;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::ops::Range;

use crate::ir::{ChartDescription, ColorSpec, Geometry, Grid};
use crate::registry::ChartKind;
use crate::scale::{axis_range, bin2d, extent, unit_position};
use crate::{OutputFormat, RenderOptions};

type P3 = (f64, f64, f64);

/// Largest canvas accepted, in pixels (about 300 MB of RGB).
pub const MAX_IMAGE_PIXELS: usize = 100_000_000;

/// Everything drawn into a 3D panel. Plot space is (x, vertical, depth) with
/// data Z on the vertical axis and data Y going into the screen.
#[derive(Default)]
struct Scene3d {
    x_range: Range<f64>,
    v_range: Range<f64>,
    d_range: Range<f64>,
    circles: Vec<Circle<P3, i32>>,
    polygons: Vec<Polygon<P3>>,
    paths: Vec<PathElement<P3>>,
    cuboids: Vec<Cubiod<f64, f64, f64>>,
}

#[derive(Default)]
struct Scene2d {
    x_range: Range<f64>,
    y_range: Range<f64>,
    circles: Vec<Circle<(f64, f64), i32>>,
}

enum Scene {
    Flat(Scene2d),
    Space(Scene3d),
}

/// Draw a chart description and encode it in the requested format.
pub fn render_description(chart: &ChartDescription, options: &RenderOptions) -> Result<Vec<u8>> {
    image_buffer_len(options)?;
    let scene = build_scene(chart);
    match options.format {
        OutputFormat::Png => render_png(chart, scene, options),
        OutputFormat::Svg => render_svg(chart, scene, options).map(String::into_bytes),
    }
}

/// RGB buffer length for the canvas, rejecting empty or oversized images.
fn image_buffer_len(options: &RenderOptions) -> Result<usize> {
    let (width, height) = (options.width as usize, options.height as usize);
    if width == 0 || height == 0 {
        anyhow::bail!("Invalid image size {}x{}", options.width, options.height);
    }
    match width.checked_mul(height) {
        Some(pixels) if pixels <= MAX_IMAGE_PIXELS => Ok(pixels * 3),
        _ => anyhow::bail!(
            "Image size {}x{} exceeds the limit of {} pixels",
            options.width,
            options.height,
            MAX_IMAGE_PIXELS
        ),
    }
}

fn render_png(chart: &ChartDescription, scene: Scene, options: &RenderOptions) -> Result<Vec<u8>> {
    let mut buffer = vec![0u8; image_buffer_len(options)?];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (options.width, options.height))
            .into_drawing_area();
        draw(&root, chart, scene)?;
        root.present().context("Failed to present drawing")?;
    }

    let mut png_bytes = Vec::new();
    {
        let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
        encoder
            .write_image(&buffer, options.width, options.height, image::ColorType::Rgb8)
            .context("Failed to encode PNG")?;
    }

    Ok(png_bytes)
}

fn render_svg(chart: &ChartDescription, scene: Scene, options: &RenderOptions) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        draw(&root, chart, scene)?;
        root.present().context("Failed to present drawing")?;
    }
    Ok(svg)
}

fn draw<DB>(root: &DrawingArea<DB, Shift>, chart: &ChartDescription, scene: Scene) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: std::error::Error + Send + Sync + 'static,
{
    root.fill(&WHITE).context("Failed to fill background")?;

    match scene {
        Scene::Flat(flat) => {
            let mut ctx = ChartBuilder::on(root)
                .margin(10)
                .margin_top(chart.margin.t as i32)
                .caption(&chart.title, ("sans-serif", 20))
                .x_label_area_size(40)
                .y_label_area_size(50)
                .build_cartesian_2d(flat.x_range.clone(), flat.y_range.clone())
                .context("Failed to build chart")?;

            ctx.configure_mesh()
                .x_desc(&chart.axes.x)
                .y_desc(&chart.axes.y)
                .draw()
                .context("Failed to draw mesh")?;

            ctx.draw_series(flat.circles)
                .context("Failed to draw markers")?;
        }
        Scene::Space(space) => {
            let caption = format!(
                "{} ({} / {} / {})",
                chart.title, chart.axes.x, chart.axes.y, chart.axes.z
            );
            let mut ctx = ChartBuilder::on(root)
                .margin(10)
                .margin_top(chart.margin.t as i32)
                .caption(caption, ("sans-serif", 20))
                .build_cartesian_3d(
                    space.x_range.clone(),
                    space.v_range.clone(),
                    space.d_range.clone(),
                )
                .context("Failed to build chart")?;

            ctx.with_projection(|mut pb| {
                pb.yaw = 0.6;
                pb.pitch = 0.35;
                pb.scale = 0.8;
                pb.into_matrix()
            });

            ctx.configure_axes()
                .draw()
                .context("Failed to draw axes")?;

            if !space.polygons.is_empty() {
                ctx.draw_series(space.polygons)
                    .context("Failed to draw surface")?;
            }
            if !space.cuboids.is_empty() {
                ctx.draw_series(space.cuboids)
                    .context("Failed to draw bars")?;
            }
            if !space.paths.is_empty() {
                ctx.draw_series(space.paths)
                    .context("Failed to draw lines")?;
            }
            if !space.circles.is_empty() {
                ctx.draw_series(space.circles)
                    .context("Failed to draw markers")?;
            }
        }
    }

    Ok(())
}

// =============================================================================
// Scene construction
// =============================================================================

fn build_scene(chart: &ChartDescription) -> Scene {
    match &chart.geometry {
        Geometry::Grid(grid) => Scene::Space(grid_scene(chart, grid)),
        Geometry::Points { x, y, z } => match chart.kind {
            ChartKind::Contour | ChartKind::Density => Scene::Flat(flat_scene(chart, x, y, z)),
            ChartKind::Bar => Scene::Space(bar_scene(chart, x, y, z)),
            ChartKind::Histogram => Scene::Space(histogram_scene(chart, x, y, z)),
            ChartKind::Mesh => Scene::Space(mesh_scene(chart, x, y, z)),
            _ => Scene::Space(marker_scene(chart, x, y, z)),
        },
    }
}

/// Per-row color for point geometries.
fn point_colors(chart: &ChartDescription, z: &[f64]) -> Vec<RGBColor> {
    let scale = chart.style.colorscale.as_deref();
    match &chart.color {
        ColorSpec::Fixed(name) => vec![parse_color(name); z.len()],
        ColorSpec::Mapped(values) => map_values(scale, values),
        ColorSpec::ByValue => map_values(scale, z),
    }
}

fn map_values(scale: Option<&str>, values: &[f64]) -> Vec<RGBColor> {
    let (lo, hi) = extent(values).unwrap_or((0.0, 1.0));
    values
        .iter()
        .map(|&v| colorscale(scale, unit_position(v, lo, hi)))
        .collect()
}

fn marker_scene(chart: &ChartDescription, x: &[f64], y: &[f64], z: &[f64]) -> Scene3d {
    let colors = point_colors(chart, z);
    let alpha = chart.style.opacity.unwrap_or(if chart.sizes.is_some() { 0.8 } else { 1.0 });
    let default_size = chart.style.marker_size.unwrap_or(5.0);

    let circles = (0..x.len())
        .map(|i| {
            let size = chart
                .sizes
                .as_ref()
                .and_then(|s| s.get(i).copied())
                .unwrap_or(default_size);
            Circle::new(
                (x[i], z[i], y[i]),
                size.round().max(1.0) as i32,
                colors[i].mix(alpha).filled(),
            )
        })
        .collect();

    Scene3d {
        x_range: axis_range(x),
        v_range: axis_range(z),
        d_range: axis_range(y),
        circles,
        ..Scene3d::default()
    }
}

fn mesh_scene(chart: &ChartDescription, x: &[f64], y: &[f64], z: &[f64]) -> Scene3d {
    let colors = point_colors(chart, z);
    let alpha = chart.style.opacity.unwrap_or(1.0);
    let points: Vec<P3> = (0..x.len()).map(|i| (x[i], z[i], y[i])).collect();
    let line_color = colors.first().copied().unwrap_or(BLUE);

    let circles = points
        .iter()
        .zip(&colors)
        .map(|(&p, c)| Circle::new(p, 3, c.mix(alpha).filled()))
        .collect();

    Scene3d {
        x_range: axis_range(x),
        v_range: axis_range(z),
        d_range: axis_range(y),
        circles,
        paths: vec![PathElement::new(points, line_color.mix(alpha).stroke_width(1))],
        ..Scene3d::default()
    }
}

fn grid_scene(chart: &ChartDescription, grid: &Grid) -> Scene3d {
    let flat: Vec<f64> = grid.z.iter().flatten().copied().collect();
    let (lo, hi) = extent(&flat).unwrap_or((0.0, 1.0));
    let scale = chart.style.colorscale.as_deref();
    let alpha = chart.style.opacity.unwrap_or(1.0);
    let wire = chart.kind == ChartKind::Wireframe;

    let mut polygons = Vec::new();
    let mut paths = Vec::new();
    let mut circles = Vec::new();

    let (rows, cols) = grid.shape();
    if rows < 2 || cols < 2 {
        for (i, row) in grid.z.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                let color = colorscale(scale, unit_position(v, lo, hi));
                circles.push(Circle::new((grid.x[j], v, grid.y[i]), 4, color.mix(alpha).filled()));
            }
        }
    } else {
        for i in 0..rows - 1 {
            for j in 0..cols - 1 {
                let corners = vec![
                    (grid.x[j], grid.z[i][j], grid.y[i]),
                    (grid.x[j + 1], grid.z[i][j + 1], grid.y[i]),
                    (grid.x[j + 1], grid.z[i + 1][j + 1], grid.y[i + 1]),
                    (grid.x[j], grid.z[i + 1][j], grid.y[i + 1]),
                ];
                let mean = corners.iter().map(|c| c.1).sum::<f64>() / 4.0;
                let color = colorscale(scale, unit_position(mean, lo, hi));
                if wire {
                    let mut outline = corners;
                    outline.push(outline[0]);
                    paths.push(PathElement::new(outline, color.mix(alpha).stroke_width(1)));
                } else {
                    polygons.push(Polygon::new(corners, color.mix(alpha).filled()));
                }
            }
        }
    }

    Scene3d {
        x_range: axis_range(&grid.x),
        v_range: axis_range(&flat),
        d_range: axis_range(&grid.y),
        circles,
        polygons,
        paths,
        ..Scene3d::default()
    }
}

/// Bars and histogram columns rise from zero (or the lowest value, if below).
fn floor_range(values: &[f64]) -> Range<f64> {
    let (lo, hi) = extent(values).unwrap_or((0.0, 1.0));
    axis_range(&[lo.min(0.0), hi.max(0.0)])
}

fn bar_scene(chart: &ChartDescription, x: &[f64], y: &[f64], z: &[f64]) -> Scene3d {
    let colors = point_colors(chart, z);
    let alpha = chart.style.opacity.unwrap_or(1.0);
    let x_range = axis_range(x);
    let d_range = axis_range(y);
    let half_w = (x_range.end - x_range.start) * 0.02;
    let half_d = (d_range.end - d_range.start) * 0.02;

    let cuboids = (0..x.len())
        .map(|i| {
            Cubiod::new(
                [
                    (x[i] - half_w, 0.0, y[i] - half_d),
                    (x[i] + half_w, z[i], y[i] + half_d),
                ],
                colors[i].mix(alpha).filled(),
                BLACK.mix(0.3).stroke_width(1),
            )
        })
        .collect();

    Scene3d {
        x_range,
        v_range: floor_range(z),
        d_range,
        cuboids,
        ..Scene3d::default()
    }
}

fn histogram_scene(chart: &ChartDescription, x: &[f64], y: &[f64], z: &[f64]) -> Scene3d {
    let bins = bin2d(x, y, z, chart.style.bins.unwrap_or(10));
    let sums: Vec<f64> = bins.sums.iter().flatten().copied().collect();
    let (lo, hi) = extent(&sums).unwrap_or((0.0, 1.0));
    let scale = chart.style.colorscale.as_deref();

    let mut cuboids = Vec::new();
    for (i, row) in bins.sums.iter().enumerate() {
        for (j, &sum) in row.iter().enumerate() {
            if sum == 0.0 {
                continue;
            }
            let color = colorscale(scale, unit_position(sum, lo, hi));
            cuboids.push(Cubiod::new(
                [
                    (bins.x_edges[j], 0.0, bins.y_edges[i]),
                    (bins.x_edges[j + 1], sum, bins.y_edges[i + 1]),
                ],
                color.filled(),
                BLACK.mix(0.3).stroke_width(1),
            ));
        }
    }

    Scene3d {
        x_range: axis_range(&bins.x_edges),
        v_range: floor_range(&sums),
        d_range: axis_range(&bins.y_edges),
        cuboids,
        ..Scene3d::default()
    }
}

/// Contour and density charts are drawn flat, as heat markers on X/Y.
fn flat_scene(chart: &ChartDescription, x: &[f64], y: &[f64], z: &[f64]) -> Scene2d {
    let colors = point_colors(chart, z);
    let (radius, alpha) = match chart.kind {
        ChartKind::Density => (chart.style.radius.unwrap_or(10.0), 0.5),
        _ => (6.0, chart.style.opacity.unwrap_or(1.0)),
    };

    let circles = (0..x.len())
        .map(|i| Circle::new((x[i], y[i]), radius as i32, colors[i].mix(alpha).filled()))
        .collect();

    Scene2d {
        x_range: axis_range(x),
        y_range: axis_range(y),
        circles,
    }
}

// =============================================================================
// Colors
// =============================================================================

const VIRIDIS_STOPS: [(u8, u8, u8); 5] = [
    (68, 1, 84),
    (59, 82, 139),
    (33, 145, 140),
    (94, 201, 98),
    (253, 231, 37),
];

const GRAY_STOPS: [(u8, u8, u8); 2] = [(0, 0, 0), (255, 255, 255)];

/// Sample a named colorscale at `t` in `0..=1`. Unknown names fall back to Viridis.
pub fn colorscale(name: Option<&str>, t: f64) -> RGBColor {
    let stops: &[(u8, u8, u8)] = match name.map(str::to_ascii_lowercase).as_deref() {
        Some("gray") | Some("grey") | Some("greys") => &GRAY_STOPS,
        _ => &VIRIDIS_STOPS,
    };

    let t = t.clamp(0.0, 1.0) * (stops.len() - 1) as f64;
    let i = (t.floor() as usize).min(stops.len() - 2);
    let f = t - i as f64;
    let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * f).round() as u8;
    let (a, b) = (stops[i], stops[i + 1]);
    RGBColor(lerp(a.0, b.0), lerp(a.1, b.1), lerp(a.2, b.2))
}

/// Parse color name to RGBColor
fn parse_color(color: &str) -> RGBColor {
    match color.to_ascii_lowercase().as_str() {
        "red" => RED,
        "green" => GREEN,
        "blue" => BLUE,
        "black" => BLACK,
        "yellow" => YELLOW,
        "cyan" => CYAN,
        "magenta" => MAGENTA,
        "white" => WHITE,
        "lightblue" => RGBColor(173, 216, 230),
        "gray" | "grey" => RGBColor(128, 128, 128),
        _ => BLUE, // default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Table;
    use crate::ir::ChartRequest;
    use crate::registry::ChartRegistry;
    use crate::renderer::render;

    const PNG_MAGIC: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

    fn table() -> Table {
        Table::from_csv_str("x,y,z\n0,0,1\n1,0,2\n0,1,3\n1,1,4\n").unwrap()
    }

    #[test]
    fn test_colorscale_endpoints() {
        assert_eq!(colorscale(Some("Viridis"), 0.0), RGBColor(68, 1, 84));
        assert_eq!(colorscale(None, 1.0), RGBColor(253, 231, 37));
        assert_eq!(colorscale(Some("gray"), 0.5), RGBColor(128, 128, 128));
        assert_eq!(colorscale(Some("gray"), 7.0), RGBColor(255, 255, 255));
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("lightblue"), RGBColor(173, 216, 230));
        assert_eq!(parse_color("Red"), RED);
        assert_eq!(parse_color("unknown"), BLUE);
    }

    #[test]
    fn test_surface_scene_has_one_polygon_per_cell() {
        let chart = render(&table(), &ChartRequest::xyz("surface", "x", "y", "z")).unwrap();
        match build_scene(&chart) {
            Scene::Space(space) => {
                assert_eq!(space.polygons.len(), 1);
                assert!(space.paths.is_empty());
            }
            Scene::Flat(_) => panic!("surface must be drawn in 3D"),
        }
    }

    #[test]
    fn test_wireframe_scene_uses_outlines() {
        let chart = render(&table(), &ChartRequest::xyz("wireframe", "x", "y", "z")).unwrap();
        match build_scene(&chart) {
            Scene::Space(space) => {
                assert_eq!(space.paths.len(), 1);
                assert!(space.polygons.is_empty());
            }
            Scene::Flat(_) => panic!("wireframe must be drawn in 3D"),
        }
    }

    #[test]
    fn test_density_is_flat() {
        let chart = render(&table(), &ChartRequest::xyz("density", "x", "y", "z")).unwrap();
        assert!(matches!(build_scene(&chart), Scene::Flat(ref s) if s.circles.len() == 4));
    }

    #[test]
    fn test_png_output_for_every_chart() {
        let options = RenderOptions {
            width: 320,
            height: 240,
            format: OutputFormat::Png,
        };
        for label in ChartRegistry::global().menu() {
            let chart = render(&table(), &ChartRequest::xyz(label, "x", "y", "z")).unwrap();
            let bytes = render_description(&chart, &options).unwrap();
            assert_eq!(&bytes[0..8], &PNG_MAGIC, "{label}");
        }
    }

    #[test]
    fn test_svg_output() {
        let options = RenderOptions {
            format: OutputFormat::Svg,
            ..RenderOptions::default()
        };
        let chart = render(&table(), &ChartRequest::xyz("scatter", "x", "y", "z")).unwrap();
        let bytes = render_description(&chart, &options).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("<svg"));
    }

    #[test]
    fn test_zero_size_rejected() {
        let options = RenderOptions {
            width: 0,
            ..RenderOptions::default()
        };
        let chart = render(&table(), &ChartRequest::xyz("scatter", "x", "y", "z")).unwrap();
        assert!(render_description(&chart, &options).is_err());
    }

    #[test]
    fn test_oversized_image_rejected() {
        let chart = render(&table(), &ChartRequest::xyz("scatter", "x", "y", "z")).unwrap();
        for format in [OutputFormat::Png, OutputFormat::Svg] {
            let options = RenderOptions {
                width: 70_000,
                height: 70_000,
                format,
            };
            let err = render_description(&chart, &options).unwrap_err();
            assert!(err.to_string().contains("exceeds the limit"), "{err}");
        }
        let at_limit = RenderOptions {
            width: 10_000,
            height: 10_000,
            format: OutputFormat::Png,
        };
        assert_eq!(image_buffer_len(&at_limit).unwrap(), 300_000_000);
    }
}
