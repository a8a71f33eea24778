use plotters::chart::SeriesAnno;
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::CoordTranslate;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::series::DashedLineSeries;
use plotters::style::colors::colormaps::ViridisRGB;
use plotters_backend::DrawingBackend;
use plotters_bitmap::BitMapBackend;
use plotters_svg::SVGBackend;
use polars::prelude::*;
use std::fs;
use std::ops::Range;
use tracing::info;

use crate::models::{plot_err, polars_err};

pub const FIGURE_DIR: &str = "./figures";

/// Canvas for the two-row, four-column metric grids.
pub const PANEL_GRID_SIZE: (u32, u32) = (1800, 900);

pub const TAB_GRAY: RGBColor = RGBColor(127, 127, 127);

pub fn ensure_figure_dir() -> PolarsResult<()> {
    fs::create_dir_all(FIGURE_DIR).map_err(|e| polars_err(Box::new(e)))
}

/// A figure described once and rendered through any backend.
pub trait Draw {
    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> PolarsResult<()>;
}

/// Renders `figure` to `<name>.png` and `<name>.svg` under [`FIGURE_DIR`].
pub fn save_figure(name: &str, size: (u32, u32), figure: &impl Draw) -> PolarsResult<()> {
    let png_path = format!("{}/{}.png", FIGURE_DIR, name);
    let svg_path = format!("{}/{}.svg", FIGURE_DIR, name);

    let root = BitMapBackend::new(&png_path, size).into_drawing_area();
    figure.draw(&root)?;
    root.present().map_err(plot_err)?;

    let root = SVGBackend::new(&svg_path, size).into_drawing_area();
    figure.draw(&root)?;
    root.present().map_err(plot_err)?;

    info!("Figure saved to: {} and {}", png_path, svg_path);
    Ok(())
}

/// Continuous viridis ramp.
pub fn viridis_at(t: f64) -> RGBColor {
    ViridisRGB::get_color(t.clamp(0.0, 1.0))
}

/// Colour for series `idx` when `n` series share one panel, spread evenly
/// across the ramp.
pub fn viridis_color(idx: usize, n: usize) -> RGBColor {
    if n <= 1 {
        return viridis_at(0.0);
    }
    viridis_at(idx as f64 / (n - 1) as f64)
}

/// Line cycle matching the solid/dashed/dash-dot/dotted rotation of the
/// simulation figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashPattern {
    Solid,
    Dashed(i32, i32),
}

pub fn dash_pattern(idx: usize) -> DashPattern {
    match idx % 4 {
        0 => DashPattern::Solid,
        1 => DashPattern::Dashed(10, 6),
        2 => DashPattern::Dashed(6, 4),
        _ => DashPattern::Dashed(2, 4),
    }
}

pub fn draw_patterned_series<'b, 'a, DB, CT>(
    chart: &'b mut ChartContext<'a, DB, CT>,
    points: Vec<(f64, f64)>,
    pattern: DashPattern,
    style: ShapeStyle,
) -> PolarsResult<&'b mut SeriesAnno<'a, DB>>
where
    DB: DrawingBackend,
    CT: CoordTranslate<From = (f64, f64)>,
{
    let anno = match pattern {
        DashPattern::Solid => chart
            .draw_series(LineSeries::new(points, style))
            .map_err(plot_err)?,
        DashPattern::Dashed(size, spacing) => chart
            .draw_series(DashedLineSeries::new(points, size, spacing, style))
            .map_err(plot_err)?,
    };
    Ok(anno)
}

/// One panel of a metric grid: caption on every panel, axis descriptions only
/// on the outer edge the way the composite figures label them.
pub fn build_panel_chart<'a, DB: DrawingBackend>(
    panel: &'a DrawingArea<DB, Shift>,
    panel_idx: usize,
    caption: &str,
    x_desc: &str,
    y_desc: &str,
    x_range: Range<f64>,
    y_range: Range<f64>,
) -> PolarsResult<ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>> {
    let mut chart = ChartBuilder::on(panel)
        .caption(caption, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(48)
        .build_cartesian_2d(x_range, y_range)
        .map_err(plot_err)?;

    let x_desc = if panel_idx >= 4 { x_desc } else { "" };
    let y_desc = if panel_idx % 4 == 0 { y_desc } else { "" };
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(x_desc)
        .y_desc(y_desc)
        .axis_desc_style(("sans-serif", 13))
        .label_style(("sans-serif", 12))
        .draw()
        .map_err(plot_err)?;

    Ok(chart)
}
