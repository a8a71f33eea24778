use ndarray::Array1;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters_backend::DrawingBackend;
use polars::prelude::*;
use tracing::info;

use crate::models::plot_err;
use crate::render::{save_figure, viridis_color, Draw};

const SATURATION_FIGURE_SIZE: (u32, u32) = (900, 650);

/// Least-squares fit of y = a(1 - e^(-bx)) by damped Gauss-Newton, started
/// from a = max(y), b = 0.1.
pub fn fit_saturating(xs: &[f64], ys: &[f64]) -> PolarsResult<(f64, f64)> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return Err(PolarsError::ComputeError(
            "saturating fit needs at least two matched samples".into(),
        ));
    }

    let mut a = ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !a.is_finite() || a <= 0.0 {
        a = 1.0;
    }
    let mut b = 0.1;

    let sse = |a: f64, b: f64| -> f64 {
        xs.iter()
            .zip(ys)
            .map(|(&x, &y)| {
                let r = y - a * (1.0 - (-b * x).exp());
                r * r
            })
            .sum()
    };

    let mut current = sse(a, b);
    for _ in 0..200 {
        let (mut jtj00, mut jtj01, mut jtj11) = (0.0, 0.0, 0.0);
        let (mut jtr0, mut jtr1) = (0.0, 0.0);
        for (&x, &y) in xs.iter().zip(ys) {
            let decay = (-b * x).exp();
            let residual = y - a * (1.0 - decay);
            let ja = 1.0 - decay;
            let jb = a * x * decay;
            jtj00 += ja * ja;
            jtj01 += ja * jb;
            jtj11 += jb * jb;
            jtr0 += ja * residual;
            jtr1 += jb * residual;
        }

        let det = jtj00 * jtj11 - jtj01 * jtj01;
        if !det.is_finite() || det.abs() < 1e-12 {
            return Err(PolarsError::ComputeError(
                "singular normal equations in saturating fit".into(),
            ));
        }
        let mut da = (jtj11 * jtr0 - jtj01 * jtr1) / det;
        let mut db = (jtj00 * jtr1 - jtj01 * jtr0) / det;

        // halve the step until it stops overshooting
        let mut halvings = 0;
        while halvings < 12 && sse(a + da, b + db) > current {
            da *= 0.5;
            db *= 0.5;
            halvings += 1;
        }

        a += da;
        b += db;
        let next = sse(a, b);
        if (current - next).abs() <= 1e-12 * current.max(1.0) {
            break;
        }
        current = next;
    }
    Ok((a, b))
}

/// Normalized difference between neutral assemblies against tree size, with
/// the fitted saturation curve overlaid.
pub fn plot_null_neutral_agreement(neutral_pairs: &DataFrame) -> PolarsResult<()> {
    let sizes = neutral_pairs.column("tree.size")?.i64()?;
    let diffs = neutral_pairs.column("norm.diff")?.f64()?;
    let mut points = Vec::with_capacity(neutral_pairs.height());
    for (size, diff) in sizes.into_iter().zip(diffs.into_iter()) {
        if let (Some(size), Some(diff)) = (size, diff) {
            points.push((size as f64, diff));
        }
    }

    let xs: Vec<f64> = points.iter().map(|&(x, _)| x).collect();
    let ys: Vec<f64> = points.iter().map(|&(_, y)| y).collect();
    let (a, b) = fit_saturating(&xs, &ys)?;
    info!("Neutral saturation fit: a = {:.4}, b = {:.4}", a, b);

    let x_lo = xs.iter().cloned().fold(f64::INFINITY, f64::min);
    let x_hi = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let curve: Vec<(f64, f64)> = Array1::linspace(x_lo, x_hi, 200)
        .iter()
        .map(|&x| (x, a * (1.0 - (-b * x).exp())))
        .collect();

    let y_max = ys.iter().cloned().fold(0.0f64, f64::max);
    let figure = SaturationFigure {
        points,
        curve,
        y_max: (y_max * 1.1).max(0.1),
    };
    save_figure("null_neutral_agreement", SATURATION_FIGURE_SIZE, &figure)
}

struct SaturationFigure {
    points: Vec<(f64, f64)>,
    curve: Vec<(f64, f64)>,
    y_max: f64,
}

impl Draw for SaturationFigure {
    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> PolarsResult<()> {
        root.fill(&WHITE).map_err(plot_err)?;

        let mut chart = ChartBuilder::on(root)
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(55)
            .build_cartesian_2d(0.0..105.0, 0.0..self.y_max)
            .map_err(plot_err)?;

        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc("n Leaves")
            .y_desc("Norm. difference (D*)")
            .axis_desc_style(("sans-serif", 16))
            .label_style(("sans-serif", 14))
            .draw()
            .map_err(plot_err)?;

        let scatter_colour = viridis_color(0, 7);
        chart
            .draw_series(
                self.points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 3, scatter_colour.mix(0.25).filled())),
            )
            .map_err(plot_err)?
            .label("Neutral pairs")
            .legend(move |(x, y)| Circle::new((x + 10, y), 3, scatter_colour.filled()));

        chart
            .draw_series(LineSeries::new(self.curve.clone(), BLACK.stroke_width(2)))
            .map_err(plot_err)?
            .label("a(1 - exp(-b n))")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK.stroke_width(3)));

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(&BLACK)
            .label_font(("sans-serif", 14))
            .position(SeriesLabelPosition::LowerRight)
            .draw()
            .map_err(plot_err)?;
        Ok(())
    }
}
