use ndarray::Array1;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters_backend::DrawingBackend;
use polars::prelude::*;

use crate::logistic_fit::expit;
use crate::models::{plot_err, Metric};
use crate::render::{
    build_panel_chart, draw_patterned_series, save_figure, viridis_color, DashPattern, Draw,
    PANEL_GRID_SIZE, TAB_GRAY,
};

pub const SIZES: [i64; 7] = [5, 10, 20, 40, 60, 80, 100];

type FitCell = Option<(f64, f64)>;

// (intercept, slope) per metric and tree size, lifted from the
// power-simulation logistic fits. Cells without a stable fit stay None and
// are drawn as a flat zero line.
const POWER_FITS: [[FitCell; 7]; 8] = [
    // RF
    [None, None, None, None, None, None, None],
    // ICRF
    [
        None,
        None,
        Some((-9.8933, 11.0120)),
        Some((-11.1307, 17.1234)),
        Some((-9.0681, 11.3525)),
        Some((-10.2190, 12.0841)),
        Some((-9.2381, 10.3768)),
    ],
    // JRF
    [
        None,
        Some((-102.7691, 111.5063)),
        Some((-84.8484, 94.0039)),
        Some((-44.2672, 50.1590)),
        Some((-33.6336, 41.7099)),
        Some((-23.4646, 26.7147)),
        Some((-24.0605, 30.7602)),
    ],
    // NS
    [
        Some((-32.1354, 28.4341)),
        Some((-48.3070, 87.0383)),
        Some((-48.1304, 84.1187)),
        Some((-33.0505, 57.6112)),
        Some((-23.0839, 34.0898)),
        Some((-17.2369, 25.4592)),
        Some((-20.6019, 27.0331)),
    ],
    // MCI
    [
        None,
        Some((-57.9179, 108.8080)),
        Some((-63.8108, 116.8081)),
        Some((-51.2984, 72.8831)),
        Some((-80.8385, 131.9994)),
        Some((-57.4355, 83.1211)),
        Some((-52.8209, 80.1754)),
    ],
    // SPI
    [
        Some((-43.3586, 38.9518)),
        Some((-49.0206, 89.8005)),
        Some((-62.9976, 136.3855)),
        Some((-63.0061, 99.8518)),
        Some((-42.7417, 77.6178)),
        Some((-47.9057, 67.8887)),
        Some((-28.4679, 45.5794)),
    ],
    // MSD
    [
        None,
        Some((-36.1453, 41.8630)),
        Some((-16.5307, 22.2469)),
        Some((-13.1179, 17.6936)),
        Some((-11.1956, 13.8335)),
        Some((-9.7185, 11.7608)),
        Some((-10.6702, 12.9323)),
    ],
    // MSID
    [
        None,
        Some((-43.4658, 55.1396)),
        Some((-24.1900, 27.6694)),
        Some((-16.9594, 24.4382)),
        Some((-10.3124, 12.9644)),
        Some((-12.9686, 17.3113)),
        Some((-10.5698, 11.8186)),
    ],
];

// every size keeps its own line style, so seven distinct patterns
fn dash_for(idx: usize) -> DashPattern {
    match idx {
        0 => DashPattern::Solid,
        1 => DashPattern::Dashed(10, 6),
        2 => DashPattern::Dashed(6, 4),
        3 => DashPattern::Dashed(2, 4),
        4 => DashPattern::Dashed(8, 3),
        5 => DashPattern::Dashed(5, 5),
        _ => DashPattern::Dashed(3, 2),
    }
}

fn curve_points(intercept: f64, slope: f64) -> Vec<(f64, f64)> {
    Array1::linspace(0.0, 1.0, 100)
        .iter()
        .map(|&x| (x, expit(intercept + slope * x)))
        .collect()
}

/// Fitted probability of significance against scaled congruence, per metric
/// and tree size.
pub fn plot_power_logistics() -> PolarsResult<()> {
    save_figure("power_logistics", PANEL_GRID_SIZE, &PowerLogisticsFigure)
}

struct PowerLogisticsFigure;

impl Draw for PowerLogisticsFigure {
    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> PolarsResult<()> {
        root.fill(&WHITE).map_err(plot_err)?;
        let panels = root.split_evenly((2, 4));

        for (panel_idx, metric) in Metric::ALL.iter().enumerate() {
            let mut chart = build_panel_chart(
                &panels[panel_idx],
                panel_idx,
                metric.as_str(),
                "Scaled Congruence",
                "Estimated P(significant), alpha = 0.05",
                0.0..1.0,
                -0.025..1.025,
            )?;

            // solid references at 80% power and high congruence
            chart
                .draw_series(LineSeries::new(
                    vec![(0.0, 0.8), (1.0, 0.8)],
                    TAB_GRAY.stroke_width(2),
                ))
                .map_err(plot_err)?;
            chart
                .draw_series(LineSeries::new(
                    vec![(0.8, -0.025), (0.8, 1.025)],
                    TAB_GRAY.stroke_width(2),
                ))
                .map_err(plot_err)?;

            for (j, &tree_size) in SIZES.iter().enumerate() {
                let colour = viridis_color(j, SIZES.len());
                let points = match POWER_FITS[metric.index()][j] {
                    Some((intercept, slope)) => curve_points(intercept, slope),
                    None => vec![(0.0, 0.0), (1.0, 0.0)],
                };
                let anno =
                    draw_patterned_series(&mut chart, points, dash_for(j), colour.stroke_width(3))?;
                if panel_idx == 3 {
                    anno.label(format!("{}", tree_size)).legend(move |(x, y)| {
                        PathElement::new(vec![(x, y), (x + 20, y)], colour.stroke_width(3))
                    });
                }
            }

            if panel_idx == 3 {
                chart
                    .configure_series_labels()
                    .background_style(WHITE.mix(0.8))
                    .border_style(&BLACK)
                    .label_font(("sans-serif", 12))
                    .position(SeriesLabelPosition::UpperLeft)
                    .draw()
                    .map_err(plot_err)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curves_follow_the_logistic_shape() {
        let points = curve_points(-10.0, 20.0);
        assert_eq!(points.len(), 100);
        assert!((points[0].1 - expit(-10.0)).abs() < 1e-12);
        assert!((points[99].1 - expit(10.0)).abs() < 1e-12);
        for pair in points.windows(2) {
            assert!(pair[1].1 >= pair[0].1);
        }
    }

    #[test]
    fn fit_table_covers_every_metric_and_size() {
        for row in POWER_FITS.iter() {
            assert_eq!(row.len(), SIZES.len());
        }
        // RF never reached a stable fit at any size
        assert!(POWER_FITS[Metric::Rf.index()].iter().all(|c| c.is_none()));
        // every tabled fit has a rising curve
        for row in POWER_FITS.iter() {
            for cell in row.iter().flatten() {
                assert!(cell.1 > 0.0);
            }
        }
    }

    #[test]
    fn line_styles_are_distinct_per_size() {
        for i in 0..SIZES.len() {
            for j in (i + 1)..SIZES.len() {
                assert_ne!(dash_for(i), dash_for(j));
            }
        }
    }
}
