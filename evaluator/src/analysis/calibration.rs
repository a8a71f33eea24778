use plotters::coord::Shift;
use plotters::prelude::*;
use plotters_backend::DrawingBackend;
use polars::prelude::*;

use crate::grouped_stats::{evaluate_groups, GroupOutcome, GroupResult};
use crate::models::{plot_err, Metric};
use crate::render::{
    build_panel_chart, dash_pattern, draw_patterned_series, save_figure, viridis_color,
    DashPattern, Draw, PANEL_GRID_SIZE,
};

/// Empirical CDF as explicit step coordinates, anchored at (0, 0) and (1, 1)
/// so the flat tails reach the panel edges.
pub fn ecdf_points(sample: &[f64]) -> Vec<(f64, f64)> {
    let mut sorted = sample.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len() as f64;

    let mut points = Vec::with_capacity(sorted.len() * 2 + 2);
    points.push((0.0, 0.0));
    for (i, &x) in sorted.iter().enumerate() {
        points.push((x, i as f64 / n));
        points.push((x, (i as f64 + 1.0) / n));
    }
    points.push((1.0, 1.0));
    points
}

/// If the p-values are calibrated, every ECDF hugs the diagonal. One panel
/// per metric, one step curve per tree size.
pub fn plot_error_ecdfs(null_pairs: &DataFrame) -> PolarsResult<()> {
    let results = evaluate_groups(null_pairs, |_key, rows| {
        let p: Vec<f64> = rows.column("p")?.f64()?.into_no_null_iter().collect();
        Ok(GroupOutcome::Value(ecdf_points(&p)))
    })?;

    let figure = ErrorEcdfFigure { results };
    save_figure("error_ecdfs", PANEL_GRID_SIZE, &figure)
}

struct ErrorEcdfFigure {
    results: Vec<GroupResult<Vec<(f64, f64)>>>,
}

impl Draw for ErrorEcdfFigure {
    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> PolarsResult<()> {
        root.fill(&WHITE).map_err(plot_err)?;
        let panels = root.split_evenly((2, 4));

        for (panel_idx, metric) in Metric::ALL.iter().enumerate() {
            let series: Vec<(i64, &Vec<(f64, f64)>)> = self
                .results
                .iter()
                .filter(|r| r.key.metric == *metric)
                .filter_map(|r| match &r.outcome {
                    GroupOutcome::Value(points) => Some((r.key.tree_size, points)),
                    GroupOutcome::Skipped(_) => None,
                })
                .collect();

            let mut chart = build_panel_chart(
                &panels[panel_idx],
                panel_idx,
                metric.as_str(),
                "P(Null >= Observed)",
                "Cumulative Proportion",
                0.0..1.0,
                0.0..1.0,
            )?;

            let n = series.len();
            for (j, &(tree_size, points)) in series.iter().enumerate() {
                let colour = viridis_color(j, n);
                let anno = draw_patterned_series(
                    &mut chart,
                    points.clone(),
                    dash_pattern(j),
                    colour.stroke_width(2),
                )?;
                if panel_idx == 3 {
                    anno.label(format!("{}", tree_size)).legend(move |(x, y)| {
                        PathElement::new(vec![(x, y), (x + 20, y)], colour.stroke_width(3))
                    });
                }
            }

            let diagonal = draw_patterned_series(
                &mut chart,
                vec![(0.0, 0.0), (1.0, 1.0)],
                DashPattern::Dashed(8, 5),
                BLACK.stroke_width(3),
            )?;
            if panel_idx == 3 {
                diagonal.label("Expected: F(P) = P").legend(|(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], BLACK.stroke_width(3))
                });
                chart
                    .configure_series_labels()
                    .background_style(WHITE.mix(0.8))
                    .border_style(&BLACK)
                    .label_font(("sans-serif", 12))
                    .position(SeriesLabelPosition::LowerRight)
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
    fn steps_are_anchored_and_exact() {
        let points = ecdf_points(&[0.75, 0.25]);
        assert_eq!(
            points,
            vec![
                (0.0, 0.0),
                (0.25, 0.0),
                (0.25, 0.5),
                (0.75, 0.5),
                (0.75, 1.0),
                (1.0, 1.0)
            ]
        );
    }

    #[test]
    fn steps_never_decrease() {
        let points = ecdf_points(&[0.9, 0.1, 0.5, 0.5, 0.2]);
        for pair in points.windows(2) {
            assert!(pair[1].0 >= pair[0].0);
            assert!(pair[1].1 >= pair[0].1);
        }
    }
}
