use plotters::coord::Shift;
use plotters::prelude::*;
use plotters_backend::DrawingBackend;
use polars::prelude::*;

use crate::grouped_stats::{evaluate_groups, GroupOutcome, GroupResult, SkipReason};
use crate::models::{plot_err, Metric};
use crate::render::{
    dash_pattern, draw_patterned_series, save_figure, viridis_color, Draw, PANEL_GRID_SIZE,
};

/// Spread of repeated p-value estimates per permutation count: the standard
/// deviation over draws within each replicate pair, then averaged over pairs.
pub fn plot_p_stabilization(variance_runs: &DataFrame) -> PolarsResult<()> {
    let spread = variance_runs
        .clone()
        .lazy()
        .group_by([
            col("metric"),
            col("tree.size"),
            col("replicate.pair"),
            col("iterations"),
        ])
        .agg([col("p").std(1).alias("stdev_p")])
        .group_by([col("metric"), col("tree.size"), col("iterations")])
        .agg([col("stdev_p").mean().alias("stdev_p")])
        .sort(["iterations"], SortMultipleOptions::default())
        .collect()?;

    let results = evaluate_groups(&spread, |_key, rows| {
        let iterations = rows.column("iterations")?.i64()?;
        let stdevs = rows.column("stdev_p")?.f64()?;
        let mut points = Vec::with_capacity(rows.height());
        for (iteration, stdev) in iterations.into_iter().zip(stdevs.into_iter()) {
            if let (Some(iteration), Some(stdev)) = (iteration, stdev) {
                points.push((iteration as f64, stdev));
            }
        }
        if points.is_empty() {
            return Ok(GroupOutcome::Skipped(SkipReason::EmptyGroup));
        }
        Ok(GroupOutcome::Value(points))
    })?;

    let x_min = (spread.column("iterations")?.i64()?.min().unwrap_or(10) as f64).max(1.0);
    let x_max = spread.column("iterations")?.i64()?.max().unwrap_or(10_000) as f64;
    let y_max = spread.column("stdev_p")?.f64()?.max().unwrap_or(0.1);

    let figure = StabilizationFigure {
        results,
        x_range: (x_min * 0.8, x_max * 1.25),
        y_max: y_max * 1.1,
    };
    save_figure("p_stabilization", PANEL_GRID_SIZE, &figure)
}

struct StabilizationFigure {
    results: Vec<GroupResult<Vec<(f64, f64)>>>,
    x_range: (f64, f64),
    y_max: f64,
}

impl Draw for StabilizationFigure {
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

            let mut chart = ChartBuilder::on(&panels[panel_idx])
                .caption(metric.as_str(), ("sans-serif", 20))
                .margin(10)
                .x_label_area_size(40)
                .y_label_area_size(48)
                .build_cartesian_2d(
                    (self.x_range.0..self.x_range.1).log_scale(),
                    0.0..self.y_max,
                )
                .map_err(plot_err)?;

            let x_desc = if panel_idx >= 4 { "Iterations" } else { "" };
            let y_desc = if panel_idx % 4 == 0 {
                "s.d. of P(Null >= Observed)"
            } else {
                ""
            };
            chart
                .configure_mesh()
                .disable_mesh()
                .x_desc(x_desc)
                .y_desc(y_desc)
                .axis_desc_style(("sans-serif", 13))
                .label_style(("sans-serif", 12))
                .draw()
                .map_err(plot_err)?;

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

            if panel_idx == 3 {
                chart
                    .configure_series_labels()
                    .background_style(WHITE.mix(0.8))
                    .border_style(&BLACK)
                    .label_font(("sans-serif", 12))
                    .position(SeriesLabelPosition::UpperRight)
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
    fn spread_averages_over_replicate_pairs() {
        // two pairs at 100 iterations: sd([0.1, 0.3]) and sd([0.5, 0.5])
        let runs = df![
            "metric" => &["RF", "RF", "RF", "RF"],
            "tree.size" => &[5i64, 5, 5, 5],
            "replicate.pair" => &[1i64, 1, 2, 2],
            "iterations" => &[100i64, 100, 100, 100],
            "p" => &[0.1, 0.3, 0.5, 0.5]
        ]
        .unwrap();

        let spread = runs
            .lazy()
            .group_by([
                col("metric"),
                col("tree.size"),
                col("replicate.pair"),
                col("iterations"),
            ])
            .agg([col("p").std(1).alias("stdev_p")])
            .group_by([col("metric"), col("tree.size"), col("iterations")])
            .agg([col("stdev_p").mean().alias("stdev_p")])
            .collect()
            .unwrap();

        assert_eq!(spread.height(), 1);
        let stdev = spread
            .column("stdev_p")
            .unwrap()
            .f64()
            .unwrap()
            .get(0)
            .unwrap();
        let expected = 0.02f64.sqrt() / 2.0;
        assert!((stdev - expected).abs() < 1e-12);
    }
}
