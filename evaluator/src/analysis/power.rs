use plotters::coord::Shift;
use plotters::prelude::*;
use plotters_backend::DrawingBackend;
use polars::prelude::*;

use crate::grouped_stats::{evaluate_groups, GroupOutcome, GroupResult};
use crate::models::{plot_err, Metric};
use crate::render::{
    build_panel_chart, dash_pattern, draw_patterned_series, save_figure, viridis_color,
    DashPattern, Draw, PANEL_GRID_SIZE, TAB_GRAY,
};

/// Proportion of significant calls at each divergence fraction, ascending.
pub fn power_curve(rows: &DataFrame) -> PolarsResult<Vec<(f64, f64)>> {
    let grouped = rows
        .clone()
        .lazy()
        .group_by([col("pct_div")])
        .agg([col("significance").mean().alias("proportion_significant")])
        .sort(["pct_div"], SortMultipleOptions::default())
        .collect()?;

    let mut points = Vec::with_capacity(grouped.height());
    let xs = grouped.column("pct_div")?.f64()?;
    let ys = grouped.column("proportion_significant")?.f64()?;
    for (x, y) in xs.into_iter().zip(ys.into_iter()) {
        if let (Some(x), Some(y)) = (x, y) {
            points.push((x, y));
        }
    }
    Ok(points)
}

/// Power curves from the SPR simulation: one panel per metric, one curve per
/// tree size, with the 80% power reference line.
pub fn plot_power_curves(power_sim: &DataFrame) -> PolarsResult<()> {
    let results = evaluate_groups(power_sim, |_key, rows| {
        Ok(GroupOutcome::Value(power_curve(rows)?))
    })?;

    let x_max = power_sim
        .column("pct_div")?
        .f64()?
        .max()
        .unwrap_or(0.5)
        .max(0.5);

    let figure = PowerCurvesFigure {
        results,
        x_max: x_max * 1.04,
    };
    save_figure("power_curves", PANEL_GRID_SIZE, &figure)
}

struct PowerCurvesFigure {
    results: Vec<GroupResult<Vec<(f64, f64)>>>,
    x_max: f64,
}

impl Draw for PowerCurvesFigure {
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
                "SPRs / n Leaves",
                "Proportion Significant",
                0.0..self.x_max,
                0.0..1.02,
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

            draw_patterned_series(
                &mut chart,
                vec![(0.0, 0.8), (self.x_max, 0.8)],
                DashPattern::Dashed(6, 4),
                TAB_GRAY.stroke_width(2),
            )?;
            chart
                .draw_series(std::iter::once(Text::new(
                    "80% Power",
                    (self.x_max * 0.01, 0.825),
                    ("sans-serif", 11).into_font().color(&TAB_GRAY),
                )))
                .map_err(plot_err)?;

            if panel_idx == 3 {
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
    fn proportion_is_exact_for_known_counts() {
        let rows = df![
            "pct_div" => &[0.2; 10],
            "significance" => &[1i32, 1, 1, 0, 0, 0, 0, 0, 0, 0]
        ]
        .unwrap();
        assert_eq!(power_curve(&rows).unwrap(), vec![(0.2, 0.3)]);
    }

    #[test]
    fn divergence_levels_come_back_ascending() {
        let rows = df![
            "pct_div" => &[0.4, 0.1, 0.4, 0.1],
            "significance" => &[1i32, 0, 1, 1]
        ]
        .unwrap();
        let curve = power_curve(&rows).unwrap();
        assert_eq!(curve, vec![(0.1, 0.5), (0.4, 1.0)]);
    }
}
