use plotters::coord::Shift;
use plotters::prelude::*;
use plotters_backend::DrawingBackend;
use polars::prelude::*;
use tracing::info;

use crate::data_handling::sensitivity::{SensitivityData, SensitivityRun};
use crate::models::{plot_err, Metric};
use crate::render::{
    build_panel_chart, draw_patterned_series, save_figure, viridis_at, DashPattern, Draw,
    PANEL_GRID_SIZE, TAB_GRAY,
};

/// Index-wise mean trajectory over replicates, truncated to the shortest run.
pub fn mean_trajectory(runs: &[SensitivityRun]) -> Vec<(f64, f64)> {
    let len = runs
        .iter()
        .map(|run| run.prop_div.len().min(run.integrated_p.len()))
        .min()
        .unwrap_or(0);
    let mut points = Vec::with_capacity(len);
    for i in 0..len {
        let x = runs[0].prop_div[i];
        let y = runs.iter().map(|run| run.integrated_p[i]).sum::<f64>() / runs.len() as f64;
        points.push((x, y));
    }
    points
}

// the source panels pick three widely spaced viridis stops per size
fn size_colour(idx: usize) -> RGBColor {
    viridis_at(((2 + 2 * idx) as f64 / 6.0).min(1.0))
}

fn size_pattern(idx: usize) -> DashPattern {
    match idx {
        0 => DashPattern::Solid,
        1 => DashPattern::Dashed(10, 6),
        _ => DashPattern::Dashed(4, 3),
    }
}

/// Integrated p-values along the divergence grid: every replicate as a faint
/// trace, the replicate mean as a bold line, per metric and tree size.
pub fn plot_sensitivity(data: &SensitivityData) -> PolarsResult<()> {
    for metric in Metric::ALL {
        if !data.contains_key(metric.as_str()) {
            info!("Skipping sensitivity panel for {}: no replicates", metric);
        }
    }

    let x_max = data
        .values()
        .flat_map(|groups| groups.iter())
        .flat_map(|(_, runs)| runs.iter())
        .flat_map(|run| run.prop_div.iter().copied())
        .fold(0.0f64, f64::max);

    let figure = SensitivityFigure {
        data,
        x_max: (x_max * 1.04).max(0.1),
    };
    save_figure("sensitivity", PANEL_GRID_SIZE, &figure)
}

struct SensitivityFigure<'a> {
    data: &'a SensitivityData,
    x_max: f64,
}

impl Draw for SensitivityFigure<'_> {
    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> PolarsResult<()> {
        root.fill(&WHITE).map_err(plot_err)?;
        let panels = root.split_evenly((2, 4));

        for (panel_idx, metric) in Metric::ALL.iter().enumerate() {
            let mut chart = build_panel_chart(
                &panels[panel_idx],
                panel_idx,
                metric.as_str(),
                "SPRs / n Leaves",
                "Integrated P(Null >= Obs.)",
                0.0..self.x_max,
                0.0..1.02,
            )?;

            draw_patterned_series(
                &mut chart,
                vec![(0.0, 0.05), (self.x_max, 0.05)],
                DashPattern::Dashed(6, 4),
                TAB_GRAY.stroke_width(2),
            )?;
            chart
                .draw_series(std::iter::once(Text::new(
                    "alpha = 0.05",
                    (self.x_max * 0.01, 0.06),
                    ("sans-serif", 11).into_font().color(&TAB_GRAY),
                )))
                .map_err(plot_err)?;

            let groups = match self.data.get(metric.as_str()) {
                Some(groups) => groups,
                None => continue,
            };

            for (j, (tree_size, runs)) in groups.iter().enumerate() {
                let colour = size_colour(j);
                for run in runs {
                    let trace: Vec<(f64, f64)> = run
                        .prop_div
                        .iter()
                        .zip(run.integrated_p.iter())
                        .map(|(&x, &y)| (x, y))
                        .collect();
                    chart
                        .draw_series(LineSeries::new(trace, colour.mix(0.3).stroke_width(1)))
                        .map_err(plot_err)?;
                }

                let anno = draw_patterned_series(
                    &mut chart,
                    mean_trajectory(runs),
                    size_pattern(j),
                    colour.stroke_width(3),
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
    fn mean_trajectory_averages_replicates() {
        let runs = vec![
            SensitivityRun {
                integrated_p: vec![0.6, 0.2, 0.1],
                prop_div: vec![0.0, 0.1, 0.2],
            },
            SensitivityRun {
                integrated_p: vec![0.4, 0.4],
                prop_div: vec![0.0, 0.1],
            },
        ];
        // truncated to the shorter replicate
        let mean = mean_trajectory(&runs);
        assert_eq!(mean.len(), 2);
        assert_eq!(mean[0], (0.0, 0.5));
        assert!((mean[1].0 - 0.1).abs() < 1e-12);
        assert!((mean[1].1 - 0.3).abs() < 1e-12);
    }

    #[test]
    fn mean_trajectory_of_nothing_is_empty() {
        assert!(mean_trajectory(&[]).is_empty());
    }

    #[test]
    fn size_colours_stay_within_the_ramp() {
        assert_eq!(size_colour(0), viridis_at(2.0 / 6.0));
        assert_eq!(size_colour(2), viridis_at(1.0));
        // extra sizes clamp instead of running off the ramp
        assert_eq!(size_colour(3), viridis_at(1.0));
    }
}
