use plotters::coord::Shift;
use plotters::prelude::*;
use plotters_backend::DrawingBackend;
use polars::prelude::*;
use std::fs::File;
use std::io::Write;
use tracing::info;

use crate::grouped_stats::{
    evaluate_groups, group_frame, GroupOutcome, GroupResult, SkipReason,
};
use crate::models::{plot_err, polars_err, Metric};
use crate::render::{
    build_panel_chart, dash_pattern, draw_patterned_series, save_figure, viridis_color,
    DashPattern, Draw, FIGURE_DIR, PANEL_GRID_SIZE, TAB_GRAY,
};

pub struct RocCurve {
    pub fprs: Vec<f64>,
    pub tprs: Vec<f64>,
    pub auc: f64,
}

/// ROC swept threshold-descending. Tied scores collapse into a single step so
/// an uninformative scorer integrates to exactly 0.5.
pub fn compute_roc(scores: &[f64], labels: &[bool]) -> RocCurve {
    let total_pos = labels.iter().filter(|&&label| label).count() as f64;
    let total_neg = labels.len() as f64 - total_pos;

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut fprs = vec![0.0];
    let mut tprs = vec![0.0];
    let mut auc = 0.0;
    let (mut tp, mut fp) = (0.0, 0.0);
    let (mut prev_fpr, mut prev_tpr) = (0.0, 0.0);

    let mut i = 0;
    while i < order.len() {
        let threshold = scores[order[i]];
        // consume the whole block of tied scores before emitting a point
        while i < order.len() && scores[order[i]] == threshold {
            if labels[order[i]] {
                tp += 1.0;
            } else {
                fp += 1.0;
            }
            i += 1;
        }
        let fpr = if total_neg > 0.0 { fp / total_neg } else { 0.0 };
        let tpr = if total_pos > 0.0 { tp / total_pos } else { 0.0 };
        auc += (fpr - prev_fpr) * (tpr + prev_tpr) / 2.0;
        fprs.push(fpr);
        tprs.push(tpr);
        prev_fpr = fpr;
        prev_tpr = tpr;
    }

    RocCurve { fprs, tprs, auc }
}

/// Discrimination between null and SPR-diverged pairs. Null rows are the
/// negatives, power-simulation rows the positives, and low p-values should
/// rank positives first.
pub fn plot_roc_curves(null_pairs: &DataFrame, power_sim: &DataFrame) -> PolarsResult<()> {
    let results = evaluate_groups(null_pairs, |key, null_rows| {
        let alt_rows = group_frame(power_sim, key)?;
        if alt_rows.height() == 0 {
            return Ok(GroupOutcome::Skipped(SkipReason::EmptyGroup));
        }

        let null_p = null_rows.column("p")?.f64()?;
        let alt_p = alt_rows.column("p")?.f64()?;
        let mut scores = Vec::with_capacity(null_rows.height() + alt_rows.height());
        let mut labels = Vec::with_capacity(null_rows.height() + alt_rows.height());
        for p in null_p.into_no_null_iter() {
            scores.push(-p);
            labels.push(false);
        }
        for p in alt_p.into_no_null_iter() {
            scores.push(-p);
            labels.push(true);
        }
        Ok(GroupOutcome::Value(compute_roc(&scores, &labels)))
    })?;

    for result in &results {
        match &result.outcome {
            GroupOutcome::Value(curve) => {
                info!("ROC {}: AUC = {:.3}", result.key, curve.auc);
            }
            GroupOutcome::Skipped(reason) => {
                info!("Skipping ROC {}: {}", result.key, reason);
            }
        }
    }

    let figure = RocCurvesFigure { results };
    save_figure("roc_curves", PANEL_GRID_SIZE, &figure)?;

    let by_size = AucBySizeFigure::from_results(&figure.results);
    save_figure("auc_roc_curves", PANEL_GRID_SIZE, &by_size)?;

    let path = format!("{}/auc_values.csv", FIGURE_DIR);
    save_auc_values(&figure.results, &path)?;
    Ok(())
}

struct RocCurvesFigure {
    results: Vec<GroupResult<RocCurve>>,
}

impl Draw for RocCurvesFigure {
    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> PolarsResult<()> {
        root.fill(&WHITE).map_err(plot_err)?;
        let panels = root.split_evenly((2, 4));

        for (panel_idx, metric) in Metric::ALL.iter().enumerate() {
            let series: Vec<(i64, &RocCurve)> = self
                .results
                .iter()
                .filter(|r| r.key.metric == *metric)
                .filter_map(|r| match &r.outcome {
                    GroupOutcome::Value(curve) => Some((r.key.tree_size, curve)),
                    GroupOutcome::Skipped(_) => None,
                })
                .collect();

            let mut chart = build_panel_chart(
                &panels[panel_idx],
                panel_idx,
                metric.as_str(),
                "False Positive Rate",
                "True Positive Rate",
                0.0..1.0,
                0.0..1.0,
            )?;

            // chance line underneath the curves
            draw_patterned_series(
                &mut chart,
                vec![(0.0, 0.0), (1.0, 1.0)],
                DashPattern::Dashed(6, 4),
                TAB_GRAY.stroke_width(2),
            )?;

            let n = series.len();
            for (j, &(tree_size, curve)) in series.iter().enumerate() {
                let colour = viridis_color(j, n);
                let points: Vec<(f64, f64)> = curve
                    .fprs
                    .iter()
                    .zip(curve.tprs.iter())
                    .map(|(&x, &y)| (x, y))
                    .collect();
                let anno = draw_patterned_series(
                    &mut chart,
                    points,
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
                    .position(SeriesLabelPosition::LowerRight)
                    .draw()
                    .map_err(plot_err)?;
            }
        }
        Ok(())
    }
}

struct AucBySizeFigure {
    per_metric: Vec<(Metric, Vec<(f64, f64)>)>,
}

impl AucBySizeFigure {
    fn from_results(results: &[GroupResult<RocCurve>]) -> Self {
        let per_metric = Metric::ALL
            .iter()
            .map(|&metric| {
                let points = results
                    .iter()
                    .filter(|r| r.key.metric == metric)
                    .filter_map(|r| match &r.outcome {
                        GroupOutcome::Value(curve) => {
                            Some((r.key.tree_size as f64, curve.auc))
                        }
                        GroupOutcome::Skipped(_) => None,
                    })
                    .collect();
                (metric, points)
            })
            .collect();
        Self { per_metric }
    }
}

impl Draw for AucBySizeFigure {
    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> PolarsResult<()> {
        root.fill(&WHITE).map_err(plot_err)?;
        let panels = root.split_evenly((2, 4));

        for (panel_idx, (metric, points)) in self.per_metric.iter().enumerate() {
            let mut chart = build_panel_chart(
                &panels[panel_idx],
                panel_idx,
                metric.as_str(),
                "n Leaves",
                "AUC",
                0.0..105.0,
                0.0..1.05,
            )?;

            draw_patterned_series(
                &mut chart,
                vec![(0.0, 0.5), (105.0, 0.5)],
                DashPattern::Dashed(6, 4),
                TAB_GRAY.stroke_width(2),
            )?;
            chart
                .draw_series(std::iter::once(Text::new(
                    "Non-discriminative line",
                    (27.5, 0.525),
                    ("sans-serif", 11).into_font().color(&TAB_GRAY),
                )))
                .map_err(plot_err)?;

            // NS keeps its black line from the composite figure
            let colour = if *metric == Metric::Ns {
                BLACK
            } else {
                viridis_color(0, 7)
            };
            chart
                .draw_series(LineSeries::new(points.clone(), colour.stroke_width(2)))
                .map_err(plot_err)?;
        }
        Ok(())
    }
}

fn save_auc_values(results: &[GroupResult<RocCurve>], path: &str) -> PolarsResult<()> {
    let mut file = File::create(path).map_err(|e| polars_err(Box::new(e)))?;
    writeln!(file, "metric,tree.size,auc").map_err(|e| polars_err(Box::new(e)))?;
    for result in results {
        if let GroupOutcome::Value(curve) = &result.outcome {
            writeln!(
                file,
                "{},{},{:.5}",
                result.key.metric, result.key.tree_size, curve.auc
            )
            .map_err(|e| polars_err(Box::new(e)))?;
        }
    }
    info!("AUC values saved to: {}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separable_scores_reach_full_auc() {
        let scores = [-0.01, -0.01, -0.8, -0.9];
        let labels = [true, true, false, false];
        let curve = compute_roc(&scores, &labels);
        assert_eq!(curve.auc, 1.0);
        assert_eq!(curve.fprs.first(), Some(&0.0));
        assert_eq!(curve.fprs.last(), Some(&1.0));
        assert_eq!(curve.tprs.last(), Some(&1.0));
    }

    #[test]
    fn indistinguishable_scores_sit_on_the_chance_line() {
        let scores = [-0.5, -0.5, -0.5, -0.5];
        let labels = [true, false, true, false];
        let curve = compute_roc(&scores, &labels);
        // all scores tie, so the sweep is a single diagonal step
        assert_eq!(curve.fprs, vec![0.0, 1.0]);
        assert_eq!(curve.tprs, vec![0.0, 1.0]);
        assert_eq!(curve.auc, 0.5);
    }

    #[test]
    fn reversed_scores_invert_the_curve() {
        let scores = [-0.9, -0.8, -0.1, -0.05];
        let labels = [true, true, false, false];
        let curve = compute_roc(&scores, &labels);
        assert_eq!(curve.auc, 0.0);
    }

    #[test]
    fn mixed_scores_integrate_between_bounds() {
        let scores = [-0.01, -0.3, -0.2, -0.9];
        let labels = [true, false, true, false];
        let curve = compute_roc(&scores, &labels);
        assert!(curve.auc > 0.5 && curve.auc < 1.0);
    }
}
