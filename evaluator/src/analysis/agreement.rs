use ndarray::Array2;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters_backend::DrawingBackend;
use polars::prelude::*;
use tracing::info;

use crate::models::{plot_err, polars_err, Metric};
use crate::render::{save_figure, viridis_at, Draw};

const AGREEMENT_FIGURE_SIZE: (u32, u32) = (1500, 700);

/// Fraction of replicate chunks in which two metrics make the same
/// significance call, symmetrized. Rows arrive as consecutive chunks holding
/// one row per metric; a chunk that does not is a data error.
pub fn agreement_matrix(df: &DataFrame) -> PolarsResult<Array2<f64>> {
    let k = Metric::ALL.len();
    let n_rows = df.height();
    if n_rows == 0 {
        return Err(polars_err("agreement table is empty".into()));
    }
    if n_rows % k != 0 {
        return Err(PolarsError::ComputeError(
            format!(
                "agreement table has {} rows, not a multiple of {} metrics",
                n_rows, k
            )
            .into(),
        ));
    }

    let metric_col = df.column("metric")?.str()?;
    let sig_col = df.column("significance")?.i32()?;

    let mut agree = Array2::<f64>::zeros((k, k));
    let mut comps = Array2::<f64>::zeros((k, k));

    let mut row = 0;
    while row < n_rows {
        let mut seen = [false; 8];
        let mut sig = [0i32; 8];
        for offset in 0..k {
            let tag = metric_col
                .get(row + offset)
                .ok_or_else(|| polars_err("missing metric tag".into()))?;
            let metric = Metric::from_tag(tag).ok_or_else(|| {
                PolarsError::ComputeError(format!("unknown metric tag `{}`", tag).into())
            })?;
            let idx = metric.index();
            if seen[idx] {
                return Err(PolarsError::ComputeError(
                    format!("metric `{}` repeats within one replicate chunk", tag).into(),
                ));
            }
            seen[idx] = true;
            sig[idx] = sig_col
                .get(row + offset)
                .ok_or_else(|| polars_err("missing significance value".into()))?;
        }

        for i in 0..k {
            for j in 0..k {
                comps[[i, j]] += 1.0;
                if i == j || sig[i] == sig[j] {
                    agree[[i, j]] += 1.0;
                }
            }
        }
        row += k;
    }

    let percent = &agree / &comps;
    Ok((&percent + &percent.t()) / 2.0)
}

/// Side-by-side agreement heatmaps: diverged pairs on the left, null pairs on
/// the right, sharing one colour scale.
pub fn plot_pct_agreement(power_sim: &DataFrame, null_pairs: &DataFrame) -> PolarsResult<()> {
    let power = agreement_matrix(power_sim)?;
    let null = agreement_matrix(null_pairs)?;
    info!(
        "Pairwise agreement over {} diverged and {} null replicate chunks",
        power_sim.height() / Metric::ALL.len(),
        null_pairs.height() / Metric::ALL.len()
    );

    let figure = AgreementFigure::new(power, null);
    save_figure("pct_agreement", AGREEMENT_FIGURE_SIZE, &figure)
}

struct AgreementFigure {
    power: Array2<f64>,
    null: Array2<f64>,
    vmin: f64,
    vmax: f64,
}

impl AgreementFigure {
    fn new(power: Array2<f64>, null: Array2<f64>) -> Self {
        let mut vmin = f64::INFINITY;
        let mut vmax = f64::NEG_INFINITY;
        for v in power.iter().chain(null.iter()) {
            vmin = vmin.min(*v);
            vmax = vmax.max(*v);
        }
        if !(vmax - vmin).is_finite() || vmax - vmin < 1e-9 {
            vmin -= 0.01;
            vmax += 0.01;
        }
        Self {
            power,
            null,
            vmin,
            vmax,
        }
    }

    fn shade(&self, v: f64) -> RGBColor {
        // reversed ramp, so stronger agreement reads darker
        let t = (v - self.vmin) / (self.vmax - self.vmin);
        viridis_at(1.0 - t.clamp(0.0, 1.0))
    }
}

impl Draw for AgreementFigure {
    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> PolarsResult<()> {
        root.fill(&WHITE).map_err(plot_err)?;
        let (heat_area, bar_area) = root.split_horizontally(1360);
        let panels = heat_area.split_evenly((1, 2));

        self.draw_heatmap(root, &panels[0], &self.power, "A")?;
        self.draw_heatmap(root, &panels[1], &self.null, "B")?;
        self.draw_colorbar(&bar_area)
    }
}

impl AgreementFigure {
    fn draw_heatmap<DB: DrawingBackend>(
        &self,
        root: &DrawingArea<DB, Shift>,
        panel: &DrawingArea<DB, Shift>,
        percent: &Array2<f64>,
        letter: &str,
    ) -> PolarsResult<()> {
        let k = Metric::ALL.len();
        let mut chart = ChartBuilder::on(panel)
            .margin(14)
            .margin_top(34)
            .x_label_area_size(36)
            .y_label_area_size(52)
            .build_cartesian_2d(0.0..k as f64, k as f64..0.0)
            .map_err(plot_err)?;

        // strict lower triangle, like the masked panels of the source figure
        for r in 1..k {
            for c in 0..r {
                let v = percent[[r, c]];
                chart
                    .draw_series(std::iter::once(Rectangle::new(
                        [
                            (c as f64, r as f64),
                            (c as f64 + 1.0, r as f64 + 1.0),
                        ],
                        self.shade(v).filled(),
                    )))
                    .map_err(plot_err)?;
            }
        }

        panel
            .draw(&Text::new(letter, (10, 6), ("sans-serif", 26).into_font()))
            .map_err(plot_err)?;

        let bottom = ("sans-serif", 13)
            .into_font()
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Top));
        let left = ("sans-serif", 13)
            .into_font()
            .color(&BLACK)
            .pos(Pos::new(HPos::Right, VPos::Center));
        for (idx, metric) in Metric::ALL.iter().enumerate() {
            let (x, y) = chart.backend_coord(&(idx as f64 + 0.5, k as f64));
            root.draw(&Text::new(metric.as_str(), (x, y + 6), bottom.clone()))
                .map_err(plot_err)?;
            let (x, y) = chart.backend_coord(&(0.0, idx as f64 + 0.5));
            root.draw(&Text::new(metric.as_str(), (x - 6, y), left.clone()))
                .map_err(plot_err)?;
        }

        for r in 1..k {
            for c in 0..r {
                let v = percent[[r, c]];
                let cell = self.shade(v);
                let luminance =
                    0.299 * cell.0 as f64 + 0.587 * cell.1 as f64 + 0.114 * cell.2 as f64;
                let ink = if luminance < 140.0 { WHITE } else { BLACK };
                let style = ("sans-serif", 12)
                    .into_font()
                    .color(&ink)
                    .pos(Pos::new(HPos::Center, VPos::Center));
                let (x, y) = chart.backend_coord(&(c as f64 + 0.5, r as f64 + 0.5));
                root.draw(&Text::new(format!("{:.2}", v), (x, y), style))
                    .map_err(plot_err)?;
            }
        }
        Ok(())
    }

    fn draw_colorbar<DB: DrawingBackend>(
        &self,
        area: &DrawingArea<DB, Shift>,
    ) -> PolarsResult<()> {
        let mut chart = ChartBuilder::on(area)
            .caption("% Agreement", ("sans-serif", 14))
            .margin(10)
            .margin_top(34)
            .margin_bottom(36)
            .right_y_label_area_size(52)
            .build_cartesian_2d(0.0..1.0, self.vmin..self.vmax)
            .map_err(plot_err)?;

        chart
            .configure_mesh()
            .disable_mesh()
            .y_labels(6)
            .y_label_formatter(&|v| format!("{:.2}", v))
            .label_style(("sans-serif", 12))
            .draw()
            .map_err(plot_err)?;

        let steps = 64;
        for step in 0..steps {
            let lo = self.vmin + (self.vmax - self.vmin) * step as f64 / steps as f64;
            let hi = self.vmin + (self.vmax - self.vmin) * (step + 1) as f64 / steps as f64;
            let t = (step as f64 + 0.5) / steps as f64;
            chart
                .draw_series(std::iter::once(Rectangle::new(
                    [(0.0, lo), (1.0, hi)],
                    viridis_at(1.0 - t).filled(),
                )))
                .map_err(plot_err)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_chunk_frame() -> DataFrame {
        let mut metric: Vec<&str> = Vec::new();
        let mut significance: Vec<i32> = Vec::new();
        // chunk 1: everything significant
        for m in Metric::ALL {
            metric.push(m.as_str());
            significance.push(1);
        }
        // chunk 2: only RF significant
        for m in Metric::ALL {
            metric.push(m.as_str());
            significance.push(if m == Metric::Rf { 1 } else { 0 });
        }
        df![
            "metric" => metric,
            "significance" => significance
        ]
        .unwrap()
    }

    #[test]
    fn agreement_counts_match_hand_worked_values() {
        let matrix = agreement_matrix(&two_chunk_frame()).unwrap();
        let rf = Metric::Rf.index();
        let ns = Metric::Ns.index();
        let mci = Metric::Mci.index();
        // RF agrees with NS only in the first chunk
        assert!((matrix[[rf, ns]] - 0.5).abs() < 1e-12);
        // NS and MCI agree in both chunks
        assert!((matrix[[ns, mci]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn matrix_is_symmetric_with_unit_diagonal() {
        let matrix = agreement_matrix(&two_chunk_frame()).unwrap();
        for i in 0..8 {
            assert!((matrix[[i, i]] - 1.0).abs() < 1e-12);
            for j in 0..8 {
                assert_eq!(matrix[[i, j]], matrix[[j, i]]);
            }
        }
    }

    #[test]
    fn misaligned_chunks_are_rejected() {
        let mut metric: Vec<&str> = Metric::ALL.iter().map(|m| m.as_str()).collect();
        metric[1] = "RF"; // duplicate within the chunk
        let df = df![
            "metric" => metric,
            "significance" => vec![1i32; 8]
        ]
        .unwrap();
        assert!(agreement_matrix(&df).is_err());

        let truncated = df![
            "metric" => &["RF", "NS"],
            "significance" => &[1i32, 0]
        ]
        .unwrap();
        assert!(agreement_matrix(&truncated).is_err());

        let empty = df![
            "metric" => Vec::<&str>::new(),
            "significance" => Vec::<i32>::new()
        ]
        .unwrap();
        assert!(agreement_matrix(&empty).is_err());
    }
}
