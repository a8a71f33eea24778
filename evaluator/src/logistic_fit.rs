//! Logistic regression of significance calls against scaled congruence, fitted
//! independently for every metric-by-size group of the null-model pairs.

use linfa::prelude::*;
use linfa_logistic::LogisticRegression;
use log::info;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use statrs::distribution::{ContinuousCDF, Normal};
use std::fs::File;

use crate::grouped_stats::{evaluate_groups, GroupOutcome, GroupResult, SkipReason};
use crate::models::polars_err;
use crate::render::FIGURE_DIR;

pub fn expit(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Wald summary of one converged group fit.
#[derive(Debug, Clone)]
pub struct CongruenceFit {
    pub n: usize,
    pub intercept: f64,
    pub intercept_se: f64,
    pub intercept_z: f64,
    pub intercept_p: f64,
    pub slope: f64,
    pub slope_se: f64,
    pub slope_z: f64,
    pub slope_p: f64,
}

/// Either a usable fit or a numerically singular information matrix; callers
/// record the latter as a skip.
#[derive(Debug)]
pub enum FitOutcome {
    Fitted(CongruenceFit),
    Singular,
}

// ─── single-predictor fit ────────────────────────────────────────────────────

fn observed_information(intercept: f64, slope: f64, xs: &[f64]) -> (f64, f64, f64) {
    let (mut s_w, mut s_wx, mut s_wxx) = (0.0, 0.0, 0.0);
    for &x in xs {
        let p = expit(intercept + slope * x);
        let w = p * (1.0 - p);
        s_w += w;
        s_wx += w * x;
        s_wxx += w * x * x;
    }
    (s_w, s_wx, s_wxx)
}

/// Maximum-likelihood logistic fit of `ys` on a single predictor, with Wald
/// standard errors taken from the 2x2 inverse of the observed information.
pub fn fit_binary_logistic(xs: &[f64], ys: &[u8]) -> PolarsResult<FitOutcome> {
    let records = Array2::from_shape_vec((xs.len(), 1), xs.to_vec())
        .map_err(|e| polars_err(Box::new(e)))?;
    let targets: Array1<u8> = Array1::from(ys.to_vec());

    let model = LogisticRegression::default()
        .max_iterations(100)
        .gradient_tolerance(1e-6)
        .alpha(0.0)
        .fit(&Dataset::new(records, targets))
        .map_err(|e| PolarsError::ComputeError(format!("{}", e).into()))?;

    let intercept = model.intercept();
    let slope = model.params()[0];

    let (s_w, s_wx, s_wxx) = observed_information(intercept, slope, xs);
    let det = s_w * s_wxx - s_wx * s_wx;
    if !det.is_finite() || det.abs() < 1e-12 {
        return Ok(FitOutcome::Singular);
    }
    let var_intercept = s_wxx / det;
    let var_slope = s_w / det;
    if var_intercept <= 0.0 || var_slope <= 0.0 {
        return Ok(FitOutcome::Singular);
    }

    let normal = Normal::new(0.0, 1.0).map_err(|e| polars_err(Box::new(e)))?;
    let intercept_se = var_intercept.sqrt();
    let slope_se = var_slope.sqrt();
    let intercept_z = intercept / intercept_se;
    let slope_z = slope / slope_se;

    Ok(FitOutcome::Fitted(CongruenceFit {
        n: xs.len(),
        intercept,
        intercept_se,
        intercept_z,
        intercept_p: 2.0 * (1.0 - normal.cdf(intercept_z.abs())),
        slope,
        slope_se,
        slope_z,
        slope_p: 2.0 * (1.0 - normal.cdf(slope_z.abs())),
    }))
}

// ─── per-group sweep ─────────────────────────────────────────────────────────

/// Fit for one group, with congruence rescaled to [0, 1] within the group.
/// Degenerate groups come back as skips rather than errors.
pub fn fit_group(rows: &DataFrame) -> PolarsResult<GroupOutcome<CongruenceFit>> {
    if rows.column("significance")?.n_unique()? <= 1 {
        return Ok(GroupOutcome::Skipped(SkipReason::ConstantOutcome));
    }

    let congruence: Vec<f64> = rows
        .column("congruence")?
        .f64()?
        .into_no_null_iter()
        .collect();
    let lo = congruence.iter().cloned().fold(f64::INFINITY, f64::min);
    let hi = congruence.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !(hi - lo).is_finite() || hi - lo <= f64::EPSILON {
        return Ok(GroupOutcome::Skipped(SkipReason::ConstantPredictor));
    }
    let scaled: Vec<f64> = congruence.iter().map(|v| (v - lo) / (hi - lo)).collect();

    let outcomes: Vec<u8> = rows
        .column("significance")?
        .i32()?
        .into_no_null_iter()
        .map(|v| v as u8)
        .collect();

    match fit_binary_logistic(&scaled, &outcomes)? {
        FitOutcome::Fitted(fit) => Ok(GroupOutcome::Value(fit)),
        FitOutcome::Singular => Ok(GroupOutcome::Skipped(SkipReason::SingularFit)),
    }
}

/// Fits every metric-by-size group of the null pairs and writes the summary
/// table next to the figures.
pub fn run_congruence_fits(null_pairs: &DataFrame) -> PolarsResult<()> {
    let results = evaluate_groups(null_pairs, |_key, rows| fit_group(rows))?;

    for result in &results {
        match &result.outcome {
            GroupOutcome::Value(fit) => {
                info!(
                    "{}: n = {}, intercept = {:.4} (se {:.4}, z {:.2}, p {:.3e}), slope = {:.4} (se {:.4}, z {:.2}, p {:.3e})",
                    result.key,
                    fit.n,
                    fit.intercept,
                    fit.intercept_se,
                    fit.intercept_z,
                    fit.intercept_p,
                    fit.slope,
                    fit.slope_se,
                    fit.slope_z,
                    fit.slope_p
                );
            }
            GroupOutcome::Skipped(reason) => {
                info!("Skipping {}: {}", result.key, reason);
            }
        }
    }

    let path = format!("{}/congruence_logistic_fits.csv", FIGURE_DIR);
    write_fit_table(&results, &path)?;
    Ok(())
}

fn write_fit_table(results: &[GroupResult<CongruenceFit>], path: &str) -> PolarsResult<()> {
    let metric: Vec<&str> = results.iter().map(|r| r.key.metric.as_str()).collect();
    let tree_size: Vec<i64> = results.iter().map(|r| r.key.tree_size).collect();
    let status: Vec<String> = results
        .iter()
        .map(|r| match &r.outcome {
            GroupOutcome::Value(_) => "ok".to_string(),
            GroupOutcome::Skipped(reason) => format!("{}", reason),
        })
        .collect();
    let n: Vec<Option<i64>> = results
        .iter()
        .map(|r| match &r.outcome {
            GroupOutcome::Value(fit) => Some(fit.n as i64),
            GroupOutcome::Skipped(_) => None,
        })
        .collect();
    let field = |pick: fn(&CongruenceFit) -> f64| -> Vec<Option<f64>> {
        results
            .iter()
            .map(|r| match &r.outcome {
                GroupOutcome::Value(fit) => Some(pick(fit)),
                GroupOutcome::Skipped(_) => None,
            })
            .collect()
    };

    let mut df = df![
        "metric" => metric,
        "tree.size" => tree_size,
        "status" => status,
        "n" => n,
        "intercept" => field(|fit| fit.intercept),
        "intercept_se" => field(|fit| fit.intercept_se),
        "intercept_z" => field(|fit| fit.intercept_z),
        "intercept_p" => field(|fit| fit.intercept_p),
        "slope" => field(|fit| fit.slope),
        "slope_se" => field(|fit| fit.slope_se),
        "slope_z" => field(|fit| fit.slope_z),
        "slope_p" => field(|fit| fit.slope_p)
    ]?;

    let mut file = File::create(path).map_err(|e| polars_err(Box::new(e)))?;
    CsvWriter::new(&mut file).finish(&mut df)?;
    info!("Congruence fit table written to {}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouped_stats::GroupKey;
    use crate::models::Metric;
    use tempfile::NamedTempFile;

    #[test]
    fn expit_is_the_inverse_logit() {
        assert!((expit(0.0) - 0.5).abs() < 1e-12);
        assert!((expit(3.0) + expit(-3.0) - 1.0).abs() < 1e-12);
        assert!(expit(20.0) > 0.999);
    }

    #[test]
    fn fit_recovers_the_grouped_mle() {
        // two support points with known empirical odds, so the MLE is exact:
        // logit(0.1) at x = 0.1 and logit(0.9) at x = 0.9
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for i in 0..100 {
            xs.push(0.1);
            ys.push(if i < 10 { 1u8 } else { 0 });
            xs.push(0.9);
            ys.push(if i < 90 { 1u8 } else { 0 });
        }

        let fit = match fit_binary_logistic(&xs, &ys).unwrap() {
            FitOutcome::Fitted(fit) => fit,
            FitOutcome::Singular => panic!("fit should not be singular"),
        };

        let expected_slope = (9.0f64.ln() * 2.0) / 0.8;
        let expected_intercept = -(9.0f64.ln()) - expected_slope * 0.1;
        assert!((fit.slope - expected_slope).abs() < 0.2);
        assert!((fit.intercept - expected_intercept).abs() < 0.2);
        assert!(fit.slope_se > 0.0 && fit.slope_se < 1.5);
        assert!(fit.slope_p < 1e-6);
        assert_eq!(fit.n, 200);
    }

    #[test]
    fn constant_outcome_groups_are_skipped() {
        let rows = df![
            "significance" => &[1i32, 1, 1, 1],
            "congruence" => &[0.1, 0.4, 0.6, 0.9]
        ]
        .unwrap();
        let outcome = fit_group(&rows).unwrap();
        assert!(matches!(
            outcome,
            GroupOutcome::Skipped(SkipReason::ConstantOutcome)
        ));
    }

    #[test]
    fn flat_predictor_groups_are_skipped() {
        let rows = df![
            "significance" => &[1i32, 0, 1, 0],
            "congruence" => &[0.5, 0.5, 0.5, 0.5]
        ]
        .unwrap();
        let outcome = fit_group(&rows).unwrap();
        assert!(matches!(
            outcome,
            GroupOutcome::Skipped(SkipReason::ConstantPredictor)
        ));
    }

    #[test]
    fn saturated_weights_make_the_information_singular() {
        let xs = [0.0, 0.0, 1.0, 1.0];
        let (s_w, s_wx, s_wxx) = observed_information(-5e5, 1e6, &xs);
        let det = s_w * s_wxx - s_wx * s_wx;
        assert!(det.abs() < 1e-12);
    }

    #[test]
    fn fit_table_reports_status_per_group() {
        let results = vec![
            GroupResult {
                key: GroupKey {
                    metric: Metric::Rf,
                    tree_size: 5,
                },
                outcome: GroupOutcome::Skipped(SkipReason::ConstantOutcome),
            },
            GroupResult {
                key: GroupKey {
                    metric: Metric::Ns,
                    tree_size: 10,
                },
                outcome: GroupOutcome::Value(CongruenceFit {
                    n: 40,
                    intercept: -1.0,
                    intercept_se: 0.5,
                    intercept_z: -2.0,
                    intercept_p: 0.0455,
                    slope: 2.0,
                    slope_se: 0.5,
                    slope_z: 4.0,
                    slope_p: 6.3e-5,
                }),
            },
        ];

        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();
        write_fit_table(&results, &path).unwrap();

        let written = crate::helper_functions::read_csv(&path).unwrap();
        assert_eq!(written.height(), 2);
        let status: Vec<&str> = written
            .column("status")
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(status, vec!["all outcome values are identical", "ok"]);
    }
}
