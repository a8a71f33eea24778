use log::info;
use polars::prelude::*;
use std::fs::File;

use crate::grouped_stats::{evaluate_groups, GroupOutcome, GroupResult, SkipReason};
use crate::models::polars_err;
use crate::render::FIGURE_DIR;

/// One-sample Kolmogorov-Smirnov test against Uniform(0, 1).
#[derive(Debug, Clone)]
pub struct KsTest {
    pub statistic: f64,
    pub p_value: f64,
    pub n: usize,
}

/// D_n against the uniform CDF, with the Stephens small-sample factor and the
/// tail probability from the asymptotic Kolmogorov series.
pub fn ks_uniform(sample: &[f64]) -> Option<KsTest> {
    if sample.is_empty() {
        return None;
    }
    let mut sorted = sample.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len() as f64;

    let mut statistic = 0.0f64;
    for (i, &x) in sorted.iter().enumerate() {
        let cdf = x.clamp(0.0, 1.0);
        let above = (i as f64 + 1.0) / n - cdf;
        let below = cdf - i as f64 / n;
        statistic = statistic.max(above).max(below);
    }

    let lambda = (n.sqrt() + 0.12 + 0.11 / n.sqrt()) * statistic;
    Some(KsTest {
        statistic,
        p_value: kolmogorov_sf(lambda),
        n: sorted.len(),
    })
}

/// Kolmogorov survival function Q(lambda) = 2 * sum (-1)^(k-1) exp(-2 k^2 lambda^2).
pub fn kolmogorov_sf(lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return 1.0;
    }
    let exponent = -2.0 * lambda * lambda;
    let mut sign = 1.0;
    let mut previous = 0.0;
    let mut sum = 0.0;
    for k in 1..=100 {
        let term = sign * (exponent * (k * k) as f64).exp();
        sum += term;
        if term.abs() <= 1e-3 * previous || term.abs() <= 1e-10 * sum.abs() {
            return (2.0 * sum).clamp(0.0, 1.0);
        }
        sign = -sign;
        previous = term.abs();
    }
    1.0
}

/// Tests every metric-by-size group of null p-values for uniformity, logging
/// each result and writing the summary table next to the figures.
pub fn report_ks_uniformity(null_pairs: &DataFrame) -> PolarsResult<()> {
    let results = evaluate_groups(null_pairs, |_key, rows| {
        let p: Vec<f64> = rows.column("p")?.f64()?.into_no_null_iter().collect();
        match ks_uniform(&p) {
            Some(test) => Ok(GroupOutcome::Value(test)),
            None => Ok(GroupOutcome::Skipped(SkipReason::EmptyGroup)),
        }
    })?;

    for result in &results {
        match &result.outcome {
            GroupOutcome::Value(test) => {
                info!(
                    "{}: KS statistic = {:.4}, p-value = {:.4e}",
                    result.key, test.statistic, test.p_value
                );
            }
            GroupOutcome::Skipped(reason) => {
                info!("Skipping {}: {}", result.key, reason);
            }
        }
    }

    let path = format!("{}/ks_uniformity.csv", FIGURE_DIR);
    write_ks_table(&results, &path)?;
    Ok(())
}

fn write_ks_table(results: &[GroupResult<KsTest>], path: &str) -> PolarsResult<()> {
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
            GroupOutcome::Value(test) => Some(test.n as i64),
            GroupOutcome::Skipped(_) => None,
        })
        .collect();
    let statistic: Vec<Option<f64>> = results
        .iter()
        .map(|r| match &r.outcome {
            GroupOutcome::Value(test) => Some(test.statistic),
            GroupOutcome::Skipped(_) => None,
        })
        .collect();
    let p_value: Vec<Option<f64>> = results
        .iter()
        .map(|r| match &r.outcome {
            GroupOutcome::Value(test) => Some(test.p_value),
            GroupOutcome::Skipped(_) => None,
        })
        .collect();

    let mut df = df![
        "metric" => metric,
        "tree.size" => tree_size,
        "status" => status,
        "n" => n,
        "ks_statistic" => statistic,
        "p_value" => p_value
    ]?;

    let mut file = File::create(path).map_err(|e| polars_err(Box::new(e)))?;
    CsvWriter::new(&mut file).finish(&mut df)?;
    info!("KS uniformity table written to {}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn survival_function_boundary_and_known_value() {
        assert_eq!(kolmogorov_sf(0.0), 1.0);
        assert_eq!(kolmogorov_sf(-1.0), 1.0);
        // Q(1) = 2(e^-2 - e^-8 + e^-18 - ...) ~ 0.27
        assert!((kolmogorov_sf(1.0) - 0.27).abs() < 0.005);
        assert!(kolmogorov_sf(0.5) > kolmogorov_sf(1.0));
        assert!(kolmogorov_sf(1.0) > kolmogorov_sf(2.0));
    }

    #[test]
    fn midpoint_grid_is_as_uniform_as_a_sample_gets() {
        let n = 10;
        let sample: Vec<f64> = (0..n).map(|i| (2 * i + 1) as f64 / (2 * n) as f64).collect();
        let test = ks_uniform(&sample).unwrap();
        assert!((test.statistic - 0.05).abs() < 1e-12);
        assert!(test.p_value > 0.99);
        assert_eq!(test.n, 10);
    }

    #[test]
    fn concentrated_sample_is_rejected() {
        let sample = vec![0.99; 50];
        let test = ks_uniform(&sample).unwrap();
        assert!(test.statistic > 0.9);
        assert!(test.p_value < 1e-8);
    }

    #[test]
    fn uniform_draws_are_not_rejected_on_average() {
        let mut p_values = Vec::new();
        let mut worst_statistic = 0.0f64;
        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let sample: Vec<f64> = (0..500).map(|_| rng.gen::<f64>()).collect();
            let test = ks_uniform(&sample).unwrap();
            worst_statistic = worst_statistic.max(test.statistic);
            p_values.push(test.p_value);
        }
        let mean_p = p_values.iter().sum::<f64>() / p_values.len() as f64;
        assert!(mean_p > 0.2);
        assert!(worst_statistic < 0.15);
    }

    #[test]
    fn empty_sample_has_no_test() {
        assert!(ks_uniform(&[]).is_none());
    }
}
