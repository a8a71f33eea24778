use polars::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::data_handling::neutral_pairs::NeutralPairs;
use crate::data_handling::null_pairs::NullPairs;
use crate::data_handling::power_sim::PowerSim;
use crate::data_handling::sensitivity::SensitivityResults;
use crate::data_handling::variance_runs::VarianceRuns;
use crate::models::Dataset;

mod analysis;
mod data_handling;
mod grouped_stats;
mod helper_functions;
mod logistic_fit;
mod models;
mod render;

const NULL_PAIRS_PATH: &str = "./data/random_pairs_data.csv";
const POWER_SIM_PATH: &str = "./data/power_simulation_data.csv";
const VARIANCE_RUNS_PATH: &str = "./data/p_var_data.csv";
const NEUTRAL_PAIRS_PATH: &str = "./data/neutral_assembly_comparisons.csv";
const SENSITIVITY_PATH: &str = "./data/rtc_sensitivity_results.json";

fn main() -> PolarsResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting metric evaluation pipeline");
    render::ensure_figure_dir()?;

    let null_pairs = NullPairs {
        path: NULL_PAIRS_PATH.to_string(),
    }
    .load()?;
    info!("Null pairs loaded: {} rows", null_pairs.height());

    let power_sim = PowerSim {
        path: POWER_SIM_PATH.to_string(),
    }
    .load()?;
    info!("Power simulation loaded: {} rows", power_sim.height());

    let variance_runs = VarianceRuns {
        path: VARIANCE_RUNS_PATH.to_string(),
    }
    .load()?;
    info!("Variance runs loaded: {} rows", variance_runs.height());

    let neutral_pairs = NeutralPairs {
        path: NEUTRAL_PAIRS_PATH.to_string(),
    }
    .load()?;
    info!("Neutral comparisons loaded: {} rows", neutral_pairs.height());

    let sensitivity = SensitivityResults {
        path: SENSITIVITY_PATH.to_string(),
    }
    .load()?;
    info!("Sensitivity results loaded: {} metrics", sensitivity.len());

    analysis::calibration::plot_error_ecdfs(&null_pairs)?;
    analysis::uniformity::report_ks_uniformity(&null_pairs)?;
    analysis::power::plot_power_curves(&power_sim)?;
    analysis::power_logistic::plot_power_logistics()?;
    logistic_fit::run_congruence_fits(&null_pairs)?;
    analysis::roc::plot_roc_curves(&null_pairs, &power_sim)?;
    analysis::agreement::plot_pct_agreement(&power_sim, &null_pairs)?;
    analysis::stabilization::plot_p_stabilization(&variance_runs)?;
    analysis::sensitivity::plot_sensitivity(&sensitivity)?;
    analysis::saturation::plot_null_neutral_agreement(&neutral_pairs)?;

    info!("Evaluation pipeline complete");
    Ok(())
}
