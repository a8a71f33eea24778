pub mod neutral_pairs;
pub mod null_pairs;
pub mod power_sim;
pub mod sensitivity;
pub mod variance_runs;
