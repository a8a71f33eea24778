use polars::prelude::*;

use crate::helper_functions::{drop_index_column, read_csv};
use crate::models::Dataset;

/// Power-simulation table: tree pairs separated by a known number of SPR
/// moves. Loading appends the significance call and the divergence fraction
/// `pct_div` (moves scaled by tree size).
pub struct PowerSim {
    pub path: String,
}

impl Dataset for PowerSim {
    fn load(&self) -> PolarsResult<DataFrame> {
        let df = drop_index_column(read_csv(&self.path)?)?;
        df.lazy()
            .with_columns([
                col("tree.size").cast(DataType::Int64),
                col("movements").cast(DataType::Int64),
                col("p").cast(DataType::Float64),
            ])
            .with_columns([
                when(col("p").lt(lit(0.05)))
                    .then(lit(1i32))
                    .otherwise(lit(0i32))
                    .alias("significance"),
                (col("movements").cast(DataType::Float64)
                    / col("tree.size").cast(DataType::Float64))
                .alias("pct_div"),
            ])
            .collect()
    }
}
