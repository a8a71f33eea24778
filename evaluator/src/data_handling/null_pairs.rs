use polars::prelude::*;

use crate::helper_functions::{drop_index_column, read_csv};
use crate::models::Dataset;

/// Null-model table: random tree pairs scored by every metric, one row per
/// pair and metric. Loading appends the 0/1 `significance` call at the 0.05
/// level.
pub struct NullPairs {
    pub path: String,
}

impl Dataset for NullPairs {
    fn load(&self) -> PolarsResult<DataFrame> {
        let df = drop_index_column(read_csv(&self.path)?)?;
        df.lazy()
            .with_columns([
                col("tree.size").cast(DataType::Int64),
                col("p").cast(DataType::Float64),
                col("congruence").cast(DataType::Float64),
            ])
            .with_column(
                when(col("p").lt(lit(0.05)))
                    .then(lit(1i32))
                    .otherwise(lit(0i32))
                    .alias("significance"),
            )
            .collect()
    }
}
