use polars::prelude::*;

use crate::helper_functions::{drop_index_column, read_csv};
use crate::models::Dataset;

/// Repeated-evaluation table: the same tree pairs re-scored under growing
/// permutation counts, used to trace how p-value estimates stabilize.
pub struct VarianceRuns {
    pub path: String,
}

impl Dataset for VarianceRuns {
    fn load(&self) -> PolarsResult<DataFrame> {
        let df = drop_index_column(read_csv(&self.path)?)?;
        df.lazy()
            .with_columns([
                col("tree.size").cast(DataType::Int64),
                col("iterations").cast(DataType::Int64),
                col("p").cast(DataType::Float64),
            ])
            .sort(["tree.size"], SortMultipleOptions::default())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn rows_come_back_ordered_by_tree_size() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, ",metric,tree.size,replicate.pair,iterations,p").unwrap();
        writeln!(file, "0,RF,20,1,100,0.2").unwrap();
        writeln!(file, "1,RF,5,1,100,0.4").unwrap();
        writeln!(file, "2,RF,10,1,100,0.3").unwrap();

        let dataset = VarianceRuns {
            path: file.path().to_str().unwrap().to_string(),
        };
        let df = dataset.load().unwrap();

        let sizes: Vec<i64> = df
            .column("tree.size")
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(sizes, vec![5, 10, 20]);
    }
}
