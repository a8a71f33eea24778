use polars::prelude::*;

use crate::helper_functions::{drop_index_column, read_csv};
use crate::models::Dataset;

/// Neutral-process comparisons: normalized topology differences between
/// assemblies evolved without selection, across a range of tree sizes.
pub struct NeutralPairs {
    pub path: String,
}

impl Dataset for NeutralPairs {
    fn load(&self) -> PolarsResult<DataFrame> {
        let df = drop_index_column(read_csv(&self.path)?)?;
        df.lazy()
            .with_columns([
                col("tree.size").cast(DataType::Int64),
                col("norm.diff").cast(DataType::Float64),
            ])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn loads_normalized_differences() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, ",tree.size,norm.diff").unwrap();
        writeln!(file, "0,5,0.31").unwrap();
        writeln!(file, "1,100,0.78").unwrap();

        let dataset = NeutralPairs {
            path: file.path().to_str().unwrap().to_string(),
        };
        let df = dataset.load().unwrap();

        assert_eq!(df.get_column_names(), &["tree.size", "norm.diff"]);
        assert_eq!(df.height(), 2);
        let diffs: Vec<f64> = df
            .column("norm.diff")
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(diffs, vec![0.31, 0.78]);
    }
}
