use polars::prelude::*;

pub fn read_csv(file_path: &str) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(file_path.into()))?
        .finish()
}

/// Tables exported from the simulation runs carry an unnamed leading index
/// column; drop it so downstream schemas stay positional-free.
pub fn drop_index_column(df: DataFrame) -> PolarsResult<DataFrame> {
    let first = match df.get_columns().first() {
        Some(column) => column.name().clone(),
        None => return Ok(df),
    };
    if first.is_empty() {
        return df.drop(first.as_str());
    }
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn read_csv_parses_headers_and_rows() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "metric,p").unwrap();
        writeln!(file, "RF,0.4").unwrap();
        writeln!(file, "NS,0.01").unwrap();

        let df = read_csv(file.path().to_str().unwrap()).unwrap();
        assert_eq!(df.shape(), (2, 2));
        assert_eq!(df.get_column_names(), &["metric", "p"]);
    }

    #[test]
    fn unnamed_index_column_is_dropped() {
        let df = df![
            "" => &[0i64, 1],
            "metric" => &["RF", "NS"],
            "p" => &[0.5, 0.01]
        ]
        .unwrap();

        let trimmed = drop_index_column(df).unwrap();
        assert_eq!(trimmed.get_column_names(), &["metric", "p"]);
    }

    #[test]
    fn named_first_column_is_kept() {
        let df = df![
            "metric" => &["RF"],
            "p" => &[0.5]
        ]
        .unwrap();

        let trimmed = drop_index_column(df).unwrap();
        assert_eq!(trimmed.get_column_names(), &["metric", "p"]);
    }
}
