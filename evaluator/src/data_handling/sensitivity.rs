use polars::prelude::*;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;

use crate::models::polars_err;

/// One sensitivity replicate: integrated p-values sampled along a grid of
/// divergence fractions.
#[derive(Debug, Clone, Deserialize)]
pub struct SensitivityRun {
    #[serde(rename = "integrated.p")]
    pub integrated_p: Vec<f64>,
    #[serde(rename = "prop.div")]
    pub prop_div: Vec<f64>,
}

/// Replicates grouped per metric, with tree sizes in ascending order.
pub type SensitivityData = HashMap<String, Vec<(i64, Vec<SensitivityRun>)>>;

pub struct SensitivityResults {
    pub path: String,
}

impl SensitivityResults {
    pub fn load(&self) -> PolarsResult<SensitivityData> {
        let file = File::open(&self.path).map_err(|e| polars_err(Box::new(e)))?;
        let raw: HashMap<String, HashMap<String, Vec<SensitivityRun>>> =
            serde_json::from_reader(file).map_err(|e| polars_err(Box::new(e)))?;

        let mut data = SensitivityData::new();
        for (metric, by_size) in raw {
            let mut groups: Vec<(i64, Vec<SensitivityRun>)> = Vec::with_capacity(by_size.len());
            for (size, runs) in by_size {
                // JSON keys are strings; order them numerically, not lexically
                let size: i64 = size.parse().map_err(|e| {
                    polars_err(format!("bad tree size key `{}`: {}", size, e).into())
                })?;
                groups.push((size, runs));
            }
            groups.sort_by_key(|(size, _)| *size);
            data.insert(metric, groups);
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn sizes_sort_numerically_and_fields_map() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "RF": {{
                    "100": [{{"integrated.p": [0.5, 0.2], "prop.div": [0.0, 0.1]}}],
                    "20": [
                        {{"integrated.p": [0.6], "prop.div": [0.0]}},
                        {{"integrated.p": [0.3], "prop.div": [0.0]}}
                    ]
                }}
            }}"#
        )
        .unwrap();

        let dataset = SensitivityResults {
            path: file.path().to_str().unwrap().to_string(),
        };
        let data = dataset.load().unwrap();

        let rf = &data["RF"];
        let sizes: Vec<i64> = rf.iter().map(|(size, _)| *size).collect();
        assert_eq!(sizes, vec![20, 100]);
        assert_eq!(rf[0].1.len(), 2);
        assert_eq!(rf[1].1[0].integrated_p, vec![0.5, 0.2]);
        assert_eq!(rf[1].1[0].prop_div, vec![0.0, 0.1]);
    }

    #[test]
    fn malformed_size_key_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"RF": {{"tiny": [{{"integrated.p": [0.5], "prop.div": [0.0]}}]}}}}"#
        )
        .unwrap();

        let dataset = SensitivityResults {
            path: file.path().to_str().unwrap().to_string(),
        };
        assert!(dataset.load().is_err());
    }
}
