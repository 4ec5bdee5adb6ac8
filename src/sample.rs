//! Illustrative sample upload.
//!
//! A fixed three-row table in the credit-card fraud schema (`Time`,
//! principal components `V1`..`V28`, `Amount`) that users can download to
//! see the expected upload format.

use crate::error::ScoringResult;
use crate::types::RawTable;
use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;

/// Default file name for the downloadable sample
pub const SAMPLE_FILE_NAME: &str = "sample_fraud_data.csv";

/// Column names of the sample table, in model order
pub const SAMPLE_COLUMNS: [&str; 30] = [
    "Time", "V1", "V2", "V3", "V4", "V5", "V6", "V7", "V8", "V9", "V10", "V11", "V12", "V13",
    "V14", "V15", "V16", "V17", "V18", "V19", "V20", "V21", "V22", "V23", "V24", "V25", "V26",
    "V27", "V28", "Amount",
];

/// Sample values, one array per column
const SAMPLE_VALUES: [[&str; 3]; 30] = [
    ["100", "200", "300"],
    ["0.1", "-0.2", "0.05"],
    ["1.2", "0.4", "-0.3"],
    ["0.3", "-0.6", "0.2"],
    ["0.5", "-0.1", "-0.4"],
    ["1.1", "-0.9", "0.7"],
    ["0.2", "0.1", "-0.3"],
    ["-0.4", "0.6", "0.2"],
    ["0.7", "-0.8", "0.4"],
    ["0.3", "0.2", "-0.5"],
    ["0.5", "-0.3", "0.1"],
    ["0.4", "-0.1", "-0.2"],
    ["0.9", "-0.7", "0.3"],
    ["-0.3", "0.5", "-0.1"],
    ["0.2", "-0.4", "0.6"],
    ["0.8", "0.3", "-0.2"],
    ["-0.5", "0.6", "-0.4"],
    ["0.7", "-0.1", "0.9"],
    ["0.1", "-0.3", "0.2"],
    ["-0.2", "0.5", "-0.6"],
    ["0.6", "-0.5", "0.1"],
    ["-0.3", "0.7", "-0.2"],
    ["0.4", "0.2", "-0.8"],
    ["0.1", "-0.1", "0.3"],
    ["-0.5", "0.4", "0.7"],
    ["0.6", "-0.3", "-0.2"],
    ["0.3", "0.1", "-0.1"],
    ["-0.2", "0.5", "-0.4"],
    ["0.4", "-0.6", "0.8"],
    ["120.5", "450.0", "99.99"],
];

/// The fixed sample table.
pub fn sample_table() -> ScoringResult<RawTable> {
    let headers = SAMPLE_COLUMNS.iter().map(|c| c.to_string()).collect();
    let rows = (0..3)
        .map(|row| SAMPLE_VALUES.iter().map(|col| col[row].to_string()).collect())
        .collect();
    RawTable::new(headers, rows)
}

/// Write the sample table as CSV.
pub fn write_sample<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut wtr = csv::Writer::from_writer(file);
    let table = sample_table()?;
    wtr.write_record(table.headers())?;
    for row in table.rows() {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Differences between the sample columns and a model schema.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SchemaDrift {
    /// Model features the sample lacks
    pub missing_from_sample: Vec<String>,
    /// Sample columns the model does not use
    pub unused_by_model: Vec<String>,
}

impl SchemaDrift {
    pub fn is_empty(&self) -> bool {
        self.missing_from_sample.is_empty() && self.unused_by_model.is_empty()
    }
}

/// Compare the sample columns against `model_schema`.
pub fn schema_drift(model_schema: &[String]) -> SchemaDrift {
    SchemaDrift {
        missing_from_sample: model_schema
            .iter()
            .filter(|f| !SAMPLE_COLUMNS.contains(&f.as_str()))
            .cloned()
            .collect(),
        unused_by_model: SAMPLE_COLUMNS
            .iter()
            .filter(|c| !model_schema.iter().any(|f| f.as_str() == **c))
            .map(|c| c.to_string())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_shape() {
        let table = sample_table().unwrap();
        assert_eq!(table.headers().len(), 30);
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows()[2][29], "99.99");
        assert_eq!(table.rows()[0][0], "100");
    }

    #[test]
    fn test_no_drift_against_matching_schema() {
        let schema: Vec<String> = SAMPLE_COLUMNS.iter().map(|c| c.to_string()).collect();
        assert!(schema_drift(&schema).is_empty());
    }

    #[test]
    fn test_drift_reported() {
        let mut schema: Vec<String> = SAMPLE_COLUMNS[..29].iter().map(|c| c.to_string()).collect();
        schema.push("Merchant".to_string());

        let drift = schema_drift(&schema);
        assert_eq!(drift.missing_from_sample, vec!["Merchant".to_string()]);
        assert_eq!(drift.unused_by_model, vec!["Amount".to_string()]);
    }

    #[test]
    fn test_write_sample_round_trips_through_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SAMPLE_FILE_NAME);

        write_sample(&path).unwrap();
        let table = RawTable::from_path(&path).unwrap();

        assert_eq!(table, sample_table().unwrap());
    }
}
