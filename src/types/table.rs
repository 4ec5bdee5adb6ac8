//! Uploaded and scored transaction tables

use crate::error::{ScoringError, ScoringResult};
use crate::types::prediction::Prediction;
use csv::{ReaderBuilder, Trim, Writer};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

/// Column appended with the positive-class probability
pub const FRAUD_PROBABILITY_COLUMN: &str = "fraud_probability";

/// Column appended with the binary decision
pub const PREDICTION_COLUMN: &str = "prediction";

/// Uploaded table as named columns of raw string cells.
///
/// Row identity is row position; nothing here reorders or deduplicates rows.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Build a table. Short rows are padded with empty (missing) cells;
    /// rows wider than the header are rejected.
    pub fn new(headers: Vec<String>, mut rows: Vec<Vec<String>>) -> ScoringResult<Self> {
        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() > headers.len())
        {
            return Err(ScoringError::Upload {
                reason: format!(
                    "row {} has {} fields, header has {}",
                    index,
                    row.len(),
                    headers.len()
                ),
            });
        }
        for row in rows.iter_mut().filter(|row| row.len() < headers.len()) {
            row.resize(headers.len(), String::new());
        }
        Ok(Self { headers, rows })
    }

    /// Parse a header row plus comma-separated records.
    pub fn from_reader<R: Read>(reader: R) -> ScoringResult<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let mut headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        if let Some(first) = headers.first_mut() {
            *first = first.trim_start_matches('\u{feff}').to_string();
        }

        let rows = rdr
            .records()
            .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
            .collect::<Result<Vec<Vec<String>>, csv::Error>>()?;

        debug!(columns = headers.len(), rows = rows.len(), "Parsed upload");
        Self::new(headers, rows)
    }

    /// Open and parse a CSV file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> ScoringResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ScoringError::Upload {
            reason: format!("{}: {}", path.display(), e),
        })?;
        Self::from_reader(file)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of data rows (the header is not counted)
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the first header equal to `name`.
    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }
}

/// Uploaded table with `fraud_probability` and `prediction` columns.
///
/// All original columns are kept in their original order. If the upload
/// already had a column with one of the appended names it is overwritten in
/// place, so column names stay unique.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    probabilities: Vec<f64>,
    predictions: Vec<Prediction>,
}

impl ScoredTable {
    /// Augment `source`. Callers guarantee one probability and one
    /// prediction per source row.
    pub(crate) fn augment(
        source: &RawTable,
        probabilities: Vec<f64>,
        predictions: Vec<Prediction>,
    ) -> Self {
        debug_assert_eq!(source.len(), probabilities.len());
        debug_assert_eq!(source.len(), predictions.len());

        let mut headers = source.headers.clone();
        let probability_index = column_slot(&mut headers, FRAUD_PROBABILITY_COLUMN);
        let prediction_index = column_slot(&mut headers, PREDICTION_COLUMN);

        let rows = source
            .rows
            .iter()
            .zip(probabilities.iter().zip(predictions.iter()))
            .map(|(row, (probability, prediction))| {
                let mut row = row.clone();
                row.resize(headers.len(), String::new());
                row[probability_index] = probability.to_string();
                row[prediction_index] = prediction.to_string();
                row
            })
            .collect();

        Self {
            headers,
            rows,
            probabilities,
            predictions,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Positive-class probability per row, unrounded
    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }

    pub fn predictions(&self) -> &[Prediction] {
        &self.predictions
    }

    /// Write the full scored table as CSV.
    pub fn write_csv<W: Write>(&self, writer: W) -> csv::Result<()> {
        let mut wtr = Writer::from_writer(writer);
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_csv_path<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        use anyhow::Context;
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        self.write_csv(file)
            .with_context(|| format!("Failed to write scored table to {}", path.display()))
    }
}

/// Index of `name` in `headers`, appending it when absent.
fn column_slot(headers: &mut Vec<String>, name: &str) -> usize {
    match headers.iter().position(|h| h == name) {
        Some(index) => index,
        None => {
            headers.push(name.to_string());
            headers.len() - 1
        }
    }
}
