//! Schema alignment of uploaded tables for model inference.
//!
//! Selects the model's feature columns from an arbitrary upload, by name and
//! in the model's order, and parses them into a numeric matrix. The
//! ground-truth label column is never used as a feature.

use crate::error::SchemaMismatch;
use crate::types::{FeatureMatrix, RawTable};
use tracing::debug;

/// Default name of the ground-truth label column in training data
pub const DEFAULT_LABEL_COLUMN: &str = "Class";

/// Cell spellings read as a missing value rather than rejected.
const MISSING_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Aligns uploaded tables to a model's feature schema.
pub struct FeatureAligner {
    label_column: String,
}

impl FeatureAligner {
    pub fn new() -> Self {
        Self::with_label_column(DEFAULT_LABEL_COLUMN)
    }

    pub fn with_label_column(label_column: impl Into<String>) -> Self {
        Self {
            label_column: label_column.into(),
        }
    }

    pub fn label_column(&self) -> &str {
        &self.label_column
    }

    /// Build the model input matrix for `table`.
    ///
    /// Each schema feature binds to the first non-label column with its name;
    /// later columns of the same name are extra columns and ignored. All
    /// missing features are reported together.
    pub fn align(
        &self,
        table: &RawTable,
        schema: &[String],
    ) -> Result<FeatureMatrix, SchemaMismatch> {
        if table.has_column(&self.label_column) {
            debug!(column = %self.label_column, "Ignoring ground-truth label column");
        }

        let mut source_columns = Vec::with_capacity(schema.len());
        let mut missing = Vec::new();

        for feature in schema {
            if feature == &self.label_column {
                missing.push(feature.clone());
                continue;
            }
            match table.column_position(feature) {
                Some(index) => source_columns.push(index),
                None => missing.push(feature.clone()),
            }
        }

        if !missing.is_empty() {
            return Err(SchemaMismatch::MissingFeatures { columns: missing });
        }

        let mut data = Vec::with_capacity(table.len() * schema.len());
        for (row_index, row) in table.rows().iter().enumerate() {
            for (&column, feature) in source_columns.iter().zip(schema) {
                let cell = &row[column];
                let value = parse_cell(cell).ok_or_else(|| SchemaMismatch::NonNumeric {
                    column: feature.clone(),
                    row: row_index,
                    value: cell.clone(),
                })?;
                data.push(value);
            }
        }

        debug!(rows = table.len(), features = schema.len(), "Aligned upload to model schema");

        FeatureMatrix::new(table.len(), schema.len(), data).ok_or_else(|| {
            SchemaMismatch::Inference {
                reason: "aligned matrix has inconsistent shape".to_string(),
            }
        })
    }
}

impl Default for FeatureAligner {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one feature cell; missing tokens become `NaN`.
fn parse_cell(cell: &str) -> Option<f32> {
    let cell = cell.trim();
    if MISSING_TOKENS.contains(&cell) {
        return Some(f32::NAN);
    }
    cell.parse::<f64>().ok().map(|v| v as f32)
}
