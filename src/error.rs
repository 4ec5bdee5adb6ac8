//! Error taxonomy for the scoring pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Message shown to the end user for any recoverable request error.
///
/// Request errors never leak their internal detail to the user; the detail
/// goes to the log instead.
pub const USER_FACING_MESSAGE: &str =
    "Data does not match the expected transaction format. Please check your file.";

/// Ways an uploaded table can fail to line up with the model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaMismatch {
    #[error("missing required feature column(s): {}", columns.join(", "))]
    MissingFeatures { columns: Vec<String> },

    #[error("non-numeric value {value:?} in feature column '{column}' at row {row}")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },

    #[error("model rejected the aligned data: {reason}")]
    Inference { reason: String },
}

/// Errors produced while loading the model or scoring an upload
#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("uploaded table has no data rows")]
    EmptyInput,

    #[error("schema mismatch: {0}")]
    SchemaMismatch(#[from] SchemaMismatch),

    #[error("could not read upload: {reason}")]
    Upload { reason: String },

    #[error("model artifact unavailable at {}: {reason}", path.display())]
    ArtifactUnavailable { path: PathBuf, reason: String },
}

impl ScoringError {
    pub fn artifact(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ScoringError::ArtifactUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors that are recovered at the request boundary.
    ///
    /// `ArtifactUnavailable` is the only fatal error; it is raised once at
    /// start-up before any upload is accepted.
    pub fn is_request_error(&self) -> bool {
        !matches!(self, ScoringError::ArtifactUnavailable { .. })
    }

    /// Message suitable for the end user.
    pub fn user_message(&self) -> String {
        if self.is_request_error() {
            USER_FACING_MESSAGE.to_string()
        } else {
            "Model file not found or unreadable. Train and export the model first, then set model.path."
                .to_string()
        }
    }
}

impl From<csv::Error> for ScoringError {
    fn from(e: csv::Error) -> Self {
        ScoringError::Upload {
            reason: e.to_string(),
        }
    }
}

pub type ScoringResult<T> = Result<T, ScoringError>;
