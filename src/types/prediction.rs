//! Per-row prediction and aggregate summary

use serde::{Deserialize, Serialize};
use std::fmt;

/// Label of the positive (fraud) class in model output
pub const POSITIVE_CLASS: i64 = 1;

/// Binary decision for one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prediction {
    Fraudulent,
    Legitimate,
}

impl Prediction {
    /// Map a model label to a prediction. Only 0 and 1 are valid labels.
    pub fn from_label(label: i64) -> Option<Self> {
        match label {
            POSITIVE_CLASS => Some(Prediction::Fraudulent),
            0 => Some(Prediction::Legitimate),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Prediction::Fraudulent => "fraudulent",
            Prediction::Legitimate => "legitimate",
        }
    }

    pub fn is_fraud(&self) -> bool {
        matches!(self, Prediction::Fraudulent)
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fraud vs legitimate counts over one scored table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub fraudulent: usize,
    pub legitimate: usize,
}

impl Summary {
    /// Count predictions. Every row lands in exactly one bucket.
    pub fn from_predictions(predictions: &[Prediction]) -> Self {
        let fraudulent = predictions.iter().filter(|p| p.is_fraud()).count();
        Self {
            total: predictions.len(),
            fraudulent,
            legitimate: predictions.len() - fraudulent,
        }
    }

    /// Share of fraudulent rows in [0, 1]; zero for an empty summary.
    pub fn fraud_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.fraudulent as f64 / self.total as f64
        }
    }
}
