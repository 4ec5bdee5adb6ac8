//! Type definitions for the scoring pipeline

pub mod matrix;
pub mod prediction;
pub mod table;

pub use matrix::FeatureMatrix;
pub use prediction::{Prediction, Summary};
pub use table::{RawTable, ScoredTable, FRAUD_PROBABILITY_COLUMN, PREDICTION_COLUMN};
