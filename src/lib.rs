//! Fraud Dashboard Library
//!
//! Scores uploaded transaction tables against a pre-trained fraud
//! classifier: aligns the upload to the model's feature schema, runs batch
//! inference, and summarizes fraudulent vs legitimate rows.

pub mod config;
pub mod error;
pub mod feature_aligner;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod sample;
pub mod types;

pub use config::AppConfig;
pub use error::{SchemaMismatch, ScoringError, ScoringResult};
pub use feature_aligner::FeatureAligner;
pub use models::{Classifier, ModelLoader};
pub use pipeline::{score, ScoringPipeline};
pub use report::{Dashboard, ScoringReport};
pub use types::{Prediction, RawTable, ScoredTable, Summary};
