//! Binary classifier interface used by the scoring pipeline

use crate::types::FeatureMatrix;
use anyhow::Result;

/// A loaded, read-only binary fraud classifier.
///
/// Implementations must be safe to share across threads: inference keeps
/// no mutable state visible to callers.
pub trait Classifier: Send + Sync {
    /// Model name for logs and reports
    fn name(&self) -> &str;

    /// Ordered feature names the model was trained on
    fn feature_names(&self) -> &[String];

    /// Class label per row: 1 for fraud, 0 for legitimate.
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<i64>>;

    /// Probability of the fraud class per row.
    fn predict_probability(&self, features: &FeatureMatrix) -> Result<Vec<f64>>;

    /// Labels and probabilities for the same matrix.
    ///
    /// The default calls `predict` then `predict_probability`. Models whose
    /// single inference pass yields both override this to run once.
    fn predict_with_probability(
        &self,
        features: &FeatureMatrix,
    ) -> Result<(Vec<i64>, Vec<f64>)> {
        Ok((self.predict(features)?, self.predict_probability(features)?))
    }
}
