//! Batch scoring pipeline.
//!
//! Takes an uploaded table and a loaded classifier and produces the scored
//! table plus fraud/legitimate counts:
//!
//! 1. reject tables without data rows
//! 2. align columns to the model schema, ignoring the label column
//! 3. run `predict` and `predict_probability` on the same aligned matrix
//! 4. append `fraud_probability` and `prediction` to the original table
//! 5. count fraudulent and legitimate rows
//!
//! The pipeline holds no state between calls.

use crate::config::ScoringConfig;
use crate::error::{SchemaMismatch, ScoringError, ScoringResult};
use crate::feature_aligner::FeatureAligner;
use crate::models::Classifier;
use crate::types::{Prediction, RawTable, ScoredTable, Summary};
use std::time::Instant;
use tracing::{debug, info};

/// Scores uploaded tables against a classifier
pub struct ScoringPipeline {
    aligner: FeatureAligner,
}

impl ScoringPipeline {
    pub fn new() -> Self {
        Self {
            aligner: FeatureAligner::new(),
        }
    }

    pub fn from_config(config: &ScoringConfig) -> Self {
        Self {
            aligner: FeatureAligner::with_label_column(config.label_column.clone()),
        }
    }

    /// Score every row of `raw`.
    ///
    /// The scored table has the same rows, in the same order, as `raw`.
    /// Any failure inside the model is reported as a schema mismatch.
    pub fn score<C: Classifier + ?Sized>(
        &self,
        raw: &RawTable,
        model: &C,
    ) -> ScoringResult<(ScoredTable, Summary)> {
        let start_time = Instant::now();

        if raw.is_empty() {
            return Err(ScoringError::EmptyInput);
        }

        let features = self.aligner.align(raw, model.feature_names())?;

        let (labels, probabilities) = model
            .predict_with_probability(&features)
            .map_err(inference_failure)?;

        let rows = raw.len();
        if labels.len() != rows || probabilities.len() != rows {
            return Err(SchemaMismatch::Inference {
                reason: format!(
                    "model returned {} labels and {} probabilities for {} rows",
                    labels.len(),
                    probabilities.len(),
                    rows
                ),
            }
            .into());
        }

        if let Some((row, p)) = probabilities
            .iter()
            .enumerate()
            .find(|(_, p)| !(0.0..=1.0).contains(*p))
        {
            return Err(SchemaMismatch::Inference {
                reason: format!("probability {} at row {} is outside [0, 1]", p, row),
            }
            .into());
        }

        let predictions = labels
            .iter()
            .enumerate()
            .map(|(row, &label)| {
                Prediction::from_label(label).ok_or_else(|| SchemaMismatch::Inference {
                    reason: format!("label {} at row {} is not a binary class", label, row),
                })
            })
            .collect::<Result<Vec<Prediction>, SchemaMismatch>>()?;

        let summary = Summary::from_predictions(&predictions);
        let scored = ScoredTable::augment(raw, probabilities, predictions);

        debug!(
            model = %model.name(),
            columns = scored.headers().len(),
            "Scored table assembled"
        );
        info!(
            model = %model.name(),
            rows = summary.total,
            fraudulent = summary.fraudulent,
            legitimate = summary.legitimate,
            processing_time_us = start_time.elapsed().as_micros() as u64,
            "Upload scored"
        );

        Ok((scored, summary))
    }
}

impl Default for ScoringPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Score with the default label column.
pub fn score<C: Classifier + ?Sized>(
    raw: &RawTable,
    model: &C,
) -> ScoringResult<(ScoredTable, Summary)> {
    ScoringPipeline::new().score(raw, model)
}

fn inference_failure(e: anyhow::Error) -> ScoringError {
    SchemaMismatch::Inference {
        reason: format!("{:#}", e),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::xgboost::tests::TWO_TREE_MODEL;
    use crate::models::XgboostModel;
    use crate::sample;
    use crate::types::FeatureMatrix;
    use anyhow::Result;

    /// Probability is the first feature divided by 100; the label is the
    /// sign of the second feature. The two rules disagree on purpose so
    /// tests can tell which one drove the prediction.
    struct StubClassifier {
        features: Vec<String>,
    }

    impl StubClassifier {
        fn new(names: &[&str]) -> Self {
            Self {
                features: names.iter().map(|n| n.to_string()).collect(),
            }
        }
    }

    impl Classifier for StubClassifier {
        fn name(&self) -> &str {
            "stub"
        }

        fn feature_names(&self) -> &[String] {
            &self.features
        }

        fn predict(&self, features: &FeatureMatrix) -> Result<Vec<i64>> {
            Ok(features
                .iter_rows()
                .map(|r| i64::from(r.get(1).copied().unwrap_or(0.0) > 0.0))
                .collect())
        }

        fn predict_probability(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
            Ok(features
                .iter_rows()
                .map(|r| (r[0] as f64 / 100.0).clamp(0.0, 1.0))
                .collect())
        }
    }

    /// Returns whatever it was built with, regardless of input
    struct FixedClassifier {
        features: Vec<String>,
        labels: Vec<i64>,
        probabilities: Vec<f64>,
        fail: bool,
    }

    impl Classifier for FixedClassifier {
        fn name(&self) -> &str {
            "fixed"
        }

        fn feature_names(&self) -> &[String] {
            &self.features
        }

        fn predict(&self, _features: &FeatureMatrix) -> Result<Vec<i64>> {
            if self.fail {
                anyhow::bail!("feature_names mismatch");
            }
            Ok(self.labels.clone())
        }

        fn predict_probability(&self, _features: &FeatureMatrix) -> Result<Vec<f64>> {
            Ok(self.probabilities.clone())
        }
    }

    fn fixed(labels: Vec<i64>, probabilities: Vec<f64>) -> FixedClassifier {
        FixedClassifier {
            features: vec!["a".to_string()],
            labels,
            probabilities,
            fail: false,
        }
    }

    fn table(csv: &str) -> RawTable {
        RawTable::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_preserves_rows_and_order() {
        let raw = table("id,a,b\nt1,10,1\nt2,90,-1\nt3,50,1\nt4,0,0\n");
        let model = StubClassifier::new(&["a", "b"]);

        let (scored, summary) = score(&raw, &model).unwrap();

        assert_eq!(scored.len(), raw.len());
        let ids: Vec<&str> = scored.rows().iter().map(|r| r[0].as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2", "t3", "t4"]);
        assert_eq!(summary.fraudulent + summary.legitimate, scored.len());
    }

    #[test]
    fn test_prediction_follows_label_not_probability() {
        // Row 0: low probability, positive label. Row 1: high probability,
        // negative label.
        let raw = table("a,b\n10,1\n90,-1\n");
        let model = StubClassifier::new(&["a", "b"]);

        let (scored, summary) = score(&raw, &model).unwrap();

        assert_eq!(
            scored.predictions(),
            &[Prediction::Fraudulent, Prediction::Legitimate]
        );
        assert!((scored.probabilities()[0] - 0.1).abs() < 1e-6);
        assert!((scored.probabilities()[1] - 0.9).abs() < 1e-6);
        assert_eq!(summary.fraudulent, 1);
        assert_eq!(summary.legitimate, 1);
    }

    #[test]
    fn test_probabilities_in_unit_interval() {
        let raw = table("a,b\n-50,1\n250,1\n42,0\n");
        let model = StubClassifier::new(&["a", "b"]);

        let (scored, _) = score(&raw, &model).unwrap();

        assert!(scored
            .probabilities()
            .iter()
            .all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_label_column_does_not_change_output() {
        let model = StubClassifier::new(&["a", "b"]);
        let without = table("a,b\n10,1\n90,-1\n");
        let with_label = table("a,Class,b\n10,0,1\n90,banana,-1\n");

        let (plain, plain_summary) = score(&without, &model).unwrap();
        let (labelled, labelled_summary) = score(&with_label, &model).unwrap();

        assert_eq!(plain.predictions(), labelled.predictions());
        assert_eq!(plain.probabilities(), labelled.probabilities());
        assert_eq!(plain_summary, labelled_summary);
        // The original columns are all kept
        assert_eq!(labelled.headers()[1], "Class");
        assert_eq!(labelled.rows()[1][1], "banana");
    }

    #[test]
    fn test_missing_feature_named() {
        let raw = table("a,c\n1,2\n");
        let model = StubClassifier::new(&["a", "b"]);

        let err = score(&raw, &model).unwrap_err();

        match err {
            ScoringError::SchemaMismatch(SchemaMismatch::MissingFeatures { columns }) => {
                assert_eq!(columns, vec!["b".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_header_only_is_empty_input() {
        let raw = table("a,b\n");
        let model = StubClassifier::new(&["a", "b"]);

        assert!(matches!(score(&raw, &model), Err(ScoringError::EmptyInput)));
    }

    #[test]
    fn test_empty_check_precedes_schema_check() {
        let raw = table("unrelated\n");
        let model = StubClassifier::new(&["a", "b"]);

        assert!(matches!(score(&raw, &model), Err(ScoringError::EmptyInput)));
    }

    #[test]
    fn test_non_numeric_feature() {
        let raw = table("a,b\n1,yes\n");
        let model = StubClassifier::new(&["a", "b"]);

        let err = score(&raw, &model).unwrap_err();
        assert!(matches!(
            err,
            ScoringError::SchemaMismatch(SchemaMismatch::NonNumeric { .. })
        ));
    }

    #[test]
    fn test_reordered_columns_give_identical_predictions() {
        let model = XgboostModel::from_json_str(TWO_TREE_MODEL, "xgboost", None).unwrap();
        let ordered = table("amount,hour\n50,2\n500,2\n500,12\n");
        let shuffled = table("hour,note,amount\n2,a,50\n2,b,500\n12,c,500\n");

        let (a, a_summary) = score(&ordered, &model).unwrap();
        let (b, b_summary) = score(&shuffled, &model).unwrap();

        assert_eq!(a.predictions(), b.predictions());
        assert_eq!(a.probabilities(), b.probabilities());
        assert_eq!(a_summary, b_summary);
        assert_eq!(a_summary.fraudulent, 2);
        // extra columns survive in their original position
        assert_eq!(b.headers()[1], "note");
    }

    #[test]
    fn test_inference_failure_collapses_to_schema_mismatch() {
        let raw = table("a\n1\n");
        let model = FixedClassifier {
            fail: true,
            ..fixed(vec![0], vec![0.1])
        };

        let err = score(&raw, &model).unwrap_err();
        assert!(matches!(
            err,
            ScoringError::SchemaMismatch(SchemaMismatch::Inference { .. })
        ));
        assert!(err.is_request_error());
    }

    #[test]
    fn test_wrong_output_length_rejected() {
        let raw = table("a\n1\n2\n");
        let model = fixed(vec![0], vec![0.1, 0.2]);

        assert!(matches!(
            score(&raw, &model),
            Err(ScoringError::SchemaMismatch(SchemaMismatch::Inference { .. }))
        ));
    }

    #[test]
    fn test_invalid_model_outputs_rejected() {
        let raw = table("a\n1\n");

        let out_of_range = fixed(vec![1], vec![1.5]);
        assert!(score(&raw, &out_of_range).is_err());

        let nan = fixed(vec![1], vec![f64::NAN]);
        assert!(score(&raw, &nan).is_err());

        let non_binary = fixed(vec![2], vec![0.9]);
        assert!(score(&raw, &non_binary).is_err());
    }

    #[test]
    fn test_sample_table_scores_three_rows() {
        let raw = sample::sample_table().unwrap();
        let names: Vec<&str> = sample::SAMPLE_COLUMNS.to_vec();
        let model = StubClassifier::new(&names);

        let (scored, summary) = score(&raw, &model).unwrap();

        assert_eq!(scored.len(), 3);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.fraudulent + summary.legitimate, 3);
        let headers = scored.headers();
        assert_eq!(headers.len(), 32);
        assert_eq!(headers[30], "fraud_probability");
        assert_eq!(headers[31], "prediction");
    }

    #[test]
    fn test_custom_label_column_from_config() {
        let pipeline = ScoringPipeline::from_config(&ScoringConfig {
            label_column: "b".to_string(),
        });
        let raw = table("a,b\n1,1\n");
        let model = StubClassifier::new(&["a", "b"]);

        // "b" is now the label column, so the model's second feature is missing
        assert!(matches!(
            pipeline.score(&raw, &model),
            Err(ScoringError::SchemaMismatch(SchemaMismatch::MissingFeatures { .. }))
        ));
    }

    #[test]
    fn test_short_row_missing_feature_takes_default_branch() {
        let raw = table("amount,hour\n50\n500,12\n");
        let model = XgboostModel::from_json_str(TWO_TREE_MODEL, "xgboost", None).unwrap();

        let (scored, summary) = score(&raw, &model).unwrap();

        // Row 0: amount < 100 gives -1.5, missing hour goes left for +0.5
        let expected = 1.0 / (1.0 + 1.0f64.exp());
        assert!((scored.probabilities()[0] - expected).abs() < 1e-6);
        assert_eq!(scored.predictions()[0], Prediction::Legitimate);
        assert_eq!(scored.rows()[0][1], "");
        assert_eq!(summary.total, 2);
    }

    #[test]
    fn test_duplicate_feature_header_scores_first_column() {
        let raw = table("amount,hour,amount\n50,2,999\n");
        let model = XgboostModel::from_json_str(TWO_TREE_MODEL, "xgboost", None).unwrap();

        let (scored, summary) = score(&raw, &model).unwrap();

        // amount=50 at night: -1.5 + 0.5
        let expected = 1.0 / (1.0 + 1.0f64.exp());
        assert!((scored.probabilities()[0] - expected).abs() < 1e-6);
        assert_eq!(summary.legitimate, 1);
        assert_eq!(scored.headers().len(), 5);
    }

    /// Serves both outputs from a single pass only
    struct SinglePassClassifier {
        features: Vec<String>,
    }

    impl Classifier for SinglePassClassifier {
        fn name(&self) -> &str {
            "single-pass"
        }

        fn feature_names(&self) -> &[String] {
            &self.features
        }

        fn predict(&self, _features: &FeatureMatrix) -> Result<Vec<i64>> {
            anyhow::bail!("separate predict call")
        }

        fn predict_probability(&self, _features: &FeatureMatrix) -> Result<Vec<f64>> {
            anyhow::bail!("separate predict_probability call")
        }

        fn predict_with_probability(
            &self,
            features: &FeatureMatrix,
        ) -> Result<(Vec<i64>, Vec<f64>)> {
            Ok((vec![1; features.rows()], vec![0.8; features.rows()]))
        }
    }

    #[test]
    fn test_uses_combined_inference_pass() {
        let raw = table("a\n1\n2\n");
        let model = SinglePassClassifier {
            features: vec!["a".to_string()],
        };

        let (scored, summary) = score(&raw, &model).unwrap();
        assert_eq!(summary.fraudulent, 2);
        assert_eq!(scored.probabilities(), &[0.8, 0.8]);
    }

    #[test]
    fn test_accepts_trait_object() {
        let raw = table("a,b\n1,1\n");
        let model: Box<dyn Classifier> = Box::new(StubClassifier::new(&["a", "b"]));

        let (scored, _) = ScoringPipeline::new().score(&raw, model.as_ref()).unwrap();
        assert_eq!(scored.len(), 1);
    }
}
