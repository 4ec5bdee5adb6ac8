//! ONNX Runtime classifier for exported models

use crate::models::classifier::Classifier;
use crate::types::FeatureMatrix;
use anyhow::{Context, Result};
use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session, SessionOutputs};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Probability above which rows are labelled fraud when the exported graph
/// has no label output
const FALLBACK_THRESHOLD: f64 = 0.5;

/// Exported classifier served through ONNX Runtime.
///
/// The session is behind a mutex because running it needs exclusive access.
pub struct OnnxModel {
    name: String,
    feature_names: Vec<String>,
    session: Mutex<Session>,
    input_name: String,
    probability_output: String,
    label_output: Option<String>,
}

impl OnnxModel {
    /// Load a model file. The feature schema comes from outside the graph,
    /// since ONNX inputs carry no column names.
    pub fn load<P: AsRef<Path>>(
        path: P,
        name: &str,
        feature_names: Vec<String>,
        threads: usize,
    ) -> Result<Self> {
        let path = path.as_ref();

        info!(model = %name, path = %path.display(), threads = threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let label_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("label"))
            .map(|o| o.name.clone());

        let probability_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .or_else(|| session.outputs.iter().rev().find(|o| !o.name.contains("label")))
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "probabilities".to_string());

        info!(
            model = %name,
            input = %input_name,
            probability_output = %probability_output,
            label_output = ?label_output,
            features = feature_names.len(),
            "Model loaded successfully"
        );

        Ok(Self {
            name: name.to_string(),
            feature_names,
            session: Mutex::new(session),
            input_name,
            probability_output,
            label_output,
        })
    }

    /// Run the graph once and collect probabilities plus labels, when the
    /// graph emits them.
    fn run(&self, features: &FeatureMatrix) -> Result<(Vec<f64>, Option<Vec<i64>>)> {
        anyhow::ensure!(
            features.cols() == self.feature_names.len(),
            "expected {} feature columns, got {}",
            self.feature_names.len(),
            features.cols()
        );

        let shape = vec![features.rows() as i64, features.cols() as i64];
        let input_tensor = Tensor::from_array((shape, features.as_slice().to_vec()))
            .context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let outputs = session.run(ort::inputs![&self.input_name => input_tensor])?;

        let probabilities = self.extract_probabilities(&outputs, features.rows())?;
        let labels = match &self.label_output {
            Some(label_name) => match outputs.get(label_name.as_str()) {
                Some(output) => {
                    let (_, data) = output.try_extract_tensor::<i64>()?;
                    Some(data.to_vec())
                }
                None => None,
            },
            None => None,
        };

        debug!(
            model = %self.name,
            rows = features.rows(),
            labels = labels.is_some(),
            "ONNX inference complete"
        );

        Ok((probabilities, labels))
    }

    /// Fraud-class probability per row.
    ///
    /// Handles tensor outputs (`[rows, 2]`, `[rows, 1]`, `[rows]`) and the
    /// `seq(map(int64, float))` form some converters emit.
    fn extract_probabilities(&self, outputs: &SessionOutputs, rows: usize) -> Result<Vec<f64>> {
        let output = outputs
            .get(self.probability_output.as_str())
            .with_context(|| format!("model has no output '{}'", self.probability_output))?;

        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let dims: Vec<i64> = shape.iter().copied().collect();
            return Ok(probabilities_from_tensor(&dims, data, rows));
        }

        let dtype = output.dtype();
        if DynSequenceValueType::can_downcast(&dtype) {
            return extract_from_sequence_map(output);
        }

        anyhow::bail!(
            "output '{}' is neither a float tensor nor a sequence of maps",
            self.probability_output
        )
    }
}

impl Classifier for OnnxModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<i64>> {
        let (labels, _) = self.predict_with_probability(features)?;
        Ok(labels)
    }

    fn predict_probability(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
        let (probabilities, _) = self.run(features)?;
        Ok(probabilities)
    }

    /// One graph run serves both outputs.
    fn predict_with_probability(
        &self,
        features: &FeatureMatrix,
    ) -> Result<(Vec<i64>, Vec<f64>)> {
        let (probabilities, labels) = self.run(features)?;
        Ok((resolve_labels(labels, &probabilities), probabilities))
    }
}

/// Graph labels when present, otherwise thresholded probabilities.
fn resolve_labels(labels: Option<Vec<i64>>, probabilities: &[f64]) -> Vec<i64> {
    labels.unwrap_or_else(|| {
        probabilities
            .iter()
            .map(|&p| i64::from(p > FALLBACK_THRESHOLD))
            .collect()
    })
}

/// Pick the fraud column out of a probability tensor.
fn probabilities_from_tensor(dims: &[i64], data: &[f32], rows: usize) -> Vec<f64> {
    let width = match dims {
        [_, classes] if *classes >= 2 => *classes as usize,
        _ => 1,
    };
    let fraud_column = if width >= 2 { 1 } else { 0 };

    (0..rows)
        .filter_map(|row| data.get(row * width + fraud_column))
        .map(|&p| p as f64)
        .collect()
}

/// Fraud probability per row from `seq(map(int64, float))`.
fn extract_from_sequence_map(output: &DynValue) -> Result<Vec<f64>> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| anyhow::anyhow!("Failed to downcast to sequence: {}", e))?;

    let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;

    maps.iter()
        .map(|map_value| {
            let kv_pairs = map_value.try_extract_key_values::<i64, f32>()?;
            fraud_probability_from_pairs(&kv_pairs)
                .ok_or_else(|| anyhow::anyhow!("No probability found in map"))
        })
        .collect()
}

/// Fraud probability from one `{class_id: probability}` map. Class 1 wins;
/// a map with only class 0 is complemented.
fn fraud_probability_from_pairs(pairs: &[(i64, f32)]) -> Option<f64> {
    if let Some((_, prob)) = pairs.iter().find(|(class_id, _)| *class_id == 1) {
        return Some(*prob as f64);
    }
    pairs
        .iter()
        .find(|(class_id, _)| *class_id == 0)
        .map(|(_, prob)| 1.0 - *prob as f64)
}
