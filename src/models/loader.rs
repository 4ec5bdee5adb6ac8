//! Model artifact loader

use crate::config::{ModelConfig, ModelFormat};
use crate::error::{ScoringError, ScoringResult};
use crate::models::classifier::Classifier;
use crate::models::onnx::OnnxModel;
use crate::models::xgboost::XgboostModel;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};

/// Feature schema sidecar written next to an exported model
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureInfo {
    pub feature_names: Vec<String>,
}

impl FeatureInfo {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read feature info {}", path.display()))?;
        let info: FeatureInfo = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse feature info {}", path.display()))?;
        anyhow::ensure!(
            !info.feature_names.is_empty(),
            "feature info {} lists no features",
            path.display()
        );
        Ok(info)
    }
}

/// Loads the classifier artifact once at start-up
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with default settings (1 thread)
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    /// Load the model described by `config`.
    pub fn load(&self, config: &ModelConfig) -> ScoringResult<Box<dyn Classifier>> {
        self.load_model(&config.path, config.format, config.feature_info.as_deref())
    }

    /// Load a model file, failing with `ArtifactUnavailable` on any problem.
    pub fn load_model(
        &self,
        path: &Path,
        format: Option<ModelFormat>,
        feature_info: Option<&Path>,
    ) -> ScoringResult<Box<dyn Classifier>> {
        if !path.is_file() {
            error!(path = %path.display(), "Model file not found");
            return Err(ScoringError::artifact(path, "model file not found"));
        }

        let result = self.try_load(path, format, feature_info);
        match result {
            Ok(model) => {
                info!(
                    model = %model.name(),
                    features = model.feature_names().len(),
                    "Model ready"
                );
                Ok(model)
            }
            Err(e) => {
                error!(path = %path.display(), error = %format!("{:#}", e), "Failed to load model");
                Err(ScoringError::artifact(path, format!("{:#}", e)))
            }
        }
    }

    fn try_load(
        &self,
        path: &Path,
        format: Option<ModelFormat>,
        feature_info: Option<&Path>,
    ) -> Result<Box<dyn Classifier>> {
        let format = match format {
            Some(format) => format,
            None => ModelFormat::from_extension(path)?,
        };
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| format.as_str().to_string());
        let feature_names = feature_info
            .map(FeatureInfo::from_path)
            .transpose()?
            .map(|info| info.feature_names);

        info!(model = %name, path = %path.display(), format = format.as_str(), "Loading model");

        match format {
            ModelFormat::Xgboost => {
                let json = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let model = XgboostModel::from_json_str(&json, &name, feature_names)?;
                Ok(Box::new(model))
            }
            ModelFormat::Onnx => {
                let feature_names = feature_names
                    .context("ONNX models need model.feature_info to name their inputs")?;
                let model = OnnxModel::load(path, &name, feature_names, self.onnx_threads)?;
                Ok(Box::new(model))
            }
        }
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}
