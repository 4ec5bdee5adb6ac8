//! Configuration management for the fraud dashboard

use crate::feature_aligner::DEFAULT_LABEL_COLUMN;
use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Environment variable naming an alternative configuration file
pub const CONFIG_PATH_ENV: &str = "FRAUD_DASHBOARD_CONFIG";

/// Model artifact format
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    /// XGBoost JSON model (`save_model("*.json")`)
    Xgboost,
    /// ONNX graph served through ONNX Runtime
    Onnx,
}

impl ModelFormat {
    /// Infer the format from a file extension.
    pub fn from_extension(path: &Path) -> Result<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => Ok(ModelFormat::Xgboost),
            Some("onnx") => Ok(ModelFormat::Onnx),
            _ => bail!(
                "cannot infer model format from {}; set model.format",
                path.display()
            ),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFormat::Xgboost => "xgboost",
            ModelFormat::Onnx => "onnx",
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub model: ModelConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Model artifact configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Path to the trained model artifact (required)
    pub path: PathBuf,
    /// Artifact format; inferred from the extension when absent
    #[serde(default)]
    pub format: Option<ModelFormat>,
    /// JSON file with `feature_names`; required for ONNX models
    #[serde(default)]
    pub feature_info: Option<PathBuf>,
    /// Number of threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

/// Scoring configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    /// Ground-truth label column dropped before inference
    #[serde(default = "default_label_column")]
    pub label_column: String,
}

fn default_label_column() -> String {
    DEFAULT_LABEL_COLUMN.to_string()
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            label_column: default_label_column(),
        }
    }
}

/// Report rendering configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// Number of scored rows shown in the preview
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
    /// Buckets in the probability distribution chart
    #[serde(default = "default_histogram_buckets")]
    pub histogram_buckets: usize,
}

fn default_preview_rows() -> usize {
    20
}

fn default_histogram_buckets() -> usize {
    10
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            preview_rows: default_preview_rows(),
            histogram_buckets: default_histogram_buckets(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `FRAUD_DASHBOARD_CONFIG` or the default path
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path.
    ///
    /// The file is optional; `FRAUD__SECTION__KEY` environment variables
    /// override it (for example `FRAUD__MODEL__PATH`).
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("FRAUD")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration (model.path is required)")
    }
}
