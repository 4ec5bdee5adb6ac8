//! Classifier artifacts and their loader

pub mod classifier;
pub mod loader;
pub mod onnx;
pub mod xgboost;

pub use classifier::Classifier;
pub use loader::{FeatureInfo, ModelLoader};
pub use onnx::OnnxModel;
pub use xgboost::XgboostModel;
