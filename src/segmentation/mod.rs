mod engine;
mod onnx;
mod preprocess;
pub mod types;

pub use engine::SegmentationEngine;
pub use onnx::OnnxHairModel;
pub use preprocess::{blur_sigma, Preprocessor};
pub use types::{ClassScores, SegmentationMask, SegmentationModel};

use crate::config::{ModelConfig, ProcessingConfig};
use crate::error::Result;
use std::path::Path;

/// Load the ONNX hair model and wrap it in a ready engine.
pub fn create_default_engine<P: AsRef<Path>>(
    model_path: P,
    model: ModelConfig,
    processing: &ProcessingConfig,
) -> Result<SegmentationEngine> {
    let onnx = OnnxHairModel::new(model_path, model.clone(), processing)?;
    SegmentationEngine::with_model(Box::new(onnx), model, processing.mask_blur_radius)
}
