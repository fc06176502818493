use super::types::{ClassScores, SegmentationModel};
use crate::config::{ModelConfig, ProcessingConfig, TensorLayout};
use crate::error::{PipelineError, Result};
use ndarray::Array4;
use ort::execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;

/// Multi-class hair segmentation model executed with ONNX Runtime.
///
/// The session is owned, so the model can be moved into the preview worker
/// thread and used there exclusively.
pub struct OnnxHairModel {
    session: Session,
    input_name: String,
    config: ModelConfig,
}

impl OnnxHairModel {
    /// Load a segmentation model from an ONNX file
    ///
    /// # Arguments
    /// * `model_path` - Path to the ONNX model file
    /// * `config` - Input size, class count and tensor layout of the model
    /// * `processing` - Thread count and hardware acceleration switch
    ///
    /// When acceleration is enabled, CUDA and TensorRT providers are
    /// registered; ONNX Runtime falls back to CPU if they fail to initialize.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        config: ModelConfig,
        processing: &ProcessingConfig,
    ) -> Result<Self> {
        let path = model_path.as_ref();
        tracing::info!("Loading segmentation model from {}", path.display());

        if !path.exists() {
            return Err(PipelineError::EngineUnavailable(format!(
                "model file {} does not exist",
                path.display()
            )));
        }

        let mut builder = Session::builder()
            .map_err(unavailable)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(unavailable)?
            .with_intra_threads(processing.inference_threads)
            .map_err(unavailable)?;

        if processing.enable_hardware_acceleration {
            builder = builder
                .with_execution_providers([
                    TensorRTExecutionProvider::default().build(),
                    CUDAExecutionProvider::default().build(),
                ])
                .map_err(unavailable)?;
        }

        let session = builder.commit_from_file(path).map_err(|e| {
            PipelineError::EngineUnavailable(format!(
                "failed to load model from {}: {e}",
                path.display()
            ))
        })?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| PipelineError::EngineUnavailable("model has no inputs".into()))?;

        tracing::debug!(
            "Model inputs: {:?}, outputs: {:?}",
            session.inputs.iter().map(|i| &i.name).collect::<Vec<_>>(),
            session.outputs.iter().map(|o| &o.name).collect::<Vec<_>>()
        );
        tracing::info!(
            "Segmentation model loaded: {}x{} input, {} classes, hair class {}",
            config.input_size,
            config.input_size,
            config.num_classes,
            config.hair_class
        );

        Ok(Self {
            session,
            input_name,
            config,
        })
    }
}

impl SegmentationModel for OnnxHairModel {
    fn infer(&mut self, input: Array4<f32>) -> Result<ClassScores> {
        let _span = tracing::debug_span!("inference").entered();

        let (n, d1, d2, d3) = input.dim();
        let tensor = Tensor::from_array(([n, d1, d2, d3], input.into_raw_vec()))
            .map_err(|e| PipelineError::Inference(e.to_string()))?;

        let outputs = self
            .session
            .run(vec![(self.input_name.as_str(), tensor)])
            .map_err(|e| PipelineError::Inference(e.to_string()))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| PipelineError::Inference(e.to_string()))?;
        let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();

        scores_from_output(&dims, data, &self.config)
    }

    fn input_size(&self) -> u32 {
        self.config.input_size
    }
}

fn unavailable(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::EngineUnavailable(e.to_string())
}

/// Interpret a raw `[1, H, W, K]` / `[1, K, H, W]` output tensor.
fn scores_from_output(dims: &[usize], data: &[f32], config: &ModelConfig) -> Result<ClassScores> {
    let (height, width, classes) = match (config.layout, dims) {
        (TensorLayout::Nhwc, [1, h, w, k]) => (*h, *w, *k),
        (TensorLayout::Nchw, [1, k, h, w]) => (*h, *w, *k),
        _ => {
            return Err(PipelineError::Inference(format!(
                "unexpected output shape {dims:?} for {:?} layout",
                config.layout
            )))
        }
    };

    let scores = ClassScores {
        width: width as u32,
        height: height as u32,
        num_classes: classes,
        layout: config.layout,
        data: data.to_vec(),
    };
    scores.validate(config.num_classes)?;
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scores_from_nhwc_output() {
        let config = ModelConfig {
            num_classes: 2,
            ..Default::default()
        };
        let scores = scores_from_output(&[1, 2, 3, 2], &[0.0; 12], &config).unwrap();
        assert_eq!((scores.width, scores.height), (3, 2));
    }

    #[test]
    fn test_scores_from_nchw_output() {
        let config = ModelConfig {
            num_classes: 2,
            layout: TensorLayout::Nchw,
            ..Default::default()
        };
        let scores = scores_from_output(&[1, 2, 4, 5], &[0.0; 40], &config).unwrap();
        assert_eq!((scores.width, scores.height), (5, 4));
    }

    #[test]
    fn test_rejects_wrong_class_count() {
        let config = ModelConfig::default();
        assert!(scores_from_output(&[1, 2, 2, 3], &[0.0; 12], &config).is_err());
    }

    #[test]
    fn test_rejects_truncated_output() {
        let config = ModelConfig {
            num_classes: 2,
            ..Default::default()
        };
        assert!(scores_from_output(&[1, 2, 2, 2], &[0.0; 7], &config).is_err());
    }

    #[test]
    fn test_missing_model_file_is_engine_unavailable() {
        let result = OnnxHairModel::new(
            "/nonexistent/hair.onnx",
            ModelConfig::default(),
            &ProcessingConfig::default(),
        );
        assert!(matches!(result, Err(PipelineError::EngineUnavailable(_))));
    }
}
