use crate::error::{PipelineError, Result};
use std::time::Duration;

/// Processing options resolved once per pipeline instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingConfig {
    /// Register CUDA/TensorRT execution providers; falls back to CPU silently.
    pub enable_hardware_acceleration: bool,
    /// Intra-op threads for inference, at least 1.
    pub inference_threads: usize,
    /// Gaussian blur radius applied to the mask, 0 disables.
    pub mask_blur_radius: u32,
    /// Mask values at or below this alpha leave the pixel untouched.
    pub mask_inclusion_threshold: f32,
    /// JPEG quality for preview and still output (0..=100).
    pub output_encoding_quality: u8,
    /// Long edge above which frames are downscaled before processing.
    pub max_processing_dimension: u32,
    /// Minimum interval between accepted preview frames.
    pub preview_interval: Duration,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            enable_hardware_acceleration: true,
            inference_threads: 2,
            mask_blur_radius: 3,
            mask_inclusion_threshold: 0.0,
            output_encoding_quality: 85,
            max_processing_dimension: 360,
            preview_interval: Duration::from_millis(450),
        }
    }
}

impl ProcessingConfig {
    pub fn validate(self) -> Result<Self> {
        if self.inference_threads == 0 {
            return Err(PipelineError::InvalidConfig(
                "inference_threads must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.mask_inclusion_threshold) {
            return Err(PipelineError::InvalidConfig(format!(
                "mask_inclusion_threshold {} outside [0, 1]",
                self.mask_inclusion_threshold
            )));
        }
        if self.output_encoding_quality > 100 {
            return Err(PipelineError::InvalidConfig(format!(
                "output_encoding_quality {} outside [0, 100]",
                self.output_encoding_quality
            )));
        }
        if self.max_processing_dimension == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_processing_dimension must be positive".into(),
            ));
        }
        Ok(self)
    }

    /// JPEG encoders reject quality 0.
    pub fn jpeg_quality(&self) -> u8 {
        self.output_encoding_quality.clamp(1, 100)
    }
}

/// Memory order of the model's image tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TensorLayout {
    /// `[1, H, W, C]`, as exported from TFLite.
    #[default]
    Nhwc,
    /// `[1, C, H, W]`
    Nchw,
}

/// Shape contract of the segmentation model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub input_size: u32,
    pub num_classes: usize,
    pub hair_class: usize,
    pub layout: TensorLayout,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            input_size: 256,
            num_classes: 6,
            hair_class: 1,
            layout: TensorLayout::Nhwc,
        }
    }
}

impl ModelConfig {
    pub fn validate(self) -> Result<Self> {
        if self.input_size == 0 {
            return Err(PipelineError::InvalidConfig("model input size must be positive".into()));
        }
        if self.num_classes < 2 {
            return Err(PipelineError::InvalidConfig(format!(
                "model needs at least 2 classes, got {}",
                self.num_classes
            )));
        }
        if self.hair_class >= self.num_classes {
            return Err(PipelineError::InvalidConfig(format!(
                "hair class {} out of range for {} classes",
                self.hair_class, self.num_classes
            )));
        }
        Ok(self)
    }
}
