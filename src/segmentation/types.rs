use crate::config::TensorLayout;
use crate::error::{PipelineError, Result};
use image::GrayImage;
use ndarray::Array4;

/// Hair mask: 0 = background, 255 = hair.
/// Dimensions match the raster it is applied to.
pub type SegmentationMask = GrayImage;

/// Per-pixel class scores produced by a segmentation model.
#[derive(Debug, Clone)]
pub struct ClassScores {
    pub width: u32,
    pub height: u32,
    pub num_classes: usize,
    pub layout: TensorLayout,
    pub data: Vec<f32>,
}

impl ClassScores {
    /// Check that the grid is non-empty, carries `expected_classes` classes
    /// and holds exactly one score per pixel and class.
    pub fn validate(&self, expected_classes: usize) -> Result<()> {
        if self.width == 0 || self.height == 0 || self.num_classes == 0 {
            return Err(PipelineError::Inference(format!(
                "empty score grid {}x{}x{}",
                self.width, self.height, self.num_classes
            )));
        }
        if self.num_classes != expected_classes {
            return Err(PipelineError::Inference(format!(
                "model produced {} classes, expected {}",
                self.num_classes, expected_classes
            )));
        }
        let needed = self.width as usize * self.height as usize * self.num_classes;
        if self.data.len() != needed {
            return Err(PipelineError::Inference(format!(
                "score grid {}x{}x{} holds {} values, needs {}",
                self.width,
                self.height,
                self.num_classes,
                self.data.len(),
                needed
            )));
        }
        Ok(())
    }

    pub fn score(&self, x: u32, y: u32, class: usize) -> f32 {
        let (w, h) = (self.width as usize, self.height as usize);
        let (x, y) = (x as usize, y as usize);
        let idx = match self.layout {
            TensorLayout::Nhwc => (y * w + x) * self.num_classes + class,
            TensorLayout::Nchw => class * w * h + y * w + x,
        };
        self.data[idx]
    }

    /// Index of the highest score at a pixel; the first maximum wins ties.
    pub fn argmax(&self, x: u32, y: u32) -> usize {
        let mut best = 0;
        let mut best_score = self.score(x, y, 0);
        for class in 1..self.num_classes {
            let score = self.score(x, y, class);
            if score > best_score {
                best = class;
                best_score = score;
            }
        }
        best
    }
}

/// Trait for segmentation models
/// Allows swapping the ONNX Runtime session for other backends or test doubles.
pub trait SegmentationModel: Send {
    /// Run inference on a normalized input tensor
    ///
    /// # Arguments
    /// * `input` - Shape `[1, S, S, 3]` or `[1, 3, S, S]` depending on layout
    ///
    /// # Returns
    /// * Class scores at the model's native output resolution
    fn infer(&mut self, input: Array4<f32>) -> Result<ClassScores>;

    /// Edge length of the square model input
    fn input_size(&self) -> u32;
}
