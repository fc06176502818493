use super::types::{ClassScores, SegmentationMask};
use crate::config::TensorLayout;
use crate::error::{PipelineError, Result};
use image::{imageops, GrayImage, Luma, RgbImage};
use ndarray::Array4;

/// Preprocessor for converting RGB images to model input tensors
pub struct Preprocessor {
    size: u32,
    layout: TensorLayout,
}

impl Preprocessor {
    pub fn new(size: u32, layout: TensorLayout) -> Self {
        Self { size, layout }
    }

    /// Preprocess an RGB image into a normalized tensor
    ///
    /// Steps:
    /// 1. Resize to the square model input with an averaging filter
    /// 2. Normalize each channel to [-1, 1] as `(v - 127.5) / 127.5`
    /// 3. Lay out as NHWC or NCHW
    pub fn preprocess(&self, image: &RgbImage) -> Result<Array4<f32>> {
        let _span = tracing::debug_span!("preprocess").entered();

        let resized = if image.dimensions() != (self.size, self.size) {
            imageops::resize(image, self.size, self.size, imageops::FilterType::Triangle)
        } else {
            image.clone()
        };

        let s = self.size as usize;
        let plane = s * s;
        let mut data = vec![0f32; plane * 3];
        for (i, px) in resized.as_raw().chunks_exact(3).enumerate() {
            for c in 0..3 {
                let value = (px[c] as f32 - 127.5) / 127.5;
                match self.layout {
                    TensorLayout::Nhwc => data[i * 3 + c] = value,
                    TensorLayout::Nchw => data[c * plane + i] = value,
                }
            }
        }

        let shape = match self.layout {
            TensorLayout::Nhwc => (1, s, s, 3),
            TensorLayout::Nchw => (1, 3, s, s),
        };
        Array4::from_shape_vec(shape, data)
            .map_err(|e| PipelineError::Inference(format!("input tensor shape: {e}")))
    }

    /// Binary hair mask at model resolution: 255 where the hair class wins.
    pub fn hair_mask(scores: &ClassScores, hair_class: usize) -> GrayImage {
        GrayImage::from_fn(scores.width, scores.height, |x, y| {
            if scores.argmax(x, y) == hair_class {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    /// Resize the mask to the target raster and soften its edges.
    pub fn postprocess_mask(
        mask: &GrayImage,
        target_width: u32,
        target_height: u32,
        blur_radius: u32,
    ) -> SegmentationMask {
        let _span = tracing::debug_span!("postprocess").entered();

        let resized = if mask.dimensions() != (target_width, target_height) {
            imageops::resize(
                mask,
                target_width,
                target_height,
                imageops::FilterType::Triangle,
            )
        } else {
            mask.clone()
        };

        if blur_radius == 0 {
            resized
        } else {
            imageops::blur(&resized, blur_sigma(blur_radius))
        }
    }
}

/// Gaussian sigma for a blur radius in pixels.
pub fn blur_sigma(radius: u32) -> f32 {
    0.4 * radius as f32 + 0.6
}
