//! Recolor compositing: soft-light blend of a target color into hair pixels.

use crate::error::{PipelineError, Result};
use image::{imageops, GrayImage, RgbImage};

/// Blends a target color into the masked region of an image.
#[derive(Debug, Clone, Copy)]
pub struct Compositor {
    threshold: f32,
}

impl Compositor {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Recolor `original` wherever `mask` exceeds the inclusion threshold.
    ///
    /// The caller skips this entirely for the "no color" selection.
    pub fn composite(&self, original: &RgbImage, mask: &GrayImage, target: [u8; 3]) -> Result<RgbImage> {
        let _span = tracing::debug_span!("composite").entered();

        if original.dimensions() != mask.dimensions() {
            let (image_width, image_height) = original.dimensions();
            let (mask_width, mask_height) = mask.dimensions();
            return Err(PipelineError::MaskMismatch {
                mask_width,
                mask_height,
                image_width,
                image_height,
            });
        }

        let mut output = original.clone();
        for (px, &m) in output.chunks_exact_mut(3).zip(mask.as_raw().iter()) {
            let alpha = m as f32 / 255.0;
            if alpha <= self.threshold {
                continue;
            }
            let weight = alpha.sqrt();
            let source = [px[0], px[1], px[2]];
            for c in 0..3 {
                px[c] = mix(source[c], target[c], weight);
            }
        }
        Ok(output)
    }
}

/// Soft-light style blend of one channel.
pub fn soft_light(original: u8, target: u8) -> f32 {
    let o = original as f32;
    let t = target as f32;
    if o < 128.0 {
        2.0 * o * t / 255.0
    } else {
        255.0 - 2.0 * (255.0 - o) * (255.0 - t) / 255.0
    }
}

fn mix(original: u8, target: u8, weight: f32) -> u8 {
    let blended = soft_light(original, target);
    let value = blended * weight + original as f32 * (1.0 - weight);
    value.round().clamp(0.0, 255.0) as u8
}

/// Scale a processed raster back to the source resolution.
pub fn upscale_to(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    imageops::resize(image, width, height, imageops::FilterType::Triangle)
}
