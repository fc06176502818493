use crate::composite::{upscale_to, Compositor};
use crate::config::ProcessingConfig;
use crate::error::Result;
use crate::segmentation::SegmentationEngine;
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, RgbImage};
use std::time::Instant;

/// Segmentation plus compositing for one image, owned by whichever thread
/// runs it.
pub struct FrameProcessor {
    engine: SegmentationEngine,
    compositor: Compositor,
    max_dimension: u32,
    quality: u8,
}

impl FrameProcessor {
    pub fn new(engine: SegmentationEngine, config: &ProcessingConfig) -> Self {
        Self {
            engine,
            compositor: Compositor::new(config.mask_inclusion_threshold),
            max_dimension: config.max_processing_dimension,
            quality: config.jpeg_quality(),
        }
    }

    /// Recolor hair in `image`, returning a raster of the same size.
    ///
    /// Large images are processed at a reduced resolution and scaled back.
    pub fn recolor(&mut self, image: &RgbImage, target: [u8; 3]) -> Result<RgbImage> {
        let start = Instant::now();
        let (width, height) = image.dimensions();
        let (work_width, work_height) = processing_dimensions(width, height, self.max_dimension);

        let working = if (work_width, work_height) != (width, height) {
            tracing::debug!(
                "Downscaling {}x{} to {}x{} for processing",
                width,
                height,
                work_width,
                work_height
            );
            imageops::resize(image, work_width, work_height, imageops::FilterType::Triangle)
        } else {
            image.clone()
        };

        let mask = self.engine.segment(&working)?;
        let tinted = self.compositor.composite(&working, &mask, target)?;
        let output = upscale_to(&tinted, width, height);

        tracing::debug!(
            "Recolored {}x{} in {:.1}ms",
            width,
            height,
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(output)
    }

    /// Recolor and encode as JPEG at the configured quality.
    pub fn recolor_jpeg(&mut self, image: &RgbImage, target: [u8; 3]) -> Result<Vec<u8>> {
        let tinted = self.recolor(image, target)?;
        encode_jpeg(&tinted, self.quality)
    }
}

/// Aspect-preserving size whose long edge is at most `max_dimension`.
pub fn processing_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let long = width.max(height);
    if long <= max_dimension {
        return (width, height);
    }
    let scale = max_dimension as f64 / long as f64;
    let scaled = |v: u32| ((v as f64 * scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}

pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let _span = tracing::debug_span!("encode_jpeg").entered();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality).encode_image(image)?;
    Ok(bytes)
}
