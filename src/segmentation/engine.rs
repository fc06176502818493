use super::preprocess::Preprocessor;
use super::types::{SegmentationMask, SegmentationModel};
use crate::config::ModelConfig;
use crate::error::{PipelineError, Result};
use image::RgbImage;

/// Segmentation engine: model plus the pre/post-processing around it.
///
/// The model slot starts empty; `segment` fails with `EngineUnavailable`
/// until `load` has been called once.
pub struct SegmentationEngine {
    model: Option<Box<dyn SegmentationModel>>,
    preprocessor: Preprocessor,
    config: ModelConfig,
    blur_radius: u32,
}

impl SegmentationEngine {
    pub fn new(config: ModelConfig, blur_radius: u32) -> Self {
        let preprocessor = Preprocessor::new(config.input_size, config.layout);
        Self {
            model: None,
            preprocessor,
            config,
            blur_radius,
        }
    }

    pub fn with_model(
        model: Box<dyn SegmentationModel>,
        config: ModelConfig,
        blur_radius: u32,
    ) -> Result<Self> {
        let mut engine = Self::new(config, blur_radius);
        engine.load(model)?;
        Ok(engine)
    }

    pub fn load(&mut self, model: Box<dyn SegmentationModel>) -> Result<()> {
        if self.model.is_some() {
            return Err(PipelineError::InvalidConfig(
                "segmentation model is already loaded".into(),
            ));
        }
        if model.input_size() != self.config.input_size {
            return Err(PipelineError::EngineUnavailable(format!(
                "model expects {}px input, configured for {}px",
                model.input_size(),
                self.config.input_size
            )));
        }
        self.model = Some(model);
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Produce a hair mask with the same dimensions as `image`.
    pub fn segment(&mut self, image: &RgbImage) -> Result<SegmentationMask> {
        let _span = tracing::debug_span!("segment").entered();

        let model = self
            .model
            .as_mut()
            .ok_or_else(|| PipelineError::EngineUnavailable("model not loaded".into()))?;

        let input = self.preprocessor.preprocess(image)?;
        let scores = model.infer(input)?;
        scores.validate(self.config.num_classes)?;
        if scores.num_classes <= self.config.hair_class {
            return Err(PipelineError::Inference(format!(
                "hair class {} missing from {} model classes",
                self.config.hair_class, scores.num_classes
            )));
        }

        let raw = Preprocessor::hair_mask(&scores, self.config.hair_class);
        let (width, height) = image.dimensions();
        Ok(Preprocessor::postprocess_mask(
            &raw,
            width,
            height,
            self.blur_radius,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TensorLayout;
    use crate::segmentation::ClassScores;
    use image::Rgb;
    use ndarray::Array4;

    /// Labels a pixel as class 1 when its normalized red channel is positive.
    struct RedIsHair {
        size: u32,
    }

    impl SegmentationModel for RedIsHair {
        fn infer(&mut self, input: Array4<f32>) -> Result<ClassScores> {
            let s = self.size as usize;
            let mut data = Vec::with_capacity(s * s * 2);
            for y in 0..s {
                for x in 0..s {
                    let red = input[[0, y, x, 0]];
                    data.extend_from_slice(&[0.0, red]);
                }
            }
            Ok(ClassScores {
                width: self.size,
                height: self.size,
                num_classes: 2,
                layout: TensorLayout::Nhwc,
                data,
            })
        }

        fn input_size(&self) -> u32 {
            self.size
        }
    }

    fn config(size: u32) -> ModelConfig {
        ModelConfig {
            input_size: size,
            num_classes: 2,
            hair_class: 1,
            layout: TensorLayout::Nhwc,
        }
    }

    /// Returns a fixed score grid regardless of input.
    struct FixedScores(ClassScores);

    impl SegmentationModel for FixedScores {
        fn infer(&mut self, _input: Array4<f32>) -> Result<ClassScores> {
            Ok(self.0.clone())
        }

        fn input_size(&self) -> u32 {
            8
        }
    }

    fn engine_returning(width: u32, height: u32, data: Vec<f32>) -> SegmentationEngine {
        let scores = ClassScores {
            width,
            height,
            num_classes: 2,
            layout: TensorLayout::Nhwc,
            data,
        };
        SegmentationEngine::with_model(Box::new(FixedScores(scores)), config(8), 0).unwrap()
    }

    #[test]
    fn test_truncated_scores_are_inference_fault() {
        let mut engine = engine_returning(8, 8, vec![0.0; 10]);
        let result = engine.segment(&RgbImage::new(16, 16));
        assert!(matches!(result, Err(PipelineError::Inference(_))));
    }

    #[test]
    fn test_empty_score_grid_is_inference_fault() {
        let mut engine = engine_returning(0, 0, Vec::new());
        let result = engine.segment(&RgbImage::new(16, 16));
        assert!(matches!(result, Err(PipelineError::Inference(_))));
    }

    #[test]
    fn test_unloaded_engine_is_unavailable() {
        let mut engine = SegmentationEngine::new(config(8), 0);
        let result = engine.segment(&RgbImage::new(4, 4));
        assert!(matches!(result, Err(PipelineError::EngineUnavailable(_))));
    }

    #[test]
    fn test_load_only_once() {
        let mut engine = SegmentationEngine::new(config(8), 0);
        engine.load(Box::new(RedIsHair { size: 8 })).unwrap();
        assert!(engine.is_loaded());
        assert!(engine.load(Box::new(RedIsHair { size: 8 })).is_err());
    }

    #[test]
    fn test_rejects_mismatched_input_size() {
        let mut engine = SegmentationEngine::new(config(8), 0);
        assert!(engine.load(Box::new(RedIsHair { size: 16 })).is_err());
    }

    #[test]
    fn test_mask_matches_image_dimensions() {
        let mut engine =
            SegmentationEngine::with_model(Box::new(RedIsHair { size: 8 }), config(8), 2).unwrap();
        let image = RgbImage::new(37, 21);
        assert_eq!(engine.segment(&image).unwrap().dimensions(), (37, 21));
    }

    #[test]
    fn test_red_half_becomes_hair() {
        let mut engine =
            SegmentationEngine::with_model(Box::new(RedIsHair { size: 16 }), config(16), 0).unwrap();
        let image = RgbImage::from_fn(32, 32, |_, y| {
            if y < 16 {
                Rgb([250, 0, 0])
            } else {
                Rgb([0, 0, 0])
            }
        });
        let mask = engine.segment(&image).unwrap();
        assert_eq!(mask.get_pixel(5, 2)[0], 255);
        assert_eq!(mask.get_pixel(5, 30)[0], 0);
    }
}
