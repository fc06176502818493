use thiserror::Error;

/// Failures of the recolor pipeline.
///
/// Startup failures (`EngineUnavailable`, `CameraUnavailable`) block the
/// caller. `StillCapture` is user-visible but retryable. `PreviewFrame` and
/// `FrameConversion` are recovered per frame by the preview session.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("segmentation engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("frame conversion failed: {0}")]
    FrameConversion(String),

    #[error("still capture failed: {0}")]
    StillCapture(String),

    #[error("preview frame failed: {0}")]
    PreviewFrame(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("mask is {mask_width}x{mask_height} but image is {image_width}x{image_height}")]
    MaskMismatch {
        mask_width: u32,
        mask_height: u32,
        image_width: u32,
        image_height: u32,
    },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
