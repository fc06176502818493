mod process;
mod session;
mod throttle;
mod worker;

pub use process::{encode_jpeg, processing_dimensions, FrameProcessor};
pub use session::{FrameDecision, PreviewSession, PreviewUpdate};
pub use throttle::FrameThrottle;
pub use worker::{Job, JobKind, JobOutcome, SubmitError, Worker};

use crate::color::ColorSpec;
use crate::config::ProcessingConfig;
use crate::error::Result;
use crate::segmentation::SegmentationEngine;

/// Move the engine onto a worker thread and open a preview session on it.
pub fn start_session(
    engine: SegmentationEngine,
    config: &ProcessingConfig,
    color: ColorSpec,
) -> Result<PreviewSession> {
    let worker = Worker::spawn(FrameProcessor::new(engine, config))?;
    Ok(PreviewSession::new(worker, config, color))
}
