mod v4l_capture;

pub use v4l_capture::WebcamCapture;

use crate::frame::RawFrame;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Trait for camera capture sources
pub trait CameraSource {
    /// Start delivering preview frames
    fn start_stream(&mut self) -> Result<()>;

    /// Stop delivering preview frames
    fn stop_stream(&mut self) -> Result<()>;

    /// Capture a single preview frame
    fn next_frame(&mut self) -> Result<RawFrame>;

    /// Take a still picture and store it as a decodable image file in `dir`
    fn take_picture(&mut self, dir: &Path) -> Result<PathBuf>;

    /// Get the resolution of captured frames
    fn resolution(&self) -> (u32, u32);
}
