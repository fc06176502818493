use super::throttle::FrameThrottle;
use super::worker::{Job, JobKind, JobOutcome, SubmitError, Worker};
use crate::capture::CameraSource;
use crate::color::ColorSpec;
use crate::config::ProcessingConfig;
use crate::error::{PipelineError, Result};
use crate::frame::{self, RawFrame};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// What happened to a frame offered to the preview session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDecision {
    /// Converted and handed to the worker.
    Accepted,
    /// Arrived within the throttle interval of the last accepted frame.
    Throttled,
    /// A job is still in flight.
    Busy,
    /// "No color" is selected; nothing to process.
    NoColor,
    /// The frame could not be converted; dropped.
    ConversionFailed,
    /// The worker is gone.
    Unavailable,
}

/// Change to the displayed preview, reported by `poll` and `select_color`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewUpdate {
    /// `last_preview` holds a new frame.
    Updated,
    /// The processed overlay was removed.
    Cleared,
}

/// Live preview and still capture orchestration.
///
/// All methods run on the interactive thread. Only the worker performs
/// segmentation and compositing; results come back through `poll`.
pub struct PreviewSession {
    worker: Worker,
    throttle: FrameThrottle,
    selected: ColorSpec,
    generation: u64,
    last_preview: Option<Vec<u8>>,
    in_flight: Option<u64>,
    next_job_id: u64,
}

impl PreviewSession {
    pub fn new(worker: Worker, config: &ProcessingConfig, color: ColorSpec) -> Self {
        Self {
            worker,
            throttle: FrameThrottle::new(config.preview_interval),
            selected: color,
            generation: 0,
            last_preview: None,
            in_flight: None,
            next_job_id: 0,
        }
    }

    pub fn selected(&self) -> ColorSpec {
        self.selected
    }

    pub fn last_preview(&self) -> Option<&[u8]> {
        self.last_preview.as_deref()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Switch the target color. Results of jobs started under the previous
    /// color are discarded when they arrive.
    pub fn select_color(&mut self, color: ColorSpec) -> Option<PreviewUpdate> {
        tracing::info!("Selected color: {}", color);
        self.selected = color;
        self.generation += 1;

        if color.is_none() && self.last_preview.take().is_some() {
            return Some(PreviewUpdate::Cleared);
        }
        None
    }

    /// Offer a camera frame for preview processing.
    pub fn offer_frame(&mut self, raw: &RawFrame, now: Instant) -> FrameDecision {
        let Some(target) = self.selected.rgb else {
            return FrameDecision::NoColor;
        };
        if self.in_flight.is_some() {
            return FrameDecision::Busy;
        }
        if !self.throttle.is_ready(now) {
            return FrameDecision::Throttled;
        }

        let image = match frame::convert(raw) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!("Dropping preview frame: {}", e);
                self.throttle.mark(now);
                return FrameDecision::ConversionFailed;
            }
        };

        let id = self.next_id();
        let job = Job {
            id,
            kind: JobKind::Preview,
            generation: self.generation,
            image,
            target,
        };
        match self.worker.try_submit(job) {
            Ok(()) => {
                tracing::debug!("Preview job {} submitted", id);
                self.throttle.mark(now);
                self.in_flight = Some(id);
                FrameDecision::Accepted
            }
            Err(SubmitError::Busy(_)) => FrameDecision::Busy,
            Err(SubmitError::Stopped) => {
                tracing::error!("Processing worker stopped; preview disabled");
                FrameDecision::Unavailable
            }
        }
    }

    /// Collect a finished preview job, if any.
    pub fn poll(&mut self) -> Option<PreviewUpdate> {
        match self.worker.try_recv() {
            Ok(Some(outcome)) => self.apply(outcome),
            Ok(None) => None,
            Err(e) => {
                if self.in_flight.take().is_some() {
                    tracing::error!("Preview job lost: {}", e);
                }
                None
            }
        }
    }

    /// Block until the in-flight preview job, if any, has completed.
    pub fn wait_idle(&mut self) -> Option<PreviewUpdate> {
        let mut update = None;
        while self.in_flight.is_some() {
            match self.worker.recv() {
                Ok(outcome) => update = self.apply(outcome).or(update),
                Err(e) => {
                    tracing::error!("Preview job lost: {}", e);
                    self.in_flight = None;
                }
            }
        }
        update
    }

    fn apply(&mut self, outcome: JobOutcome) -> Option<PreviewUpdate> {
        if self.in_flight == Some(outcome.id) {
            self.in_flight = None;
        }
        if outcome.kind != JobKind::Preview {
            tracing::warn!("Unexpected {:?} result for job {}", outcome.kind, outcome.id);
            return None;
        }

        match outcome.result {
            Ok(bytes) if outcome.generation == self.generation && !self.selected.is_none() => {
                tracing::debug!("Preview job {} done ({} bytes)", outcome.id, bytes.len());
                self.last_preview = Some(bytes);
                Some(PreviewUpdate::Updated)
            }
            Ok(_) => {
                tracing::debug!("Discarding preview job {} from an earlier color", outcome.id);
                None
            }
            Err(e) => {
                tracing::warn!("Preview job {} failed: {}", outcome.id, e);
                None
            }
        }
    }

    /// Take a picture and recolor it.
    ///
    /// The preview stream is stopped for the duration and restarted whatever
    /// the outcome. With "no color" selected the picture is returned as is.
    pub fn capture_still<C: CameraSource + ?Sized>(&mut self, camera: &mut C, dir: &Path) -> Result<PathBuf> {
        if let Err(e) = camera.stop_stream() {
            tracing::warn!("Failed to stop preview stream: {:#}", e);
        }
        self.wait_idle();

        let result = camera
            .take_picture(dir)
            .map_err(|e| PipelineError::StillCapture(format!("{e:#}")))
            .and_then(|picture| self.process_still_file(&picture));

        if let Err(e) = camera.start_stream() {
            tracing::warn!("Failed to restart preview stream: {:#}", e);
        }
        result
    }

    /// Recolor an image file, writing `<stem>_tinted.jpg` beside it.
    pub fn process_still_file(&mut self, picture: &Path) -> Result<PathBuf> {
        let Some(target) = self.selected.rgb else {
            return Ok(picture.to_path_buf());
        };
        self.wait_idle();

        let still = |e: PipelineError| PipelineError::StillCapture(e.to_string());
        let image = image::open(picture)
            .map_err(|e| still(e.into()))?
            .to_rgb8();

        let id = self.next_id();
        self.worker
            .submit(Job {
                id,
                kind: JobKind::Still,
                generation: self.generation,
                image,
                target,
            })
            .map_err(still)?;

        let bytes = loop {
            let outcome = self.worker.recv().map_err(still)?;
            if outcome.id == id {
                break outcome.result.map_err(still)?;
            }
            self.apply(outcome);
        };

        let output = tinted_path(picture);
        std::fs::write(&output, bytes).map_err(|e| still(e.into()))?;
        tracing::info!("Still saved to {}", output.display());
        Ok(output)
    }

    pub fn shutdown(mut self) {
        self.worker.shutdown();
    }

    fn next_id(&mut self) -> u64 {
        self.next_job_id += 1;
        self.next_job_id
    }
}

fn tinted_path(picture: &Path) -> PathBuf {
    let stem = picture
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "capture".into());
    picture.with_file_name(format!("{stem}_tinted.jpg"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tinted_path() {
        assert_eq!(
            tinted_path(Path::new("/tmp/a/capture_1.jpg")),
            PathBuf::from("/tmp/a/capture_1_tinted.jpg")
        );
        assert_eq!(tinted_path(Path::new("photo.png")), PathBuf::from("photo_tinted.jpg"));
    }
}
