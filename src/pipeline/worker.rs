use super::process::FrameProcessor;
use crate::error::{PipelineError, Result};
use image::RgbImage;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError, TrySendError};
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Preview,
    Still,
}

/// Self-contained unit of work handed to the worker thread.
pub struct Job {
    pub id: u64,
    pub kind: JobKind,
    /// Color selection generation the job was submitted under.
    pub generation: u64,
    pub image: RgbImage,
    pub target: [u8; 3],
}

/// Result of one job, encoded as JPEG on success.
pub struct JobOutcome {
    pub id: u64,
    pub kind: JobKind,
    pub generation: u64,
    pub result: Result<Vec<u8>>,
}

pub enum SubmitError {
    /// A job is already queued; the new one is handed back.
    Busy(Job),
    Stopped,
}

/// Background thread owning the segmentation engine.
///
/// The job queue holds a single entry and submissions never block, so a
/// busy worker drops new preview frames instead of building a backlog.
pub struct Worker {
    jobs: Option<SyncSender<Job>>,
    results: Receiver<JobOutcome>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn spawn(mut processor: FrameProcessor) -> Result<Self> {
        let (job_tx, job_rx) = mpsc::sync_channel::<Job>(1);
        let (result_tx, result_rx) = mpsc::channel::<JobOutcome>();

        let handle = thread::Builder::new()
            .name("tintcam-worker".into())
            .spawn(move || {
                tracing::info!("Processing worker started");
                while let Ok(job) = job_rx.recv() {
                    let _span = tracing::debug_span!("job", id = job.id).entered();
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        processor.recolor_jpeg(&job.image, job.target)
                    }))
                    .unwrap_or_else(|_| {
                        Err(PipelineError::PreviewFrame(format!("job {} panicked", job.id)))
                    });

                    let outcome = JobOutcome {
                        id: job.id,
                        kind: job.kind,
                        generation: job.generation,
                        result,
                    };
                    if result_tx.send(outcome).is_err() {
                        break;
                    }
                }
                tracing::info!("Processing worker finished");
            })?;

        Ok(Self {
            jobs: Some(job_tx),
            results: result_rx,
            handle: Some(handle),
        })
    }

    pub fn try_submit(&self, job: Job) -> std::result::Result<(), SubmitError> {
        let Some(jobs) = &self.jobs else {
            return Err(SubmitError::Stopped);
        };
        jobs.try_send(job).map_err(|e| match e {
            TrySendError::Full(job) => SubmitError::Busy(job),
            TrySendError::Disconnected(_) => SubmitError::Stopped,
        })
    }

    /// Blocking submit, for callers that have already drained the queue.
    pub fn submit(&self, job: Job) -> Result<()> {
        let jobs = self.jobs.as_ref().ok_or_else(stopped)?;
        jobs.send(job).map_err(|_| stopped())
    }

    /// Non-blocking check for a finished job.
    pub fn try_recv(&self) -> Result<Option<JobOutcome>> {
        match self.results.try_recv() {
            Ok(outcome) => Ok(Some(outcome)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(stopped()),
        }
    }

    pub fn recv(&self) -> Result<JobOutcome> {
        self.results.recv().map_err(|_| stopped())
    }

    /// Close the queue and wait for the thread to exit.
    pub fn shutdown(&mut self) {
        self.jobs = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Processing worker panicked during shutdown");
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn stopped() -> PipelineError {
    PipelineError::EngineUnavailable("processing worker stopped".into())
}
