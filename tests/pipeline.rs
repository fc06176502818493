use image::{Rgb, RgbImage};
use ndarray::Array4;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tintcam::capture::CameraSource;
use tintcam::config::TensorLayout;
use tintcam::frame::{rgb_to_i420, RawFrame};
use tintcam::pipeline::{self, FrameDecision, PreviewSession, PreviewUpdate};
use tintcam::segmentation::{ClassScores, SegmentationEngine, SegmentationModel};
use tintcam::{ColorSpec, ModelConfig, PipelineError, ProcessingConfig};

const SIZE: u32 = 8;

/// Labels every pixel as hair.
struct AllHair;

impl SegmentationModel for AllHair {
    fn infer(&mut self, _input: Array4<f32>) -> tintcam::Result<ClassScores> {
        let pixels = (SIZE * SIZE) as usize;
        Ok(ClassScores {
            width: SIZE,
            height: SIZE,
            num_classes: 2,
            layout: TensorLayout::Nhwc,
            data: [0.0, 1.0].repeat(pixels),
        })
    }

    fn input_size(&self) -> u32 {
        SIZE
    }
}

struct Broken;

impl SegmentationModel for Broken {
    fn infer(&mut self, _input: Array4<f32>) -> tintcam::Result<ClassScores> {
        Err(PipelineError::Inference("synthetic failure".into()))
    }

    fn input_size(&self) -> u32 {
        SIZE
    }
}

fn model_config() -> ModelConfig {
    ModelConfig {
        input_size: SIZE,
        num_classes: 2,
        hair_class: 1,
        layout: TensorLayout::Nhwc,
    }
}

fn processing_config() -> ProcessingConfig {
    ProcessingConfig {
        enable_hardware_acceleration: false,
        inference_threads: 1,
        mask_blur_radius: 0,
        mask_inclusion_threshold: 0.0,
        output_encoding_quality: 100,
        max_processing_dimension: 360,
        preview_interval: Duration::from_millis(450),
    }
}

fn session_with(model: Box<dyn SegmentationModel>, color: &str) -> PreviewSession {
    let engine = SegmentationEngine::with_model(model, model_config(), 0).unwrap();
    pipeline::start_session(engine, &processing_config(), ColorSpec::parse(color).unwrap()).unwrap()
}

fn gray_frame() -> RawFrame {
    rgb_to_i420(&RgbImage::from_pixel(16, 12, Rgb([100, 100, 100])))
}

fn close(actual: [u8; 3], expected: [u8; 3], tolerance: i32) -> bool {
    actual
        .iter()
        .zip(expected)
        .all(|(a, e)| (*a as i32 - e as i32).abs() <= tolerance)
}

#[test]
fn test_still_recolors_flat_gray_to_target() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("gray.png");
    RgbImage::from_pixel(24, 16, Rgb([100, 100, 100])).save(&input).unwrap();

    let mut session = session_with(Box::new(AllHair), "#c8320a");
    let output = session.process_still_file(&input).unwrap();
    assert_eq!(output, dir.path().join("gray_tinted.jpg"));

    let result = image::open(&output).unwrap().to_rgb8();
    assert_eq!(result.dimensions(), (24, 16));
    let center = result.get_pixel(12, 8).0;
    assert!(close(center, [157, 39, 8], 4), "{center:?}");
    session.shutdown();
}

#[test]
fn test_still_downscales_and_restores_size() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("big.png");
    RgbImage::from_pixel(800, 400, Rgb([100, 100, 100])).save(&input).unwrap();

    let mut session = session_with(Box::new(AllHair), "red");
    let output = session.process_still_file(&input).unwrap();
    let result = image::open(&output).unwrap().to_rgb8();
    assert_eq!(result.dimensions(), (800, 400));
    assert!(close(result.get_pixel(400, 200).0, [157, 39, 8], 4));
}

#[test]
fn test_still_without_color_returns_input_path() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("photo.png");
    RgbImage::new(4, 4).save(&input).unwrap();

    let mut session = session_with(Box::new(AllHair), "none");
    assert_eq!(session.process_still_file(&input).unwrap(), input);
    assert!(!dir.path().join("photo_tinted.jpg").exists());
}

#[test]
fn test_still_failure_is_still_capture_fault() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("photo.png");
    RgbImage::new(4, 4).save(&input).unwrap();

    let mut session = session_with(Box::new(Broken), "red");
    let result = session.process_still_file(&input);
    assert!(matches!(result, Err(PipelineError::StillCapture(_))));

    let missing = session.process_still_file(&dir.path().join("missing.png"));
    assert!(matches!(missing, Err(PipelineError::StillCapture(_))));
}

#[test]
fn test_preview_in_flight_and_throttle() {
    let mut session = session_with(Box::new(AllHair), "red");
    let start = Instant::now();
    let frame = gray_frame();

    assert_eq!(session.offer_frame(&frame, start), FrameDecision::Accepted);
    assert!(session.is_in_flight());
    assert_eq!(
        session.offer_frame(&frame, start + Duration::from_millis(600)),
        FrameDecision::Busy
    );

    assert_eq!(session.wait_idle(), Some(PreviewUpdate::Updated));
    assert!(!session.is_in_flight());
    let preview = session.last_preview().expect("preview stored");
    let decoded = image::load_from_memory(preview).unwrap().to_rgb8();
    assert_eq!(decoded.dimensions(), (16, 12));

    assert_eq!(
        session.offer_frame(&frame, start + Duration::from_millis(100)),
        FrameDecision::Throttled
    );
    assert_eq!(
        session.offer_frame(&frame, start + Duration::from_millis(500)),
        FrameDecision::Accepted
    );
    session.wait_idle();
}

#[test]
fn test_no_color_clears_and_skips_processing() {
    let mut session = session_with(Box::new(AllHair), "red");
    let start = Instant::now();
    assert_eq!(session.offer_frame(&gray_frame(), start), FrameDecision::Accepted);
    session.wait_idle();
    assert!(session.last_preview().is_some());

    assert_eq!(session.select_color(ColorSpec::NONE), Some(PreviewUpdate::Cleared));
    assert!(session.last_preview().is_none());
    for i in 1..5 {
        let now = start + Duration::from_secs(i);
        assert_eq!(session.offer_frame(&gray_frame(), now), FrameDecision::NoColor);
    }
    assert!(!session.is_in_flight());
}

#[test]
fn test_result_from_previous_color_is_discarded() {
    let mut session = session_with(Box::new(AllHair), "red");
    assert_eq!(session.offer_frame(&gray_frame(), Instant::now()), FrameDecision::Accepted);
    assert_eq!(session.select_color(ColorSpec::parse("blue").unwrap()), None);

    assert_eq!(session.wait_idle(), None);
    assert!(session.last_preview().is_none());
    assert!(!session.is_in_flight());
}

#[test]
fn test_preview_failure_is_swallowed() {
    let mut session = session_with(Box::new(Broken), "red");
    let start = Instant::now();

    assert_eq!(session.offer_frame(&gray_frame(), start), FrameDecision::Accepted);
    assert_eq!(session.wait_idle(), None);
    assert!(session.last_preview().is_none());
    assert!(!session.is_in_flight());

    assert_eq!(
        session.offer_frame(&gray_frame(), start + Duration::from_millis(500)),
        FrameDecision::Accepted
    );
    assert_eq!(session.wait_idle(), None);
}

#[test]
fn test_unloaded_engine_fails_frames_not_session() {
    let engine = SegmentationEngine::new(model_config(), 0);
    let mut session = pipeline::start_session(
        engine,
        &processing_config(),
        ColorSpec::parse("red").unwrap(),
    )
    .unwrap();
    assert_eq!(session.offer_frame(&gray_frame(), Instant::now()), FrameDecision::Accepted);
    assert_eq!(session.wait_idle(), None);
    assert!(!session.is_in_flight());
}

#[test]
fn test_malformed_frame_is_dropped() {
    let mut session = session_with(Box::new(AllHair), "red");
    let broken = RawFrame::i420(16, 16, vec![0; 10], vec![128; 64], vec![128; 64]);
    assert_eq!(
        session.offer_frame(&broken, Instant::now()),
        FrameDecision::ConversionFailed
    );
    assert!(!session.is_in_flight());
}

/// Camera double that writes a flat gray picture.
#[derive(Default)]
struct FakeCamera {
    streaming: bool,
    starts: u32,
    stops: u32,
    fail_picture: bool,
}

impl CameraSource for FakeCamera {
    fn start_stream(&mut self) -> anyhow::Result<()> {
        self.streaming = true;
        self.starts += 1;
        Ok(())
    }

    fn stop_stream(&mut self) -> anyhow::Result<()> {
        self.streaming = false;
        self.stops += 1;
        Ok(())
    }

    fn next_frame(&mut self) -> anyhow::Result<RawFrame> {
        Ok(gray_frame())
    }

    fn take_picture(&mut self, dir: &Path) -> anyhow::Result<PathBuf> {
        assert!(!self.streaming, "preview must be stopped during capture");
        if self.fail_picture {
            anyhow::bail!("shutter jammed");
        }
        let path = dir.join("shot.png");
        RgbImage::from_pixel(20, 10, Rgb([100, 100, 100])).save(&path)?;
        Ok(path)
    }

    fn resolution(&self) -> (u32, u32) {
        (16, 12)
    }
}

#[test]
fn test_capture_still_stops_and_restarts_preview() {
    let dir = tempfile::tempdir().unwrap();
    let mut camera = FakeCamera::default();
    camera.start_stream().unwrap();

    let mut session = session_with(Box::new(AllHair), "red");
    assert_eq!(session.offer_frame(&gray_frame(), Instant::now()), FrameDecision::Accepted);

    let output = session.capture_still(&mut camera, dir.path()).unwrap();
    assert_eq!(output, dir.path().join("shot_tinted.jpg"));
    assert!(output.exists());
    assert!(!session.is_in_flight());
    assert!(camera.streaming);
    assert_eq!((camera.starts, camera.stops), (2, 1));
}

#[test]
fn test_capture_failure_still_restarts_preview() {
    let dir = tempfile::tempdir().unwrap();
    let mut camera = FakeCamera {
        fail_picture: true,
        ..Default::default()
    };

    let mut session = session_with(Box::new(AllHair), "red");
    let result = session.capture_still(&mut camera, dir.path());
    match result {
        Err(PipelineError::StillCapture(message)) => assert!(message.contains("shutter jammed")),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(camera.streaming);

    // The user can retry.
    camera.fail_picture = false;
    assert!(session.capture_still(&mut camera, dir.path()).is_ok());
}
