use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use image::RgbImage;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};
use tintcam::capture::{CameraSource, WebcamCapture};
use tintcam::config::TensorLayout;
use tintcam::frame::{self, SensorOrientation};
use tintcam::output::{OutputSink, V4L2Output};
use tintcam::pipeline::{self, FrameDecision, PreviewSession, PreviewUpdate};
use tintcam::{color, segmentation, ColorSpec, ModelConfig, ProcessingConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Preview hair color changes on a camera feed", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the built-in colors
    Colors,
    /// Recolor a still image file
    Still(StillArgs),
    /// Run the live preview against a webcam
    Live(LiveArgs),
}

#[derive(Args, Debug)]
struct ProcessingArgs {
    /// Path to the hair segmentation model (ONNX file)
    #[arg(long)]
    model: PathBuf,

    /// Run inference on CPU only
    #[arg(long)]
    no_acceleration: bool,

    /// Inference threads
    #[arg(long, default_value_t = 2)]
    threads: usize,

    /// Mask blur radius in pixels (0 disables)
    #[arg(long, default_value_t = 3)]
    blur_radius: u32,

    /// Mask values at or below this alpha are left untouched
    #[arg(long, default_value_t = 0.0)]
    threshold: f32,

    /// JPEG quality of the output (0-100)
    #[arg(long, default_value_t = 85)]
    quality: u8,

    /// Long edge above which frames are downscaled for processing
    #[arg(long, default_value_t = 360)]
    max_dimension: u32,

    /// Square input edge of the model
    #[arg(long, default_value_t = 256)]
    input_size: u32,

    /// Number of classes the model predicts
    #[arg(long, default_value_t = 6)]
    classes: usize,

    /// Class index that denotes hair
    #[arg(long, default_value_t = 1)]
    hair_class: usize,

    /// Tensor layout of the model
    #[arg(long, value_enum, default_value_t = TensorLayout::Nhwc)]
    layout: TensorLayout,
}

impl ProcessingArgs {
    fn configs(&self, preview_interval: Duration) -> Result<(ProcessingConfig, ModelConfig)> {
        let processing = ProcessingConfig {
            enable_hardware_acceleration: !self.no_acceleration,
            inference_threads: self.threads,
            mask_blur_radius: self.blur_radius,
            mask_inclusion_threshold: self.threshold,
            output_encoding_quality: self.quality,
            max_processing_dimension: self.max_dimension,
            preview_interval,
        }
        .validate()?;
        let model = ModelConfig {
            input_size: self.input_size,
            num_classes: self.classes,
            hair_class: self.hair_class,
            layout: self.layout,
        }
        .validate()?;
        Ok((processing, model))
    }
}

#[derive(Args, Debug)]
struct StillArgs {
    #[command(flatten)]
    processing: ProcessingArgs,

    /// Image to recolor
    #[arg(short, long)]
    input: PathBuf,

    /// Catalog color id or #rrggbb
    #[arg(short, long, value_parser = parse_color)]
    color: ColorSpec,
}

#[derive(Args, Debug)]
struct LiveArgs {
    #[command(flatten)]
    processing: ProcessingArgs,

    /// Initial color: catalog id or #rrggbb
    #[arg(short, long, value_parser = parse_color, default_value = "none")]
    color: ColorSpec,

    /// Input webcam device index
    #[arg(short, long, default_value_t = 0)]
    input_device: u32,

    /// Output v4l2loopback device path
    #[arg(short, long, default_value = "/dev/video10")]
    output_device: String,

    /// Capture resolution width
    #[arg(long, default_value_t = 1280)]
    capture_width: u32,

    /// Capture resolution height
    #[arg(long, default_value_t = 720)]
    capture_height: u32,

    /// Output resolution width
    #[arg(long, default_value_t = 1280)]
    output_width: u32,

    /// Output resolution height
    #[arg(long, default_value_t = 720)]
    output_height: u32,

    /// Target frames per second
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Minimum milliseconds between processed preview frames
    #[arg(long, default_value_t = 450)]
    interval_ms: u64,

    /// Sensor orientation in degrees (0, 90, 180, 270)
    #[arg(long, default_value_t = 0)]
    sensor_orientation: u32,

    /// Treat the camera as rear-facing (no mirroring)
    #[arg(long)]
    back_camera: bool,

    /// Directory for still captures
    #[arg(long, default_value = ".")]
    capture_dir: PathBuf,
}

fn parse_color(value: &str) -> std::result::Result<ColorSpec, String> {
    ColorSpec::parse(value).ok_or_else(|| {
        let ids: Vec<_> = color::catalog().iter().map(|c| c.id).collect();
        format!("unknown color '{value}', expected #rrggbb or one of: {}", ids.join(", "))
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    match cli.command {
        Command::Colors => {
            for spec in color::catalog() {
                println!("{:<10} {}", spec.id, spec);
            }
            Ok(())
        }
        Command::Still(args) => run_still(args),
        Command::Live(args) => run_live(args),
    }
}

fn run_still(args: StillArgs) -> Result<()> {
    let (processing, model) = args.processing.configs(Duration::ZERO)?;

    let engine = segmentation::create_default_engine(&args.processing.model, model, &processing)
        .context("Failed to load segmentation model")?;
    let mut session = pipeline::start_session(engine, &processing, args.color)?;

    let output = session
        .process_still_file(&args.input)
        .with_context(|| format!("Failed to recolor {}", args.input.display()))?;
    session.shutdown();

    println!("{}", output.display());
    Ok(())
}

enum UserCommand {
    Color(ColorSpec),
    Capture,
    Quit,
}

/// Read interactive commands from stdin on a separate thread.
fn spawn_command_reader() -> Receiver<UserCommand> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let mut words = line.split_whitespace();
            let command = match (words.next(), words.next()) {
                (Some("color"), Some(value)) => match ColorSpec::parse(value) {
                    Some(spec) => UserCommand::Color(spec),
                    None => {
                        tracing::warn!("Unknown color '{}'", value);
                        continue;
                    }
                },
                (Some("capture"), _) => UserCommand::Capture,
                (Some("quit"), _) => UserCommand::Quit,
                (None, _) => continue,
                (Some(other), _) => {
                    tracing::warn!("Unknown command '{}' (color <id>, capture, quit)", other);
                    continue;
                }
            };
            if tx.send(command).is_err() {
                break;
            }
        }
    });
    rx
}

fn run_live(args: LiveArgs) -> Result<()> {
    let Some(orientation) = SensorOrientation::from_degrees(args.sensor_orientation) else {
        bail!("sensor orientation must be 0, 90, 180 or 270");
    };
    if args.fps == 0 {
        bail!("fps must be positive");
    }
    let (processing, model) = args
        .processing
        .configs(Duration::from_millis(args.interval_ms))?;

    tracing::info!("Capture: {}x{}", args.capture_width, args.capture_height);
    tracing::info!("Output: {}x{}", args.output_width, args.output_height);
    tracing::info!("Target FPS: {}", args.fps);

    let engine = segmentation::create_default_engine(&args.processing.model, model, &processing)
        .context("Failed to load segmentation model")?;

    let mut camera = WebcamCapture::new(
        args.input_device,
        args.capture_width,
        args.capture_height,
        orientation,
        !args.back_camera,
    )
    .context("Failed to initialize webcam capture")?;

    let mut output = V4L2Output::new(&args.output_device, args.output_width, args.output_height)
        .context("Failed to initialize v4l2loopback output")?;

    let session = pipeline::start_session(engine, &processing, args.color)?;
    let commands = spawn_command_reader();

    run_pipeline(&mut camera, &mut output, session, &commands, &args)
}

fn decode_preview(session: &PreviewSession) -> Option<RgbImage> {
    let bytes = session.last_preview()?;
    match image::load_from_memory(bytes) {
        Ok(decoded) => Some(decoded.to_rgb8()),
        Err(e) => {
            tracing::warn!("Failed to decode preview frame: {}", e);
            None
        }
    }
}

fn run_pipeline<C, O>(
    camera: &mut C,
    output: &mut O,
    mut session: PreviewSession,
    commands: &Receiver<UserCommand>,
    args: &LiveArgs,
) -> Result<()>
where
    C: CameraSource,
    O: OutputSink,
{
    let frame_duration = Duration::from_secs_f32(1.0 / args.fps as f32);
    let mut overlay: Option<RgbImage> = None;
    let mut frame_count = 0u64;
    let mut accepted = 0u64;
    let mut dropped = 0u64;

    tracing::info!("Starting preview loop with {}", session.selected());
    tracing::info!("Commands: color <id|#rrggbb>, capture, quit");

    'main: loop {
        let loop_start = Instant::now();

        while let Ok(command) = commands.try_recv() {
            match command {
                UserCommand::Color(spec) => {
                    if session.select_color(spec) == Some(PreviewUpdate::Cleared) {
                        overlay = None;
                    }
                }
                UserCommand::Capture => {
                    match session.capture_still(camera, &args.capture_dir) {
                        Ok(path) => tracing::info!("Capture ready: {}", path.display()),
                        Err(e) => tracing::error!("{} (try again)", e),
                    }
                    if !session.selected().is_none() {
                        overlay = decode_preview(&session).or(overlay);
                    }
                }
                UserCommand::Quit => break 'main,
            }
        }

        if session.poll() == Some(PreviewUpdate::Updated) {
            overlay = decode_preview(&session).or(overlay);
        }

        let raw = match camera.next_frame() {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Camera frame failed: {:#}", e);
                std::thread::sleep(frame_duration);
                continue;
            }
        };

        match session.offer_frame(&raw, loop_start) {
            FrameDecision::Accepted => accepted += 1,
            FrameDecision::NoColor => {}
            decision => {
                dropped += 1;
                tracing::trace!("Frame dropped: {:?}", decision);
            }
        }

        match &overlay {
            Some(processed) => output.write_frame(processed)?,
            None => match frame::convert(&raw) {
                Ok(image) => output.write_frame(&image)?,
                Err(e) => tracing::warn!("Passthrough frame failed: {}", e),
            },
        }

        frame_count += 1;

        // Log stats every 30 frames
        if frame_count % 30 == 0 {
            tracing::info!(
                "Frame {}: processed={}, dropped={}, overlay={}",
                frame_count,
                accepted,
                dropped,
                overlay.is_some()
            );
        }

        // Frame rate limiting
        let elapsed = loop_start.elapsed();
        if elapsed < frame_duration {
            std::thread::sleep(frame_duration - elapsed);
        }
    }

    tracing::info!("Shutting down");
    session.shutdown();
    Ok(())
}
