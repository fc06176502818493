use super::CameraSource;
use crate::frame::{self, RawFrame, SensorOrientation};
use anyhow::{Context, Result};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::{Buffer, Camera};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Mounting of the sensor, applied to every frame the camera hands out.
#[derive(Debug, Clone, Copy, Default)]
struct Mounting {
    orientation: SensorOrientation,
    front_facing: bool,
}

impl Mounting {
    fn apply(self, raw: RawFrame) -> RawFrame {
        raw.with_orientation(self.orientation, self.front_facing)
    }
}

/// Webcam on a V4L2 device, delivering frames as YUV plane views.
///
/// Preview frames and pictures share the same mounting, so a front-facing
/// still comes out mirrored exactly like the preview.
pub struct WebcamCapture {
    camera: Camera,
    width: u32,
    height: u32,
    mounting: Mounting,
}

impl WebcamCapture {
    pub fn new(
        device_index: u32,
        width: u32,
        height: u32,
        orientation: SensorOrientation,
        front_facing: bool,
    ) -> Result<Self> {
        tracing::info!(
            "Initializing webcam {} at {}x{} ({} degrees, front_facing={})",
            device_index,
            width,
            height,
            orientation.degrees(),
            front_facing
        );

        let index = CameraIndex::Index(device_index);
        let format = CameraFormat::new(Resolution::new(width, height), FrameFormat::YUYV, 30);
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));

        let mut camera = Camera::new(index, requested).context("Failed to open camera")?;

        camera.open_stream().context("Failed to open camera stream")?;

        let resolution = camera.resolution();
        tracing::info!(
            "Webcam initialized at {}x{} ({:?})",
            resolution.width(),
            resolution.height(),
            camera.frame_format()
        );

        Ok(Self {
            camera,
            width: resolution.width(),
            height: resolution.height(),
            mounting: Mounting {
                orientation,
                front_facing,
            },
        })
    }

    /// Wrap a captured buffer as a 4:2:0 frame without decoding when the
    /// source layout allows it.
    fn raw_frame(buffer: &Buffer) -> Result<RawFrame> {
        let resolution = buffer.resolution();
        let (width, height) = (resolution.width(), resolution.height());

        let frame = match buffer.source_frame_format() {
            FrameFormat::YUYV => RawFrame::from_yuyv(width, height, buffer.buffer()),
            FrameFormat::NV12 => RawFrame::from_nv12(width, height, buffer.buffer()),
            other => {
                tracing::debug!("Decoding {:?} frame to RGB before packing", other);
                let decoded = buffer
                    .decode_image::<RgbFormat>()
                    .context("Failed to decode frame")?;
                frame::rgb_to_i420(&decoded)
            }
        };
        Ok(frame)
    }
}

impl CameraSource for WebcamCapture {
    fn start_stream(&mut self) -> Result<()> {
        if !self.camera.is_stream_open() {
            self.camera
                .open_stream()
                .context("Failed to open camera stream")?;
        }
        Ok(())
    }

    fn stop_stream(&mut self) -> Result<()> {
        if self.camera.is_stream_open() {
            self.camera
                .stop_stream()
                .context("Failed to stop camera stream")?;
        }
        Ok(())
    }

    fn next_frame(&mut self) -> Result<RawFrame> {
        let buffer = self.camera.frame().context("Failed to capture frame")?;
        Ok(self.mounting.apply(Self::raw_frame(&buffer)?))
    }

    fn take_picture(&mut self, dir: &Path) -> Result<PathBuf> {
        let reopened = !self.camera.is_stream_open();
        if reopened {
            self.camera
                .open_stream()
                .context("Failed to open camera stream")?;
        }

        let captured = self
            .camera
            .frame()
            .context("Failed to capture picture")
            .and_then(|buffer| {
                let raw = self.mounting.apply(Self::raw_frame(&buffer)?);
                frame::convert(&raw).context("Failed to convert picture")
            });

        if reopened {
            if let Err(e) = self.camera.stop_stream() {
                tracing::warn!("Failed to stop stream after picture: {}", e);
            }
        }

        let image = captured?;
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let path = dir.join(format!("capture_{millis}.jpg"));
        image
            .save(&path)
            .with_context(|| format!("Failed to save picture to {}", path.display()))?;

        tracing::info!("Picture saved to {}", path.display());
        Ok(path)
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_front_mounting_mirrors_frames() {
        // Bright sample in the top-left corner of a 4x2 frame.
        let mut luma = vec![16u8; 8];
        luma[0] = 235;
        let raw = RawFrame::i420(4, 2, luma, vec![128; 2], vec![128; 2]);
        let mounting = Mounting {
            orientation: SensorOrientation::Deg0,
            front_facing: true,
        };

        let image = frame::convert(&mounting.apply(raw.clone())).unwrap();
        assert_eq!(image.get_pixel(3, 0)[0], 235);
        assert_eq!(image.get_pixel(0, 0)[0], 16);

        let upright = frame::convert(&Mounting::default().apply(raw)).unwrap();
        assert_eq!(upright.get_pixel(0, 0)[0], 235);
    }
}
