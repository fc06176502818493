use crate::error::{PipelineError, Result};
use std::sync::Arc;

/// One plane of a planar YUV buffer.
///
/// Planes of a packed or semi-planar frame share a single buffer and start
/// at different offsets. `row_stride` and `pixel_stride` are in bytes.
/// Interleaved chroma (NV12/NV21) is a plane view with `pixel_stride == 2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    data: Arc<[u8]>,
    offset: usize,
    pub row_stride: usize,
    pub pixel_stride: usize,
}

impl Plane {
    pub fn new(data: impl Into<Arc<[u8]>>, row_stride: usize, pixel_stride: usize) -> Self {
        Self::shared(data.into(), 0, row_stride, pixel_stride)
    }

    /// View into `data` starting at `offset`.
    pub fn shared(data: Arc<[u8]>, offset: usize, row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            data,
            offset,
            row_stride,
            pixel_stride,
        }
    }

    /// Bytes from the first sample of this plane to the end of the buffer.
    pub fn bytes(&self) -> &[u8] {
        self.data.get(self.offset..).unwrap_or(&[])
    }

    /// Check that a `width` x `height` sample grid fits inside the plane.
    pub(crate) fn check_extent(&self, name: &str, width: usize, height: usize) -> Result<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        if self.pixel_stride == 0 || self.row_stride == 0 {
            return Err(PipelineError::FrameConversion(format!(
                "{name} plane has zero stride"
            )));
        }
        let available = self.bytes().len();
        let last = (height - 1) * self.row_stride + (width - 1) * self.pixel_stride;
        if last >= available {
            return Err(PipelineError::FrameConversion(format!(
                "{name} plane holds {} bytes, {}x{} samples need {}",
                available,
                width,
                height,
                last + 1
            )));
        }
        Ok(())
    }
}

/// Clockwise mounting angle of the camera sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorOrientation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl SensorOrientation {
    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees % 360 {
            0 => Some(Self::Deg0),
            90 => Some(Self::Deg90),
            180 => Some(Self::Deg180),
            270 => Some(Self::Deg270),
            _ => None,
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Whether the output raster swaps width and height.
    pub fn is_transposed(self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }
}

/// A YUV 4:2:0 camera frame as delivered by the camera collaborator.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub y: Plane,
    pub u: Plane,
    pub v: Plane,
    pub orientation: SensorOrientation,
    pub front_facing: bool,
}

impl RawFrame {
    /// Tightly packed I420 frame (`Y` then `U` then `V`, chroma at half
    /// resolution rounded up).
    pub fn i420(width: u32, height: u32, y: Vec<u8>, u: Vec<u8>, v: Vec<u8>) -> Self {
        let chroma_width = (width as usize).div_ceil(2);
        Self {
            width,
            height,
            y: Plane::new(y, width as usize, 1),
            u: Plane::new(u, chroma_width, 1),
            v: Plane::new(v, chroma_width, 1),
            orientation: SensorOrientation::Deg0,
            front_facing: false,
        }
    }

    /// View a packed YUYV (4:2:2) buffer as 4:2:0 planes by sampling the
    /// chroma of every other row. The bytes are copied once and shared by
    /// all three planes.
    pub fn from_yuyv(width: u32, height: u32, data: &[u8]) -> Self {
        let row = width as usize * 2;
        let buffer: Arc<[u8]> = Arc::from(data);
        Self {
            width,
            height,
            y: Plane::shared(buffer.clone(), 0, row, 2),
            u: Plane::shared(buffer.clone(), 1, row * 2, 4),
            v: Plane::shared(buffer, 3, row * 2, 4),
            orientation: SensorOrientation::Deg0,
            front_facing: false,
        }
    }

    /// View an NV12 buffer (Y plane followed by interleaved UV).
    pub fn from_nv12(width: u32, height: u32, data: &[u8]) -> Self {
        let w = width as usize;
        let luma_len = (w * height as usize).min(data.len());
        let chroma_row = w.div_ceil(2) * 2;
        let buffer: Arc<[u8]> = Arc::from(data);
        Self {
            width,
            height,
            y: Plane::shared(buffer.clone(), 0, w, 1),
            u: Plane::shared(buffer.clone(), luma_len, chroma_row, 2),
            v: Plane::shared(buffer, luma_len + 1, chroma_row, 2),
            orientation: SensorOrientation::Deg0,
            front_facing: false,
        }
    }

    pub fn with_orientation(mut self, orientation: SensorOrientation, front_facing: bool) -> Self {
        self.orientation = orientation;
        self.front_facing = front_facing;
        self
    }

    /// Dimensions of the upright raster this frame converts to.
    pub fn output_dimensions(&self) -> (u32, u32) {
        if self.orientation.is_transposed() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_degrees() {
        assert_eq!(SensorOrientation::from_degrees(450), Some(SensorOrientation::Deg90));
        assert_eq!(SensorOrientation::from_degrees(45), None);
        assert_eq!(SensorOrientation::Deg270.degrees(), 270);
    }

    #[test]
    fn test_check_extent_detects_short_plane() {
        let plane = Plane::new(vec![0; 10], 4, 1);
        assert!(plane.check_extent("Y", 4, 3).is_err());
        assert!(plane.check_extent("Y", 2, 3).is_ok());
    }

    #[test]
    fn test_yuyv_view_strides() {
        let frame = RawFrame::from_yuyv(4, 2, &[0u8; 16]);
        assert_eq!(frame.y.pixel_stride, 2);
        assert_eq!(frame.u.row_stride, 16);
        assert_eq!(frame.u.bytes().len(), 15);
        assert_eq!(frame.v.bytes().len(), 13);
        assert!(frame.u.check_extent("U", 2, 1).is_ok());
    }

    #[test]
    fn test_packed_planes_share_one_buffer() {
        let yuyv = RawFrame::from_yuyv(4, 2, &[0u8; 16]);
        assert!(Arc::ptr_eq(&yuyv.y.data, &yuyv.u.data));
        assert!(Arc::ptr_eq(&yuyv.u.data, &yuyv.v.data));

        let nv12 = RawFrame::from_nv12(4, 2, &[0u8; 12]);
        assert!(Arc::ptr_eq(&nv12.y.data, &nv12.v.data));
        assert_eq!(nv12.y.bytes().len(), 12);
        assert_eq!(nv12.u.bytes().len(), 4);
        assert_eq!(nv12.v.bytes().len(), 3);
    }

    #[test]
    fn test_truncated_nv12_has_empty_chroma() {
        let frame = RawFrame::from_nv12(4, 4, &[0u8; 10]);
        assert!(frame.v.bytes().is_empty());
        assert!(frame.u.check_extent("U", 2, 2).is_err());
    }
}
