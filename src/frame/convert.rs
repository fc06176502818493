use super::types::{RawFrame, SensorOrientation};
use crate::error::{PipelineError, Result};
use image::RgbImage;

/// Convert a YUV 4:2:0 frame into an upright RGB raster.
///
/// Rotation follows the sensor orientation; front-facing frames are mirrored
/// afterwards so the result matches an unmirrored viewfinder.
pub fn convert(frame: &RawFrame) -> Result<RgbImage> {
    let _span = tracing::debug_span!("convert_frame").entered();

    let width = frame.width as usize;
    let height = frame.height as usize;
    if width == 0 || height == 0 {
        return Err(PipelineError::FrameConversion(format!(
            "empty frame {}x{}",
            frame.width, frame.height
        )));
    }

    let chroma_width = width.div_ceil(2);
    let chroma_height = height.div_ceil(2);
    frame.y.check_extent("Y", width, height)?;
    frame.u.check_extent("U", chroma_width, chroma_height)?;
    frame.v.check_extent("V", chroma_width, chroma_height)?;

    let (out_width, out_height) = frame.output_dimensions();
    let (out_w, out_h) = (out_width as usize, out_height as usize);
    let mut rgb = vec![0u8; out_w * out_h * 3];

    let (y_plane, u_plane, v_plane) = (&frame.y, &frame.u, &frame.v);
    let (y_data, u_data, v_data) = (y_plane.bytes(), u_plane.bytes(), v_plane.bytes());

    for y in 0..height {
        let y_row = y * y_plane.row_stride;
        let u_row = (y / 2) * u_plane.row_stride;
        let v_row = (y / 2) * v_plane.row_stride;

        for x in 0..width {
            let luma = y_data[y_row + x * y_plane.pixel_stride];
            let cb = u_data[u_row + (x / 2) * u_plane.pixel_stride];
            let cr = v_data[v_row + (x / 2) * v_plane.pixel_stride];

            let (dx, dy) = destination(x, y, out_w, out_h, frame.orientation, frame.front_facing);
            let base = (dy * out_w + dx) * 3;
            rgb[base..base + 3].copy_from_slice(&yuv_to_rgb(luma, cb, cr));
        }
    }

    RgbImage::from_raw(out_width, out_height, rgb).ok_or_else(|| {
        PipelineError::FrameConversion(format!("raster {out_width}x{out_height} size mismatch"))
    })
}

/// Full-range BT.601 YUV to RGB.
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = y + 1.402 * v;
    let g = y - 0.344_136 * u - 0.714_136 * v;
    let b = y + 1.772 * u;

    [
        r.round().clamp(0.0, 255.0) as u8,
        g.round().clamp(0.0, 255.0) as u8,
        b.round().clamp(0.0, 255.0) as u8,
    ]
}

/// Map a source sample to its position in the upright output.
fn destination(
    x: usize,
    y: usize,
    out_w: usize,
    out_h: usize,
    orientation: SensorOrientation,
    front_facing: bool,
) -> (usize, usize) {
    let (dx, dy) = match orientation {
        SensorOrientation::Deg0 => (x, y),
        SensorOrientation::Deg90 => (y, out_h - 1 - x),
        SensorOrientation::Deg180 => (out_w - 1 - x, out_h - 1 - y),
        SensorOrientation::Deg270 => (out_w - 1 - y, x),
    };

    if !front_facing {
        return (dx, dy);
    }
    // After a transpose the sensor's horizontal axis runs along output rows.
    if orientation.is_transposed() {
        (dx, out_h - 1 - dy)
    } else {
        (out_w - 1 - dx, dy)
    }
}
