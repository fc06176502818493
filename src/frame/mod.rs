mod convert;
pub mod types;

pub use convert::{convert, yuv_to_rgb};
pub use types::{Plane, RawFrame, SensorOrientation};

/// Convert RGB to full-range YUV.
pub fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let r = r as f32;
    let g = g as f32;
    let b = b as f32;

    let y = (0.299 * r + 0.587 * g + 0.114 * b).round().clamp(0.0, 255.0) as u8;
    let u = (-0.168_736 * r - 0.331_264 * g + 0.5 * b + 128.0).round().clamp(0.0, 255.0) as u8;
    let v = (0.5 * r - 0.418_688 * g - 0.081_312 * b + 128.0).round().clamp(0.0, 255.0) as u8;

    (y, u, v)
}

/// Pack an RGB raster into a tightly packed I420 frame, averaging chroma
/// over each 2x2 block.
pub fn rgb_to_i420(image: &image::RgbImage) -> RawFrame {
    let (width, height) = image.dimensions();
    let (w, h) = (width as usize, height as usize);
    let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
    let raw = image.as_raw();

    let mut y_plane = vec![0u8; w * h];
    let mut u_sum = vec![0u32; cw * ch];
    let mut v_sum = vec![0u32; cw * ch];
    let mut counts = vec![0u32; cw * ch];

    for (i, px) in raw.chunks_exact(3).enumerate() {
        let (x, y) = (i % w, i / w);
        let (luma, u, v) = rgb_to_yuv(px[0], px[1], px[2]);
        y_plane[i] = luma;
        let c = (y / 2) * cw + x / 2;
        u_sum[c] += u as u32;
        v_sum[c] += v as u32;
        counts[c] += 1;
    }

    let average = |sums: Vec<u32>| -> Vec<u8> {
        sums.iter()
            .zip(&counts)
            .map(|(s, n)| (s / (*n).max(1)) as u8)
            .collect()
    };
    let u_plane = average(u_sum);
    let v_plane = average(v_sum);

    RawFrame::i420(width, height, y_plane, u_plane, v_plane)
}
