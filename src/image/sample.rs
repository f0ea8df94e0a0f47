//! Sub-pixel sampling for RGBA buffers.
//!
//! Sample coordinates use pixel centres: `(0, 0)` is the centre of the top-left
//! pixel. Positions outside the image clamp to the nearest edge pixel.
use super::{ImageView, Rgba};

/// Bilinearly interpolate all four channels at `(x, y)`.
///
/// Returns channel values as `f32` in `[0, 255]`.
#[inline]
pub fn bilinear_sample_rgba<I>(img: &I, x: f32, y: f32) -> [f32; 4]
where
    I: ImageView<Pixel = Rgba>,
{
    let (w, h) = (img.width(), img.height());
    if w == 0 || h == 0 {
        return [0.0; 4];
    }
    let max_x = (w - 1) as f32;
    let max_y = (h - 1) as f32;
    let x = if x.is_finite() { x.clamp(0.0, max_x) } else { 0.0 };
    let y = if y.is_finite() { y.clamp(0.0, max_y) } else { 0.0 };

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let r0 = img.row(y0);
    let r1 = img.row(y1);
    let (p00, p10, p01, p11) = (r0[x0], r0[x1], r1[x0], r1[x1]);

    let mut out = [0.0f32; 4];
    for c in 0..4 {
        let top = p00[c] as f32 + (p10[c] as f32 - p00[c] as f32) * fx;
        let bottom = p01[c] as f32 + (p11[c] as f32 - p01[c] as f32) * fx;
        out[c] = top + (bottom - top) * fy;
    }
    out
}

/// Round interpolated channels back to 8 bits.
#[inline]
pub fn quantize(px: [f32; 4]) -> Rgba {
    px.map(|c| c.round().clamp(0.0, 255.0) as u8)
}
