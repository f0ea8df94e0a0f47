//! Owned 8-bit RGBA image in row-major layout (stride == width).
//!
//! This is the buffer every stage consumes and produces. Conversions to and
//! from [`image::RgbaImage`] are lossless.
use super::traits::{ImageView, ImageViewMut};
use crate::types::PixelRect;

/// One pixel as `[r, g, b, a]`.
pub type Rgba = [u8; 4];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageRgba8 {
    /// Image width in pixels
    pub w: usize,
    /// Image height in pixels
    pub h: usize,
    /// Number of pixels between consecutive rows (equals `w`)
    pub stride: usize,
    /// Backing storage in row-major order
    pub data: Vec<Rgba>,
}

impl ImageRgba8 {
    /// Construct a `w × h` buffer filled with `fill`.
    pub fn new_filled(w: usize, h: usize, fill: Rgba) -> Self {
        Self {
            w,
            h,
            stride: w,
            data: vec![fill; w * h],
        }
    }

    /// Construct a transparent black `w × h` buffer.
    pub fn new(w: usize, h: usize) -> Self {
        Self::new_filled(w, h, [0, 0, 0, 0])
    }

    /// Wrap existing pixels; `None` if `data.len() != w * h`.
    pub fn from_pixels(w: usize, h: usize, data: Vec<Rgba>) -> Option<Self> {
        (data.len() == w * h).then_some(Self {
            w,
            h,
            stride: w,
            data,
        })
    }

    /// Build an image by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(w: usize, h: usize, mut f: impl FnMut(usize, usize) -> Rgba) -> Self {
        let mut data = Vec::with_capacity(w * h);
        for y in 0..h {
            for x in 0..w {
                data.push(f(x, y));
            }
        }
        Self {
            w,
            h,
            stride: w,
            data,
        }
    }

    #[inline]
    pub fn idx(&self, x: usize, y: usize) -> usize {
        y * self.stride + x
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Rgba {
        self.data[self.idx(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, px: Rgba) {
        let i = self.idx(x, y);
        self.data[i] = px;
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// Copy out `rect`; `None` if it is empty or reaches past the image.
    pub fn crop(&self, rect: &PixelRect) -> Option<ImageRgba8> {
        if rect.is_empty() || rect.right() as usize > self.w || rect.bottom() as usize > self.h {
            return None;
        }
        let (x0, w) = (rect.x as usize, rect.w as usize);
        let mut data = Vec::with_capacity(w * rect.h as usize);
        for y in rect.y as usize..rect.bottom() as usize {
            data.extend_from_slice(&self.row(y)[x0..x0 + w]);
        }
        Some(ImageRgba8 {
            w,
            h: rect.h as usize,
            stride: w,
            data,
        })
    }

    /// Largest per-channel absolute difference, `None` if sizes differ.
    pub fn max_abs_diff(&self, other: &ImageRgba8) -> Option<u8> {
        if self.w != other.w || self.h != other.h {
            return None;
        }
        let diff = self
            .rows()
            .zip(other.rows())
            .flat_map(|(a, b)| a.iter().zip(b.iter()))
            .flat_map(|(pa, pb)| pa.iter().zip(pb.iter()).map(|(&ca, &cb)| ca.abs_diff(cb)))
            .max()
            .unwrap_or(0);
        Some(diff)
    }

    pub fn to_rgba_image(&self) -> image::RgbaImage {
        let mut raw = Vec::with_capacity(self.w * self.h * 4);
        for row in self.rows() {
            for px in row {
                raw.extend_from_slice(px);
            }
        }
        image::RgbaImage::from_raw(self.w as u32, self.h as u32, raw)
            .unwrap_or_else(|| image::RgbaImage::new(self.w as u32, self.h as u32))
    }
}

impl From<image::RgbaImage> for ImageRgba8 {
    fn from(img: image::RgbaImage) -> Self {
        let w = img.width() as usize;
        let h = img.height() as usize;
        let data = img
            .into_raw()
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]])
            .collect();
        Self {
            w,
            h,
            stride: w,
            data,
        }
    }
}

impl ImageView for ImageRgba8 {
    type Pixel = Rgba;

    #[inline]
    fn width(&self) -> usize {
        self.w
    }
    #[inline]
    fn height(&self) -> usize {
        self.h
    }
    #[inline]
    fn stride(&self) -> usize {
        self.stride
    }
    #[inline]
    fn row(&self, y: usize) -> &[Rgba] {
        let start = y * self.stride;
        &self.data[start..start + self.w]
    }
}

impl ImageViewMut for ImageRgba8 {
    #[inline]
    fn row_mut(&mut self, y: usize) -> &mut [Rgba] {
        let start = y * self.stride;
        let end = start + self.w;
        &mut self.data[start..end]
    }
}
