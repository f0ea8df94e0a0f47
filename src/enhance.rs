//! Tone adjustments applied to a map before it is printed.
//!
//! Every adjustment interpolates between a degenerate version of the image
//! and the image itself: `out = degenerate + factor · (image - degenerate)`.
//! A factor of `1.0` leaves the image unchanged, `0.0` yields the degenerate
//! image and values above one extrapolate away from it.
//!
//! | adjustment | degenerate image |
//! |---|---|
//! | brighten   | black |
//! | sharpen    | 3×3 smoothed copy (`[1 1 1; 1 5 1; 1 1 1] / 13`) |
//! | saturation | luminance greyscale |
//!
//! Adjustments run in that order. Alpha is never touched.
use crate::image::{ImageRgba8, Rgba};
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneParams {
    pub brighten: Option<f32>,
    pub sharpen: Option<f32>,
    pub saturation: Option<f32>,
}

impl ToneParams {
    pub fn is_identity(&self) -> bool {
        [self.brighten, self.sharpen, self.saturation]
            .iter()
            .all(|f| f.map_or(true, |f| f == 1.0))
    }
}

/// Apply every configured adjustment; returns a copy even when none is set.
pub fn apply_tone(image: &ImageRgba8, params: &ToneParams) -> ImageRgba8 {
    let mut out = image.clone();
    if let Some(f) = active(params.brighten) {
        brighten(&mut out, f);
    }
    if let Some(f) = active(params.sharpen) {
        sharpen(&mut out, f);
    }
    if let Some(f) = active(params.saturation) {
        saturate(&mut out, f);
    }
    debug!("apply_tone {:?} on {}x{}", params, image.w, image.h);
    out
}

fn active(factor: Option<f32>) -> Option<f32> {
    factor.filter(|f| f.is_finite() && *f != 1.0)
}

#[inline]
fn blend(degenerate: f32, value: u8, factor: f32) -> u8 {
    (degenerate + factor * (value as f32 - degenerate))
        .round()
        .clamp(0.0, 255.0) as u8
}

pub fn brighten(image: &mut ImageRgba8, factor: f32) {
    image.data.par_iter_mut().for_each(|px| {
        for c in 0..3 {
            px[c] = blend(0.0, px[c], factor);
        }
    });
}

/// ITU-R 601 luma, as used for greyscale conversion.
#[inline]
fn luma(px: &Rgba) -> f32 {
    (px[0] as f32 * 299.0 + px[1] as f32 * 587.0 + px[2] as f32 * 114.0) / 1000.0
}

pub fn saturate(image: &mut ImageRgba8, factor: f32) {
    image.data.par_iter_mut().for_each(|px| {
        let grey = luma(px).round();
        for c in 0..3 {
            px[c] = blend(grey, px[c], factor);
        }
    });
}

/// Sharpen against the smoothing kernel. Border pixels are left as they are.
pub fn sharpen(image: &mut ImageRgba8, factor: f32) {
    let (w, h) = (image.w, image.h);
    if w < 3 || h < 3 {
        return;
    }
    let src = image.clone();
    image
        .data
        .par_chunks_mut(w)
        .enumerate()
        .skip(1)
        .take(h - 2)
        .for_each(|(y, row)| {
            for x in 1..w - 1 {
                let mut acc = [0.0f32; 3];
                for dy in 0..3 {
                    for dx in 0..3 {
                        let weight = if dx == 1 && dy == 1 { 5.0 } else { 1.0 };
                        let p = src.get(x + dx - 1, y + dy - 1);
                        for c in 0..3 {
                            acc[c] += weight * p[c] as f32;
                        }
                    }
                }
                let px = &mut row[x];
                for c in 0..3 {
                    let smooth = (acc[c] / 13.0).round();
                    px[c] = blend(smooth, px[c], factor);
                }
            }
        });
}
