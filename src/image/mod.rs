//! Image buffers used by the calibration and tiling stages.
//!
//! - [`ImageRgba8`]: owned 8-bit RGBA buffer, row-major.
//! - [`ImageView`] / [`ImageViewMut`]: row access shared by all buffers.
//! - [`sample`]: clamped bilinear sampling used by rectification.
//! - [`io`]: PNG/JPEG loading and saving through the `image` crate.
pub mod io;
pub mod rgba;
pub mod sample;
pub mod traits;

pub use self::rgba::{ImageRgba8, Rgba};
pub use self::traits::{ImageView, ImageViewMut, Rows};
