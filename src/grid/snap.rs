//! Crop or rectify an image so its borders fall on whole grid cells.
//!
//! The snapper keeps the largest block of whole cells of the requested grid
//! whose corners all lie inside the image. On a rotated lattice that block
//! may start a few cells in from the grid origin. Pixel-aligned grids are
//! cropped directly; any other lattice is resampled once with bilinear
//! interpolation onto an axis-aligned square grid.
use super::model::{GridModel, GridModelError};
use crate::image::sample::{bilinear_sample_rgba, quantize};
use crate::image::ImageRgba8;
use crate::types::{PixelRect, Point};
use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Largest per-channel change the resampling path may introduce when
/// re-snapping an already rectified image with its own grid.
pub const RESAMPLE_TOLERANCE: u8 = 1;

/// Grid coordinates within this of a whole cell count as on the vertex.
const FIT_EPS: f32 = 1e-4;

/// Calibrated cell counts are rounded, so a calibrated grid may reach up to
/// half a cell further past the trailing image edge than its leading one.
const ROUNDING_SLACK_CELLS: f32 = 0.5;

/// Whole-cell block, in cell steps from the grid origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Block {
    i0: u32,
    j0: u32,
    cols: u32,
    rows: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapParams {
    /// Output cell edge in pixels. `None` keeps the mean source cell edge.
    pub output_cell_px: Option<u32>,
    /// Lattice corners may overshoot the image by this much (pixels).
    pub edge_tolerance_px: f32,
    /// How far (in cells) the grid may reach past the image along either
    /// lattice axis before it is treated as a bad calibration.
    pub max_trim_cells: u32,
    /// Crop without resampling when the grid is pixel aligned.
    pub exact_crop: bool,
    /// Off-axis and fractional-pixel tolerance for the exact crop path.
    pub pixel_align_tol: f32,
}

impl Default for SnapParams {
    fn default() -> Self {
        Self {
            output_cell_px: None,
            edge_tolerance_px: 1.0,
            max_trim_cells: 1,
            exact_crop: true,
            pixel_align_tol: 1e-3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum SnapError {
    #[error("no whole grid cell fits inside the {width}x{height} image")]
    EmptyGrid { width: usize, height: usize },
    #[error(
        "grid extends outside the image: {cols}x{rows} cells requested, {fit_cols}x{fit_rows} fit (origin {origin_x:.1},{origin_y:.1})"
    )]
    OutOfBounds {
        cols: u32,
        rows: u32,
        fit_cols: u32,
        fit_rows: u32,
        origin_x: f32,
        origin_y: f32,
    },
    #[error("invalid rectified grid: {0}")]
    Grid(#[from] GridModelError),
}

/// Image whose width and height are whole multiples of its square cell size.
#[derive(Clone, Debug)]
pub struct RectifiedImage {
    image: ImageRgba8,
    grid: GridModel,
    source_grid: GridModel,
    cell_px: u32,
    resampled: bool,
    trimmed: (u32, u32),
}

impl RectifiedImage {
    pub fn image(&self) -> &ImageRgba8 {
        &self.image
    }

    /// Axis-aligned grid covering the whole buffer.
    pub fn grid(&self) -> &GridModel {
        &self.grid
    }

    /// Block of the source lattice, in original image pixels, that this
    /// buffer was cut from.
    pub fn source_grid(&self) -> &GridModel {
        &self.source_grid
    }

    pub fn cell_px(&self) -> u32 {
        self.cell_px
    }

    pub fn cols(&self) -> u32 {
        self.grid.cols()
    }

    pub fn rows(&self) -> u32 {
        self.grid.rows()
    }

    /// Whether the buffer was resampled rather than cropped.
    pub fn resampled(&self) -> bool {
        self.resampled
    }

    /// Cells of the requested grid dropped per axis because they reached
    /// past the image.
    pub fn trimmed(&self) -> (u32, u32) {
        self.trimmed
    }

    pub fn into_image(self) -> ImageRgba8 {
        self.image
    }

    /// Swap in a processed version of the buffer (e.g. upscaled or
    /// tone-adjusted). The new buffer must still hold the same whole cells
    /// with square cell size; `None` otherwise.
    pub fn with_image(self, image: ImageRgba8) -> Option<RectifiedImage> {
        let (cols, rows) = (self.cols() as usize, self.rows() as usize);
        if image.w == 0 || image.w % cols != 0 || image.h % rows != 0 {
            return None;
        }
        let cell = image.w / cols;
        if image.h / rows != cell {
            return None;
        }
        let grid = self
            .grid
            .rescaled((self.image.w, self.image.h), (image.w, image.h))
            .ok()?;
        Some(RectifiedImage {
            image,
            grid,
            source_grid: self.source_grid,
            cell_px: cell as u32,
            resampled: self.resampled,
            trimmed: self.trimmed,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct GridSnapper {
    params: SnapParams,
}

impl GridSnapper {
    pub fn new(params: SnapParams) -> Self {
        Self { params }
    }

    pub fn snap(&self, image: &ImageRgba8, grid: &GridModel) -> Result<RectifiedImage, SnapError> {
        let empty = SnapError::EmptyGrid {
            width: image.w,
            height: image.h,
        };
        let (lo, hi) = self.image_extent(image, grid).ok_or(empty.clone())?;
        let fit = self.fitting_block(image, grid);
        let (fit_cols, fit_rows) = fit.map_or((0, 0), |b| (b.cols, b.rows));

        let (cols, rows) = (grid.cols() as f32, grid.rows() as f32);
        let lead = self.params.max_trim_cells as f32 + FIT_EPS;
        let trail = lead + ROUNDING_SLACK_CELLS;
        if lo.x > lead || lo.y > lead || cols - hi.x > trail || rows - hi.y > trail {
            let origin = grid.origin();
            return Err(SnapError::OutOfBounds {
                cols: grid.cols(),
                rows: grid.rows(),
                fit_cols,
                fit_rows,
                origin_x: origin.x,
                origin_y: origin.y,
            });
        }
        let fit = fit.ok_or(empty)?;

        let trimmed = (grid.cols() - fit.cols, grid.rows() - fit.rows);
        if trimmed != (0, 0) {
            warn!(
                "trimming partial cells from grid: {}x{} -> {}x{} (offset {},{})",
                grid.cols(),
                grid.rows(),
                fit.cols,
                fit.rows,
                fit.i0,
                fit.j0
            );
        }

        let block = grid
            .shifted(fit.i0 as i32, fit.j0 as i32)
            .with_size(fit.cols, fit.rows)?;
        let cell_px = self
            .params
            .output_cell_px
            .unwrap_or_else(|| grid.cell_size().round() as u32)
            .max(1);

        let (out, resampled) = match self.pixel_aligned_crop(image, &block, cell_px) {
            Some(rect) => match image.crop(&rect) {
                Some(crop) => (crop, false),
                None => (resample(image, &block, cell_px), true),
            },
            None => (resample(image, &block, cell_px), true),
        };
        debug!(
            "GridSnapper::snap {}x{} cells, cell_px={} resampled={} output={}x{}",
            fit.cols, fit.rows, cell_px, resampled, out.w, out.h
        );

        Ok(RectifiedImage {
            image: out,
            grid: GridModel::identity(cell_px, fit.cols, fit.rows)?,
            source_grid: block,
            cell_px,
            resampled,
            trimmed,
        })
    }

    /// Bounding box, in grid coordinates, of the image grown by the edge
    /// tolerance. `(lower, upper)` corners.
    fn image_extent(&self, image: &ImageRgba8, grid: &GridModel) -> Option<(Point, Point)> {
        let tol = self.params.edge_tolerance_px;
        let (w, h) = (image.w as f32 + tol, image.h as f32 + tol);
        let mut lo = Point::new(f32::INFINITY, f32::INFINITY);
        let mut hi = Point::new(f32::NEG_INFINITY, f32::NEG_INFINITY);
        for corner in [
            Point::new(-tol, -tol),
            Point::new(w, -tol),
            Point::new(-tol, h),
            Point::new(w, h),
        ] {
            let g = grid.to_grid(&corner)?;
            lo = Point::new(lo.x.min(g.x), lo.y.min(g.y));
            hi = Point::new(hi.x.max(g.x), hi.y.max(g.y));
        }
        Some((lo, hi))
    }

    /// Range of `a` in `[0, cols]` for which `grid.vertex(a, b)` stays inside
    /// the image (plus tolerance).
    fn chord(&self, image: &ImageRgba8, grid: &GridModel, b: f32) -> Option<(f32, f32)> {
        let tol = self.params.edge_tolerance_px;
        let (o, u, v) = (grid.origin(), grid.u(), grid.v());
        let (mut lo, mut hi) = (0.0f32, grid.cols() as f32);
        for (base, step, len) in [
            (o.x + b * v.x, u.x, image.w as f32),
            (o.y + b * v.y, u.y, image.h as f32),
        ] {
            let (min, max) = (-tol - base, len + tol - base);
            if step.abs() < f32::EPSILON {
                if min > 0.0 || max < 0.0 {
                    return None;
                }
                continue;
            }
            let (a0, a1) = (min / step, max / step);
            lo = lo.max(a0.min(a1));
            hi = hi.min(a0.max(a1));
        }
        (lo <= hi).then_some((lo, hi))
    }

    /// Largest block of whole cells within the grid whose corners all lie
    /// inside the image. The image is convex in grid space, so a block fits
    /// when its top and bottom edges do. Among equal areas the wider block
    /// wins, then the one nearest the origin.
    fn fitting_block(&self, image: &ImageRgba8, grid: &GridModel) -> Option<Block> {
        let chords: Vec<_> = (0..=grid.rows())
            .map(|j| self.chord(image, grid, j as f32))
            .collect();
        let mut best: Option<Block> = None;
        let mut best_area = 0u64;
        for j0 in 0..grid.rows() {
            let Some(top) = chords[j0 as usize] else {
                continue;
            };
            for j1 in (j0 + 1..=grid.rows()).rev() {
                let rows = j1 - j0;
                if (rows as u64) * (grid.cols() as u64) < best_area {
                    break;
                }
                let Some(bottom) = chords[j1 as usize] else {
                    continue;
                };
                let a = (top.0.max(bottom.0) - FIT_EPS).ceil().max(0.0);
                let b = (top.1.min(bottom.1) + FIT_EPS).floor();
                if b < a + 1.0 {
                    continue;
                }
                let cols = (b - a) as u32;
                let area = cols as u64 * rows as u64;
                let wider = best.is_some_and(|blk| cols > blk.cols);
                if area > best_area || (area == best_area && wider) {
                    best = Some(Block {
                        i0: a as u32,
                        j0,
                        cols,
                        rows,
                    });
                    best_area = area;
                }
            }
        }
        best
    }

    fn pixel_aligned_crop(
        &self,
        image: &ImageRgba8,
        block: &GridModel,
        cell_px: u32,
    ) -> Option<PixelRect> {
        if !self.params.exact_crop {
            return None;
        }
        let tol = self.params.pixel_align_tol;
        let integral = |x: f32| (x - x.round()).abs() <= tol;
        let (o, u, v) = (block.origin(), block.u(), block.v());
        let cell = cell_px as f32;
        let aligned = block.is_axis_aligned(tol)
            && (u.x - cell).abs() <= tol
            && (v.y - cell).abs() <= tol
            && integral(o.x)
            && integral(o.y);
        if !aligned || o.x.round() < 0.0 || o.y.round() < 0.0 {
            return None;
        }
        let rect = PixelRect::new(
            o.x.round() as u32,
            o.y.round() as u32,
            block.cols() * cell_px,
            block.rows() * cell_px,
        );
        (rect.right() as usize <= image.w && rect.bottom() as usize <= image.h).then_some(rect)
    }
}

/// Resample `block` onto an axis-aligned grid of `cell_px` square cells.
fn resample(image: &ImageRgba8, block: &GridModel, cell_px: u32) -> ImageRgba8 {
    let out_w = (block.cols() * cell_px) as usize;
    let out_h = (block.rows() * cell_px) as usize;
    let mut out = ImageRgba8::new(out_w, out_h);
    let inv_cell = 1.0 / cell_px as f32;
    out.data
        .par_chunks_mut(out_w)
        .enumerate()
        .for_each(|(y, row)| {
            let b = (y as f32 + 0.5) * inv_cell;
            for (x, px) in row.iter_mut().enumerate() {
                let a = (x as f32 + 0.5) * inv_cell;
                let p = block.vertex(a, b);
                *px = quantize(bilinear_sample_rgba(image, p.x - 0.5, p.y - 0.5));
            }
        });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vector;

    fn checker(w: usize, h: usize, cell: usize, off: usize) -> ImageRgba8 {
        ImageRgba8::from_fn(w, h, |x, y| {
            let cx = (x + cell - off) / cell;
            let cy = (y + cell - off) / cell;
            if (cx + cy) % 2 == 0 {
                [30, 30, 30, 255]
            } else {
                [220, 220, 220, 255]
            }
        })
    }

    #[test]
    fn aligned_grid_is_cropped_exactly() {
        let img = checker(500, 500, 50, 10);
        let grid = GridModel::new(
            Point::new(10.0, 10.0),
            Vector::new(50.0, 0.0),
            Vector::new(0.0, 50.0),
            10,
            10,
        )
        .unwrap();
        let rect = GridSnapper::default().snap(&img, &grid).unwrap();
        assert!(!rect.resampled());
        assert_eq!((rect.cols(), rect.rows()), (9, 9));
        assert_eq!(rect.trimmed(), (1, 1));
        assert_eq!((rect.image().w, rect.image().h), (450, 450));
        assert_eq!(rect.image().get(0, 0), img.get(10, 10));
        assert_eq!(rect.image().get(449, 449), img.get(459, 459));
    }

    #[test]
    fn overshoot_beyond_one_cell_is_out_of_bounds() {
        let img = checker(200, 200, 20, 0);
        let grid = GridModel::identity(20, 12, 10).unwrap();
        let err = GridSnapper::default().snap(&img, &grid).unwrap_err();
        assert!(matches!(
            err,
            SnapError::OutOfBounds {
                fit_cols: 10,
                fit_rows: 10,
                ..
            }
        ));
    }

    #[test]
    fn rotated_overhang_is_trimmed_not_rejected() {
        let (s, c) = 10f32.to_radians().sin_cos();
        let u = Vector::new(40.0 * c, 40.0 * s);
        let v = Vector::new(-40.0 * s, 40.0 * c);
        // Block a calibrator sizes from the projected 600x400 image extent.
        let grid = GridModel::new(Point::new(100.0, 100.0), u, v, 15, 10)
            .unwrap()
            .shifted(-2, -2);
        let img = ImageRgba8::new(600, 400);
        let rect = GridSnapper::default().snap(&img, &grid).unwrap();
        let (cols, rows) = (rect.cols(), rect.rows());
        assert!(cols >= 12 && rows >= 6, "kept {cols}x{rows}");
        assert_eq!(rect.trimmed(), (15 - cols, 10 - rows));
        for p in rect.source_grid().corners() {
            assert!(p.x >= -1.01 && p.y >= -1.01 && p.x <= 601.01 && p.y <= 401.01);
        }
    }

    #[test]
    fn origin_outside_image_is_out_of_bounds() {
        let img = checker(100, 100, 10, 0);
        let grid = GridModel::new(
            Point::new(-30.0, 0.0),
            Vector::new(10.0, 0.0),
            Vector::new(0.0, 10.0),
            5,
            5,
        )
        .unwrap();
        let err = GridSnapper::default().snap(&img, &grid).unwrap_err();
        assert!(matches!(err, SnapError::OutOfBounds { .. }));
    }

    #[test]
    fn cell_larger_than_image_is_empty() {
        let img = checker(30, 30, 10, 0);
        let grid = GridModel::identity(40, 1, 1).unwrap();
        let err = GridSnapper::default().snap(&img, &grid).unwrap_err();
        assert_eq!(
            err,
            SnapError::EmptyGrid {
                width: 30,
                height: 30
            }
        );
    }

    #[test]
    fn fractional_origin_is_resampled_to_whole_cells() {
        let img = checker(200, 200, 20, 0);
        let grid = GridModel::new(
            Point::new(0.5, 0.5),
            Vector::new(20.0, 0.0),
            Vector::new(0.0, 20.0),
            9,
            9,
        )
        .unwrap();
        let rect = GridSnapper::default().snap(&img, &grid).unwrap();
        assert!(rect.resampled());
        assert_eq!((rect.image().w, rect.image().h), (180, 180));
        assert_eq!(rect.image().w % rect.cell_px() as usize, 0);
    }

    #[test]
    fn output_cell_size_override() {
        let img = checker(200, 200, 20, 0);
        let grid = GridModel::identity(20, 10, 10).unwrap();
        let snapper = GridSnapper::new(SnapParams {
            output_cell_px: Some(10),
            ..Default::default()
        });
        let rect = snapper.snap(&img, &grid).unwrap();
        assert!(rect.resampled());
        assert_eq!(rect.cell_px(), 10);
        assert_eq!((rect.image().w, rect.image().h), (100, 100));
    }

    #[test]
    fn with_image_accepts_integer_upscale() {
        let img = checker(40, 20, 10, 0);
        let rect = GridSnapper::default()
            .snap(&img, &GridModel::identity(10, 4, 2).unwrap())
            .unwrap();
        let up = rect.clone().with_image(ImageRgba8::new(80, 40)).unwrap();
        assert_eq!(up.cell_px(), 20);
        assert_eq!(up.grid().u(), Vector::new(20.0, 0.0));
        assert!(rect.with_image(ImageRgba8::new(80, 30)).is_none());
    }
}
