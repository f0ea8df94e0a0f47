//! Cut an image into the pages of a [`TilePlan`].
//!
//! Registration crosshairs are drawn once onto a copy of the source image at
//! the centre of every overlap strip, then each page is cropped from that
//! copy. Neighbouring pages therefore carry identical marks in their shared
//! strip and line up when glued.
use super::layout::{LayoutMode, Tile, TilePlan};
use crate::image::{ImageRgba8, ImageViewMut, Rgba};
use crate::types::PixelRect;
use image::imageops::{self, FilterType};
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderParams {
    pub draw_marks: bool,
    /// Length of each crosshair arm from the centre, in pixels.
    pub mark_arm_px: u32,
    pub mark_thickness_px: u32,
    pub mark_color: Rgba,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            draw_marks: true,
            mark_arm_px: 12,
            mark_thickness_px: 1,
            mark_color: [0, 0, 0, 255],
        }
    }
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("plan was made for a {plan_w}x{plan_h} image, got {image_w}x{image_h}")]
    PlanMismatch {
        plan_w: u32,
        plan_h: u32,
        image_w: usize,
        image_h: usize,
    },
    #[error("tile R{}C{} reaches outside the image", .row + 1, .col + 1)]
    TileOutOfBounds { row: u32, col: u32 },
}

#[derive(Clone, Debug)]
pub struct RenderedPage {
    pub row: u32,
    pub col: u32,
    /// `R1C1`-style label used when assembling the document.
    pub label: String,
    pub source_rect: PixelRect,
    pub image: ImageRgba8,
}

#[derive(Clone, Debug, Default)]
pub struct PosterRenderer {
    params: RenderParams,
}

impl PosterRenderer {
    pub fn new(params: RenderParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RenderParams {
        &self.params
    }

    /// Render every tile of `plan`, returned in the plan's row-major order.
    pub fn render(
        &self,
        image: &ImageRgba8,
        plan: &TilePlan,
    ) -> Result<Vec<RenderedPage>, RenderError> {
        if !plan.matches(image.w, image.h) {
            return Err(RenderError::PlanMismatch {
                plan_w: plan.image_width,
                plan_h: plan.image_height,
                image_w: image.w,
                image_h: image.h,
            });
        }

        if plan.mode == LayoutMode::SingleSheet {
            return Ok(plan
                .tiles
                .iter()
                .map(|tile| page(tile, scale_image(image, plan.output_scale)))
                .collect());
        }

        let marked;
        let source = if self.params.draw_marks && plan.overlap_px > 0 {
            let mut copy = image.clone();
            let count = self.draw_registration_marks(&mut copy, plan);
            debug!("PosterRenderer::render drew {count} registration marks");
            marked = copy;
            &marked
        } else {
            image
        };

        let pages = plan
            .tiles
            .par_iter()
            .map(|tile| {
                source
                    .crop(&tile.source_rect)
                    .map(|crop| page(tile, crop))
                    .ok_or(RenderError::TileOutOfBounds {
                        row: tile.row,
                        col: tile.col,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            "PosterRenderer::render {} pages ({}x{})",
            pages.len(),
            plan.cols,
            plan.rows
        );
        Ok(pages)
    }

    /// Crosshairs at the centre of each overlap strip segment, returns how
    /// many were drawn. Arms are clipped to their strip so no mark reaches
    /// into a printed core.
    fn draw_registration_marks(&self, img: &mut ImageRgba8, plan: &TilePlan) -> usize {
        let overlap = plan.overlap_px;
        let half = overlap / 2;
        let mut marks = Vec::new();
        for tile in &plan.tiles {
            let core = tile.core_rect;
            if !tile.is_edge_col {
                let strip = PixelRect::new(core.right(), core.y, overlap, core.h);
                marks.push((core.right() + half, core.y + core.h / 2, strip));
            }
            if !tile.is_edge_row {
                let strip = PixelRect::new(core.x, core.bottom(), core.w, overlap);
                marks.push((core.x + core.w / 2, core.bottom() + half, strip));
            }
        }
        for &(x, y, strip) in &marks {
            self.crosshair(img, x as i64, y as i64, &strip);
        }
        marks.len()
    }

    fn crosshair(&self, img: &mut ImageRgba8, cx: i64, cy: i64, bounds: &PixelRect) {
        let x_end = (bounds.right() as i64).min(img.w as i64);
        let y_end = (bounds.bottom() as i64).min(img.h as i64);
        let (x_start, y_start) = (bounds.x as i64, bounds.y as i64);
        let arm = self.params.mark_arm_px as i64;
        let t = self.params.mark_thickness_px.max(1) as i64;
        let (lo, hi) = (-(t - 1) / 2, t / 2);
        let color = self.params.mark_color;
        // Clipped inclusive range, `None` when it misses [start, end).
        let clip = |a: i64, b: i64, start: i64, end: i64| {
            let (a, b) = (a.max(start), b.min(end - 1));
            (a <= b).then_some((a as usize, b as usize))
        };

        let xs = clip(cx - arm, cx + arm, x_start, x_end);
        let bar_x = clip(cx + lo, cx + hi, x_start, x_end);
        for y in (cy - arm).max(y_start)..=(cy + arm).min(y_end - 1) {
            let horizontal = y >= cy + lo && y <= cy + hi;
            let span = if horizontal { xs } else { bar_x };
            if let Some((x0, x1)) = span {
                img.row_mut(y as usize)[x0..=x1].fill(color);
            }
        }
    }
}

fn page(tile: &Tile, image: ImageRgba8) -> RenderedPage {
    RenderedPage {
        row: tile.row,
        col: tile.col,
        label: tile.label(),
        source_rect: tile.source_rect,
        image,
    }
}

fn scale_image(image: &ImageRgba8, scale: f32) -> ImageRgba8 {
    let w = ((image.w as f32 * scale).round() as u32).max(1);
    let h = ((image.h as f32 * scale).round() as u32).max(1);
    if w as usize == image.w && h as usize == image.h {
        return image.clone();
    }
    let resized = imageops::resize(&image.to_rgba_image(), w, h, FilterType::Lanczos3);
    ImageRgba8::from(resized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poster::layout::PosterLayoutPlanner;
    use crate::poster::page::{Orientation, PageSpec};

    fn gradient(w: usize, h: usize) -> ImageRgba8 {
        ImageRgba8::from_fn(w, h, |x, y| [(x % 256) as u8, (y % 256) as u8, 128, 255])
    }

    fn spec(w: f32, h: f32, overlap: f32) -> PageSpec {
        PageSpec {
            width_mm: w,
            height_mm: h,
            margin_mm: 0.0,
            overlap_mm: overlap,
            orientation: Orientation::Portrait,
        }
    }

    #[test]
    fn quadrants_in_row_major_order() {
        let img = gradient(200, 200);
        let plan = PosterLayoutPlanner::default()
            .plan(200, 200, 1.0, &spec(100.0, 100.0, 0.0))
            .unwrap();
        let pages = PosterRenderer::default().render(&img, &plan).unwrap();
        let order: Vec<_> = pages.iter().map(|p| (p.row, p.col)).collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
        for p in &pages {
            let rect = PixelRect::new(p.col * 100, p.row * 100, 100, 100);
            assert_eq!(p.source_rect, rect);
            assert_eq!(p.image, img.crop(&rect).unwrap());
        }
        assert_eq!(pages[3].label, "R2C2");
    }

    #[test]
    fn overlap_strips_carry_identical_marks() {
        let img = ImageRgba8::new_filled(300, 120, [255, 255, 255, 255]);
        let plan = PosterLayoutPlanner::default()
            .plan(300, 120, 1.0, &spec(120.0, 130.0, 20.0))
            .unwrap();
        assert_eq!((plan.cols, plan.rows), (3, 1));
        let pages = PosterRenderer::default().render(&img, &plan).unwrap();

        let left = &pages[0];
        let right = &pages[1];
        let strip = |p: &RenderedPage, x0: u32| {
            p.image
                .crop(&PixelRect::new(x0, 0, 20, p.image.h as u32))
                .unwrap()
        };
        let a = strip(left, 100);
        let b = strip(right, 0);
        assert_eq!(a, b);
        assert!(a.data.iter().any(|px| *px == [0, 0, 0, 255]));
        // Crosshair centre: strip midpoint column, tile core mid row.
        assert_eq!(left.image.get(110, 60), [0, 0, 0, 255]);
    }

    #[test]
    fn marks_stay_inside_narrow_strips() {
        let white = [255, 255, 255, 255];
        let img = ImageRgba8::new_filled(300, 120, white);
        let plan = PosterLayoutPlanner::default()
            .plan(300, 120, 1.0, &spec(120.0, 130.0, 4.0))
            .unwrap();
        assert_eq!((plan.cols, plan.rows, plan.overlap_px), (3, 1, 4));
        let pages = PosterRenderer::default().render(&img, &plan).unwrap();

        let first = &pages[0].image;
        assert_eq!(first.get(118, 60), [0, 0, 0, 255]);
        for y in 0..first.h {
            for x in 0..116 {
                assert_eq!(first.get(x, y), white, "mark leaked to ({x}, {y})");
            }
        }
        let second = &pages[1].image;
        for y in 0..second.h {
            for x in 4..116 {
                assert_eq!(second.get(x, y), white, "mark leaked to ({x}, {y})");
            }
        }
    }

    #[test]
    fn tile_outside_image_is_an_error() {
        let img = gradient(200, 200);
        let mut plan = PosterLayoutPlanner::default()
            .plan(200, 200, 1.0, &spec(100.0, 100.0, 0.0))
            .unwrap();
        plan.tiles[3].source_rect = PixelRect::new(150, 150, 100, 100);
        let err = PosterRenderer::default().render(&img, &plan).unwrap_err();
        assert_eq!(err, RenderError::TileOutOfBounds { row: 1, col: 1 });
    }

    #[test]
    fn no_marks_without_overlap() {
        let img = ImageRgba8::new_filled(200, 100, [255, 255, 255, 255]);
        let plan = PosterLayoutPlanner::default()
            .plan(200, 100, 1.0, &spec(100.0, 100.0, 0.0))
            .unwrap();
        let pages = PosterRenderer::default().render(&img, &plan).unwrap();
        assert!(pages
            .iter()
            .all(|p| p.image.data.iter().all(|px| *px == [255, 255, 255, 255])));
    }

    #[test]
    fn mismatched_plan_is_rejected() {
        let plan = PosterLayoutPlanner::default()
            .plan(200, 200, 1.0, &spec(100.0, 100.0, 0.0))
            .unwrap();
        let err = PosterRenderer::default()
            .render(&gradient(100, 100), &plan)
            .unwrap_err();
        assert!(matches!(err, RenderError::PlanMismatch { plan_w: 200, .. }));
    }

    #[test]
    fn single_sheet_is_scaled_to_page() {
        let img = gradient(400, 200);
        let plan = PosterLayoutPlanner::new(LayoutMode::SingleSheet)
            .plan(400, 200, 1.0, &spec(200.0, 300.0, 0.0))
            .unwrap();
        let pages = PosterRenderer::default().render(&img, &plan).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!((pages[0].image.w, pages[0].image.h), (200, 100));
        assert_eq!(pages[0].label, "R1C1");
    }
}
