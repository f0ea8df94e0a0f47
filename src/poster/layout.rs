//! Split an image into printable pages.
//!
//! Planning is pure rectangle arithmetic on the image dimensions; no pixel
//! data is touched, so a [`TilePlan`] can be cached and reused for every
//! image of the same resolution.
//!
//! Per axis, with `content` the printable page extent in pixels and
//! `overlap` the glue strip:
//!
//! ```text
//! stride = content - overlap
//! tiles  = max(1, ceil((image - overlap) / stride))
//! source = [i·stride, min(i·stride + content, image))
//! core   = [i·stride, (i+1)·stride)     (last tile: up to the image edge)
//! ```
//!
//! Cores partition the image. Each source rect extends its core by the
//! overlap strip on the trailing side, which is exactly the leading part of
//! the next tile's core.
use super::page::{Orientation, PageSpec};
use crate::types::PixelRect;
use log::debug;
use serde::{Deserialize, Serialize};

const PX_EPS: f32 = 1e-3;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMode {
    /// Uniform grid of overlapping pages meant to be glued together.
    #[default]
    Tiled,
    /// Scale the whole image onto one page.
    SingleSheet,
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("invalid page spec: {reason}")]
    InvalidPageSpec { reason: String },
    #[error("overlap of {overlap_px}px leaves no stride on a {content_px}px page")]
    NonPositiveStride { content_px: u32, overlap_px: u32 },
}

fn invalid(reason: impl Into<String>) -> LayoutError {
    LayoutError::InvalidPageSpec {
        reason: reason.into(),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    pub row: u32,
    pub col: u32,
    /// Pixels printed on this page, including the trailing overlap strips.
    pub source_rect: PixelRect,
    /// Pixels this page is responsible for; cores partition the image.
    pub core_rect: PixelRect,
    pub is_edge_row: bool,
    pub is_edge_col: bool,
}

impl Tile {
    /// One-based page label, `R1C1` for the top-left page.
    pub fn label(&self) -> String {
        format!("R{}C{}", self.row + 1, self.col + 1)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TilePlan {
    pub image_width: u32,
    pub image_height: u32,
    pub rows: u32,
    pub cols: u32,
    pub mode: LayoutMode,
    /// Concrete orientation the pages are printed in.
    pub orientation: Orientation,
    /// Printable page area in pixels `(width, height)`.
    pub content_px: (u32, u32),
    /// Distance between neighbouring page origins `(x, y)`.
    pub stride_px: (u32, u32),
    pub overlap_px: u32,
    /// Factor applied to the source pixels when printing (1 for tiled plans).
    pub output_scale: f32,
    /// Row-major: the whole first row left to right, then the next row.
    pub tiles: Vec<Tile>,
}

impl TilePlan {
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tile(&self, row: u32, col: u32) -> Option<&Tile> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.tiles.get((row * self.cols + col) as usize)
    }

    /// Whether the plan was computed for an image of this size.
    pub fn matches(&self, width: usize, height: usize) -> bool {
        self.image_width as usize == width && self.image_height as usize == height
    }
}

/// One tile's extent along a single axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Span {
    start: u32,
    end: u32,
    core_end: u32,
}

fn axis_spans(image: u32, content: u32, overlap: u32) -> Vec<Span> {
    let stride = content - overlap;
    let count = if image <= overlap {
        1
    } else {
        (image - overlap).div_ceil(stride).max(1)
    };
    (0..count)
        .map(|i| {
            let start = i * stride;
            let last = i + 1 == count;
            Span {
                start,
                end: (start + content).min(image),
                core_end: if last { image } else { start + stride },
            }
        })
        .collect()
}

#[derive(Clone, Debug, Default)]
pub struct PosterLayoutPlanner {
    mode: LayoutMode,
}

impl PosterLayoutPlanner {
    pub fn new(mode: LayoutMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> LayoutMode {
        self.mode
    }

    /// Plan pages for a `width × height` pixel image printed at
    /// `pixels_per_unit` pixels per millimetre.
    pub fn plan(
        &self,
        width: u32,
        height: u32,
        pixels_per_unit: f32,
        page: &PageSpec,
    ) -> Result<TilePlan, LayoutError> {
        validate(width, height, pixels_per_unit, page)?;
        let candidates: &[Orientation] = match page.orientation {
            Orientation::Auto => &[Orientation::Portrait, Orientation::Landscape],
            Orientation::Portrait => &[Orientation::Portrait],
            Orientation::Landscape => &[Orientation::Landscape],
        };

        let mut best: Option<TilePlan> = None;
        for &orientation in candidates {
            let plan = match self.mode {
                LayoutMode::Tiled => tiled(width, height, pixels_per_unit, page, orientation)?,
                LayoutMode::SingleSheet => {
                    single_sheet(width, height, pixels_per_unit, page, orientation)?
                }
            };
            let better = match &best {
                None => true,
                Some(b) => match self.mode {
                    LayoutMode::Tiled => plan.len() < b.len(),
                    LayoutMode::SingleSheet => plan.output_scale > b.output_scale,
                },
            };
            if better {
                best = Some(plan);
            }
        }
        let plan = best.ok_or_else(|| invalid("no orientation to evaluate"))?;
        debug!(
            "PosterLayoutPlanner::plan {}x{} px -> {}x{} pages ({:?}, {:?}) stride={:?} overlap={}",
            width, height, plan.cols, plan.rows, plan.mode, plan.orientation, plan.stride_px, plan.overlap_px
        );
        Ok(plan)
    }
}

fn validate(width: u32, height: u32, ppu: f32, page: &PageSpec) -> Result<(), LayoutError> {
    if width == 0 || height == 0 {
        return Err(invalid(format!("image is empty ({width}x{height})")));
    }
    if !(ppu.is_finite() && ppu > 0.0) {
        return Err(invalid(format!("resolution must be positive, got {ppu}")));
    }
    let dims = [page.width_mm, page.height_mm];
    if dims.iter().any(|d| !(d.is_finite() && *d > 0.0)) {
        return Err(invalid(format!(
            "page dimensions must be positive, got {}x{}",
            page.width_mm, page.height_mm
        )));
    }
    for (name, value) in [("margin", page.margin_mm), ("overlap", page.overlap_mm)] {
        if !(value.is_finite() && value >= 0.0) {
            return Err(invalid(format!("{name} must be non-negative, got {value}")));
        }
    }
    let short = page.width_mm.min(page.height_mm);
    if 2.0 * page.margin_mm >= short {
        return Err(invalid(format!(
            "margin {}mm leaves no printable area on a {}mm side",
            page.margin_mm, short
        )));
    }
    Ok(())
}

fn content_px(
    ppu: f32,
    page: &PageSpec,
    orientation: Orientation,
) -> Result<(u32, u32), LayoutError> {
    let (w_mm, h_mm) = page.content_size_mm(orientation);
    // Absorb float noise so a page fitted to an image keeps every pixel.
    let w = (w_mm * ppu + PX_EPS).floor();
    let h = (h_mm * ppu + PX_EPS).floor();
    if w < 1.0 || h < 1.0 {
        return Err(invalid(format!(
            "printable area {w_mm}x{h_mm}mm is smaller than one pixel"
        )));
    }
    Ok((w as u32, h as u32))
}

fn tiled(
    width: u32,
    height: u32,
    ppu: f32,
    page: &PageSpec,
    orientation: Orientation,
) -> Result<TilePlan, LayoutError> {
    let (content_w, content_h) = content_px(ppu, page, orientation)?;
    let overlap = (page.overlap_mm * ppu).round() as u32;
    for content_px in [content_w, content_h] {
        if overlap >= content_px {
            return Err(LayoutError::NonPositiveStride {
                content_px,
                overlap_px: overlap,
            });
        }
    }

    let xs = axis_spans(width, content_w, overlap);
    let ys = axis_spans(height, content_h, overlap);
    let (cols, rows) = (xs.len() as u32, ys.len() as u32);
    let mut tiles = Vec::with_capacity(xs.len() * ys.len());
    for (row, y) in ys.iter().enumerate() {
        for (col, x) in xs.iter().enumerate() {
            let (row, col) = (row as u32, col as u32);
            tiles.push(Tile {
                row,
                col,
                source_rect: PixelRect::new(x.start, y.start, x.end - x.start, y.end - y.start),
                core_rect: PixelRect::new(
                    x.start,
                    y.start,
                    x.core_end - x.start,
                    y.core_end - y.start,
                ),
                is_edge_row: row + 1 == rows,
                is_edge_col: col + 1 == cols,
            });
        }
    }

    Ok(TilePlan {
        image_width: width,
        image_height: height,
        rows,
        cols,
        mode: LayoutMode::Tiled,
        orientation,
        content_px: (content_w, content_h),
        stride_px: (content_w - overlap, content_h - overlap),
        overlap_px: overlap,
        output_scale: 1.0,
        tiles,
    })
}

fn single_sheet(
    width: u32,
    height: u32,
    ppu: f32,
    page: &PageSpec,
    orientation: Orientation,
) -> Result<TilePlan, LayoutError> {
    let (content_w, content_h) = content_px(ppu, page, orientation)?;
    let scale = (content_w as f32 / width as f32).min(content_h as f32 / height as f32);
    let full = PixelRect::new(0, 0, width, height);
    Ok(TilePlan {
        image_width: width,
        image_height: height,
        rows: 1,
        cols: 1,
        mode: LayoutMode::SingleSheet,
        orientation,
        content_px: (content_w, content_h),
        stride_px: (width, height),
        overlap_px: 0,
        output_scale: scale,
        tiles: vec![Tile {
            row: 0,
            col: 0,
            source_rect: full,
            core_rect: full,
            is_edge_row: true,
            is_edge_col: true,
        }],
    })
}
