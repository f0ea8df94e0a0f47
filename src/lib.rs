#![doc = include_str!("../README.md")]

// Public modules (stable-ish surface)
pub mod export;
pub mod grid;
pub mod image;
pub mod poster;
pub mod types;

// Supporting modules.
pub mod angle;
pub mod config;
pub mod diagnostics;
pub mod enhance;
pub mod filename;
pub mod homography;

// --- High-level re-exports -------------------------------------------------

pub use crate::export::{ExportError, ExportMode, ExportParams, MapExporter};
pub use crate::filename::MapFileName;
pub use crate::grid::{GridCalibrator, GridModel, GridSnapper, RectifiedImage};
pub use crate::poster::{PageSpec, PosterLayoutPlanner, PosterRenderer, TilePlan};

pub use crate::diagnostics::ExportReport;

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use grid_poster::prelude::*;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let image = ImageRgba8::new_filled(500, 500, [255, 255, 255, 255]);
/// let clicks = [Point::new(10.0, 10.0), Point::new(60.0, 10.0), Point::new(10.0, 60.0)];
///
/// let calibration = GridCalibrator::default().calibrate(&clicks, image.w, image.h)?;
/// let snapped = GridSnapper::default().snap(&image, &calibration.grid)?;
///
/// let (w, h) = (snapped.image().w as u32, snapped.image().h as u32);
/// let plan = PosterLayoutPlanner::default().plan(w, h, 2.0, &PageSpec::default())?;
/// let pages = PosterRenderer::default().render(snapped.image(), &plan)?;
/// for page in &pages {
///     println!("{} -> {}x{}", page.label, page.image.w, page.image.h);
/// }
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::image::ImageRgba8;
    pub use crate::types::{Point, Vector};
    pub use crate::{
        GridCalibrator, GridModel, GridSnapper, PageSpec, PosterLayoutPlanner, PosterRenderer,
    };
}
