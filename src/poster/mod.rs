//! Poster printing: page geometry, tiling plans and page rendering.
//!
//! - [`page`]: paper sizes, margins, overlap and print resolution.
//! - [`layout`]: pure planning of overlapping page tiles ([`TilePlan`]).
//! - [`render`]: crop tiles out of an image and add registration marks.

pub mod layout;
pub mod page;
pub mod render;

pub use layout::{LayoutError, LayoutMode, PosterLayoutPlanner, Tile, TilePlan};
pub use page::{pixels_per_mm_for_cells, Orientation, PageSpec, Paper, MM_PER_INCH};
pub use render::{PosterRenderer, RenderError, RenderParams, RenderedPage};
