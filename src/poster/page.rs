//! Physical page description and unit conversion.
use serde::{Deserialize, Serialize};

pub const MM_PER_INCH: f32 = 25.4;

/// ISO 216 paper sizes, portrait dimensions in millimetres.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Paper {
    A0,
    A1,
    A2,
    A3,
    #[default]
    A4,
}

impl Paper {
    /// `(width, height)` in millimetres, portrait.
    pub fn size_mm(self) -> (f32, f32) {
        match self {
            Paper::A0 => (841.0, 1189.0),
            Paper::A1 => (594.0, 841.0),
            Paper::A2 => (420.0, 594.0),
            Paper::A3 => (297.0, 420.0),
            Paper::A4 => (210.0, 297.0),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Short side horizontal.
    Portrait,
    /// Long side horizontal.
    Landscape,
    /// Let the planner pick whichever orientation suits the image better.
    #[default]
    Auto,
}

/// Paper size plus the borders that stay blank and the strip duplicated
/// between neighbouring sheets. All lengths in millimetres.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSpec {
    pub width_mm: f32,
    pub height_mm: f32,
    pub margin_mm: f32,
    pub overlap_mm: f32,
    pub orientation: Orientation,
}

impl Default for PageSpec {
    fn default() -> Self {
        Self::from_paper(Paper::A4, 5.0, 3.0)
    }
}

impl PageSpec {
    pub fn from_paper(paper: Paper, margin_mm: f32, overlap_mm: f32) -> Self {
        let (width_mm, height_mm) = paper.size_mm();
        Self {
            width_mm,
            height_mm,
            margin_mm,
            overlap_mm,
            orientation: Orientation::Auto,
        }
    }

    pub fn with_orientation(self, orientation: Orientation) -> Self {
        Self {
            orientation,
            ..self
        }
    }

    /// Page sized exactly to an image of `width_px × height_px` at
    /// `pixels_per_mm`, plus `margin_mm` on every side. The orientation is
    /// fixed to whichever the image itself has.
    pub fn fitted(width_px: u32, height_px: u32, pixels_per_mm: f32, margin_mm: f32) -> Self {
        let width_mm = width_px as f32 / pixels_per_mm + 2.0 * margin_mm;
        let height_mm = height_px as f32 / pixels_per_mm + 2.0 * margin_mm;
        let orientation = if width_mm > height_mm {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        };
        Self {
            width_mm,
            height_mm,
            margin_mm,
            overlap_mm: 0.0,
            orientation,
        }
    }

    /// Page `(width, height)` in millimetres for a concrete orientation.
    /// `Auto` keeps the dimensions as given.
    pub fn oriented_size_mm(&self, orientation: Orientation) -> (f32, f32) {
        let short = self.width_mm.min(self.height_mm);
        let long = self.width_mm.max(self.height_mm);
        match orientation {
            Orientation::Portrait => (short, long),
            Orientation::Landscape => (long, short),
            Orientation::Auto => (self.width_mm, self.height_mm),
        }
    }

    /// Printable `(width, height)` in millimetres once margins are removed.
    pub fn content_size_mm(&self, orientation: Orientation) -> (f32, f32) {
        let (w, h) = self.oriented_size_mm(orientation);
        (w - 2.0 * self.margin_mm, h - 2.0 * self.margin_mm)
    }
}

/// Print resolution that makes every grid cell `cell_mm` wide.
///
/// Both axes are considered and the smaller density wins, so slightly
/// non-square source cells are never printed larger than `cell_mm`. `None`
/// for empty input.
pub fn pixels_per_mm_for_cells(
    width_px: u32,
    height_px: u32,
    cols: u32,
    rows: u32,
    cell_mm: f32,
) -> Option<f32> {
    if width_px == 0 || height_px == 0 || cols == 0 || rows == 0 || !(cell_mm > 0.0) {
        return None;
    }
    let x = width_px as f32 / (cols as f32 * cell_mm);
    let y = height_px as f32 / (rows as f32 * cell_mm);
    Some(x.min(y))
}
