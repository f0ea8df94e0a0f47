use super::timing::TimingBreakdown;
use crate::enhance::ToneParams;
use crate::grid::{Calibration, RectifiedImage};
use crate::poster::{RenderedPage, TilePlan};
use crate::types::PixelRect;
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDescriptor {
    pub width: usize,
    pub height: usize,
}

/// What the snapper produced from the calibrated grid.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapSummary {
    pub cols: u32,
    pub rows: u32,
    pub cell_px: u32,
    pub width: usize,
    pub height: usize,
    pub resampled: bool,
    pub trimmed_cols: u32,
    pub trimmed_rows: u32,
}

impl From<&RectifiedImage> for SnapSummary {
    fn from(r: &RectifiedImage) -> Self {
        let (trimmed_cols, trimmed_rows) = r.trimmed();
        Self {
            cols: r.cols(),
            rows: r.rows(),
            cell_px: r.cell_px(),
            width: r.image().w,
            height: r.image().h,
            resampled: r.resampled(),
            trimmed_cols,
            trimmed_rows,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
    pub label: String,
    pub source_rect: PixelRect,
    pub width: usize,
    pub height: usize,
}

impl From<&RenderedPage> for PageSummary {
    fn from(p: &RenderedPage) -> Self {
        Self {
            label: p.label.clone(),
            source_rect: p.source_rect,
            width: p.image.w,
            height: p.image.h,
        }
    }
}

/// Full trace of one export run.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReport {
    pub input: InputDescriptor,
    pub calibration: Calibration,
    pub snap: SnapSummary,
    pub upscale_factor: u32,
    pub tone: ToneParams,
    /// Print resolution of the final image.
    pub pixels_per_mm: f32,
    pub plan: Option<TilePlan>,
    pub pages: Vec<PageSummary>,
    pub timing: TimingBreakdown,
}
