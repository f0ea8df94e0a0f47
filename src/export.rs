//! End-to-end export: clicks and a decoded map in, printable pages out.
//!
//! ```text
//! calibrate -> snap -> super-resolution -> tone -> Vtt:   rectified image
//!                                               -> Print: plan -> render -> assembler
//! ```
//!
//! Super-resolution and document assembly are external concerns, reached
//! through the [`SuperResolution`] and [`DocumentAssembler`] traits.
use crate::diagnostics::{
    ExportReport, InputDescriptor, PageSummary, SnapSummary, TimingBreakdown,
};
use crate::diagnostics::timing::elapsed_ms;
use crate::enhance::{apply_tone, ToneParams};
use crate::grid::{
    Calibration, CalibrationError, CalibrationParams, GridCalibrator, GridModel, GridSnapper,
    RectifiedImage, SnapError, SnapParams,
};
use crate::image::io::{save_rgba_png, write_json_file};
use crate::image::ImageRgba8;
use crate::poster::{
    pixels_per_mm_for_cells, LayoutError, LayoutMode, PageSpec, PosterLayoutPlanner,
    PosterRenderer, RenderError, RenderParams, RenderedPage, MM_PER_INCH,
};
use crate::types::{PixelRect, Point, Vector};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error(transparent)]
    Snap(#[from] SnapError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("upscaler returned {got_w}x{got_h}, expected {expected_w}x{expected_h}")]
    UpscaleMismatch {
        expected_w: usize,
        expected_h: usize,
        got_w: usize,
        got_h: usize,
    },
    #[error("cannot derive print resolution: {0}")]
    Resolution(String),
    #[error("enhancer failed: {0}")]
    Enhancer(String),
    #[error("document assembly failed: {0}")]
    Assembly(String),
}

/// Opaque image super-resolution model.
pub trait SuperResolution: Send + Sync {
    /// Return `image` enlarged by the integer factor `scale`.
    fn enhance(&self, image: &ImageRgba8, scale: u32) -> Result<ImageRgba8, ExportError>;
}

/// Used when no model is configured: hands the image back untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassThrough;

impl SuperResolution for PassThrough {
    fn enhance(&self, image: &ImageRgba8, _scale: u32) -> Result<ImageRgba8, ExportError> {
        Ok(image.clone())
    }
}

/// Pixel replication.
#[derive(Clone, Copy, Debug, Default)]
pub struct NearestUpscale;

impl SuperResolution for NearestUpscale {
    fn enhance(&self, image: &ImageRgba8, scale: u32) -> Result<ImageRgba8, ExportError> {
        if scale == 0 {
            return Err(ExportError::Enhancer("scale must be at least 1".into()));
        }
        let s = scale as usize;
        Ok(ImageRgba8::from_fn(image.w * s, image.h * s, |x, y| {
            image.get(x / s, y / s)
        }))
    }
}

/// Consumer of the rendered pages, e.g. a PDF writer.
pub trait DocumentAssembler {
    fn assemble(&mut self, pages: &[RenderedPage], page: &PageSpec) -> Result<(), ExportError>;
}

/// Writes each page as `<name>_<label>.png` plus a `<name>_pages.json`
/// manifest into one directory.
#[derive(Clone, Debug)]
pub struct PngDirectoryAssembler {
    dir: PathBuf,
    name: String,
    written: Vec<PathBuf>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PageManifest<'a> {
    page: &'a PageSpec,
    files: Vec<String>,
    pages: Vec<PageSummary>,
}

impl PngDirectoryAssembler {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
            written: Vec::new(),
        }
    }

    /// Every file written so far, manifests included.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn page_path(&self, label: &str) -> PathBuf {
        self.dir.join(format!("{}_{label}.png", self.name))
    }

    /// `<name>_pages.json`, written last; its presence marks a finished run.
    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(format!("{}_pages.json", self.name))
    }
}

impl DocumentAssembler for PngDirectoryAssembler {
    fn assemble(&mut self, pages: &[RenderedPage], page: &PageSpec) -> Result<(), ExportError> {
        let mut files = Vec::with_capacity(pages.len());
        for p in pages {
            let path = self.page_path(&p.label);
            save_rgba_png(&p.image, &path).map_err(ExportError::Assembly)?;
            files.push(file_name(&path));
            self.written.push(path);
        }
        let manifest = PageManifest {
            page,
            files,
            pages: pages.iter().map(PageSummary::from).collect(),
        };
        let path = self.manifest_path();
        write_json_file(&path, &manifest).map_err(ExportError::Assembly)?;
        self.written.push(path);
        info!(
            "PngDirectoryAssembler wrote {} pages to {}",
            pages.len(),
            self.dir.display()
        );
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Where the snapped map ends up.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExportMode {
    /// Rectified image for a virtual tabletop; no pages.
    Vtt,
    /// Physical pages cut from the map.
    Print {
        #[serde(default)]
        page: PageSpec,
        #[serde(default)]
        layout: LayoutMode,
    },
    /// One page sized to the map plus a blank border.
    Exact {
        #[serde(default = "default_exact_margin")]
        margin_mm: f32,
    },
}

fn default_exact_margin() -> f32 {
    5.0
}

impl Default for ExportMode {
    fn default() -> Self {
        ExportMode::Print {
            page: PageSpec::default(),
            layout: LayoutMode::Tiled,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportParams {
    pub calibration: CalibrationParams,
    pub snap: SnapParams,
    pub render: RenderParams,
    pub tone: ToneParams,
    /// Integer factor handed to the super-resolution model; 1 skips it.
    pub upscale_factor: u32,
    /// Print resolution override. `None` sizes every cell to `cell_mm`.
    pub pixels_per_mm: Option<f32>,
    pub cell_mm: f32,
}

impl Default for ExportParams {
    fn default() -> Self {
        Self {
            calibration: CalibrationParams::default(),
            snap: SnapParams::default(),
            render: RenderParams::default(),
            tone: ToneParams::default(),
            upscale_factor: 1,
            pixels_per_mm: None,
            cell_mm: MM_PER_INCH,
        }
    }
}

#[derive(Debug)]
pub enum ExportOutput {
    Vtt(RectifiedImage),
    Pages {
        page: PageSpec,
        pages: Vec<RenderedPage>,
    },
}

#[derive(Debug)]
pub struct Export {
    pub output: ExportOutput,
    pub report: ExportReport,
}

pub struct MapExporter {
    params: ExportParams,
    upscaler: Box<dyn SuperResolution>,
}

impl MapExporter {
    pub fn new(params: ExportParams) -> Self {
        Self {
            params,
            upscaler: Box::new(PassThrough),
        }
    }

    pub fn with_upscaler(mut self, upscaler: Box<dyn SuperResolution>) -> Self {
        self.upscaler = upscaler;
        self
    }

    pub fn params(&self) -> &ExportParams {
        &self.params
    }

    pub fn export(
        &self,
        image: &ImageRgba8,
        points: &[Point],
        mode: &ExportMode,
    ) -> Result<Export, ExportError> {
        let start = Instant::now();
        let mut timing = TimingBreakdown::default();

        let calibrator = GridCalibrator::new(self.params.calibration.clone());
        let calibration =
            timing.measure("calibrate", || calibrator.calibrate(points, image.w, image.h))?;
        self.finish(image, calibration, mode, timing, start)
    }

    /// Export a map that is already cut to whole cells, such as one named
    /// `name_WWxHH.png`. The buffer is taken to hold exactly `cols × rows`
    /// cells, so no clicks are needed.
    pub fn export_snapped(
        &self,
        image: &ImageRgba8,
        cols: u32,
        rows: u32,
        mode: &ExportMode,
    ) -> Result<Export, ExportError> {
        let start = Instant::now();
        if cols == 0 || rows == 0 || image.w == 0 || image.h == 0 {
            return Err(SnapError::EmptyGrid {
                width: image.w,
                height: image.h,
            }
            .into());
        }
        let grid = GridModel::new(
            Point::origin(),
            Vector::new(image.w as f32 / cols as f32, 0.0),
            Vector::new(0.0, image.h as f32 / rows as f32),
            cols,
            rows,
        )
        .map_err(SnapError::from)?;
        debug!(
            "MapExporter::export_snapped {}x{} cells of {:.2}px",
            cols,
            rows,
            grid.cell_size()
        );
        let calibration = Calibration {
            grid,
            residual: 0.0,
            tolerance: self.params.calibration.residual_tolerance,
            u_flipped: false,
        };
        self.finish(image, calibration, mode, TimingBreakdown::default(), start)
    }

    fn finish(
        &self,
        image: &ImageRgba8,
        calibration: Calibration,
        mode: &ExportMode,
        mut timing: TimingBreakdown,
        start: Instant,
    ) -> Result<Export, ExportError> {
        let snapper = GridSnapper::new(self.params.snap.clone());
        let mut rect = timing.measure("snap", || snapper.snap(image, &calibration.grid))?;
        let snap = SnapSummary::from(&rect);
        info!(
            "snapped map to {}x{} cells of {}px",
            rect.cols(),
            rect.rows(),
            rect.cell_px()
        );

        let factor = self.params.upscale_factor.max(1);
        if factor > 1 {
            rect = timing.measure("upscale", || self.upscale(rect, factor))?;
        }
        if !self.params.tone.is_identity() {
            rect = timing.measure("tone", || {
                let toned = apply_tone(rect.image(), &self.params.tone);
                rect.with_image(toned)
                    .ok_or_else(|| ExportError::Enhancer("tone changed image size".into()))
            })?;
        }

        let (w, h) = (rect.image().w as u32, rect.image().h as u32);
        let pixels_per_mm = match self.params.pixels_per_mm {
            Some(v) => v,
            None => pixels_per_mm_for_cells(w, h, rect.cols(), rect.rows(), self.params.cell_mm)
                .ok_or_else(|| {
                    ExportError::Resolution(format!("cell size {}mm", self.params.cell_mm))
                })?,
        };
        debug!("MapExporter::export pixels_per_mm={pixels_per_mm:.4}");

        let (page, layout) = match mode {
            ExportMode::Vtt => (None, None),
            ExportMode::Print { page, layout } => (Some(*page), Some(*layout)),
            ExportMode::Exact { margin_mm } => (
                Some(PageSpec::fitted(w, h, pixels_per_mm, *margin_mm)),
                Some(LayoutMode::SingleSheet),
            ),
        };

        let (output, plan, pages) = match (page, layout) {
            (Some(page), Some(layout)) => {
                let planner = PosterLayoutPlanner::new(layout);
                let plan =
                    timing.measure("plan", || planner.plan(w, h, pixels_per_mm, &page))?;
                let renderer = PosterRenderer::new(self.params.render.clone());
                let pages = timing.measure("render", || renderer.render(rect.image(), &plan))?;
                info!("rendered {} pages ({}x{})", pages.len(), plan.cols, plan.rows);
                let summaries = pages.iter().map(PageSummary::from).collect();
                (ExportOutput::Pages { page, pages }, Some(plan), summaries)
            }
            _ => (ExportOutput::Vtt(rect), None, Vec::new()),
        };

        timing.total_ms = elapsed_ms(start);
        let report = ExportReport {
            input: InputDescriptor {
                width: image.w,
                height: image.h,
            },
            calibration,
            snap,
            upscale_factor: factor,
            tone: self.params.tone.clone(),
            pixels_per_mm,
            plan,
            pages,
            timing,
        };
        Ok(Export { output, report })
    }

    /// Run [`export`](Self::export) and [`deliver`](Self::deliver) the result.
    pub fn export_to(
        &self,
        image: &ImageRgba8,
        points: &[Point],
        mode: &ExportMode,
        assembler: &mut dyn DocumentAssembler,
    ) -> Result<ExportReport, ExportError> {
        let export = self.export(image, points, mode)?;
        self.deliver(export, assembler)
    }

    /// Hand a finished export to `assembler`. A VTT export is assembled as a
    /// single page sized to the map.
    pub fn deliver(
        &self,
        export: Export,
        assembler: &mut dyn DocumentAssembler,
    ) -> Result<ExportReport, ExportError> {
        let Export { output, report } = export;
        match output {
            ExportOutput::Pages { page, pages } => assembler.assemble(&pages, &page)?,
            ExportOutput::Vtt(rect) => {
                let (w, h) = (rect.image().w as u32, rect.image().h as u32);
                let page = PageSpec::fitted(w, h, report.pixels_per_mm, 0.0);
                let single = RenderedPage {
                    row: 0,
                    col: 0,
                    label: "R1C1".to_string(),
                    source_rect: PixelRect::new(0, 0, w, h),
                    image: rect.into_image(),
                };
                assembler.assemble(std::slice::from_ref(&single), &page)?;
            }
        }
        Ok(report)
    }

    fn upscale(&self, rect: RectifiedImage, factor: u32) -> Result<RectifiedImage, ExportError> {
        let (expected_w, expected_h) = (
            rect.image().w * factor as usize,
            rect.image().h * factor as usize,
        );
        let up = self.upscaler.enhance(rect.image(), factor)?;
        let (got_w, got_h) = (up.w, up.h);
        let mismatch = ExportError::UpscaleMismatch {
            expected_w,
            expected_h,
            got_w,
            got_h,
        };
        if (got_w, got_h) == (rect.image().w, rect.image().h) {
            // Models that are not installed return the input unchanged.
            debug!("MapExporter::upscale upscaler returned the input size, keeping it");
            return Ok(rect);
        }
        if (got_w, got_h) != (expected_w, expected_h) {
            return Err(mismatch);
        }
        rect.with_image(up).ok_or(mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poster::Orientation;

    fn checker(w: usize, h: usize, cell: usize) -> ImageRgba8 {
        ImageRgba8::from_fn(w, h, |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                [40, 40, 40, 255]
            } else {
                [210, 210, 210, 255]
            }
        })
    }

    fn clicks() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(20.0, 0.0),
            Point::new(0.0, 20.0),
        ]
    }

    #[test]
    fn vtt_export_returns_snapped_image() {
        let img = checker(200, 100, 20);
        let export = MapExporter::new(ExportParams::default())
            .export(&img, &clicks(), &ExportMode::Vtt)
            .unwrap();
        match export.output {
            ExportOutput::Vtt(rect) => {
                assert_eq!((rect.cols(), rect.rows()), (10, 5));
                assert_eq!(rect.image(), &img);
            }
            other => panic!("unexpected output {other:?}"),
        }
        assert!(export.report.plan.is_none());
        // 20px per 25.4mm cell.
        assert!((export.report.pixels_per_mm - 20.0 / 25.4).abs() < 1e-5);
    }

    #[test]
    fn snapped_map_exports_without_clicks() {
        let img = checker(200, 100, 20);
        let exporter = MapExporter::new(ExportParams::default());
        let export = exporter
            .export_snapped(&img, 10, 5, &ExportMode::Vtt)
            .unwrap();
        match &export.output {
            ExportOutput::Vtt(rect) => {
                assert!(!rect.resampled());
                assert_eq!(rect.image(), &img);
            }
            other => panic!("unexpected output {other:?}"),
        }
        assert_eq!(export.report.calibration.residual, 0.0);

        // 20.5px cells are resampled to whole pixels.
        let ragged = checker(205, 100, 20);
        let export = exporter
            .export_snapped(&ragged, 10, 5, &ExportMode::Vtt)
            .unwrap();
        assert_eq!((export.report.snap.width, export.report.snap.height), (200, 100));

        let err = exporter
            .export_snapped(&img, 0, 5, &ExportMode::Vtt)
            .unwrap_err();
        assert!(matches!(err, ExportError::Snap(SnapError::EmptyGrid { .. })));
    }

    #[test]
    fn print_export_with_upscale() {
        let img = checker(200, 100, 20);
        let params = ExportParams {
            upscale_factor: 2,
            pixels_per_mm: Some(1.0),
            ..Default::default()
        };
        let mode = ExportMode::Print {
            page: PageSpec {
                width_mm: 200.0,
                height_mm: 200.0,
                margin_mm: 0.0,
                overlap_mm: 0.0,
                orientation: Orientation::Portrait,
            },
            layout: LayoutMode::Tiled,
        };
        let export = MapExporter::new(params)
            .with_upscaler(Box::new(NearestUpscale))
            .export(&img, &clicks(), &mode)
            .unwrap();
        let plan = export.report.plan.as_ref().unwrap();
        assert_eq!((plan.image_width, plan.image_height), (400, 200));
        assert_eq!((plan.cols, plan.rows), (2, 1));
        match export.output {
            ExportOutput::Pages { pages, .. } => {
                assert_eq!(pages.len(), 2);
                assert_eq!(pages[1].label, "R1C2");
            }
            other => panic!("unexpected output {other:?}"),
        }
        assert!(export.report.timing.stage_ms("upscale").is_some());
    }

    #[test]
    fn exact_mode_prints_one_unscaled_page() {
        let img = checker(200, 100, 20);
        let export = MapExporter::new(ExportParams::default())
            .export(&img, &clicks(), &ExportMode::Exact { margin_mm: 5.0 })
            .unwrap();
        match export.output {
            ExportOutput::Pages { pages, page } => {
                assert_eq!(pages.len(), 1);
                assert_eq!(pages[0].image, img);
                assert_eq!(page.orientation, Orientation::Landscape);
            }
            other => panic!("unexpected output {other:?}"),
        }
    }

    struct Shrinker;
    impl SuperResolution for Shrinker {
        fn enhance(&self, image: &ImageRgba8, _scale: u32) -> Result<ImageRgba8, ExportError> {
            Ok(ImageRgba8::new(image.w / 2, image.h / 2))
        }
    }

    #[test]
    fn wrong_upscaler_output_is_an_error() {
        let params = ExportParams {
            upscale_factor: 2,
            ..Default::default()
        };
        let err = MapExporter::new(params)
            .with_upscaler(Box::new(Shrinker))
            .export(&checker(200, 100, 20), &clicks(), &ExportMode::Vtt)
            .unwrap_err();
        assert!(matches!(
            err,
            ExportError::UpscaleMismatch {
                expected_w: 400,
                got_w: 100,
                ..
            }
        ));
    }

    #[test]
    fn calibration_errors_propagate() {
        let err = MapExporter::new(ExportParams::default())
            .export(&checker(200, 100, 20), &clicks()[..2], &ExportMode::Vtt)
            .unwrap_err();
        assert!(matches!(err, ExportError::Calibration(_)));
    }

    #[test]
    fn mode_deserializes_from_tagged_json() {
        let mode: ExportMode =
            serde_json::from_str(r#"{"kind":"print","layout":"single_sheet"}"#).unwrap();
        assert_eq!(
            mode,
            ExportMode::Print {
                page: PageSpec::default(),
                layout: LayoutMode::SingleSheet
            }
        );
        let vtt: ExportMode = serde_json::from_str(r#"{"kind":"vtt"}"#).unwrap();
        assert_eq!(vtt, ExportMode::Vtt);
    }
}
