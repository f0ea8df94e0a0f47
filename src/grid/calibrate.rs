//! Three-click grid calibration.
//!
//! The caller clicks the top-left corners of three neighbouring squares:
//!
//! 1. `p0` – the reference square,
//! 2. `p1` – its neighbour one step along the map's width,
//! 3. `p2` – its neighbour one step along the map's height
//!    ([`ThirdPoint::Orthogonal`]) or the square diagonally across from the
//!    reference ([`ThirdPoint::Diagonal`]).
//!
//! The width axis is always `p1 - p0`. When the clicks describe a mirrored
//! lattice (`u × v < 0` in y-down image space) the width axis is reversed,
//! which leaves the set of lattice lines unchanged but keeps the rectified
//! output unmirrored; [`Calibration::u_flipped`] reports this.
//!
//! Each edge vector is taken as exactly one cell step. The grid origin is the
//! lattice vertex nearest the image's top-left corner from the inside, and the
//! cell counts come from projecting the image width and height onto the two
//! lattice axes.
use super::model::{GridModel, GridModelError, MIN_CELL_AREA};
use crate::angle::{angle_between_deg, cross};
use crate::types::{Point, Vector};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Grid coordinates closer than this to a whole cell count as on the vertex.
const VERTEX_SNAP_CELLS: f32 = 1e-3;

/// How the third click relates to the reference square.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThirdPoint {
    /// Neighbour one step along the height axis: `v = p2 - p0`.
    #[default]
    Orthogonal,
    /// Diagonal neighbour: `p2 = p0 + u + v`, so `v = p2 - p1`.
    Diagonal,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationParams {
    /// Smallest accepted angle between the two cell edges (degrees).
    pub min_angle_deg: f32,
    /// Largest accepted angle between the two cell edges (degrees).
    pub max_angle_deg: f32,
    /// Smallest plausible cell edge in pixels. `None` derives it from the
    /// image resolution.
    pub min_cell_px: Option<f32>,
    /// Largest plausible cell edge in pixels. `None` uses the shorter image side.
    pub max_cell_px: Option<f32>,
    /// Largest accepted ratio between the two edge lengths.
    pub max_edge_ratio: f32,
    /// Residual (fraction of a cell) above which the caller should warn.
    pub residual_tolerance: f32,
    /// Clicks closer than this (pixels) count as the same point.
    pub min_point_separation_px: f32,
    pub third_point: ThirdPoint,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            min_angle_deg: 20.0,
            max_angle_deg: 160.0,
            min_cell_px: None,
            max_cell_px: None,
            max_edge_ratio: 1.5,
            residual_tolerance: 0.08,
            min_point_separation_px: 0.5,
            third_point: ThirdPoint::Orthogonal,
        }
    }
}

impl CalibrationParams {
    /// Resolved `(min, max)` cell edge bounds for a `w × h` image.
    pub fn cell_bounds(&self, width: usize, height: usize) -> (f32, f32) {
        let short_side = width.min(height) as f32;
        let min_px = self
            .min_cell_px
            .unwrap_or_else(|| (short_side / 512.0).max(4.0));
        let max_px = self.max_cell_px.unwrap_or(short_side);
        (min_px, max_px)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, thiserror::Error)]
pub enum CalibrationError {
    #[error("need three distinct points, got {distinct} of {supplied}")]
    InsufficientPoints { supplied: usize, distinct: usize },
    #[error("cell edges are degenerate (angle {angle_deg:.1}°, area {area:.2} px²)")]
    DegenerateGeometry { angle_deg: f32, area: f32 },
    #[error(
        "implausible cell size (u={u_px:.2}px, v={v_px:.2}px, allowed {min_px:.1}..{max_px:.1}px, ratio ≤{max_ratio:.2})"
    )]
    ImplausibleScale {
        u_px: f32,
        v_px: f32,
        min_px: f32,
        max_px: f32,
        max_ratio: f32,
    },
}

/// Outcome of a successful calibration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Calibration {
    pub grid: GridModel,
    /// Largest fractional deviation (in cells) between the projected image
    /// extents and the nearest whole number of cells.
    pub residual: f32,
    /// Tolerance the residual was checked against.
    pub tolerance: f32,
    /// The width axis was reversed to avoid a mirrored lattice.
    pub u_flipped: bool,
}

impl Calibration {
    pub fn exceeds_tolerance(&self) -> bool {
        self.residual > self.tolerance
    }
}

#[derive(Clone, Debug, Default)]
pub struct GridCalibrator {
    params: CalibrationParams,
}

impl GridCalibrator {
    pub fn new(params: CalibrationParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &CalibrationParams {
        &self.params
    }

    /// Convenience wrapper for exactly three clicks.
    pub fn calibrate_points(
        &self,
        p0: Point,
        p1: Point,
        p2: Point,
        image_width: usize,
        image_height: usize,
    ) -> Result<Calibration, CalibrationError> {
        self.calibrate(&[p0, p1, p2], image_width, image_height)
    }

    /// Infer the lattice from the first three clicks in `points`.
    pub fn calibrate(
        &self,
        points: &[Point],
        image_width: usize,
        image_height: usize,
    ) -> Result<Calibration, CalibrationError> {
        let [p0, p1, p2] = self.select_points(points)?;
        if points.len() > 3 {
            debug!(
                "GridCalibrator::calibrate ignoring {} extra points",
                points.len() - 3
            );
        }

        let mut u = p1 - p0;
        let v = match self.params.third_point {
            ThirdPoint::Orthogonal => p2 - p0,
            ThirdPoint::Diagonal => p2 - p1,
        };

        let angle_deg = angle_between_deg(&u, &v);
        let area = cross(&u, &v).abs();
        if !(self.params.min_angle_deg..=self.params.max_angle_deg).contains(&angle_deg)
            || area < MIN_CELL_AREA
        {
            return Err(CalibrationError::DegenerateGeometry { angle_deg, area });
        }

        self.check_scale(&u, &v, image_width, image_height)?;

        let u_flipped = cross(&u, &v) < 0.0;
        if u_flipped {
            u = -u;
        }

        let basis = GridModel::new(p0, u, v, 1, 1).map_err(|e| degenerate(e, angle_deg))?;
        let (w, h) = (image_width as f32, image_height as f32);

        // Vertex nearest the top-left image corner from the inside.
        let tl = basis
            .to_grid(&Point::origin())
            .ok_or(CalibrationError::DegenerateGeometry { angle_deg, area })?;
        let i0 = (tl.x - VERTEX_SNAP_CELLS).ceil() as i32;
        let j0 = (tl.y - VERTEX_SNAP_CELLS).ceil() as i32;

        let cols_exact = (w * u.x / u.norm()).abs() / u.norm();
        let rows_exact = (h * v.y / v.norm()).abs() / v.norm();
        let cols = cols_exact.round().max(1.0);
        let rows = rows_exact.round().max(1.0);
        let residual = (cols_exact - cols_exact.round())
            .abs()
            .max((rows_exact - rows_exact.round()).abs());

        let grid = basis
            .shifted(i0, j0)
            .with_size(cols as u32, rows as u32)
            .map_err(|e| degenerate(e, angle_deg))?;

        let calibration = Calibration {
            grid,
            residual,
            tolerance: self.params.residual_tolerance,
            u_flipped,
        };
        debug!(
            "GridCalibrator::calibrate origin=({:.2},{:.2}) u=({:.2},{:.2}) v=({:.2},{:.2}) {}x{} residual={:.3} angle={:.1}°",
            grid.origin().x,
            grid.origin().y,
            u.x,
            u.y,
            v.x,
            v.y,
            grid.cols(),
            grid.rows(),
            residual,
            angle_deg
        );
        if calibration.exceeds_tolerance() {
            warn!(
                "grid residual {:.3} cells exceeds tolerance {:.3}; check the clicked points",
                residual, self.params.residual_tolerance
            );
        }
        Ok(calibration)
    }

    fn select_points(&self, points: &[Point]) -> Result<[Point; 3], CalibrationError> {
        let supplied = points.len();
        let head: Vec<Point> = points
            .iter()
            .take(3)
            .copied()
            .filter(|p| p.x.is_finite() && p.y.is_finite())
            .collect();

        let min_sep = self.params.min_point_separation_px.max(0.0);
        let mut distinct: Vec<Point> = Vec::with_capacity(3);
        for p in &head {
            if distinct.iter().all(|q| (p - q).norm() >= min_sep) {
                distinct.push(*p);
            }
        }
        if head.len() < 3 || distinct.len() < 3 {
            return Err(CalibrationError::InsufficientPoints {
                supplied,
                distinct: distinct.len(),
            });
        }
        Ok([head[0], head[1], head[2]])
    }

    fn check_scale(
        &self,
        u: &Vector,
        v: &Vector,
        width: usize,
        height: usize,
    ) -> Result<(), CalibrationError> {
        let (min_px, max_px) = self.params.cell_bounds(width, height);
        let (u_px, v_px) = (u.norm(), v.norm());
        let ratio = u_px.max(v_px) / u_px.min(v_px).max(f32::EPSILON);
        let in_range = |len: f32| len >= min_px && len <= max_px;
        if !in_range(u_px) || !in_range(v_px) || ratio > self.params.max_edge_ratio {
            return Err(CalibrationError::ImplausibleScale {
                u_px,
                v_px,
                min_px,
                max_px,
                max_ratio: self.params.max_edge_ratio,
            });
        }
        Ok(())
    }
}

fn degenerate(err: GridModelError, angle_deg: f32) -> CalibrationError {
    let area = match err {
        GridModelError::DegenerateBasis { area } => area,
        _ => 0.0,
    };
    CalibrationError::DegenerateGeometry { angle_deg, area }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    fn calibrator() -> GridCalibrator {
        GridCalibrator::default()
    }

    #[test]
    fn axis_aligned_clicks_give_exact_grid() {
        let cal = calibrator()
            .calibrate_points(
                Point::new(10.0, 10.0),
                Point::new(60.0, 10.0),
                Point::new(10.0, 60.0),
                500,
                500,
            )
            .unwrap();
        let g = cal.grid;
        assert_eq!(g.u(), Vector::new(50.0, 0.0));
        assert_eq!(g.v(), Vector::new(0.0, 50.0));
        assert_eq!(g.origin(), Point::new(10.0, 10.0));
        assert_eq!((g.cols(), g.rows()), (10, 10));
        assert!(approx(cal.residual, 0.0));
        assert!(!cal.exceeds_tolerance());
        assert!(!cal.u_flipped);
    }

    #[test]
    fn interior_reference_square_moves_origin_to_first_full_cell() {
        let cal = calibrator()
            .calibrate_points(
                Point::new(210.0, 160.0),
                Point::new(260.0, 160.0),
                Point::new(210.0, 210.0),
                500,
                400,
            )
            .unwrap();
        assert_eq!(cal.grid.origin(), Point::new(10.0, 10.0));
        assert_eq!((cal.grid.cols(), cal.grid.rows()), (10, 8));
    }

    #[test]
    fn vertex_on_image_edge_is_kept() {
        let cal = calibrator()
            .calibrate_points(
                Point::new(100.0, 50.0),
                Point::new(150.0, 50.0),
                Point::new(100.0, 100.0),
                400,
                300,
            )
            .unwrap();
        assert_eq!(cal.grid.origin(), Point::new(0.0, 0.0));
    }

    #[test]
    fn near_collinear_step_is_rejected() {
        let err = calibrator()
            .calibrate_points(
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(100.0, 100.0),
                500,
                500,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            CalibrationError::DegenerateGeometry { .. } | CalibrationError::ImplausibleScale { .. }
        ));
    }

    #[test]
    fn narrow_angle_is_degenerate() {
        let err = calibrator()
            .calibrate_points(
                Point::new(0.0, 0.0),
                Point::new(50.0, 0.0),
                Point::new(50.0, 10.0),
                500,
                500,
            )
            .unwrap_err();
        match err {
            CalibrationError::DegenerateGeometry { angle_deg, .. } => {
                assert!(angle_deg < 20.0, "angle={angle_deg}")
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn duplicate_clicks_are_insufficient() {
        let p = Point::new(30.0, 30.0);
        let err = calibrator()
            .calibrate(&[p, p, Point::new(30.0, 80.0)], 500, 500)
            .unwrap_err();
        assert_eq!(
            err,
            CalibrationError::InsufficientPoints {
                supplied: 3,
                distinct: 2
            }
        );

        let err = calibrator().calibrate(&[p], 500, 500).unwrap_err();
        assert_eq!(
            err,
            CalibrationError::InsufficientPoints {
                supplied: 1,
                distinct: 1
            }
        );
    }

    #[test]
    fn oversized_cell_is_implausible() {
        let err = calibrator()
            .calibrate_points(
                Point::new(0.0, 0.0),
                Point::new(300.0, 0.0),
                Point::new(0.0, 300.0),
                200,
                200,
            )
            .unwrap_err();
        assert!(matches!(err, CalibrationError::ImplausibleScale { .. }));
    }

    #[test]
    fn mirrored_clicks_flip_width_axis() {
        let cal = calibrator()
            .calibrate_points(
                Point::new(60.0, 10.0),
                Point::new(10.0, 10.0),
                Point::new(60.0, 60.0),
                500,
                500,
            )
            .unwrap();
        assert!(cal.u_flipped);
        assert_eq!(cal.grid.u(), Vector::new(50.0, 0.0));
        assert_eq!(cal.grid.v(), Vector::new(0.0, 50.0));
        assert_eq!(cal.grid.origin(), Point::new(10.0, 10.0));
    }

    #[test]
    fn diagonal_third_point_convention() {
        let params = CalibrationParams {
            third_point: ThirdPoint::Diagonal,
            ..Default::default()
        };
        let cal = GridCalibrator::new(params)
            .calibrate_points(
                Point::new(10.0, 10.0),
                Point::new(60.0, 10.0),
                Point::new(60.0, 60.0),
                500,
                500,
            )
            .unwrap();
        assert_eq!(cal.grid.v(), Vector::new(0.0, 50.0));
        assert_eq!((cal.grid.cols(), cal.grid.rows()), (10, 10));
    }

    #[test]
    fn off_grid_image_size_reports_residual() {
        let cal = calibrator()
            .calibrate_points(
                Point::new(0.0, 0.0),
                Point::new(48.0, 0.0),
                Point::new(0.0, 48.0),
                500,
                480,
            )
            .unwrap();
        assert_eq!((cal.grid.cols(), cal.grid.rows()), (10, 10));
        assert!(approx(cal.residual, 500.0 / 48.0 - 10.0));
        assert!(cal.exceeds_tolerance());
    }

    #[test]
    fn rotated_clicks_produce_rotated_lattice() {
        let theta = 10f32.to_radians();
        let (s, c) = theta.sin_cos();
        let p0 = Point::new(100.0, 100.0);
        let u = Vector::new(40.0 * c, 40.0 * s);
        let v = Vector::new(-40.0 * s, 40.0 * c);
        let cal = calibrator()
            .calibrate_points(p0, p0 + u, p0 + v, 600, 400)
            .unwrap();
        assert!(approx(cal.grid.rotation_deg(), 10.0));
        assert!(approx(cal.grid.axis_angle_deg(), 90.0));
        assert!(cal.grid.cols() >= 1 && cal.grid.rows() >= 1);
        let o = cal.grid.origin();
        assert!(o.x >= -1e-3 && o.y >= -1e-3, "origin {o:?} outside image");
    }
}
