//! Parallelogram lattice describing a map's square grid in image space.
use crate::angle::{angle_between_deg, cross, heading};
use crate::homography::{
    affine_from_basis, apply_homography_point, rescale_homography_image_space,
};
use crate::types::{Point, Vector};
use nalgebra::Matrix3;
use serde::Serialize;

/// Smallest accepted `|u × v|` in square pixels.
pub const MIN_CELL_AREA: f32 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, thiserror::Error)]
pub enum GridModelError {
    #[error("grid needs at least one cell per axis (cols={cols}, rows={rows})")]
    EmptySize { cols: u32, rows: u32 },
    #[error("cell edges are nearly parallel (|u × v| = {area:.3} px²)")]
    DegenerateBasis { area: f32 },
    #[error("grid geometry contains non-finite values")]
    NonFinite,
}

/// Regular lattice of `cols × rows` cells.
///
/// Cell `(i, j)` spans the parallelogram with corners
/// `origin + i·u + j·v` and `origin + (i+1)·u + (j+1)·v`. `u` runs along the
/// map's width, `v` along its height; they need not be perpendicular.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct GridModel {
    origin: Point,
    u: Vector,
    v: Vector,
    cols: u32,
    rows: u32,
}

impl GridModel {
    pub fn new(
        origin: Point,
        u: Vector,
        v: Vector,
        cols: u32,
        rows: u32,
    ) -> Result<Self, GridModelError> {
        let finite = [origin.x, origin.y, u.x, u.y, v.x, v.y]
            .iter()
            .all(|c| c.is_finite());
        if !finite {
            return Err(GridModelError::NonFinite);
        }
        if cols == 0 || rows == 0 {
            return Err(GridModelError::EmptySize { cols, rows });
        }
        let area = cross(&u, &v).abs();
        if area < MIN_CELL_AREA {
            return Err(GridModelError::DegenerateBasis { area });
        }
        Ok(Self {
            origin,
            u,
            v,
            cols,
            rows,
        })
    }

    /// Axis-aligned grid of square `cell_px` cells anchored at `(0, 0)`.
    pub fn identity(cell_px: u32, cols: u32, rows: u32) -> Result<Self, GridModelError> {
        let s = cell_px as f32;
        Self::new(
            Point::origin(),
            Vector::new(s, 0.0),
            Vector::new(0.0, s),
            cols,
            rows,
        )
    }

    #[inline]
    pub fn origin(&self) -> Point {
        self.origin
    }
    #[inline]
    pub fn u(&self) -> Vector {
        self.u
    }
    #[inline]
    pub fn v(&self) -> Vector {
        self.v
    }
    #[inline]
    pub fn cols(&self) -> u32 {
        self.cols
    }
    #[inline]
    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cell_count(&self) -> u64 {
        self.cols as u64 * self.rows as u64
    }

    /// Same lattice restricted to `cols × rows` cells from the same origin.
    pub fn with_size(&self, cols: u32, rows: u32) -> Result<Self, GridModelError> {
        Self::new(self.origin, self.u, self.v, cols, rows)
    }

    /// Same lattice re-anchored at vertex `(i, j)`.
    pub fn shifted(&self, i: i32, j: i32) -> Self {
        Self {
            origin: self.vertex(i as f32, j as f32),
            ..*self
        }
    }

    #[inline]
    pub fn cell_area(&self) -> f32 {
        cross(&self.u, &self.v).abs()
    }

    /// Mean edge length of one cell in pixels.
    #[inline]
    pub fn cell_size(&self) -> f32 {
        0.5 * (self.u.norm() + self.v.norm())
    }

    /// Angle between `u` and `v` in degrees (90 for an unsheared grid).
    pub fn axis_angle_deg(&self) -> f32 {
        angle_between_deg(&self.u, &self.v)
    }

    /// Direction of `u` in degrees, clockwise from the image x axis.
    pub fn rotation_deg(&self) -> f32 {
        heading(&self.u).to_degrees()
    }

    /// Lattice vertex at (fractional) grid coordinate `(a, b)`.
    #[inline]
    pub fn vertex(&self, a: f32, b: f32) -> Point {
        self.origin + self.u * a + self.v * b
    }

    /// Outer corners of the full lattice: top-left, top-right, bottom-right,
    /// bottom-left (in grid terms).
    pub fn corners(&self) -> [Point; 4] {
        let (c, r) = (self.cols as f32, self.rows as f32);
        [
            self.vertex(0.0, 0.0),
            self.vertex(c, 0.0),
            self.vertex(c, r),
            self.vertex(0.0, r),
        ]
    }

    /// `u` points right and `v` points down, each off-axis by at most `tol_px`.
    pub fn is_axis_aligned(&self, tol_px: f32) -> bool {
        self.u.y.abs() <= tol_px && self.v.x.abs() <= tol_px && self.u.x > 0.0 && self.v.y > 0.0
    }

    pub fn grid_to_image(&self) -> Matrix3<f32> {
        affine_from_basis(&self.origin, &self.u, &self.v)
    }

    pub fn image_to_grid(&self) -> Option<Matrix3<f32>> {
        self.grid_to_image().try_inverse()
    }

    /// Grid coordinate of an image point.
    pub fn to_grid(&self, p: &Point) -> Option<Point> {
        apply_homography_point(&self.image_to_grid()?, p)
    }

    /// The lattice as seen in the same image resampled from `src` to `dst`
    /// pixel dimensions (e.g. after a super-resolution pass).
    pub fn rescaled(
        &self,
        src: (usize, usize),
        dst: (usize, usize),
    ) -> Result<Self, GridModelError> {
        let h = rescale_homography_image_space(&self.grid_to_image(), src.0, src.1, dst.0, dst.1);
        Self::new(
            Point::new(h[(0, 2)], h[(1, 2)]),
            Vector::new(h[(0, 0)], h[(1, 0)]),
            Vector::new(h[(0, 1)], h[(1, 1)]),
            self.cols,
            self.rows,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn rejects_parallel_edges() {
        let err = GridModel::new(
            Point::origin(),
            Vector::new(10.0, 0.0),
            Vector::new(20.0, 0.0),
            3,
            3,
        )
        .unwrap_err();
        assert!(matches!(err, GridModelError::DegenerateBasis { .. }));
    }

    #[test]
    fn rejects_zero_cells() {
        let err = GridModel::identity(10, 0, 4).unwrap_err();
        assert_eq!(err, GridModelError::EmptySize { cols: 0, rows: 4 });
    }

    #[test]
    fn rejects_non_finite_origin() {
        let err = GridModel::new(
            Point::new(f32::NAN, 0.0),
            Vector::new(10.0, 0.0),
            Vector::new(0.0, 10.0),
            1,
            1,
        )
        .unwrap_err();
        assert_eq!(err, GridModelError::NonFinite);
    }

    #[test]
    fn corners_and_round_trip() {
        let g = GridModel::new(
            Point::new(5.0, 7.0),
            Vector::new(10.0, 2.0),
            Vector::new(-1.0, 12.0),
            4,
            3,
        )
        .unwrap();
        let [tl, tr, br, bl] = g.corners();
        assert_eq!(tl, Point::new(5.0, 7.0));
        assert!(approx(tr.x, 45.0) && approx(tr.y, 15.0));
        assert!(approx(br.x, 42.0) && approx(br.y, 51.0));
        assert!(approx(bl.x, 2.0) && approx(bl.y, 43.0));

        let q = g.to_grid(&g.vertex(2.5, 1.25)).unwrap();
        assert!(approx(q.x, 2.5) && approx(q.y, 1.25));
    }

    #[test]
    fn rescaled_grid_tracks_upscaled_image() {
        let g = GridModel::identity(16, 5, 4).unwrap();
        let up = g.rescaled((80, 64), (160, 128)).unwrap();
        assert_eq!(up.u(), Vector::new(32.0, 0.0));
        assert_eq!(up.v(), Vector::new(0.0, 32.0));
        assert_eq!((up.cols(), up.rows()), (5, 4));
    }

    #[test]
    fn shifted_moves_origin_by_whole_cells() {
        let g = GridModel::identity(10, 2, 2).unwrap();
        assert_eq!(g.shifted(-1, 3).origin(), Point::new(-10.0, 30.0));
    }

    #[test]
    fn axis_metrics() {
        let g = GridModel::identity(20, 1, 1).unwrap();
        assert!(g.is_axis_aligned(1e-3));
        assert!(approx(g.axis_angle_deg(), 90.0));
        assert!(approx(g.rotation_deg(), 0.0));
        assert!(approx(g.cell_area(), 400.0));
        assert!(approx(g.cell_size(), 20.0));
    }
}
