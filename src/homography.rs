//! 3×3 planar transforms between lattice coordinates and image pixels.
//!
//! A [`GridModel`](crate::grid::GridModel) is an affine lattice, so its
//! grid→image transform is a homography with last row `[0 0 1]`. The helpers
//! here stay projective so they also accept general homographies.
use crate::types::{Point, Vector};
use nalgebra::{Matrix3, Vector3};

const EPS: f32 = 1e-9;

/// Grid→image transform for a lattice with the given origin and edge vectors.
///
/// Grid coordinate `(a, b)` maps to `origin + a·u + b·v`.
pub fn affine_from_basis(origin: &Point, u: &Vector, v: &Vector) -> Matrix3<f32> {
    Matrix3::new(u.x, v.x, origin.x, u.y, v.y, origin.y, 0.0, 0.0, 1.0)
}

/// Rescale a transform whose output lives in a `src_w × src_h` image so that
/// it targets the same content resampled to `dst_w × dst_h`.
pub fn rescale_homography_image_space(
    h: &Matrix3<f32>,
    src_w: usize,
    src_h: usize,
    dst_w: usize,
    dst_h: usize,
) -> Matrix3<f32> {
    if src_w == 0 || src_h == 0 || dst_w == 0 || dst_h == 0 {
        return *h;
    }
    let sx = dst_w as f32 / src_w as f32;
    let sy = dst_h as f32 / src_h as f32;
    let scale = Matrix3::new(sx, 0.0, 0.0, 0.0, sy, 0.0, 0.0, 0.0, 1.0);
    scale * h
}

/// Map a single point, `None` when it lands on the line at infinity.
#[inline]
pub fn apply_homography_point(h: &Matrix3<f32>, p: &Point) -> Option<Point> {
    let v = h * Vector3::new(p.x, p.y, 1.0);
    let w = v[2];
    if !w.is_finite() || w.abs() <= EPS || !v[0].is_finite() || !v[1].is_finite() {
        return None;
    }
    Some(Point::new(v[0] / w, v[1] / w))
}

pub fn apply_homography_points(h: &Matrix3<f32>, pts: &[Point]) -> Option<Vec<Point>> {
    pts.iter().map(|p| apply_homography_point(h, p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affine_maps_unit_cell_corners() {
        let h = affine_from_basis(
            &Point::new(10.0, 20.0),
            &Vector::new(5.0, 1.0),
            &Vector::new(-1.0, 5.0),
        );
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(0.0, 1.0),
            Point::new(1.0, 1.0),
        ];
        let mapped = apply_homography_points(&h, &pts).unwrap();
        assert_eq!(mapped[0], Point::new(10.0, 20.0));
        assert_eq!(mapped[1], Point::new(15.0, 21.0));
        assert_eq!(mapped[2], Point::new(9.0, 25.0));
        assert_eq!(mapped[3], Point::new(14.0, 26.0));
    }

    #[test]
    fn rescale_doubles_image_coordinates() {
        let h = affine_from_basis(
            &Point::new(3.0, 4.0),
            &Vector::new(8.0, 0.0),
            &Vector::new(0.0, 8.0),
        );
        let scaled = rescale_homography_image_space(&h, 100, 50, 200, 100);
        let p = apply_homography_point(&scaled, &Point::new(1.0, 1.0)).unwrap();
        assert!((p.x - 22.0).abs() < 1e-5);
        assert!((p.y - 24.0).abs() < 1e-5);
    }

    #[test]
    fn point_at_infinity_is_rejected() {
        let h = Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0);
        assert!(apply_homography_point(&h, &Point::new(0.0, 3.0)).is_none());
    }
}
