//! Angle and orientation helpers for lattice edge vectors.

use crate::types::Vector;

/// Computes the unsigned angle between two 2D vectors in radians.
/// Returns a value in [0, π]. Zero if the vectors are parallel
/// and pointing in the same direction; π if they are opposite.
#[inline]
pub fn angle_between(a: &Vector, b: &Vector) -> f32 {
    let na = a.norm().max(1e-6);
    let nb = b.norm().max(1e-6);
    (a.dot(b) / (na * nb)).clamp(-1.0, 1.0).acos()
}

/// Same as [`angle_between`] but in degrees.
#[inline]
pub fn angle_between_deg(a: &Vector, b: &Vector) -> f32 {
    angle_between(a, b).to_degrees()
}

/// Signed z-component of `a × b`.
///
/// In y-down image coordinates a positive value means `b` is rotated
/// clockwise from `a` on screen, which is the orientation of an unmirrored
/// `(width, height)` axis pair.
#[inline]
pub fn cross(a: &Vector, b: &Vector) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Direction of `v` measured from the +x axis, normalized into [0, 2π).
#[inline]
pub fn heading(v: &Vector) -> f32 {
    v.y.atan2(v.x).rem_euclid(std::f32::consts::TAU)
}
