use grid_poster::image::ImageRgba8;
use grid_poster::types::{Point, Vector};

pub const DARK: [u8; 4] = [32, 32, 32, 255];
pub const LIGHT: [u8; 4] = [220, 220, 220, 255];

/// Axis-aligned checkerboard whose first full cell starts at `(ox, oy)`.
pub fn checkerboard_rgba(width: usize, height: usize, cell: usize, ox: usize, oy: usize) -> ImageRgba8 {
    assert!(width > 0 && height > 0, "image dimensions must be positive");
    assert!(cell > 0, "cell size must be positive");
    lattice_checkerboard(
        width,
        height,
        Point::new(ox as f32, oy as f32),
        Vector::new(cell as f32, 0.0),
        Vector::new(0.0, cell as f32),
    )
}

/// Checkerboard over an arbitrary lattice. Pixel `(x, y)` is coloured by the
/// parity of the lattice cell containing its centre `(x + 0.5, y + 0.5)`.
pub fn lattice_checkerboard(width: usize, height: usize, origin: Point, u: Vector, v: Vector) -> ImageRgba8 {
    let det = u.x * v.y - u.y * v.x;
    assert!(det.abs() > 1e-6, "lattice basis must be non-degenerate");
    ImageRgba8::from_fn(width, height, |x, y| {
        let dx = x as f32 + 0.5 - origin.x;
        let dy = y as f32 + 0.5 - origin.y;
        let a = (dx * v.y - dy * v.x) / det;
        let b = (dy * u.x - dx * u.y) / det;
        let parity = (a.floor() as i64 + b.floor() as i64).rem_euclid(2);
        if parity == 0 {
            DARK
        } else {
            LIGHT
        }
    })
}

/// Lattice of `angle_deg` rotation with square cells of `cell` pixels.
pub fn rotated_basis(cell: f32, angle_deg: f32) -> (Vector, Vector) {
    let (s, c) = angle_deg.to_radians().sin_cos();
    (Vector::new(cell * c, cell * s), Vector::new(-cell * s, cell * c))
}
