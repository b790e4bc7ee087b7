//! 2D affine maps `p' = M p + t`.
//!
//! Profiles are placed in render coordinates by composing affine maps from
//! the leaves outward; shears, dilations, WCS Jacobians and sub-pixel offsets
//! all reduce to this one type.

use nalgebra::{Matrix2, Vector2};

/// Determinants with magnitude below this fraction of the squared matrix
/// norm are treated as singular.
pub const SINGULAR_RELATIVE_TOLERANCE: f64 = 1e-12;

/// Affine map from a source frame to a destination frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine2 {
    /// Linear part.
    pub matrix: Matrix2<f64>,
    /// Translation applied after the linear part.
    pub offset: Vector2<f64>,
}

impl Default for Affine2 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Affine2 {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix2::identity(),
            offset: Vector2::zeros(),
        }
    }

    pub fn new(matrix: Matrix2<f64>, offset: Vector2<f64>) -> Self {
        Self { matrix, offset }
    }

    pub fn linear(matrix: Matrix2<f64>) -> Self {
        Self {
            matrix,
            offset: Vector2::zeros(),
        }
    }

    pub fn translation(dx: f64, dy: f64) -> Self {
        Self {
            matrix: Matrix2::identity(),
            offset: Vector2::new(dx, dy),
        }
    }

    /// Map a point.
    pub fn apply(&self, point: Vector2<f64>) -> Vector2<f64> {
        self.matrix * point + self.offset
    }

    /// The map that applies `self` first and then `outer`.
    ///
    /// `outer.apply(self.apply(p)) == self.then(&outer).apply(p)`
    pub fn then(&self, outer: &Affine2) -> Affine2 {
        Affine2 {
            matrix: outer.matrix * self.matrix,
            offset: outer.matrix * self.offset + outer.offset,
        }
    }

    /// Same linear part with the translation dropped.
    pub fn without_offset(&self) -> Affine2 {
        Affine2::linear(self.matrix)
    }

    pub fn determinant(&self) -> f64 {
        self.matrix.determinant()
    }

    /// True when the linear part cannot be inverted reliably.
    pub fn is_singular(&self) -> bool {
        is_singular(&self.matrix)
    }

    /// Inverse map, or `None` if the linear part is singular.
    pub fn inverse(&self) -> Option<Affine2> {
        if self.is_singular() {
            return None;
        }
        let inv = self.matrix.try_inverse()?;
        Some(Affine2 {
            matrix: inv,
            offset: -(inv * self.offset),
        })
    }

    /// Smallest and largest singular values of the linear part.
    ///
    /// These bound how much the map can shrink or stretch a length.
    pub fn singular_values(&self) -> (f64, f64) {
        singular_values(&self.matrix)
    }
}

/// Relative singularity test for a 2x2 matrix.
pub fn is_singular(matrix: &Matrix2<f64>) -> bool {
    let det = matrix.determinant();
    let scale = matrix.norm_squared();
    !det.is_finite() || scale == 0.0 || det.abs() <= SINGULAR_RELATIVE_TOLERANCE * scale
}

/// Closed-form singular values `(min, max)` of a 2x2 matrix.
pub fn singular_values(m: &Matrix2<f64>) -> (f64, f64) {
    let (a, b, c, d) = (m[(0, 0)], m[(0, 1)], m[(1, 0)], m[(1, 1)]);
    let s1 = a * a + b * b + c * c + d * d;
    let det = a * d - b * c;
    let disc = (s1 * s1 - 4.0 * det * det).max(0.0).sqrt();
    let max = (0.5 * (s1 + disc)).sqrt();
    let min = (0.5 * (s1 - disc)).max(0.0).sqrt();
    (min, max)
}

/// Counter-clockwise rotation by `angle` radians.
pub fn rotation_matrix(angle: f64) -> Matrix2<f64> {
    let (sin_a, cos_a) = angle.sin_cos();
    Matrix2::new(cos_a, -sin_a, sin_a, cos_a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_then_matches_sequential_application() {
        let first = Affine2::new(Matrix2::new(1.2, 0.3, -0.1, 0.9), Vector2::new(0.5, -2.0));
        let second = Affine2::new(rotation_matrix(0.7), Vector2::new(3.0, 1.0));
        let p = Vector2::new(1.5, -0.25);

        let sequential = second.apply(first.apply(p));
        let composed = first.then(&second).apply(p);

        assert_relative_eq!(sequential, composed, epsilon = 1e-12);
    }

    #[test]
    fn test_inverse_round_trip() {
        let map = Affine2::new(Matrix2::new(0.2, 0.05, 0.01, 0.18), Vector2::new(10.0, -4.0));
        let inv = map.inverse().unwrap();
        let p = Vector2::new(3.0, 7.0);
        assert_relative_eq!(inv.apply(map.apply(p)), p, epsilon = 1e-10);
    }

    #[test]
    fn test_singular_matrix_has_no_inverse() {
        let map = Affine2::linear(Matrix2::new(1.0, 2.0, 2.0, 4.0));
        assert!(map.is_singular());
        assert!(map.inverse().is_none());
    }

    #[test]
    fn test_singular_values_of_rotation_and_scale() {
        let m = rotation_matrix(PI / 5.0) * Matrix2::new(3.0, 0.0, 0.0, 0.5);
        let (min, max) = singular_values(&m);
        assert_relative_eq!(min, 0.5, epsilon = 1e-12);
        assert_relative_eq!(max, 3.0, epsilon = 1e-12);
    }
}
