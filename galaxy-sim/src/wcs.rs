//! Local world coordinate system: a constant 2x2 Jacobian.
//!
//! `world = J * pixel_offset`, with `J = pixel_scale * S(g)` for the common
//! case of a uniform scale plus a shear distortion. Pixel offsets are measured
//! from the image's reference point (the true center unless offset).

use nalgebra::{Matrix2, Vector2};
use profile_math::affine::{is_singular, rotation_matrix, singular_values};
use serde::Serialize;

use crate::angle::Angle;
use crate::error::{require_positive, Result, SimError};
use crate::shear::{polar_decompose, Shear};

/// Pixel-to-world Jacobian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldTransform {
    jacobian: Matrix2<f64>,
    inverse: Matrix2<f64>,
}

/// Jacobian split into `J = scale * R(rotation) * S(shear) * F`, where `F`
/// mirrors the x axis when `flip` is set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JacobianDecomposition {
    pub scale: f64,
    pub shear: Shear,
    pub rotation: Angle,
    pub flip: bool,
}

/// Astrometric summary handed to output writers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AstrometricMetadata {
    /// `[[CD1_1, CD1_2], [CD2_1, CD2_2]]` in world units per pixel.
    pub cd_matrix: [[f64; 2]; 2],
    pub pixel_area: f64,
    /// Square root of the pixel area.
    pub linear_scale: f64,
    pub shear_g1: f64,
    pub shear_g2: f64,
    /// Rotation in radians.
    pub rotation: f64,
    pub flip: bool,
}

impl WorldTransform {
    /// Build from an explicit Jacobian.
    ///
    /// # Errors
    /// [`SimError::SingularTransform`] if the determinant is zero within
    /// tolerance relative to the matrix norm.
    pub fn from_jacobian(jacobian: Matrix2<f64>) -> Result<Self> {
        if jacobian.iter().any(|v| !v.is_finite()) || is_singular(&jacobian) {
            return Err(SimError::SingularTransform {
                determinant: jacobian.determinant(),
            });
        }
        let inverse = jacobian
            .try_inverse()
            .ok_or(SimError::SingularTransform {
                determinant: jacobian.determinant(),
            })?;
        Ok(Self { jacobian, inverse })
    }

    /// Square pixels of side `pixel_scale`.
    pub fn from_pixel_scale(pixel_scale: f64) -> Result<Self> {
        let scale = require_positive("pixel_scale", pixel_scale)?;
        Self::from_jacobian(Matrix2::identity() * scale)
    }

    /// `J = pixel_scale * S(shear)`.
    pub fn from_pixel_scale_and_shear(pixel_scale: f64, shear: &Shear) -> Result<Self> {
        let scale = require_positive("pixel_scale", pixel_scale)?;
        Self::from_jacobian(shear.matrix() * scale)
    }

    pub fn jacobian(&self) -> &Matrix2<f64> {
        &self.jacobian
    }

    pub fn inverse_jacobian(&self) -> &Matrix2<f64> {
        &self.inverse
    }

    /// World offset of a pixel offset.
    pub fn to_world(&self, px: f64, py: f64) -> (f64, f64) {
        let w = self.jacobian * Vector2::new(px, py);
        (w.x, w.y)
    }

    /// Pixel offset of a world offset.
    pub fn to_pixel(&self, wx: f64, wy: f64) -> (f64, f64) {
        let p = self.inverse * Vector2::new(wx, wy);
        (p.x, p.y)
    }

    /// World area covered by one pixel.
    pub fn pixel_area(&self) -> f64 {
        self.jacobian.determinant().abs()
    }

    /// Smallest and largest world length of a unit pixel step.
    pub fn scale_range(&self) -> (f64, f64) {
        singular_values(&self.jacobian)
    }

    pub fn decompose(&self) -> Result<JacobianDecomposition> {
        let det = self.jacobian.determinant();
        let flip = det < 0.0;
        let scale = det.abs().sqrt();
        let mut unit = self.jacobian / scale;
        if flip {
            // Undo the x mirror: J F with F = diag(-1, 1)
            let mirrored = -unit.column(0);
            unit.set_column(0, &mirrored);
        }
        let (shear, rotation) = polar_decompose(&unit)?;
        Ok(JacobianDecomposition {
            scale,
            shear,
            rotation,
            flip,
        })
    }

    pub fn metadata(&self) -> Result<AstrometricMetadata> {
        let parts = self.decompose()?;
        let j = &self.jacobian;
        Ok(AstrometricMetadata {
            cd_matrix: [[j[(0, 0)], j[(0, 1)]], [j[(1, 0)], j[(1, 1)]]],
            pixel_area: self.pixel_area(),
            linear_scale: parts.scale,
            shear_g1: parts.shear.g1(),
            shear_g2: parts.shear.g2(),
            rotation: parts.rotation.radians(),
            flip: parts.flip,
        })
    }
}

impl JacobianDecomposition {
    /// Rebuild the Jacobian.
    pub fn jacobian(&self) -> Matrix2<f64> {
        let mut m = rotation_matrix(self.rotation.radians()) * self.shear.matrix() * self.scale;
        if self.flip {
            let mirrored = -m.column(0);
            m.set_column(0, &mirrored);
        }
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_round_trip() {
        let shear = Shear::from_g1g2(0.1, -0.2).unwrap();
        let wcs = WorldTransform::from_pixel_scale_and_shear(0.26, &shear).unwrap();
        let (wx, wy) = wcs.to_world(3.5, -7.25);
        let (px, py) = wcs.to_pixel(wx, wy);
        assert_relative_eq!(px, 3.5, epsilon = 1e-12);
        assert_relative_eq!(py, -7.25, epsilon = 1e-12);
    }

    #[test]
    fn test_pixel_area_is_scale_squared_under_shear() {
        let shear = Shear::from_q_beta(0.3, Angle::from_degrees(20.0)).unwrap();
        let wcs = WorldTransform::from_pixel_scale_and_shear(0.2, &shear).unwrap();
        assert_relative_eq!(wcs.pixel_area(), 0.04, max_relative = 1e-12);
    }

    #[test]
    fn test_scale_range_under_shear() {
        let shear = Shear::from_q_beta(0.3, Angle::from_degrees(20.0)).unwrap();
        let wcs = WorldTransform::from_pixel_scale_and_shear(0.2, &shear).unwrap();
        let (smallest, largest) = wcs.scale_range();
        assert_relative_eq!(smallest, 0.2 * 0.3f64.sqrt(), max_relative = 1e-12);
        assert_relative_eq!(largest, 0.2 / 0.3f64.sqrt(), max_relative = 1e-12);

        let square = WorldTransform::from_pixel_scale(0.25).unwrap();
        let (lo, hi) = square.scale_range();
        assert_relative_eq!(lo, 0.25, max_relative = 1e-12);
        assert_relative_eq!(hi, 0.25, max_relative = 1e-12);
    }

    #[test]
    fn test_singular_jacobian() {
        let err = WorldTransform::from_jacobian(Matrix2::new(0.2, 0.4, 0.1, 0.2)).unwrap_err();
        assert!(matches!(err, SimError::SingularTransform { .. }));
        assert!(WorldTransform::from_jacobian(Matrix2::zeros()).is_err());
        assert!(WorldTransform::from_jacobian(Matrix2::new(f64::NAN, 0.0, 0.0, 1.0)).is_err());
    }

    #[test]
    fn test_zero_area_shear_rejected() {
        // g1^2 + g2^2 = 1 has no valid shear matrix at all
        assert!(Shear::from_g1g2(0.6, 0.8).is_err());
        assert!(WorldTransform::from_pixel_scale(0.0).is_err());
    }

    #[test]
    fn test_decompose_recovers_parts() {
        let shear = Shear::from_g1g2(0.15, 0.05).unwrap();
        let jac = rotation_matrix(0.3) * shear.matrix() * 0.25;
        let wcs = WorldTransform::from_jacobian(jac).unwrap();
        let parts = wcs.decompose().unwrap();

        assert_relative_eq!(parts.scale, 0.25, max_relative = 1e-12);
        assert_relative_eq!(parts.rotation.radians(), 0.3, epsilon = 1e-12);
        assert_relative_eq!(parts.shear.g1(), 0.15, epsilon = 1e-12);
        assert_relative_eq!(parts.shear.g2(), 0.05, epsilon = 1e-12);
        assert!(!parts.flip);
        assert_relative_eq!(parts.jacobian(), jac, epsilon = 1e-12);
    }

    #[test]
    fn test_decompose_flipped() {
        let jac = Matrix2::new(-0.2, 0.0, 0.0, 0.2);
        let parts = WorldTransform::from_jacobian(jac).unwrap().decompose().unwrap();
        assert!(parts.flip);
        assert_relative_eq!(parts.scale, 0.2, max_relative = 1e-12);
        assert_relative_eq!(parts.jacobian(), jac, epsilon = 1e-12);
    }

    #[test]
    fn test_metadata_serializes() {
        let wcs = WorldTransform::from_pixel_scale(0.2).unwrap();
        let meta = wcs.metadata().unwrap();
        assert_relative_eq!(meta.cd_matrix[0][0], 0.2);
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["flip"], false);
        assert!(json["pixel_area"].as_f64().unwrap() > 0.039);
    }
}
