//! Area-preserving ellipticity transforms.
//!
//! A [`Shear`] is stored as reduced shear `g = g1 + i g2` with `|g| < 1`.
//! The equivalent encodings are:
//!
//! | encoding | magnitude |
//! |----------|-----------|
//! | reduced shear `g` | `(1 - q) / (1 + q)` |
//! | distortion `e` | `(1 - q²) / (1 + q²) = 2|g| / (1 + |g|²)` |
//! | conformal `η` | `ln(1 / q) = 2 atanh(|g|)` |
//!
//! All share the phase `2β`, where `β` is the position angle of the major
//! axis measured counter-clockwise from +x.
//!
//! The shear matrix
//!
//! ```text
//! S = 1/sqrt(1 - |g|²) [[1 + g1, g2], [g2, 1 - g1]]
//! ```
//!
//! has unit determinant and maps a circle onto an ellipse with axis ratio
//! `q`. Shearing twice multiplies matrices, so two shears compose to a shear
//! plus a rotation, never to the sum of their components.

use std::f64::consts::PI;

use nalgebra::Matrix2;
use profile_math::affine::rotation_matrix;

use crate::angle::Angle;
use crate::error::{require_finite, Result, SimError};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Shear {
    g1: f64,
    g2: f64,
}

impl Shear {
    /// No distortion.
    pub fn identity() -> Self {
        Shear::default()
    }

    /// From reduced shear components. Requires `g1² + g2² < 1`.
    pub fn from_g1g2(g1: f64, g2: f64) -> Result<Self> {
        require_finite("g1", g1)?;
        require_finite("g2", g2)?;
        let g_sq = g1 * g1 + g2 * g2;
        if g_sq >= 1.0 {
            return Err(SimError::invalid(
                "shear",
                format!("|g|^2 = {g_sq} must be < 1"),
            ));
        }
        Ok(Shear { g1, g2 })
    }

    /// From distortion components. Requires `e1² + e2² < 1`.
    pub fn from_e1e2(e1: f64, e2: f64) -> Result<Self> {
        require_finite("e1", e1)?;
        require_finite("e2", e2)?;
        let e = e1.hypot(e2);
        if e >= 1.0 {
            return Err(SimError::invalid(
                "distortion",
                format!("|e| = {e} must be < 1"),
            ));
        }
        if e == 0.0 {
            return Ok(Shear::identity());
        }
        let g = e / (1.0 + (1.0 - e * e).sqrt());
        Shear::from_g1g2(g * e1 / e, g * e2 / e)
    }

    /// From axis ratio `q ∈ (0, 1]` and major-axis position angle `beta`.
    pub fn from_q_beta(q: f64, beta: Angle) -> Result<Self> {
        if !(q > 0.0 && q <= 1.0) {
            return Err(SimError::invalid(
                "q",
                format!("axis ratio must lie in (0, 1], got {q}"),
            ));
        }
        require_finite("beta", beta.radians())?;
        let g = (1.0 - q) / (1.0 + q);
        let (sin_2b, cos_2b) = (2.0 * beta.radians()).sin_cos();
        Shear::from_g1g2(g * cos_2b, g * sin_2b)
    }

    /// From conformal shear components (any finite values).
    pub fn from_eta1eta2(eta1: f64, eta2: f64) -> Result<Self> {
        require_finite("eta1", eta1)?;
        require_finite("eta2", eta2)?;
        let eta = eta1.hypot(eta2);
        if eta == 0.0 {
            return Ok(Shear::identity());
        }
        let g = (0.5 * eta).tanh();
        Shear::from_g1g2(g * eta1 / eta, g * eta2 / eta)
    }

    pub fn g1(&self) -> f64 {
        self.g1
    }

    pub fn g2(&self) -> f64 {
        self.g2
    }

    /// Magnitude `|g|`.
    pub fn g(&self) -> f64 {
        self.g1.hypot(self.g2)
    }

    /// Axis ratio `q = (1 - |g|) / (1 + |g|)`.
    pub fn q(&self) -> f64 {
        let g = self.g();
        (1.0 - g) / (1.0 + g)
    }

    /// Major-axis position angle in `[0, π)`. Zero for the identity.
    pub fn beta(&self) -> Angle {
        Angle::from_radians((0.5 * self.g2.atan2(self.g1)).rem_euclid(PI))
    }

    fn phase(&self) -> (f64, f64) {
        let g = self.g();
        if g == 0.0 {
            (1.0, 0.0)
        } else {
            (self.g1 / g, self.g2 / g)
        }
    }

    /// Distortion magnitude `|e|`.
    pub fn e(&self) -> f64 {
        let g = self.g();
        2.0 * g / (1.0 + g * g)
    }

    pub fn e1(&self) -> f64 {
        self.e() * self.phase().0
    }

    pub fn e2(&self) -> f64 {
        self.e() * self.phase().1
    }

    /// Conformal magnitude `|η| = 2 atanh(|g|)`.
    pub fn eta(&self) -> f64 {
        2.0 * self.g().atanh()
    }

    pub fn eta1(&self) -> f64 {
        self.eta() * self.phase().0
    }

    pub fn eta2(&self) -> f64 {
        self.eta() * self.phase().1
    }

    /// Unit-determinant matrix that maps intrinsic coordinates to sheared ones.
    pub fn matrix(&self) -> Matrix2<f64> {
        let norm = 1.0 / (1.0 - self.g1 * self.g1 - self.g2 * self.g2).sqrt();
        Matrix2::new(
            norm * (1.0 + self.g1),
            norm * self.g2,
            norm * self.g2,
            norm * (1.0 - self.g1),
        )
    }

    /// The shear that undoes this one.
    pub fn inverse(&self) -> Shear {
        Shear {
            g1: -self.g1,
            g2: -self.g2,
        }
    }

    /// Apply `self` then `next`.
    ///
    /// Returns the equivalent single shear and the rotation that must follow
    /// it: `next.matrix() * self.matrix() == R(rotation) * combined.matrix()`.
    pub fn compose(&self, next: &Shear) -> Result<(Shear, Angle)> {
        let (shear, rotation) = polar_decompose(&(next.matrix() * self.matrix()))?;
        Ok((shear, rotation))
    }
}

/// Split a unit-determinant, orientation-preserving matrix into
/// `R(θ) * S(g)`.
pub(crate) fn polar_decompose(m: &Matrix2<f64>) -> Result<(Shear, Angle)> {
    let theta = (m[(1, 0)] - m[(0, 1)]).atan2(m[(0, 0)] + m[(1, 1)]);
    let p = rotation_matrix(-theta) * m;
    let trace = p[(0, 0)] + p[(1, 1)];
    if !(trace.is_finite() && trace > 0.0) {
        return Err(SimError::SingularTransform {
            determinant: m.determinant(),
        });
    }
    let g1 = (p[(0, 0)] - p[(1, 1)]) / trace;
    let g2 = (p[(0, 1)] + p[(1, 0)]) / trace;
    Ok((Shear::from_g1g2(g1, g2)?, Angle::from_radians(theta)))
}
