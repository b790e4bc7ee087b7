//! Surface brightness profiles and the profile tree.
//!
//! A [`Profile`] is a closed sum type over three primitives ([`Sersic`],
//! [`Kolmogorov`], [`OpticalPsf`]) and three combinators ([`Transformed`],
//! [`Sum`], [`Convolution`]). Composites own their children, so trees are
//! built bottom-up and never share or cycle. Every node answers the same
//! questions through [`SurfaceBrightness`].
//!
//! # Coordinates and units
//! Profiles live in world coordinates (arcseconds by convention). Intensity
//! is flux per unit area, so integrating [`SurfaceBrightness::evaluate`] over
//! the plane gives [`SurfaceBrightness::flux`].
//!
//! # Transforms
//! Shears, dilations, magnifications, rotations and shifts all wrap the
//! profile in a [`Transformed`] node. Transforming a transformed profile folds
//! the two maps into one, so repeated shears compose multiplicatively:
//!
//! ```ignore
//! let g = Shear::from_g1g2(0.2, 0.0)?;
//! let twice = profile.sheared(&g)?.sheared(&g)?;
//! // equivalent to a single shear with g1 = 0.4 / 1.04, not 0.4
//! ```

pub mod composite;
pub mod kolmogorov;
pub mod optical;
pub mod sersic;
pub mod tabulated;

pub use composite::{Convolution, Sum, Transformed};
pub use kolmogorov::Kolmogorov;
pub use optical::{Aberrations, OpticalPsf};
pub use sersic::Sersic;

use nalgebra::Matrix2;
use profile_math::affine::{rotation_matrix, Affine2};

use crate::angle::Angle;
use crate::error::{require_non_negative, require_positive, Result, SimError};
use crate::shear::Shear;

/// Capabilities shared by every profile node.
pub trait SurfaceBrightness {
    /// Intensity (flux per unit area) at `(x, y)`.
    fn evaluate(&self, x: f64, y: f64) -> f64;

    /// Integral of the intensity over the plane.
    fn flux(&self) -> f64;

    /// Radius about the origin that holds nearly all of the light.
    fn support_radius(&self) -> f64;

    /// Largest sampling interval that resolves the profile's finest detail.
    ///
    /// Infinite when sampling places no limit (profiles that are integrated
    /// over each cell rather than point sampled).
    fn nyquist_spacing(&self) -> f64 {
        f64::INFINITY
    }
}

#[derive(Debug, Clone)]
pub enum Profile {
    Sersic(Sersic),
    Kolmogorov(Kolmogorov),
    OpticalPsf(OpticalPsf),
    Transformed(Transformed),
    Sum(Sum),
    Convolution(Convolution),
}

impl Profile {
    /// Superpose `children`.
    pub fn sum(children: Vec<Profile>) -> Result<Profile> {
        Ok(Profile::Sum(Sum::new(children)?))
    }

    /// Convolve `children`; the first is the primary.
    pub fn convolve(children: Vec<Profile>) -> Result<Profile> {
        Ok(Profile::Convolution(Convolution::new(children)?))
    }

    fn as_brightness(&self) -> &dyn SurfaceBrightness {
        match self {
            Profile::Sersic(p) => p,
            Profile::Kolmogorov(p) => p,
            Profile::OpticalPsf(p) => p,
            Profile::Transformed(p) => p,
            Profile::Sum(p) => p,
            Profile::Convolution(p) => p,
        }
    }

    /// Wrap in (or fold into) an affine transform.
    fn map(self, map: Affine2, flux_scale: f64) -> Result<Profile> {
        let transformed = match self {
            Profile::Transformed(t) => t.then(&map, flux_scale)?,
            other => Transformed::new(other, map, flux_scale)?,
        };
        Ok(Profile::Transformed(transformed))
    }

    /// Apply an arbitrary Jacobian (flux preserving).
    pub fn transformed(self, jacobian: Matrix2<f64>) -> Result<Profile> {
        self.map(Affine2::linear(jacobian), 1.0)
    }

    /// Apply an area-preserving shear.
    pub fn sheared(self, shear: &Shear) -> Result<Profile> {
        self.transformed(shear.matrix())
    }

    /// Scale linear size by `scale` keeping the flux.
    pub fn dilated(self, scale: f64) -> Result<Profile> {
        let scale = require_positive("dilation", scale)?;
        self.transformed(Matrix2::identity() * scale)
    }

    /// Lensing magnification: area and flux both scale by `mu`.
    pub fn magnified(self, mu: f64) -> Result<Profile> {
        let mu = require_positive("magnification", mu)?;
        self.map(Affine2::linear(Matrix2::identity() * mu.sqrt()), mu)
    }

    /// Rotate counter-clockwise.
    pub fn rotated(self, angle: Angle) -> Result<Profile> {
        self.transformed(rotation_matrix(angle.radians()))
    }

    /// Move the profile center to `(dx, dy)`.
    pub fn shifted(self, dx: f64, dy: f64) -> Result<Profile> {
        if !(dx.is_finite() && dy.is_finite()) {
            return Err(SimError::invalid(
                "shift",
                format!("must be finite, got ({dx}, {dy})"),
            ));
        }
        self.map(Affine2::translation(dx, dy), 1.0)
    }

    /// Multiply the flux by `factor`.
    pub fn scale_flux(&self, factor: f64) -> Result<Profile> {
        let factor = require_non_negative("flux_scale", factor)?;
        match self {
            Profile::Transformed(t) => {
                let scale = t.flux_scale() * factor;
                Ok(Profile::Transformed(t.clone().with_flux_scale(scale)))
            }
            Profile::Sum(s) => Ok(Profile::Sum(Sum::new(
                s.children()
                    .iter()
                    .map(|c| c.scale_flux(factor))
                    .collect::<Result<Vec<_>>>()?,
            )?)),
            Profile::Convolution(c) => {
                let mut children = c.children().to_vec();
                children[0] = children[0].scale_flux(factor)?;
                Profile::convolve(children)
            }
            leaf => leaf.with_flux(leaf.flux() * factor),
        }
    }

    /// Same shape with total flux `flux`.
    ///
    /// A [`Sum`] rescales all children by a common factor; a [`Convolution`]
    /// rescales its primary.
    pub fn with_flux(&self, flux: f64) -> Result<Profile> {
        let flux = require_non_negative("flux", flux)?;
        match self {
            Profile::Sersic(p) => Ok(Profile::Sersic(p.with_flux(flux)?)),
            Profile::Kolmogorov(p) => Ok(Profile::Kolmogorov(p.with_flux(flux)?)),
            Profile::OpticalPsf(p) => Ok(Profile::OpticalPsf(p.with_flux(flux)?)),
            Profile::Sum(s) => Ok(Profile::Sum(s.with_flux(flux)?)),
            Profile::Convolution(c) => Ok(Profile::Convolution(c.with_flux(flux)?)),
            Profile::Transformed(t) => {
                let inner = t.inner().flux();
                if inner > 0.0 {
                    Ok(Profile::Transformed(t.clone().with_flux_scale(flux / inner)))
                } else {
                    Err(SimError::invalid(
                        "flux",
                        "cannot rescale a transformed profile with no flux",
                    ))
                }
            }
        }
    }
}

impl SurfaceBrightness for Profile {
    fn evaluate(&self, x: f64, y: f64) -> f64 {
        self.as_brightness().evaluate(x, y)
    }

    fn flux(&self) -> f64 {
        self.as_brightness().flux()
    }

    fn support_radius(&self) -> f64 {
        self.as_brightness().support_radius()
    }

    fn nyquist_spacing(&self) -> f64 {
        self.as_brightness().nyquist_spacing()
    }
}

impl From<Sersic> for Profile {
    fn from(p: Sersic) -> Self {
        Profile::Sersic(p)
    }
}

impl From<Kolmogorov> for Profile {
    fn from(p: Kolmogorov) -> Self {
        Profile::Kolmogorov(p)
    }
}

impl From<OpticalPsf> for Profile {
    fn from(p: OpticalPsf) -> Self {
        Profile::OpticalPsf(p)
    }
}
