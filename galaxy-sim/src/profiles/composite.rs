//! Profiles built from other profiles: affine transforms, sums and
//! convolutions.

use nalgebra::Vector2;
use profile_math::affine::{singular_values, Affine2};

use super::{Profile, SurfaceBrightness};
use crate::error::{Result, SimError};

/// A profile seen through an affine map, with a flux multiplier.
///
/// `evaluate(p) = flux_scale * inner(M⁻¹ (p - t)) / |det M|`, so a map alone
/// never changes the flux.
#[derive(Debug, Clone)]
pub struct Transformed {
    inner: Box<Profile>,
    map: Affine2,
    inverse: Affine2,
    flux_scale: f64,
}

impl Transformed {
    pub(crate) fn new(inner: Profile, map: Affine2, flux_scale: f64) -> Result<Self> {
        let inverse = map.inverse().ok_or(SimError::SingularTransform {
            determinant: map.determinant(),
        })?;
        Ok(Self {
            inner: Box::new(inner),
            map,
            inverse,
            flux_scale,
        })
    }

    pub fn inner(&self) -> &Profile {
        &self.inner
    }

    /// Map from the inner profile's frame to this profile's frame.
    pub fn map(&self) -> &Affine2 {
        &self.map
    }

    pub fn flux_scale(&self) -> f64 {
        self.flux_scale
    }

    /// Fold another map (applied after this one) into a single transform.
    pub(crate) fn then(self, outer: &Affine2, flux_scale: f64) -> Result<Self> {
        Transformed::new(*self.inner, self.map.then(outer), self.flux_scale * flux_scale)
    }

    pub(crate) fn with_flux_scale(self, flux_scale: f64) -> Self {
        Self { flux_scale, ..self }
    }
}

impl SurfaceBrightness for Transformed {
    fn evaluate(&self, x: f64, y: f64) -> f64 {
        let p = self.inverse.apply(Vector2::new(x, y));
        self.flux_scale * self.inner.evaluate(p.x, p.y) * self.inverse.determinant().abs()
    }

    fn flux(&self) -> f64 {
        self.flux_scale * self.inner.flux()
    }

    fn support_radius(&self) -> f64 {
        let (_, stretch) = singular_values(&self.map.matrix);
        self.inner.support_radius() * stretch + self.map.offset.norm()
    }

    fn nyquist_spacing(&self) -> f64 {
        let (shrink, _) = singular_values(&self.map.matrix);
        self.inner.nyquist_spacing() * shrink
    }
}

/// Superposition of independently normalized profiles.
#[derive(Debug, Clone)]
pub struct Sum {
    children: Vec<Profile>,
}

impl Sum {
    pub fn new(children: Vec<Profile>) -> Result<Self> {
        if children.is_empty() {
            return Err(SimError::invalid("items", "a Sum needs at least one child"));
        }
        Ok(Self { children })
    }

    pub fn children(&self) -> &[Profile] {
        &self.children
    }

    /// Rescale every child by the same factor so the total reaches `flux`.
    pub fn with_flux(&self, flux: f64) -> Result<Self> {
        let current = self.flux();
        if current <= 0.0 {
            return Err(SimError::invalid(
                "flux",
                "cannot rescale a Sum whose children carry no flux",
            ));
        }
        let factor = flux / current;
        let children = self
            .children
            .iter()
            .map(|child| child.scale_flux(factor))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { children })
    }
}

impl SurfaceBrightness for Sum {
    fn evaluate(&self, x: f64, y: f64) -> f64 {
        self.children.iter().map(|c| c.evaluate(x, y)).sum()
    }

    fn flux(&self) -> f64 {
        self.children.iter().map(|c| c.flux()).sum()
    }

    fn support_radius(&self) -> f64 {
        self.children
            .iter()
            .map(|c| c.support_radius())
            .fold(0.0, f64::max)
    }

    fn nyquist_spacing(&self) -> f64 {
        self.children
            .iter()
            .map(|c| c.nyquist_spacing())
            .fold(f64::INFINITY, f64::min)
    }
}

/// Number of quadrature cells per kernel radius in [`Convolution::evaluate`].
const QUADRATURE_CELLS_PER_RADIUS: usize = 64;
/// Quadrature disk radius as a multiple of the kernel support radius.
const QUADRATURE_REACH: f64 = 1.5;

/// Optical convolution of two or more profiles.
///
/// The first child is the primary: flux overrides and shifts act on it. The
/// total flux is the product of the child fluxes, which equals the primary's
/// flux when the others are normalized to 1.
#[derive(Debug, Clone)]
pub struct Convolution {
    children: Vec<Profile>,
}

impl Convolution {
    pub fn new(children: Vec<Profile>) -> Result<Self> {
        if children.is_empty() {
            return Err(SimError::invalid(
                "items",
                "a Convolution needs at least one child",
            ));
        }
        Ok(Self { children })
    }

    pub fn children(&self) -> &[Profile] {
        &self.children
    }

    pub fn primary(&self) -> &Profile {
        &self.children[0]
    }

    pub fn kernels(&self) -> &[Profile] {
        &self.children[1..]
    }

    /// Rescale the primary so the total reaches `flux`.
    pub fn with_flux(&self, flux: f64) -> Result<Self> {
        let others: f64 = self.kernels().iter().map(|c| c.flux()).product();
        if others <= 0.0 {
            return Err(SimError::invalid(
                "flux",
                "cannot rescale a Convolution with a zero-flux kernel",
            ));
        }
        let mut children = self.children.clone();
        children[0] = children[0].with_flux(flux / others)?;
        Ok(Self { children })
    }

    /// Convolve `rest` with `kernel` at one point by midpoint quadrature over
    /// the kernel's support disk.
    fn convolve_at(kernel: &Profile, rest: &dyn Fn(f64, f64) -> f64, x: f64, y: f64) -> f64 {
        let reach = QUADRATURE_REACH * kernel.support_radius();
        let cells = QUADRATURE_CELLS_PER_RADIUS as f64;
        let mut h = reach / cells;
        let nyquist = kernel.nyquist_spacing();
        if nyquist.is_finite() {
            h = h.min(0.5 * nyquist);
        }
        let steps = (reach / h).ceil() as i64;

        let mut total = 0.0;
        for j in -steps..steps {
            let qy = (j as f64 + 0.5) * h;
            for i in -steps..steps {
                let qx = (i as f64 + 0.5) * h;
                if qx.hypot(qy) > reach {
                    continue;
                }
                let k = kernel.evaluate(qx, qy);
                if k != 0.0 {
                    total += k * rest(x - qx, y - qy);
                }
            }
        }
        total * h * h
    }
}

impl SurfaceBrightness for Convolution {
    /// Direct real-space evaluation; meant for spot checks, the renderer
    /// convolves on a grid instead.
    fn evaluate(&self, x: f64, y: f64) -> f64 {
        if self.children.len() == 1 {
            return self.children[0].evaluate(x, y);
        }
        // Integrate over the most compact child.
        let (narrow, _) = self
            .children
            .iter()
            .enumerate()
            .map(|(i, c)| (i, c.support_radius()))
            .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best });

        let mut rest_children = self.children.clone();
        let kernel = rest_children.remove(narrow);
        let rest = Convolution {
            children: rest_children,
        };
        Self::convolve_at(&kernel, &|px, py| rest.evaluate(px, py), x, y)
    }

    fn flux(&self) -> f64 {
        self.children.iter().map(|c| c.flux()).product()
    }

    fn support_radius(&self) -> f64 {
        self.children.iter().map(|c| c.support_radius()).sum()
    }

    fn nyquist_spacing(&self) -> f64 {
        self.children
            .iter()
            .map(|c| c.nyquist_spacing())
            .fold(f64::INFINITY, f64::min)
    }
}
