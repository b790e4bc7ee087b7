//! Long-exposure atmospheric PSF from Kolmogorov turbulence.
//!
//! The optical transfer function is `exp(-(k / k0)^(5/3))` with
//! `k0 = 2.992934 / (λ/r0)`, and `λ/r0 = fwhm / 0.975865` links the Fried
//! parameter to the image FWHM. There is no closed form in real space, so the
//! profile is tabulated once by an inverse FFT of the OTF.

use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::Array2;
use num_complex::Complex64;
use profile_math::{fft2, fftshift};
use rustfft::FftDirection;

use super::tabulated::LookupImage;
use super::SurfaceBrightness;
use crate::error::{require_non_negative, require_positive, Result};

/// `fwhm = 0.975865 λ/r0`.
const FWHM_PER_LAMBDA_OVER_R0: f64 = 0.975_865;
/// `k0 = 2.992934 / (λ/r0)`.
const K0_TIMES_LAMBDA_OVER_R0: f64 = 2.992_934;

const TABLE_SIZE: usize = 1024;
const SAMPLES_PER_FWHM: f64 = 16.0;

/// Sampling interval, in units of the FWHM, at which the OTF drops to 1e-3.
pub const NYQUIST_PER_FWHM: f64 = 0.337;

#[derive(Debug, Clone)]
pub struct Kolmogorov {
    fwhm: f64,
    flux: f64,
    table: Arc<LookupImage>,
}

impl Kolmogorov {
    pub fn new(fwhm: f64, flux: f64) -> Result<Self> {
        let fwhm = require_positive("fwhm", fwhm)?;
        let flux = require_non_negative("flux", flux)?;
        let table = Arc::new(tabulate(fwhm)?);
        Ok(Self { fwhm, flux, table })
    }

    pub fn fwhm(&self) -> f64 {
        self.fwhm
    }

    pub fn lam_over_r0(&self) -> f64 {
        self.fwhm / FWHM_PER_LAMBDA_OVER_R0
    }

    /// Optical transfer function at wavenumber `k` (radians per unit length).
    pub fn otf(&self, k: f64) -> f64 {
        otf(k, K0_TIMES_LAMBDA_OVER_R0 / self.lam_over_r0())
    }

    pub fn with_flux(&self, flux: f64) -> Result<Self> {
        Ok(Self {
            fwhm: self.fwhm,
            flux: require_non_negative("flux", flux)?,
            table: Arc::clone(&self.table),
        })
    }
}

fn otf(k: f64, k0: f64) -> f64 {
    (-(k / k0).powf(5.0 / 3.0)).exp()
}

fn tabulate(fwhm: f64) -> Result<LookupImage> {
    let n = TABLE_SIZE;
    let dx = fwhm / SAMPLES_PER_FWHM;
    let dk = 2.0 * PI / (n as f64 * dx);
    let k0 = K0_TIMES_LAMBDA_OVER_R0 * FWHM_PER_LAMBDA_OVER_R0 / fwhm;

    let wrapped = |i: usize| if i < n / 2 { i as f64 } else { i as f64 - n as f64 };
    let mut spectrum = Array2::from_shape_fn((n, n), |(r, c)| {
        let k = (wrapped(c) * dk).hypot(wrapped(r) * dk);
        Complex64::new(otf(k, k0), 0.0)
    });
    fft2(&mut spectrum, FftDirection::Inverse);

    let norm = 1.0 / ((n * n) as f64 * dx * dx);
    let values = fftshift(&spectrum.mapv(|v| (v.re * norm).max(0.0)));
    LookupImage::new(values, dx)
}

impl SurfaceBrightness for Kolmogorov {
    fn evaluate(&self, x: f64, y: f64) -> f64 {
        self.flux * self.table.evaluate(x, y)
    }

    fn flux(&self) -> f64 {
        self.flux
    }

    fn support_radius(&self) -> f64 {
        self.table.support_radius()
    }

    fn nyquist_spacing(&self) -> f64 {
        NYQUIST_PER_FWHM * self.fwhm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fwhm_matches_parameter() {
        let psf = Kolmogorov::new(0.7, 1.0).unwrap();
        let peak = psf.evaluate(0.0, 0.0);

        // Walk outward until the profile drops below half maximum.
        let step = 1e-4;
        let mut r = 0.0;
        while psf.evaluate(r, 0.0) > 0.5 * peak {
            r += step;
        }
        assert_relative_eq!(2.0 * r, 0.7, max_relative = 0.02);
    }

    #[test]
    fn test_otf_at_k0() {
        let psf = Kolmogorov::new(1.0, 1.0).unwrap();
        let k0 = K0_TIMES_LAMBDA_OVER_R0 / psf.lam_over_r0();
        assert_relative_eq!(psf.otf(0.0), 1.0);
        assert_relative_eq!(psf.otf(k0), (-1.0f64).exp(), max_relative = 1e-12);
    }

    #[test]
    fn test_flux_scaling_shares_table() {
        let psf = Kolmogorov::new(0.9, 1.0).unwrap();
        let bright = psf.with_flux(50.0).unwrap();
        assert!(Arc::ptr_eq(&psf.table, &bright.table));
        assert_relative_eq!(bright.evaluate(0.2, 0.1), 50.0 * psf.evaluate(0.2, 0.1), max_relative = 1e-12);
    }

    #[test]
    fn test_circular_symmetry() {
        let psf = Kolmogorov::new(0.8, 1.0).unwrap();
        let r = 0.45;
        let on_axis = psf.evaluate(r, 0.0);
        let diagonal = psf.evaluate(r / 2f64.sqrt(), r / 2f64.sqrt());
        assert_relative_eq!(on_axis, diagonal, max_relative = 0.02);
    }

    #[test]
    fn test_invalid_fwhm() {
        assert!(Kolmogorov::new(0.0, 1.0).is_err());
        assert!(Kolmogorov::new(-0.5, 1.0).is_err());
        assert!(Kolmogorov::new(f64::NAN, 1.0).is_err());
    }
}
