//! Diffraction-limited PSF of a circular, optionally obscured aperture.
//!
//! The pupil is sampled on a square grid, given a wavefront phase from
//! Zernike aberrations (Noll normalization, coefficients in waves) and
//! Fourier transformed. The PSF is `|FFT(pupil)|²`:
//!
//! ```text
//! pupil(ρ, θ) = A(ρ) * exp(2πi Σ a_j Z_j(ρ, θ))
//! A(ρ) = 1 for obscuration <= ρ <= 1, else 0
//! ```
//!
//! | term | Noll | `Z_j(ρ, θ)` |
//! |------|------|-------------|
//! | defocus | 4 | `√3 (2ρ² - 1)` |
//! | astig1 | 5 | `√6 ρ² sin 2θ` |
//! | astig2 | 6 | `√6 ρ² cos 2θ` |
//! | coma1 | 7 | `√8 (3ρ³ - 2ρ) sin θ` |
//! | coma2 | 8 | `√8 (3ρ³ - 2ρ) cos θ` |
//!
//! Angular sizes are in units of `λ/D`. A pupil sampled with `npup` points
//! across the diameter and padded to `N` gives a PSF table with spacing
//! `(λ/D) * npup / N`.

use std::f64::consts::PI;
use std::sync::Arc;

use log::debug;
use ndarray::Array2;
use num_complex::Complex64;
use profile_math::{fft2, fftshift, good_fft_size};
use rustfft::FftDirection;

use super::tabulated::LookupImage;
use super::SurfaceBrightness;
use crate::error::{require_finite, require_non_negative, require_positive, Result, SimError};

const MIN_PUPIL_SAMPLES: usize = 64;
const MAX_PUPIL_SAMPLES: usize = 256;
/// Table oversampling relative to `λ/D` (Nyquist is 2).
const TABLE_OVERSAMPLING: usize = 8;

/// Zernike aberration coefficients in waves.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Aberrations {
    pub defocus: f64,
    pub astig1: f64,
    pub astig2: f64,
    pub coma1: f64,
    pub coma2: f64,
}

impl Aberrations {
    fn validate(&self) -> Result<()> {
        require_finite("defocus", self.defocus)?;
        require_finite("astig1", self.astig1)?;
        require_finite("astig2", self.astig2)?;
        require_finite("coma1", self.coma1)?;
        require_finite("coma2", self.coma2)?;
        Ok(())
    }

    fn total(&self) -> f64 {
        self.defocus.abs() + self.astig1.abs() + self.astig2.abs() + self.coma1.abs() + self.coma2.abs()
    }

    /// Wavefront error in waves at pupil radius `rho` (0..1) and angle `theta`.
    pub fn wavefront(&self, rho: f64, theta: f64) -> f64 {
        let rho2 = rho * rho;
        let (sin_t, cos_t) = theta.sin_cos();
        let (sin_2t, cos_2t) = (2.0 * theta).sin_cos();
        let coma_radial = 8f64.sqrt() * (3.0 * rho2 * rho - 2.0 * rho);

        self.defocus * 3f64.sqrt() * (2.0 * rho2 - 1.0)
            + self.astig1 * 6f64.sqrt() * rho2 * sin_2t
            + self.astig2 * 6f64.sqrt() * rho2 * cos_2t
            + self.coma1 * coma_radial * sin_t
            + self.coma2 * coma_radial * cos_t
    }
}

#[derive(Debug, Clone)]
pub struct OpticalPsf {
    lam_over_diam: f64,
    obscuration: f64,
    aberrations: Aberrations,
    flux: f64,
    table: Arc<LookupImage>,
}

impl OpticalPsf {
    pub fn new(
        lam_over_diam: f64,
        obscuration: f64,
        aberrations: Aberrations,
        flux: f64,
    ) -> Result<Self> {
        let lam_over_diam = require_positive("lam_over_diam", lam_over_diam)?;
        if !(0.0..1.0).contains(&obscuration) {
            return Err(SimError::invalid(
                "obscuration",
                format!("must lie in [0, 1), got {obscuration}"),
            ));
        }
        aberrations.validate()?;
        let flux = require_non_negative("flux", flux)?;

        let table = Arc::new(tabulate(lam_over_diam, obscuration, &aberrations)?);
        Ok(Self {
            lam_over_diam,
            obscuration,
            aberrations,
            flux,
            table,
        })
    }

    /// Aberration-free PSF (an Airy pattern).
    pub fn airy(lam_over_diam: f64, obscuration: f64, flux: f64) -> Result<Self> {
        Self::new(lam_over_diam, obscuration, Aberrations::default(), flux)
    }

    pub fn lam_over_diam(&self) -> f64 {
        self.lam_over_diam
    }

    pub fn obscuration(&self) -> f64 {
        self.obscuration
    }

    pub fn aberrations(&self) -> &Aberrations {
        &self.aberrations
    }

    pub fn with_flux(&self, flux: f64) -> Result<Self> {
        Ok(Self {
            flux: require_non_negative("flux", flux)?,
            table: Arc::clone(&self.table),
            ..*self
        })
    }

    /// Peak intensity of the unaberrated Airy pattern with the same aperture:
    /// `flux * π (1 - ε²) / (4 (λ/D)²)`.
    pub fn airy_peak(&self) -> f64 {
        self.flux * PI * (1.0 - self.obscuration.powi(2)) / (4.0 * self.lam_over_diam.powi(2))
    }
}

fn pupil_samples(aberrations: &Aberrations) -> usize {
    // Larger wavefront errors spread light further and need a wider field.
    let grow = (aberrations.total() * 2.0).ceil() as usize;
    (MIN_PUPIL_SAMPLES * (1 + grow)).min(MAX_PUPIL_SAMPLES)
}

fn tabulate(lam_over_diam: f64, obscuration: f64, aberrations: &Aberrations) -> Result<LookupImage> {
    let npup = pupil_samples(aberrations);
    let n = good_fft_size(TABLE_OVERSAMPLING * npup);
    let spacing = lam_over_diam * npup as f64 / n as f64;
    debug!("Optical PSF table: {npup} pupil samples, {n}x{n} FFT, spacing {spacing:.5}");

    let half = n as f64 / 2.0;
    let mut pupil = Array2::from_shape_fn((n, n), |(r, c)| {
        let u = (c as f64 - half + 0.5) / npup as f64;
        let v = (r as f64 - half + 0.5) / npup as f64;
        let rho = 2.0 * u.hypot(v);
        if rho > 1.0 || rho < obscuration {
            return Complex64::new(0.0, 0.0);
        }
        let phase = 2.0 * PI * aberrations.wavefront(rho, v.atan2(u));
        Complex64::from_polar(1.0, phase)
    });

    fft2(&mut pupil, FftDirection::Forward);
    let intensity = fftshift(&pupil.mapv(|v| v.norm_sqr()));
    LookupImage::new(intensity, spacing)
}

impl SurfaceBrightness for OpticalPsf {
    fn evaluate(&self, x: f64, y: f64) -> f64 {
        self.flux * self.table.evaluate(x, y)
    }

    fn flux(&self) -> f64 {
        self.flux
    }

    fn support_radius(&self) -> f64 {
        self.table.support_radius()
    }

    /// The OTF vanishes beyond `D/λ`, so samples every `λ/(2D)` suffice.
    fn nyquist_spacing(&self) -> f64 {
        0.5 * self.lam_over_diam
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_airy_peak_matches_analytic() {
        let psf = OpticalPsf::airy(0.1, 0.0, 1.0).unwrap();
        assert_relative_eq!(psf.evaluate(0.0, 0.0), psf.airy_peak(), max_relative = 0.03);
    }

    #[test]
    fn test_obscured_peak_matches_analytic() {
        let psf = OpticalPsf::airy(0.1, 0.3, 2.0).unwrap();
        assert_relative_eq!(psf.evaluate(0.0, 0.0), psf.airy_peak(), max_relative = 0.03);
    }

    #[test]
    fn test_defocus_lowers_peak() {
        let sharp = OpticalPsf::airy(0.1, 0.0, 1.0).unwrap();
        let blurred = OpticalPsf::new(
            0.1,
            0.0,
            Aberrations {
                defocus: 0.5,
                ..Default::default()
            },
            1.0,
        )
        .unwrap();
        assert!(blurred.evaluate(0.0, 0.0) < 0.7 * sharp.evaluate(0.0, 0.0));
    }

    #[test]
    fn test_astigmatism_with_defocus_elongates() {
        let psf = OpticalPsf::new(
            0.1,
            0.0,
            Aberrations {
                defocus: 0.3,
                astig2: 0.4,
                ..Default::default()
            },
            1.0,
        )
        .unwrap();
        let r = 0.08;
        let along_x = psf.evaluate(r, 0.0);
        let along_y = psf.evaluate(0.0, r);
        assert!((along_x - along_y).abs() > 0.05 * along_x.max(along_y));
    }

    #[test]
    fn test_wavefront_terms() {
        let ab = Aberrations {
            defocus: 1.0,
            ..Default::default()
        };
        assert_relative_eq!(ab.wavefront(1.0, 0.3), 3f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(ab.wavefront(0.0, 0.0), -(3f64.sqrt()), epsilon = 1e-12);

        let coma = Aberrations {
            coma2: 1.0,
            ..Default::default()
        };
        assert_relative_eq!(coma.wavefront(1.0, 0.0), 8f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_pupil_sampling_grows_with_aberration() {
        assert_eq!(pupil_samples(&Aberrations::default()), MIN_PUPIL_SAMPLES);
        let strong = Aberrations {
            defocus: 1.0,
            ..Default::default()
        };
        assert!(pupil_samples(&strong) > MIN_PUPIL_SAMPLES);
        let huge = Aberrations {
            coma1: 100.0,
            ..Default::default()
        };
        assert_eq!(pupil_samples(&huge), MAX_PUPIL_SAMPLES);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(OpticalPsf::airy(0.0, 0.0, 1.0).is_err());
        assert!(OpticalPsf::airy(0.1, 1.0, 1.0).is_err());
        assert!(OpticalPsf::airy(0.1, -0.1, 1.0).is_err());
        let bad = Aberrations {
            astig1: f64::NAN,
            ..Default::default()
        };
        assert!(OpticalPsf::new(0.1, 0.0, bad, 1.0).is_err());
    }
}
