//! Empirical noise correlation functions.
//!
//! For a noise image `f` with mean `m`, the estimator is the cyclic
//! autocovariance
//!
//! ```text
//! ξ(dx, dy) = 1/N Σ_p (f(p) - m) (f(p + d) - m)
//! ```
//!
//! computed as the inverse FFT of `|FFT(f - m)|²`. Lags are tabulated over
//! `[-n/2, n/2]` along each axis, symmetrized so `ξ(d) == ξ(-d)`, and
//! interpolated bilinearly; lags beyond the table are zero. The zero-lag
//! value is the (biased) pixel variance.

use nalgebra::{Matrix2, Vector2};
use ndarray::Array2;
use num_complex::Complex64;
use profile_math::affine::rotation_matrix;
use profile_math::fft2;
use rustfft::FftDirection;

use crate::angle::Angle;
use crate::error::{require_positive, Result, SimError};
use crate::profiles::tabulated::bilinear;

#[derive(Debug, Clone, PartialEq)]
pub struct NoiseCorrelation {
    table: Array2<f64>,
    center: (usize, usize),
    pixel_scale: f64,
    /// Maps a queried lag back to the frame the table was estimated in.
    inverse_rotation: Matrix2<f64>,
}

impl NoiseCorrelation {
    /// Estimate from a noise image whose pixels are `pixel_scale` apart.
    pub fn estimate(noise: &Array2<f64>, pixel_scale: f64) -> Result<Self> {
        let pixel_scale = require_positive("pixel_scale", pixel_scale)?;
        let (rows, cols) = noise.dim();
        if rows < 2 || cols < 2 {
            return Err(SimError::invalid(
                "noise",
                format!("need at least 2x2 pixels, got {cols}x{rows}"),
            ));
        }
        if let Some(((r, c), _)) = noise.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(SimError::NonFinite {
                x: c as i64,
                y: r as i64,
            });
        }

        let npix = (rows * cols) as f64;
        let mean = noise.sum() / npix;
        let mut spectrum = noise.mapv(|v| Complex64::new(v - mean, 0.0));
        fft2(&mut spectrum, FftDirection::Forward);
        spectrum.mapv_inplace(|v| Complex64::new(v.norm_sqr(), 0.0));
        fft2(&mut spectrum, FftDirection::Inverse);
        // One 1/N undoes the unnormalized round trip, the other averages.
        let cyclic = spectrum.mapv(|v| v.re / (npix * npix));

        let (half_rows, half_cols) = (rows / 2, cols / 2);
        let lag = |i: usize, half: usize, n: usize| -> usize {
            (i as isize - half as isize).rem_euclid(n as isize) as usize
        };
        let mirror = |i: usize, half: usize, n: usize| -> usize {
            (half as isize - i as isize).rem_euclid(n as isize) as usize
        };
        let table = Array2::from_shape_fn((2 * half_rows + 1, 2 * half_cols + 1), |(r, c)| {
            let forward = cyclic[[lag(r, half_rows, rows), lag(c, half_cols, cols)]];
            let backward = cyclic[[mirror(r, half_rows, rows), mirror(c, half_cols, cols)]];
            0.5 * (forward + backward)
        });

        Ok(Self {
            table,
            center: (half_rows, half_cols),
            pixel_scale,
            inverse_rotation: Matrix2::identity(),
        })
    }

    /// Correlation at lag `(dx, dy)` in world units.
    pub fn value_at(&self, dx: f64, dy: f64) -> f64 {
        let lag = self.inverse_rotation * Vector2::new(dx, dy) / self.pixel_scale;
        bilinear(
            &self.table,
            lag.x + self.center.1 as f64,
            lag.y + self.center.0 as f64,
        )
    }

    /// Zero-lag value.
    pub fn variance(&self) -> f64 {
        self.table[[self.center.0, self.center.1]]
    }

    pub fn pixel_scale(&self) -> f64 {
        self.pixel_scale
    }

    /// Tabulated lags; element `[rows / 2, cols / 2]` is zero lag.
    pub fn table(&self) -> &Array2<f64> {
        &self.table
    }

    /// The correlation function of the same noise rotated counter-clockwise
    /// by `angle`.
    pub fn rotated(&self, angle: Angle) -> NoiseCorrelation {
        NoiseCorrelation {
            inverse_rotation: self.inverse_rotation * rotation_matrix(-angle.radians()),
            ..self.clone()
        }
    }
}
