//! Pixel noise models.
//!
//! Noise is applied to a rendered, noiseless raster in place. All draws come
//! from a [`RandomStream`], so a seed fixes every realization.
//!
//! # Models
//!
//! ## CCD
//! Photon counting for a pixel with noiseless intensity `I`:
//!
//! 1. draw `n ~ Poisson((I + sky_level) * gain)` electrons,
//! 2. convert back with `n / gain`,
//! 3. add `Normal(0, read_noise / gain)`.
//!
//! The sky only appears inside the Poisson mean: the output carries the sky
//! pedestal and its shot noise, and nothing is subtracted afterwards. Pixels
//! whose Poisson mean is not positive draw zero electrons. The per-pixel
//! variance is `(I + sky_level) / gain + (read_noise / gain)^2`.
//!
//! ## Gaussian
//! Signal-independent `Normal(0, sigma)` added to every pixel.
//!
//! # Reproducibility
//!
//! - [`NoiseModel::apply`] walks pixels row-major and draws from one stream
//! - [`NoiseModel::apply_in_chunks`] splits rows into blocks with one
//!   sub-stream each, so blocks run in parallel and the result does not
//!   depend on the thread count
//!
//! The chunked form is reproducible for a given block size but gives a
//! different realization than `apply`.
//!
//! # Examples
//!
//! ```rust
//! use galaxy_sim::{CcdNoise, NoiseModel, RandomStream};
//! use ndarray::Array2;
//!
//! let noise: NoiseModel = CcdNoise::new(120.0, 1.7, 4.0)?.into();
//! let mut pixels = Array2::from_elem((32, 32), 50.0);
//! noise.apply(&mut pixels, &mut RandomStream::new(42))?;
//!
//! println!("Expected variance {:.1}", noise.variance(50.0));
//! # Ok::<(), galaxy_sim::SimError>(())
//! ```

use ndarray::parallel::prelude::*;
use ndarray::{Array2, ArrayViewMut2, Axis};
use rand::RngCore;
use rand_distr::{Distribution, Normal, Poisson};

use crate::error::{require_non_negative, require_positive, Result, SimError};
use crate::random::RandomStream;

/// Rows per block in [`NoiseModel::apply_in_chunks`] when unspecified.
pub const DEFAULT_CHUNK_ROWS: usize = 64;

/// Shot noise with sky background, gain and read noise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CcdNoise {
    sky_level: f64,
    gain: f64,
    read_noise: f64,
}

impl CcdNoise {
    /// # Arguments
    /// * `sky_level` - Background in image units per pixel, `>= 0`
    /// * `gain` - Electrons per image unit, `> 0`
    /// * `read_noise` - Read noise in electrons, `>= 0`
    pub fn new(sky_level: f64, gain: f64, read_noise: f64) -> Result<Self> {
        Ok(Self {
            sky_level: require_non_negative("sky_level", sky_level)?,
            gain: require_positive("gain", gain)?,
            read_noise: require_non_negative("read_noise", read_noise)?,
        })
    }

    pub fn sky_level(&self) -> f64 {
        self.sky_level
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn read_noise(&self) -> f64 {
        self.read_noise
    }
}

/// Stationary Gaussian noise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianNoise {
    sigma: f64,
}

impl GaussianNoise {
    pub fn new(sigma: f64) -> Result<Self> {
        Ok(Self {
            sigma: require_non_negative("sigma", sigma)?,
        })
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoiseModel {
    Ccd(CcdNoise),
    Gaussian(GaussianNoise),
}

impl From<CcdNoise> for NoiseModel {
    fn from(model: CcdNoise) -> Self {
        NoiseModel::Ccd(model)
    }
}

impl From<GaussianNoise> for NoiseModel {
    fn from(model: GaussianNoise) -> Self {
        NoiseModel::Gaussian(model)
    }
}

impl NoiseModel {
    /// Expected variance of a pixel with noiseless intensity `intensity`.
    pub fn variance(&self, intensity: f64) -> f64 {
        match self {
            NoiseModel::Ccd(ccd) => {
                (intensity + ccd.sky_level).max(0.0) / ccd.gain
                    + (ccd.read_noise / ccd.gain).powi(2)
            }
            NoiseModel::Gaussian(g) => g.sigma * g.sigma,
        }
    }

    /// Add noise to every pixel, row-major, drawing from `stream`.
    pub fn apply(&self, pixels: &mut Array2<f64>, stream: &mut RandomStream) -> Result<()> {
        self.apply_view(&mut pixels.view_mut(), stream)
    }

    /// Add noise in parallel blocks of `chunk_rows` rows.
    ///
    /// One value is drawn from `stream` to key the blocks; block `i` then
    /// uses sub-stream `i` of that key. The result depends on the seed and
    /// block size only, never on the thread count.
    pub fn apply_in_chunks(
        &self,
        pixels: &mut Array2<f64>,
        stream: &mut RandomStream,
        chunk_rows: Option<usize>,
    ) -> Result<()> {
        let chunk_rows = chunk_rows.unwrap_or(DEFAULT_CHUNK_ROWS).max(1);
        let key = RandomStream::new(stream.next_u64());

        pixels
            .axis_chunks_iter_mut(Axis(0), chunk_rows)
            .into_par_iter()
            .enumerate()
            .map(|(chunk_idx, mut chunk)| {
                let mut rng = key.substream(chunk_idx as u64);
                self.apply_view(&mut chunk, &mut rng)
            })
            .collect::<Result<Vec<()>>>()?;
        Ok(())
    }

    fn apply_view(&self, pixels: &mut ArrayViewMut2<f64>, rng: &mut RandomStream) -> Result<()> {
        match self {
            NoiseModel::Ccd(ccd) => {
                let read = gaussian(ccd.read_noise / ccd.gain)?;
                for value in pixels.iter_mut() {
                    let mean = (*value + ccd.sky_level) * ccd.gain;
                    let electrons = if mean > 0.0 {
                        Poisson::new(mean)
                            .map_err(|e| {
                                SimError::invalid("intensity", format!("Poisson mean {mean}: {e}"))
                            })?
                            .sample(rng)
                    } else {
                        0.0
                    };
                    *value = electrons / ccd.gain;
                    if let Some(read) = &read {
                        *value += read.sample(rng);
                    }
                }
            }
            NoiseModel::Gaussian(g) => {
                if let Some(normal) = gaussian(g.sigma)? {
                    for value in pixels.iter_mut() {
                        *value += normal.sample(rng);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Zero-mean normal, or `None` for zero width.
fn gaussian(sigma: f64) -> Result<Option<Normal<f64>>> {
    if sigma == 0.0 {
        return Ok(None);
    }
    Normal::new(0.0, sigma)
        .map(Some)
        .map_err(|e| SimError::invalid("sigma", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn flat(value: f64, size: usize) -> Array2<f64> {
        Array2::from_elem((size, size), value)
    }

    fn mean_and_variance(a: &Array2<f64>) -> (f64, f64) {
        let n = a.len() as f64;
        let mean = a.sum() / n;
        let var = a.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        (mean, var)
    }

    #[test]
    fn test_poisson_variance_scales_with_gain() {
        let model: NoiseModel = CcdNoise::new(0.0, 2.0, 0.0).unwrap().into();
        let mut pixels = flat(100.0, 200);
        model.apply(&mut pixels, &mut RandomStream::new(5)).unwrap();
        let (mean, var) = mean_and_variance(&pixels);
        assert_relative_eq!(mean, 100.0, max_relative = 0.01);
        assert_relative_eq!(var, 100.0 / 2.0, max_relative = 0.05);
        assert_relative_eq!(model.variance(100.0), 50.0);
    }

    #[test]
    fn test_sky_is_kept_in_output() {
        let model: NoiseModel = CcdNoise::new(50.0, 1.0, 0.0).unwrap().into();
        let mut pixels = flat(0.0, 100);
        model.apply(&mut pixels, &mut RandomStream::new(11)).unwrap();
        let (mean, var) = mean_and_variance(&pixels);
        assert_relative_eq!(mean, 50.0, max_relative = 0.02);
        assert_relative_eq!(var, 50.0, max_relative = 0.1);
    }

    #[test]
    fn test_read_noise_adds_variance() {
        let model: NoiseModel = CcdNoise::new(0.0, 4.0, 8.0).unwrap().into();
        let mut pixels = flat(0.0, 150);
        model.apply(&mut pixels, &mut RandomStream::new(3)).unwrap();
        let (mean, var) = mean_and_variance(&pixels);
        // (8 / 4)^2 = 4
        assert!(mean.abs() < 0.08);
        assert_relative_eq!(var, 4.0, max_relative = 0.05);
    }

    #[test]
    fn test_negative_mean_draws_zero() {
        let model: NoiseModel = CcdNoise::new(0.0, 1.0, 0.0).unwrap().into();
        let mut pixels = flat(-3.0, 4);
        model.apply(&mut pixels, &mut RandomStream::new(1)).unwrap();
        assert!(pixels.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_same_seed_same_noise() {
        let model: NoiseModel = CcdNoise::new(10.0, 1.5, 2.0).unwrap().into();
        let mut a = flat(20.0, 32);
        let mut b = flat(20.0, 32);
        model.apply(&mut a, &mut RandomStream::new(42)).unwrap();
        model.apply(&mut b, &mut RandomStream::new(42)).unwrap();
        assert_eq!(a, b);

        let mut c = flat(20.0, 32);
        model.apply(&mut c, &mut RandomStream::new(43)).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_chunked_noise_is_reproducible() {
        let model: NoiseModel = GaussianNoise::new(3.0).unwrap().into();
        let mut a = flat(0.0, 100);
        let mut b = flat(0.0, 100);
        model.apply_in_chunks(&mut a, &mut RandomStream::new(9), Some(7)).unwrap();
        model.apply_in_chunks(&mut b, &mut RandomStream::new(9), Some(7)).unwrap();
        assert_eq!(a, b);

        let (_, var) = mean_and_variance(&a);
        assert_relative_eq!(var, 9.0, max_relative = 0.05);
        // blocks draw from distinct sub-streams
        assert_ne!(a.row(0), a.row(7));
    }

    #[test]
    fn test_invalid_models() {
        assert!(CcdNoise::new(-1.0, 1.0, 0.0).is_err());
        assert!(CcdNoise::new(0.0, 0.0, 0.0).is_err());
        assert!(CcdNoise::new(0.0, 1.0, -0.5).is_err());
        assert!(GaussianNoise::new(f64::NAN).is_err());
    }
}
