//! Shared fixtures for the galaxy-sim test suites.
//!
//! - Workspace discovery and paths to checked-in test data.
//! - Seeded white-noise fields and the shift-and-add fields derived from
//!   them, whose correlation functions are known exactly.
//! - Array utilities (90-degree rotation, sample statistics).
//!
//! ```rust
//! use test_helpers::{mean_and_variance, normal_field, x_correlated};
//!
//! let white = normal_field(64, 64, 1.0, 7);
//! let correlated = x_correlated(&white);
//! let (_, variance) = mean_and_variance(&correlated);
//! assert!((variance - 1.0).abs() < 0.1);
//! ```

use ndarray::Array2;
use once_cell::sync::Lazy;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use std::env;
use std::f64::consts::FRAC_1_SQRT_2;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum TestHelperError {
    #[error("Failed to find project root: {0}")]
    ProjectRootNotFound(String),
}

/// Walk up from the current directory to the Cargo workspace root.
pub fn find_project_root() -> Result<PathBuf, TestHelperError> {
    let mut current_dir = env::current_dir().map_err(|e| {
        TestHelperError::ProjectRootNotFound(format!("Failed to get current directory: {}", e))
    })?;

    loop {
        let cargo_toml = current_dir.join("Cargo.toml");
        if cargo_toml.exists() {
            let content = std::fs::read_to_string(&cargo_toml).map_err(|e| {
                TestHelperError::ProjectRootNotFound(format!("Failed to read Cargo.toml: {}", e))
            })?;

            if content.contains("[workspace]") {
                return Ok(current_dir);
            }
        }

        if !current_dir.pop() {
            break;
        }
    }

    Err(TestHelperError::ProjectRootNotFound(
        "Workspace root not found".to_string(),
    ))
}

static PROJECT_ROOT: Lazy<PathBuf> =
    Lazy::new(|| find_project_root().expect("Failed to find project root directory"));

/// Path to a file under `galaxy-sim/tests/data/`.
pub fn data_path<P: AsRef<Path>>(path: P) -> PathBuf {
    PROJECT_ROOT.join("galaxy-sim").join("tests").join("data").join(path)
}

/// Read a test data file to a string.
///
/// # Panics
/// Panics if the file is missing.
pub fn read_data(path: impl AsRef<Path>) -> String {
    let full = data_path(path);
    std::fs::read_to_string(&full)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", full.display(), e))
}

/// Independent `Normal(0, sigma)` pixels from a fixed seed.
pub fn normal_field(rows: usize, cols: usize, sigma: f64, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let normal = Normal::new(0.0, sigma).expect("sigma must be finite and non-negative");
    Array2::from_shape_simple_fn((rows, cols), || normal.sample(&mut rng))
}

/// `(f[r, c] + f[r, c + 1]) / sqrt(2)` with cyclic wrap.
///
/// For white input of variance `s²` the output keeps variance `s²` and has
/// correlation `s² / 2` at lag `(±1, 0)`, zero at every other nonzero lag.
pub fn x_correlated(field: &Array2<f64>) -> Array2<f64> {
    let (rows, cols) = field.dim();
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        (field[[r, c]] + field[[r, (c + 1) % cols]]) * FRAC_1_SQRT_2
    })
}

/// Like [`x_correlated`] but along rows (lag `(0, ±1)`).
pub fn y_correlated(field: &Array2<f64>) -> Array2<f64> {
    let (rows, cols) = field.dim();
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        (field[[r, c]] + field[[(r + 1) % rows, c]]) * FRAC_1_SQRT_2
    })
}

/// Rotate an array counter-clockwise by 90 degrees, with `x` along columns
/// and `y` along rows: content at `(x, y)` moves to `(-y, x)`.
pub fn rot90(field: &Array2<f64>) -> Array2<f64> {
    let (rows, cols) = field.dim();
    Array2::from_shape_fn((cols, rows), |(r, c)| field[[rows - 1 - c, r]])
}

/// Sample mean and population variance.
pub fn mean_and_variance(field: &Array2<f64>) -> (f64, f64) {
    let n = field.len() as f64;
    if n == 0.0 {
        return (0.0, 0.0);
    }
    let mean = field.sum() / n;
    let variance = field.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_project_root_exists() {
        let root = find_project_root().expect("Failed to find project root");
        assert!(root.join("Cargo.toml").exists());
        assert!(root.join("test_helpers").exists());
    }

    #[test]
    fn test_scene_fixture_is_present() {
        assert!(data_path("scene.json").exists());
    }

    #[test]
    fn test_normal_field_is_seeded() {
        let a = normal_field(16, 16, 2.0, 42);
        let b = normal_field(16, 16, 2.0, 42);
        let c = normal_field(16, 16, 2.0, 43);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_normal_field_statistics() {
        let field = normal_field(256, 256, 3.0, 1);
        let (mean, variance) = mean_and_variance(&field);
        assert!(mean.abs() < 0.05, "mean {mean}");
        assert_relative_eq!(variance, 9.0, max_relative = 0.03);
    }

    #[test]
    fn test_rot90_moves_corners() {
        let field = Array2::from_shape_fn((2, 3), |(r, c)| (10 * r + c) as f64);
        let rotated = rot90(&field);
        assert_eq!(rotated.dim(), (3, 2));
        assert_eq!(rotated[[0, 0]], field[[1, 0]]);
        assert_eq!(rotated[[2, 1]], field[[0, 2]]);
        let four = rot90(&rot90(&rot90(&rot90(&field))));
        assert_eq!(four, field);
    }

    #[test]
    fn test_shift_add_keeps_variance() {
        let field = normal_field(200, 200, 1.0, 5);
        let (_, v0) = mean_and_variance(&field);
        let (_, vx) = mean_and_variance(&x_correlated(&field));
        let (_, vy) = mean_and_variance(&y_correlated(&field));
        assert_relative_eq!(vx, v0, max_relative = 0.05);
        assert_relative_eq!(vy, v0, max_relative = 0.05);
    }

    #[test]
    fn test_mean_and_variance_exact() {
        let field = Array2::from_shape_vec((2, 2), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let (mean, variance) = mean_and_variance(&field);
        assert_relative_eq!(mean, 2.5);
        assert_relative_eq!(variance, 1.25);
    }
}
