//! Error taxonomy for scene assembly and rendering.
//!
//! Construction problems (bad parameters, singular transforms) surface from
//! constructors so a scene fails before any pixels are computed. Rendering
//! problems (under-sampling, oversized grids, non-finite pixels) are fatal.
//! Flux loss at the grid edge is not an error; it is reported alongside the
//! rendered image as a [`FluxConservationWarning`].

use std::fmt;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    /// A profile, shear, noise or grid parameter is outside its domain.
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// A WCS Jacobian (or other linear map) cannot be inverted.
    #[error("Singular transform (determinant {determinant:e})")]
    SingularTransform { determinant: f64 },

    /// The sampling resolution cannot resolve the highest-frequency component.
    #[error("Aliasing risk: oversampling {chosen} is below the required {required}")]
    AliasingRisk { required: usize, chosen: usize },

    /// The sampling grid would exceed the configured FFT size cap.
    #[error("Sampling grid of {required} cells per side exceeds the limit of {limit}")]
    GridTooLarge { required: usize, limit: usize },

    /// A rendered pixel is NaN or infinite.
    #[error("Non-finite value rendered at pixel ({x}, {y})")]
    NonFinite { x: i64, y: i64 },
}

impl SimError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        SimError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SimError>;

/// Rendered flux differs from the profile's total flux beyond tolerance.
///
/// Usually light falling outside the image; not fatal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FluxConservationWarning {
    pub expected: f64,
    pub rendered: f64,
    pub relative_error: f64,
}

impl fmt::Display for FluxConservationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rendered flux {:.6} differs from expected {:.6} (relative error {:.3e})",
            self.rendered, self.expected, self.relative_error
        )
    }
}

/// Accept only finite values greater than zero.
pub(crate) fn require_positive(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(SimError::invalid(name, format!("must be finite and > 0, got {value}")))
    }
}

pub(crate) fn require_non_negative(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(SimError::invalid(name, format!("must be finite and >= 0, got {value}")))
    }
}

pub(crate) fn require_finite(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SimError::invalid(name, format!("must be finite, got {value}")))
    }
}
