//! Numeric building blocks shared by the profile renderer.
//!
//! - [`special`]: gamma-family functions and the inverse of the regularized
//!   lower incomplete gamma function (Sersic normalization).
//! - [`fft2`]: in-place 2D FFTs over `ndarray` grids, shifts and cyclic
//!   convolution.
//! - [`quadrature`]: composite Gauss-Legendre integration.
//! - [`affine`]: 2x2 linear maps with an offset, used for shears, WCS
//!   Jacobians and profile placement.

pub mod affine;
pub mod fft2;
pub mod quadrature;
pub mod special;

pub use affine::Affine2;
pub use fft2::{convolve_cyclic, fft2, fftshift, good_fft_size, ifftshift};
pub use quadrature::gauss_legendre;
pub use special::{inverse_regularized_lower_gamma, regularized_lower_gamma, SpecialFunctionError};
