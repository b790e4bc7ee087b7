//! Declarative galaxy and PSF image synthesis.
//!
//! Build a tree of surface-brightness profiles (Sersic galaxies, Kolmogorov
//! and optical PSFs, sums, convolutions, shears), draw it through a linear
//! WCS onto a pixel grid with flux-conserving sampling, and add seeded CCD
//! noise.
//!
//! # Modules
//! - [`profiles`]: profile primitives and the composition operators
//! - [`shear`], [`angle`]: ellipticity parameterizations and angle units
//! - [`wcs`]: pixel-to-world Jacobians and their decomposition
//! - [`render`]: sampling, convolution and binning onto [`image::Image`]s
//! - [`noise`], [`random`]: CCD and Gaussian noise from a reproducible stream
//! - [`correlation`]: noise correlation functions estimated from images
//! - [`scene`], [`config`]: galaxy + PSF scenes and their serde descriptions
//!
//! ```ignore
//! use galaxy_sim::{Kolmogorov, Profile, RenderGrid, RenderOptions, Sersic, Shear, draw};
//!
//! let galaxy: Profile = Sersic::from_half_light_radius(1.5, 0.8, 1000.0)?.into();
//! let galaxy = galaxy.sheared(&Shear::from_g1g2(0.1, -0.05)?)?;
//! let psf = Kolmogorov::new(0.7, 1.0)?.into();
//! let observed = Profile::convolve(vec![galaxy, psf])?;
//! let image = draw(&observed, &RenderGrid::square(64, 0.2)?, &RenderOptions::default())?;
//! ```

pub mod angle;
pub mod config;
pub mod correlation;
pub mod error;
pub mod image;
pub mod noise;
pub mod profiles;
pub mod random;
pub mod render;
pub mod scene;
pub mod shear;
pub mod wcs;

pub use angle::Angle;
pub use config::{SceneConfig, SceneSetup};
pub use correlation::NoiseCorrelation;
pub use error::{FluxConservationWarning, Result, SimError};
pub use image::{Bounds, Image, ImageSize};
pub use noise::{CcdNoise, GaussianNoise, NoiseModel};
pub use profiles::{
    Aberrations, Convolution, Kolmogorov, OpticalPsf, Profile, Sersic, Sum, SurfaceBrightness,
    Transformed,
};
pub use random::RandomStream;
pub use render::{draw, RenderGrid, RenderOptions, RenderedImage};
pub use scene::{Scene, SceneImages};
pub use shear::Shear;
pub use wcs::{AstrometricMetadata, JacobianDecomposition, WorldTransform};
