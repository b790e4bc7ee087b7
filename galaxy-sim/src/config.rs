//! Typed scene descriptions.
//!
//! A description has three blocks: `gal` and `psf` profile trees and an
//! `image` block. Every profile node names its `type` and may carry a
//! `flux` plus the usual placement fields, applied in a fixed order:
//! `dilate`, `ellip`, `rotate`, `magnify`, `shear`, `shift`.
//!
//! ```json
//! {
//!   "gal": { "type": "Sersic", "n": 1.5, "half_light_radius": 0.8, "flux": 1000,
//!            "ellip": { "type": "QBeta", "q": 0.6, "beta": "30 degrees" } },
//!   "psf": { "type": "Kolmogorov", "fwhm": 0.7 },
//!   "image": { "size": 64, "pixel_scale": 0.2, "random_seed": 1234,
//!              "noise": { "type": "CCD", "sky_level": 100, "gain": 1.7, "read_noise": 4 } }
//! }
//! ```
//!
//! Values must already be numbers (or unit-tagged angle strings); nothing
//! is evaluated.

use log::info;
use serde::Deserialize;

use crate::angle::Angle;
use crate::error::{Result, SimError};
use crate::image::ImageSize;
use crate::noise::{CcdNoise, GaussianNoise, NoiseModel};
use crate::profiles::{Aberrations, Kolmogorov, OpticalPsf, Profile, Sersic};
use crate::random::RandomStream;
use crate::render::{RenderGrid, RenderOptions};
use crate::scene::{Scene, SceneImages};
use crate::shear::Shear;
use crate::wcs::WorldTransform;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SceneConfig {
    pub gal: ProfileConfig,
    pub psf: ProfileConfig,
    pub image: ImageConfig,
}

/// One node of a profile tree.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProfileConfig {
    #[serde(flatten)]
    pub kind: ProfileKind,
    #[serde(default)]
    pub flux: Option<f64>,
    #[serde(default)]
    pub dilate: Option<f64>,
    #[serde(default)]
    pub ellip: Option<ShearConfig>,
    #[serde(default)]
    pub rotate: Option<Angle>,
    #[serde(default)]
    pub magnify: Option<f64>,
    #[serde(default)]
    pub shear: Option<ShearConfig>,
    #[serde(default)]
    pub shift: Option<[f64; 2]>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ProfileKind {
    Sersic {
        n: f64,
        #[serde(default)]
        half_light_radius: Option<f64>,
        #[serde(default)]
        scale_radius: Option<f64>,
    },
    Kolmogorov {
        fwhm: f64,
    },
    #[serde(rename = "OpticalPSF")]
    OpticalPsf {
        lam_over_diam: f64,
        #[serde(default)]
        obscuration: f64,
        #[serde(default)]
        defocus: f64,
        #[serde(default)]
        astig1: f64,
        #[serde(default)]
        astig2: f64,
        #[serde(default)]
        coma1: f64,
        #[serde(default)]
        coma2: f64,
    },
    Sum {
        items: Vec<ProfileConfig>,
    },
    Convolution {
        items: Vec<ProfileConfig>,
    },
}

/// Shear in any of the supported parameterizations.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ShearConfig {
    QBeta { q: f64, beta: Angle },
    G1G2 { g1: f64, g2: f64 },
    E1E2 { e1: f64, e2: f64 },
    Eta1Eta2 { eta1: f64, eta2: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum NoiseConfig {
    #[serde(rename = "CCD")]
    Ccd {
        #[serde(default)]
        sky_level: f64,
        #[serde(default = "unit_gain")]
        gain: f64,
        #[serde(default)]
        read_noise: f64,
    },
    Gaussian {
        sigma: f64,
    },
}

fn unit_gain() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageConfig {
    /// Side length in pixels; `xsize`/`ysize` override it per axis.
    pub size: usize,
    #[serde(default)]
    pub xsize: Option<usize>,
    #[serde(default)]
    pub ysize: Option<usize>,
    /// Arcseconds per pixel.
    pub pixel_scale: f64,
    /// Shear applied to the WCS Jacobian.
    #[serde(default)]
    pub shear: Option<ShearConfig>,
    /// Profile center relative to the true center, in pixels.
    #[serde(default)]
    pub offset: Option<[f64; 2]>,
    #[serde(default)]
    pub noise: Option<NoiseConfig>,
    pub random_seed: u64,
    #[serde(default)]
    pub render: RenderOptions,
}

/// A validated scene ready to draw.
#[derive(Debug, Clone)]
pub struct SceneSetup {
    pub scene: Scene,
    pub grid: RenderGrid,
    pub noise: Option<NoiseModel>,
    pub seed: u64,
    pub options: RenderOptions,
}

impl SceneConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| SimError::invalid("scene", err.to_string()))
    }

    /// Build every profile, the grid and the noise model.
    pub fn build(&self) -> Result<SceneSetup> {
        let galaxy = self.gal.build()?;
        let psf = self.psf.build()?;
        let grid = self.image.grid()?;
        let noise = self.image.noise.map(|n| n.build()).transpose()?;
        info!(
            "Built scene: {} image at {} arcsec/pixel, seed {}",
            grid.size(),
            self.image.pixel_scale,
            self.image.random_seed
        );
        Ok(SceneSetup {
            scene: Scene::new(galaxy, psf),
            grid,
            noise,
            seed: self.image.random_seed,
            options: self.image.render.clone(),
        })
    }
}

impl SceneSetup {
    /// Draw with a fresh stream seeded from the description.
    pub fn render(&self) -> Result<SceneImages> {
        let mut stream = RandomStream::new(self.seed);
        self.scene
            .render(&self.grid, self.noise.as_ref(), &mut stream, &self.options)
    }
}

impl ProfileConfig {
    pub fn build(&self) -> Result<Profile> {
        let flux = self.flux.unwrap_or(1.0);
        let mut profile = match &self.kind {
            ProfileKind::Sersic {
                n,
                half_light_radius,
                scale_radius,
            } => match (half_light_radius, scale_radius) {
                (Some(hlr), None) => Sersic::from_half_light_radius(*n, *hlr, flux)?.into(),
                (None, Some(r0)) => Sersic::from_scale_radius(*n, *r0, flux)?.into(),
                _ => {
                    return Err(SimError::invalid(
                        "half_light_radius",
                        "exactly one of half_light_radius and scale_radius is required",
                    ))
                }
            },
            ProfileKind::Kolmogorov { fwhm } => Kolmogorov::new(*fwhm, flux)?.into(),
            ProfileKind::OpticalPsf {
                lam_over_diam,
                obscuration,
                defocus,
                astig1,
                astig2,
                coma1,
                coma2,
            } => {
                let aberrations = Aberrations {
                    defocus: *defocus,
                    astig1: *astig1,
                    astig2: *astig2,
                    coma1: *coma1,
                    coma2: *coma2,
                };
                OpticalPsf::new(*lam_over_diam, *obscuration, aberrations, flux)?.into()
            }
            ProfileKind::Sum { items } => {
                let sum = Profile::sum(build_items(items)?)?;
                match self.flux {
                    Some(f) => sum.with_flux(f)?,
                    None => sum,
                }
            }
            ProfileKind::Convolution { items } => {
                let conv = Profile::convolve(build_items(items)?)?;
                match self.flux {
                    Some(f) => conv.with_flux(f)?,
                    None => conv,
                }
            }
        };

        if let Some(scale) = self.dilate {
            profile = profile.dilated(scale)?;
        }
        if let Some(ellip) = &self.ellip {
            profile = profile.sheared(&ellip.build()?)?;
        }
        if let Some(angle) = self.rotate {
            profile = profile.rotated(angle)?;
        }
        if let Some(mu) = self.magnify {
            profile = profile.magnified(mu)?;
        }
        if let Some(shear) = &self.shear {
            profile = profile.sheared(&shear.build()?)?;
        }
        if let Some([dx, dy]) = self.shift {
            profile = profile.shifted(dx, dy)?;
        }
        Ok(profile)
    }
}

fn build_items(items: &[ProfileConfig]) -> Result<Vec<Profile>> {
    items.iter().map(ProfileConfig::build).collect()
}

impl ShearConfig {
    pub fn build(&self) -> Result<Shear> {
        match *self {
            ShearConfig::QBeta { q, beta } => Shear::from_q_beta(q, beta),
            ShearConfig::G1G2 { g1, g2 } => Shear::from_g1g2(g1, g2),
            ShearConfig::E1E2 { e1, e2 } => Shear::from_e1e2(e1, e2),
            ShearConfig::Eta1Eta2 { eta1, eta2 } => Shear::from_eta1eta2(eta1, eta2),
        }
    }
}

impl NoiseConfig {
    pub fn build(&self) -> Result<NoiseModel> {
        Ok(match *self {
            NoiseConfig::Ccd {
                sky_level,
                gain,
                read_noise,
            } => CcdNoise::new(sky_level, gain, read_noise)?.into(),
            NoiseConfig::Gaussian { sigma } => GaussianNoise::new(sigma)?.into(),
        })
    }
}

impl ImageConfig {
    pub fn size(&self) -> ImageSize {
        ImageSize::from_width_height(
            self.xsize.unwrap_or(self.size),
            self.ysize.unwrap_or(self.size),
        )
    }

    pub fn grid(&self) -> Result<RenderGrid> {
        let wcs = match &self.shear {
            Some(shear) => WorldTransform::from_pixel_scale_and_shear(self.pixel_scale, &shear.build()?)?,
            None => WorldTransform::from_pixel_scale(self.pixel_scale)?,
        };
        let grid = RenderGrid::new(self.size(), wcs)?;
        match self.offset {
            Some([dx, dy]) => grid.with_offset(dx, dy),
            None => Ok(grid),
        }
    }
}
