//! A galaxy seen through a PSF.

use log::info;

use crate::error::Result;
use crate::noise::NoiseModel;
use crate::profiles::{Profile, SurfaceBrightness};
use crate::random::RandomStream;
use crate::render::{draw, RenderGrid, RenderOptions, RenderedImage};

/// The galaxy and PSF profile trees.
///
/// The observed image is `galaxy ⊛ psf`; the PSF is also drawn alone as a
/// sidecar image.
#[derive(Debug, Clone)]
pub struct Scene {
    galaxy: Profile,
    psf: Profile,
}

/// Output of [`Scene::render`].
#[derive(Debug, Clone, PartialEq)]
pub struct SceneImages {
    /// Galaxy convolved with the PSF, noise applied.
    pub galaxy: RenderedImage,
    /// PSF alone, noiseless.
    pub psf: RenderedImage,
}

impl Scene {
    pub fn new(galaxy: Profile, psf: Profile) -> Self {
        Self { galaxy, psf }
    }

    pub fn galaxy(&self) -> &Profile {
        &self.galaxy
    }

    pub fn psf(&self) -> &Profile {
        &self.psf
    }

    /// The profile drawn for the galaxy image.
    pub fn observed(&self) -> Result<Profile> {
        Profile::convolve(vec![self.galaxy.clone(), self.psf.clone()])
    }

    /// Draw the observed galaxy (with noise, if any) and the PSF.
    ///
    /// The two draws run concurrently. All noise draws come from `stream` in
    /// row-major order.
    pub fn render(
        &self,
        grid: &RenderGrid,
        noise: Option<&NoiseModel>,
        stream: &mut RandomStream,
        options: &RenderOptions,
    ) -> Result<SceneImages> {
        let observed = self.observed()?;
        info!(
            "Rendering {} scene: galaxy flux {:.4}, PSF flux {:.4}",
            grid.size(),
            self.galaxy.flux(),
            self.psf.flux()
        );

        let (galaxy, psf) = rayon::join(
            || draw(&observed, grid, options),
            || draw(&self.psf, grid, options),
        );
        let (mut galaxy, psf) = (galaxy?, psf?);
        if let Some(model) = noise {
            model.apply(galaxy.image.array_mut(), stream)?;
        }

        Ok(SceneImages { galaxy, psf })
    }
}
