//! Sampling decisions made before any profile is evaluated.

use log::debug;
use profile_math::affine::singular_values;
use profile_math::good_fft_size;

use super::RenderOptions;
use crate::error::{Result, SimError};
use crate::profiles::{Profile, SurfaceBrightness};
use crate::wcs::WorldTransform;

/// Fine-grid geometry for one render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RenderPlan {
    /// Fine cells per pixel along each axis.
    pub oversampling: usize,
    /// Fine grid shape `(rows, cols)`.
    pub fine_shape: (usize, usize),
    /// Fine cells between the grid edge and the image region `(rows, cols)`.
    pub padding: (usize, usize),
}

/// Slack for floating-point noise when rounding oversampling factors up.
const ROUNDING_SLACK: f64 = 1e-9;

/// Smallest oversampling that resolves every component of `profile`.
pub(crate) fn required_oversampling(profile: &Profile, wcs: &WorldTransform) -> usize {
    let (_, largest_scale) = wcs.scale_range();
    let nyquist_pixels = profile.nyquist_spacing() / largest_scale;
    if !nyquist_pixels.is_finite() || nyquist_pixels <= 0.0 {
        return 1;
    }
    ((1.0 / nyquist_pixels - ROUNDING_SLACK).ceil() as usize).max(1)
}

/// How far convolution kernels can carry light, in the profile's own units.
///
/// Zero for trees without a convolution.
pub(crate) fn kernel_reach(profile: &Profile) -> f64 {
    match profile {
        Profile::Transformed(t) => {
            let (_, stretch) = singular_values(&t.map().matrix);
            kernel_reach(t.inner()) * stretch
        }
        Profile::Sum(sum) => sum.children().iter().map(kernel_reach).fold(0.0, f64::max),
        Profile::Convolution(conv) => {
            kernel_reach(conv.primary())
                + conv
                    .kernels()
                    .iter()
                    .map(|k| k.support_radius())
                    .sum::<f64>()
        }
        _ => 0.0,
    }
}

fn choose_oversampling(required: usize, options: &RenderOptions) -> Result<usize> {
    match options.oversampling {
        Some(chosen) if chosen < required || chosen == 0 => Err(SimError::AliasingRisk {
            required,
            chosen,
        }),
        Some(chosen) => Ok(chosen),
        None => {
            let chosen = required.max(options.min_oversampling).max(1);
            if chosen > options.max_oversampling {
                Err(SimError::AliasingRisk {
                    required,
                    chosen: options.max_oversampling,
                })
            } else {
                Ok(chosen)
            }
        }
    }
}

/// Fine cells along one axis, with padding capped by the FFT size limit.
fn axis_extent(
    image_cells: usize,
    wanted_padding: usize,
    limit: usize,
    axis: &str,
) -> Result<(usize, usize)> {
    if image_cells > limit {
        return Err(SimError::GridTooLarge {
            required: image_cells,
            limit,
        });
    }
    if wanted_padding == 0 {
        return Ok((image_cells, 0));
    }

    let size = good_fft_size(image_cells + 2 * wanted_padding);
    if size <= limit {
        return Ok((size, (size - image_cells) / 2));
    }

    let padding = (limit - image_cells) / 2;
    debug!(
        "Padding along {axis} capped at {padding} cells (wanted {wanted_padding}); \
         kernel light beyond the cap wraps around"
    );
    Ok((image_cells + 2 * padding, padding))
}

/// Decide oversampling and fine-grid shape for drawing `profile` on an image
/// of `width x height` pixels.
pub(crate) fn plan(
    profile: &Profile,
    wcs: &WorldTransform,
    width: usize,
    height: usize,
    options: &RenderOptions,
) -> Result<RenderPlan> {
    let required = required_oversampling(profile, wcs);
    let oversampling = choose_oversampling(required, options)?;

    let (smallest_scale, _) = wcs.scale_range();
    let reach_pixels = kernel_reach(profile) / smallest_scale;
    let wanted_padding = (reach_pixels * oversampling as f64).ceil() as usize;

    let (cols, pad_cols) = axis_extent(width * oversampling, wanted_padding, options.max_fft_size, "x")?;
    let (rows, pad_rows) = axis_extent(height * oversampling, wanted_padding, options.max_fft_size, "y")?;

    debug!(
        "Render plan: oversampling {oversampling} (required {required}), \
         fine grid {cols}x{rows}, padding {pad_cols}x{pad_rows}"
    );

    Ok(RenderPlan {
        oversampling,
        fine_shape: (rows, cols),
        padding: (pad_rows, pad_cols),
    })
}
