//! Evaluating a profile tree onto a fine grid.
//!
//! Tabulated leaves are integrated over each fine cell with `s x s` midpoint
//! sub-samples. Sersic leaves get exact cell fluxes near their center and
//! more sub-samples where the profile is steep compared to a cell. Sums add
//! grids; convolutions sample their kernels in wrapped
//! layout (displacement zero at index `[0, 0]`) and combine them with the
//! primary by cyclic FFT convolution. Cells are computed independently, so the
//! parallel evaluation is deterministic.

use nalgebra::Vector2;
use ndarray::{s, Array2, Zip};
use profile_math::{convolve_cyclic, Affine2};

use crate::error::{Result, SimError};
use crate::profiles::{Profile, Sersic, SurfaceBrightness};

/// Sersic cells whose center lies within this many cell diagonals of the
/// profile center are integrated exactly.
const EXACT_CORE_DIAGONALS: f64 = 3.0;
/// Largest change of `ln I` across one midpoint sub-sample of a Sersic cell.
const MAX_LOG_STEP: f64 = 0.05;
const MAX_SUBSAMPLES: usize = 16;

/// Placement of a profile node in pixel coordinates.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Frame {
    /// Node coordinates to pixel coordinates.
    pub to_pixel: Affine2,
    pub flux_scale: f64,
}

/// How fine-grid indices map to pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Layout {
    /// Cell `[0, 0]` has its lower-left corner at `(x0, y0)`.
    Centered { x0: f64, y0: f64 },
    /// Cell `[r, c]` is centered on the displacement
    /// `(wrap(c) * step, wrap(r) * step)`.
    Wrapped,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct FineGrid {
    pub rows: usize,
    pub cols: usize,
    /// Cell side in pixels (`1 / oversampling`).
    pub step: f64,
    pub subsamples: usize,
    pub layout: Layout,
}

fn wrap(index: usize, n: usize) -> f64 {
    if index < n.div_ceil(2) {
        index as f64
    } else {
        index as f64 - n as f64
    }
}

impl FineGrid {
    fn wrapped(&self) -> FineGrid {
        FineGrid {
            layout: Layout::Wrapped,
            ..*self
        }
    }

    /// Lower-left corner of cell `[r, c]` in pixel coordinates.
    fn cell_corner(&self, r: usize, c: usize) -> (f64, f64) {
        match self.layout {
            Layout::Centered { x0, y0 } => (x0 + c as f64 * self.step, y0 + r as f64 * self.step),
            Layout::Wrapped => (
                (wrap(c, self.cols) - 0.5) * self.step,
                (wrap(r, self.rows) - 0.5) * self.step,
            ),
        }
    }
}

/// Sample `profile`, placed by `frame`, onto `grid`.
pub(crate) fn sample(profile: &Profile, frame: &Frame, grid: &FineGrid) -> Result<Array2<f64>> {
    match profile {
        Profile::Transformed(t) => {
            let child = Frame {
                to_pixel: t.map().then(&frame.to_pixel),
                flux_scale: frame.flux_scale * t.flux_scale(),
            };
            sample(t.inner(), &child, grid)
        }
        Profile::Sum(sum) => {
            let mut total = Array2::zeros((grid.rows, grid.cols));
            for child in sum.children() {
                total += &sample(child, frame, grid)?;
            }
            Ok(total)
        }
        Profile::Convolution(conv) => {
            let primary = sample(conv.primary(), frame, grid)?;
            let kernel_frame = Frame {
                to_pixel: frame.to_pixel.without_offset(),
                flux_scale: 1.0,
            };
            let kernel_grid = grid.wrapped();
            let kernels = conv
                .kernels()
                .iter()
                .map(|k| sample(k, &kernel_frame, &kernel_grid))
                .collect::<Result<Vec<_>>>()?;
            Ok(convolve_cyclic(&primary, &kernels))
        }
        leaf => sample_leaf(leaf, frame, grid),
    }
}

fn sample_leaf(leaf: &Profile, frame: &Frame, grid: &FineGrid) -> Result<Array2<f64>> {
    let to_leaf = frame
        .to_pixel
        .inverse()
        .ok_or(SimError::SingularTransform {
            determinant: frame.to_pixel.determinant(),
        })?;
    if let Profile::Sersic(sersic) = leaf {
        return Ok(sample_sersic(sersic, &to_leaf, frame.flux_scale, grid));
    }

    let density_scale = frame.flux_scale * to_leaf.determinant().abs();
    let sub = grid.subsamples.max(1);
    let mut out = Array2::zeros((grid.rows, grid.cols));
    Zip::indexed(&mut out).par_for_each(|(r, c), value| {
        let corner = grid.cell_corner(r, c);
        *value = density_scale * midpoint(leaf, &to_leaf, corner, grid.step, sub);
    });
    Ok(out)
}

fn sample_sersic(sersic: &Sersic, to_leaf: &Affine2, flux_scale: f64, grid: &FineGrid) -> Array2<f64> {
    let density_scale = flux_scale * to_leaf.determinant().abs();
    let step = grid.step;
    let base = grid.subsamples.max(1);
    let leaf_point = |x: f64, y: f64| {
        let p = to_leaf.apply(Vector2::new(x, y));
        (p.x, p.y)
    };

    let mut out = Array2::zeros((grid.rows, grid.cols));
    Zip::indexed(&mut out).par_for_each(|(r, c), value| {
        let (x0, y0) = grid.cell_corner(r, c);
        let corners = [
            leaf_point(x0, y0),
            leaf_point(x0 + step, y0),
            leaf_point(x0 + step, y0 + step),
            leaf_point(x0, y0 + step),
        ];
        let diagonal = (corners[2].0 - corners[0].0)
            .hypot(corners[2].1 - corners[0].1)
            .max((corners[3].0 - corners[1].0).hypot(corners[3].1 - corners[1].1));
        let (cx, cy) = leaf_point(x0 + 0.5 * step, y0 + 0.5 * step);
        let distance = cx.hypot(cy);

        *value = if distance < EXACT_CORE_DIAGONALS * diagonal {
            flux_scale * sersic.polygon_flux(&corners)
        } else {
            let sub = sersic_subsamples(sersic, distance - 0.5 * diagonal, diagonal, base);
            density_scale * midpoint(sersic, to_leaf, (x0, y0), step, sub)
        };
    });
    out
}

/// Sub-samples per axis for a Sersic cell whose nearest point lies at
/// `nearest` from the center.
///
/// Profiles with `n > 1` steepen toward the center; elsewhere `base` is
/// already enough.
fn sersic_subsamples(sersic: &Sersic, nearest: f64, diagonal: f64, base: usize) -> usize {
    if sersic.n() <= 1.0 {
        return base;
    }
    let wanted = (diagonal * sersic.log_slope(nearest) / MAX_LOG_STEP).ceil();
    if wanted.is_finite() {
        (wanted as usize).min(MAX_SUBSAMPLES).max(base)
    } else {
        base
    }
}

/// Integral over the fine cell with lower-left `corner`, in leaf units of
/// intensity times pixel area.
fn midpoint<P: SurfaceBrightness>(
    leaf: &P,
    to_leaf: &Affine2,
    corner: (f64, f64),
    step: f64,
    sub: usize,
) -> f64 {
    let (x0, y0) = corner;
    let sub_step = step / sub as f64;
    let mut acc = 0.0;
    for j in 0..sub {
        let y = y0 + (j as f64 + 0.5) * sub_step;
        for i in 0..sub {
            let x = x0 + (i as f64 + 0.5) * sub_step;
            let p = to_leaf.apply(Vector2::new(x, y));
            acc += leaf.evaluate(p.x, p.y);
        }
    }
    acc * sub_step * sub_step
}

/// Sum `factor x factor` blocks of `fine`, starting at `(row0, col0)`, into
/// a `rows x cols` array.
pub(crate) fn bin(
    fine: &Array2<f64>,
    row0: usize,
    col0: usize,
    rows: usize,
    cols: usize,
    factor: usize,
) -> Array2<f64> {
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let top = row0 + r * factor;
        let left = col0 + c * factor;
        fine.slice(s![top..top + factor, left..left + factor]).sum()
    })
}
