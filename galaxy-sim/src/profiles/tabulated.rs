//! Unit-flux surface brightness tables with bilinear interpolation.
//!
//! Profiles without a convenient closed form (Kolmogorov, the aberrated
//! optical PSF) are computed once on a fine grid and looked up afterwards.

use ndarray::Array2;

use crate::error::{Result, SimError};

/// Fraction of the table's flux used to define its support radius.
pub const SUPPORT_FLUX_FRACTION: f64 = 0.999;

/// A square table of intensities normalized to unit total flux.
///
/// Element `[row, col]` holds the intensity at
/// `x = (col - center) * spacing`, `y = (row - center) * spacing`.
/// Values outside the table are zero.
#[derive(Debug, Clone)]
pub struct LookupImage {
    values: Array2<f64>,
    spacing: f64,
    center: f64,
    support_radius: f64,
}

impl LookupImage {
    /// Normalize `values` to unit flux and wrap them.
    ///
    /// The table center is index `size / 2` along each axis.
    pub fn new(values: Array2<f64>, spacing: f64) -> Result<Self> {
        let (rows, cols) = values.dim();
        if rows != cols || rows < 2 {
            return Err(SimError::invalid(
                "lookup_table",
                format!("table must be square with at least 2 samples, got {rows}x{cols}"),
            ));
        }
        let total = values.sum() * spacing * spacing;
        if !(total.is_finite() && total > 0.0) {
            return Err(SimError::invalid(
                "lookup_table",
                format!("table flux must be finite and positive, got {total}"),
            ));
        }

        let values = values.mapv(|v| v / total);
        let center = (rows / 2) as f64;
        let support_radius = enclosed_radius(&values, spacing, center, SUPPORT_FLUX_FRACTION);

        Ok(Self {
            values,
            spacing,
            center,
            support_radius,
        })
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    /// Radius enclosing [`SUPPORT_FLUX_FRACTION`] of the flux.
    pub fn support_radius(&self) -> f64 {
        self.support_radius
    }

    /// Bilinear lookup at `(x, y)`.
    pub fn evaluate(&self, x: f64, y: f64) -> f64 {
        bilinear(&self.values, x / self.spacing + self.center, y / self.spacing + self.center)
    }
}

/// Bilinear interpolation at fractional index `(fx, fy)` = `(col, row)`.
///
/// Returns zero outside the array.
pub(crate) fn bilinear(values: &Array2<f64>, fx: f64, fy: f64) -> f64 {
    let (rows, cols) = values.dim();
    if !(fx >= 0.0 && fy >= 0.0) {
        return 0.0;
    }
    let x0 = fx.floor();
    let y0 = fy.floor();
    let (c0, r0) = (x0 as usize, y0 as usize);
    if c0 >= cols || r0 >= rows {
        return 0.0;
    }
    let tx = fx - x0;
    let ty = fy - y0;

    let at = |r: usize, c: usize| -> f64 {
        if r < rows && c < cols {
            values[[r, c]]
        } else {
            0.0
        }
    };

    (1.0 - ty) * ((1.0 - tx) * at(r0, c0) + tx * at(r0, c0 + 1))
        + ty * ((1.0 - tx) * at(r0 + 1, c0) + tx * at(r0 + 1, c0 + 1))
}

/// Smallest radius whose enclosed table flux reaches `fraction`.
fn enclosed_radius(values: &Array2<f64>, spacing: f64, center: f64, fraction: f64) -> f64 {
    let (rows, cols) = values.dim();
    let bins = rows.max(cols);
    let mut histogram = vec![0.0; bins + 1];
    let mut total = 0.0;

    for ((r, c), &v) in values.indexed_iter() {
        let radius = (r as f64 - center).hypot(c as f64 - center);
        let bin = (radius.ceil() as usize).min(bins);
        histogram[bin] += v;
        total += v;
    }

    let target = fraction * total;
    let mut acc = 0.0;
    for (bin, value) in histogram.iter().enumerate() {
        acc += value;
        if acc >= target {
            return bin.max(1) as f64 * spacing;
        }
    }
    bins as f64 * spacing
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn gaussian_table(size: usize, spacing: f64, sigma: f64) -> Array2<f64> {
        let c = (size / 2) as f64;
        Array2::from_shape_fn((size, size), |(r, col)| {
            let x = (col as f64 - c) * spacing;
            let y = (r as f64 - c) * spacing;
            (-(x * x + y * y) / (2.0 * sigma * sigma)).exp()
        })
    }

    #[test]
    fn test_normalized_to_unit_flux() {
        let table = LookupImage::new(gaussian_table(64, 0.1, 0.5), 0.1).unwrap();
        let peak = table.evaluate(0.0, 0.0);
        // 1 / (2 pi sigma^2)
        assert_relative_eq!(peak, 1.0 / (2.0 * std::f64::consts::PI * 0.25), max_relative = 1e-3);
    }

    #[test]
    fn test_interpolates_between_nodes() {
        let mut values = Array2::zeros((4, 4));
        values[[2, 2]] = 1.0;
        values[[2, 3]] = 3.0;
        let table = LookupImage::new(values, 1.0).unwrap();
        assert_relative_eq!(table.evaluate(0.5, 0.0), 0.5, epsilon = 1e-12);
        assert_relative_eq!(table.evaluate(0.5, 0.5), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_outside() {
        let table = LookupImage::new(gaussian_table(16, 0.1, 0.2), 0.1).unwrap();
        assert_eq!(table.evaluate(5.0, 0.0), 0.0);
        assert_eq!(table.evaluate(0.0, -5.0), 0.0);
        assert_eq!(table.evaluate(f64::NAN, 0.0), 0.0);
    }

    #[test]
    fn test_support_radius_of_gaussian() {
        let table = LookupImage::new(gaussian_table(256, 0.05, 1.0), 0.05).unwrap();
        // 99.9% of a 2D Gaussian lies within sigma * sqrt(2 ln 1000) ~ 3.72 sigma
        assert!((table.support_radius() - 3.72).abs() < 0.1);
    }

    #[test]
    fn test_rejects_bad_tables() {
        assert!(LookupImage::new(Array2::zeros((8, 8)), 0.1).is_err());
        assert!(LookupImage::new(Array2::ones((8, 4)), 0.1).is_err());
    }
}
