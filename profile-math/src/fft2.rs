//! Two-dimensional FFT helpers on `ndarray` grids.
//!
//! Arrays are indexed `[row, col]` = `[y, x]`. Transforms are unnormalized in
//! both directions (the `rustfft` convention); [`convolve_cyclic`] applies the
//! `1/N` factor itself. Rows and columns are transformed in parallel, but
//! every 1D transform is independent so results are bit-identical across
//! thread counts.

use ndarray::parallel::prelude::*;
use ndarray::{Array2, ArrayViewMut1, Axis};
use num_complex::Complex64;
use rustfft::{Fft, FftDirection, FftPlanner};

/// In-place 2D FFT.
pub fn fft2(data: &mut Array2<Complex64>, direction: FftDirection) {
    let (rows, cols) = data.dim();
    if rows == 0 || cols == 0 {
        return;
    }

    let mut planner = FftPlanner::new();
    let row_fft = planner.plan_fft(cols, direction);
    let col_fft = planner.plan_fft(rows, direction);

    data.axis_iter_mut(Axis(0))
        .into_par_iter()
        .for_each(|mut row| transform_lane(&mut row, row_fft.as_ref()));

    data.axis_iter_mut(Axis(1))
        .into_par_iter()
        .for_each(|mut col| transform_lane(&mut col, col_fft.as_ref()));
}

fn transform_lane(lane: &mut ArrayViewMut1<Complex64>, fft: &dyn Fft<f64>) {
    let mut buffer = lane.to_vec();
    fft.process(&mut buffer);
    lane.iter_mut().zip(buffer).for_each(|(dst, src)| *dst = src);
}

/// Move the zero-frequency (or zero-lag) element from index 0 to the center.
///
/// Element `[0, 0]` lands at `[rows / 2, cols / 2]`.
pub fn fftshift<T: Clone>(data: &Array2<T>) -> Array2<T> {
    let (rows, cols) = data.dim();
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        data[[(r + rows - rows / 2) % rows, (c + cols - cols / 2) % cols]].clone()
    })
}

/// Inverse of [`fftshift`]: element `[rows / 2, cols / 2]` lands at `[0, 0]`.
pub fn ifftshift<T: Clone>(data: &Array2<T>) -> Array2<T> {
    let (rows, cols) = data.dim();
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        data[[(r + rows / 2) % rows, (c + cols / 2) % cols]].clone()
    })
}

/// Smallest size `>= n` of the form `2^k` or `3 * 2^k`.
pub fn good_fft_size(n: usize) -> usize {
    let n = n.max(2);
    let pow2 = n.next_power_of_two();
    let three_pow2 = 3 * (pow2 / 4);
    if three_pow2 >= n {
        three_pow2
    } else {
        pow2
    }
}

/// Cyclic convolution of `image` with each of `kernels`.
///
/// Every kernel must have its origin at index `[0, 0]` (wrapped layout) and
/// the same shape as `image`. The result keeps `image`'s layout, so a
/// centered image stays centered. The sum of the output equals the sum of
/// `image` times the sums of the kernels.
///
/// # Panics
/// Panics if a kernel shape differs from the image shape.
pub fn convolve_cyclic(image: &Array2<f64>, kernels: &[Array2<f64>]) -> Array2<f64> {
    if kernels.is_empty() {
        return image.clone();
    }

    let shape = image.dim();
    let mut spectrum = image.mapv(|v| Complex64::new(v, 0.0));
    fft2(&mut spectrum, FftDirection::Forward);

    for kernel in kernels {
        assert_eq!(kernel.dim(), shape, "kernel shape must match image shape");
        let mut kernel_spectrum = kernel.mapv(|v| Complex64::new(v, 0.0));
        fft2(&mut kernel_spectrum, FftDirection::Forward);
        spectrum.zip_mut_with(&kernel_spectrum, |s, k| *s *= *k);
    }

    fft2(&mut spectrum, FftDirection::Inverse);
    let norm = 1.0 / (shape.0 * shape.1) as f64;
    spectrum.mapv(|v| v.re * norm)
}
