//! Pixel rasters with integer bounds.
//!
//! Bounds are inclusive and 1-based by default: a 64x64 image spans
//! `x, y ∈ [1, 64]` and its true center is `(32.5, 32.5)`. Pixel `(x, y)`
//! lives at `array[[y - ymin, x - xmin]]`; the center of a pixel is at its
//! integer coordinate.

use std::fmt;

use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: usize,
    pub height: usize,
}

impl ImageSize {
    pub fn from_width_height(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn square(size: usize) -> Self {
        Self::from_width_height(size, size)
    }

    /// Zeros with shape `(height, width)` (rows first).
    pub fn empty_array(&self) -> Array2<f64> {
        Array2::zeros((self.height, self.width))
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    pub fn to_tuple(&self) -> (usize, usize) {
        (self.width, self.height)
    }
}

impl From<(usize, usize)> for ImageSize {
    fn from(dimensions: (usize, usize)) -> Self {
        Self::from_width_height(dimensions.0, dimensions.1)
    }
}

impl From<ImageSize> for (usize, usize) {
    fn from(size: ImageSize) -> Self {
        size.to_tuple()
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Inclusive integer pixel bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bounds {
    pub xmin: i64,
    pub xmax: i64,
    pub ymin: i64,
    pub ymax: i64,
}

impl Bounds {
    pub fn new(xmin: i64, xmax: i64, ymin: i64, ymax: i64) -> Result<Self> {
        if xmax < xmin || ymax < ymin {
            return Err(SimError::invalid(
                "bounds",
                format!("empty bounds x=[{xmin}, {xmax}] y=[{ymin}, {ymax}]"),
            ));
        }
        Ok(Self {
            xmin,
            xmax,
            ymin,
            ymax,
        })
    }

    /// Bounds `[1, width] x [1, height]`.
    pub fn from_size(size: ImageSize) -> Result<Self> {
        Self::new(1, size.width as i64, 1, size.height as i64)
    }

    pub fn width(&self) -> usize {
        (self.xmax - self.xmin + 1) as usize
    }

    pub fn height(&self) -> usize {
        (self.ymax - self.ymin + 1) as usize
    }

    pub fn size(&self) -> ImageSize {
        ImageSize::from_width_height(self.width(), self.height())
    }

    /// Geometric center; half-integer along even dimensions.
    pub fn true_center(&self) -> (f64, f64) {
        (
            0.5 * (self.xmin + self.xmax) as f64,
            0.5 * (self.ymin + self.ymax) as f64,
        )
    }

    /// Pixel nearest the true center, rounding up on even dimensions.
    pub fn center(&self) -> (i64, i64) {
        (
            self.xmin + (self.xmax - self.xmin + 1) / 2,
            self.ymin + (self.ymax - self.ymin + 1) / 2,
        )
    }

    pub fn shifted(&self, dx: i64, dy: i64) -> Bounds {
        Bounds {
            xmin: self.xmin + dx,
            xmax: self.xmax + dx,
            ymin: self.ymin + dy,
            ymax: self.ymax + dy,
        }
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        (self.xmin..=self.xmax).contains(&x) && (self.ymin..=self.ymax).contains(&y)
    }

    /// Overlap of two bounds, if any.
    pub fn intersection(&self, other: &Bounds) -> Option<Bounds> {
        Bounds::new(
            self.xmin.max(other.xmin),
            self.xmax.min(other.xmax),
            self.ymin.max(other.ymin),
            self.ymax.min(other.ymax),
        )
        .ok()
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[{}:{}, {}:{}]",
            self.xmin, self.xmax, self.ymin, self.ymax
        )
    }
}

/// A floating-point raster placed on integer bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    array: Array2<f64>,
    bounds: Bounds,
}

impl Image {
    /// Zero image of `size` with bounds starting at `(1, 1)`.
    pub fn new(size: ImageSize) -> Result<Self> {
        let bounds = Bounds::from_size(size)?;
        Ok(Self {
            array: size.empty_array(),
            bounds,
        })
    }

    /// Wrap an array; its shape must match `bounds`.
    pub fn from_array(array: Array2<f64>, bounds: Bounds) -> Result<Self> {
        if array.dim() != (bounds.height(), bounds.width()) {
            return Err(SimError::invalid(
                "image",
                format!(
                    "array shape {:?} does not match bounds {bounds}",
                    array.dim()
                ),
            ));
        }
        Ok(Self { array, bounds })
    }

    pub fn array(&self) -> &Array2<f64> {
        &self.array
    }

    pub fn array_mut(&mut self) -> &mut Array2<f64> {
        &mut self.array
    }

    pub fn into_array(self) -> Array2<f64> {
        self.array
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn size(&self) -> ImageSize {
        self.bounds.size()
    }

    pub fn true_center(&self) -> (f64, f64) {
        self.bounds.true_center()
    }

    /// Move the bounds so that [`Bounds::center`] lands on `(x, y)`.
    pub fn set_center(&mut self, x: i64, y: i64) {
        let (cx, cy) = self.bounds.center();
        self.bounds = self.bounds.shifted(x - cx, y - cy);
    }

    /// Move the bounds so the lower-left pixel is `(x, y)`.
    pub fn set_origin(&mut self, x: i64, y: i64) {
        self.bounds = self.bounds.shifted(x - self.bounds.xmin, y - self.bounds.ymin);
    }

    /// Value at pixel `(x, y)`, or `None` outside the bounds.
    pub fn get(&self, x: i64, y: i64) -> Option<f64> {
        self.bounds
            .contains(x, y)
            .then(|| self.array[[(y - self.bounds.ymin) as usize, (x - self.bounds.xmin) as usize]])
    }

    pub fn sum(&self) -> f64 {
        self.array.sum()
    }

    /// Add `stamp` into this image where their bounds overlap.
    ///
    /// Returns the overlap, or `None` if the stamp falls entirely outside.
    pub fn add_stamp(&mut self, stamp: &Image) -> Option<Bounds> {
        let overlap = self.bounds.intersection(&stamp.bounds)?;
        let dst = self.view_range(&overlap);
        let src = stamp.view_range(&overlap);
        let mut target = self.array.slice_mut(s![dst.0..dst.1, dst.2..dst.3]);
        target += &stamp.array.slice(s![src.0..src.1, src.2..src.3]);
        Some(overlap)
    }

    /// Row and column ranges of `region` inside this image's array.
    fn view_range(&self, region: &Bounds) -> (usize, usize, usize, usize) {
        let r0 = (region.ymin - self.bounds.ymin) as usize;
        let c0 = (region.xmin - self.bounds.xmin) as usize;
        (r0, r0 + region.height(), c0, c0 + region.width())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_size_display_and_array() {
        let size = ImageSize::from_width_height(640, 480);
        assert_eq!(format!("{}", size), "640x480");
        assert_eq!(size.empty_array().dim(), (480, 640));
        assert_eq!(size.pixel_count(), 307_200);
        let tuple: (usize, usize) = size.into();
        assert_eq!(ImageSize::from(tuple), size);
    }

    #[test]
    fn test_true_center_even_and_odd() {
        let even = Bounds::from_size(ImageSize::square(64)).unwrap();
        assert_eq!(even.true_center(), (32.5, 32.5));
        assert_eq!(even.center(), (33, 33));

        let odd = Bounds::from_size(ImageSize::square(97)).unwrap();
        assert_eq!(odd.true_center(), (49.0, 49.0));
        assert_eq!(odd.center(), (49, 49));
    }

    #[test]
    fn test_set_center_moves_bounds() {
        let mut stamp = Image::new(ImageSize::square(5)).unwrap();
        stamp.set_center(100, 200);
        assert_eq!(stamp.bounds().center(), (100, 200));
        assert_eq!(stamp.bounds().xmin, 98);
        assert_eq!(stamp.bounds().ymax, 202);
    }

    #[test]
    fn test_set_origin_keeps_pixels() {
        let array = Array2::from_shape_fn((3, 4), |(r, c)| (10 * r + c) as f64);
        let bounds = Bounds::from_size(ImageSize::from_width_height(4, 3)).unwrap();
        let mut image = Image::from_array(array.clone(), bounds).unwrap();
        image.set_origin(-2, 7);
        assert_eq!(*image.bounds(), Bounds::new(-2, 1, 7, 9).unwrap());
        assert_eq!(image.get(-2, 7), Some(0.0));
        assert_eq!(image.get(1, 9), Some(23.0));
        assert_eq!(image.get(2, 9), None);
        assert_eq!(image.into_array(), array);
    }

    #[test]
    fn test_intersection() {
        let a = Bounds::new(1, 10, 1, 10).unwrap();
        let b = Bounds::new(8, 20, -5, 3).unwrap();
        assert_eq!(a.intersection(&b), Some(Bounds::new(8, 10, 1, 3).unwrap()));
        let c = Bounds::new(11, 12, 1, 2).unwrap();
        assert_eq!(a.intersection(&c), None);
    }

    #[test]
    fn test_add_stamp_partial_overlap() {
        let mut frame = Image::new(ImageSize::square(10)).unwrap();
        let mut stamp =
            Image::from_array(Array2::ones((3, 3)), Bounds::new(1, 3, 1, 3).unwrap()).unwrap();
        stamp.set_center(10, 1);

        let overlap = frame.add_stamp(&stamp).unwrap();
        assert_eq!(overlap, Bounds::new(9, 10, 1, 2).unwrap());
        assert_eq!(frame.sum(), 4.0);
        assert_eq!(frame.get(10, 1), Some(1.0));
        assert_eq!(frame.get(8, 1), Some(0.0));
        assert_eq!(frame.get(11, 1), None);

        stamp.set_center(50, 50);
        assert!(frame.add_stamp(&stamp).is_none());
    }

    #[test]
    fn test_from_array_shape_mismatch() {
        let bounds = Bounds::new(1, 4, 1, 3).unwrap();
        assert!(Image::from_array(Array2::zeros((3, 4)), bounds).is_ok());
        assert!(Image::from_array(Array2::zeros((4, 3)), bounds).is_err());
        assert!(Bounds::new(2, 1, 1, 1).is_err());
    }
}
