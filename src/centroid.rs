//! Observed star positions on the detector.
//!
//! Pixel coordinates use the 0-indexed convention: the centre of the first
//! pixel is at `(0, 0)`. The only place the 1-indexed FITS convention appears
//! is [`TanSipWcs::undistort_pixel`](crate::wcs::TanSipWcs::undistort_pixel) and
//! its inverse.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Centroid {
    /// Position along columns (image x-axis), pixels.
    pub x: f64,
    /// Position along rows (image y-axis), pixels.
    pub y: f64,
}

impl Centroid {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Offset of this centroid from a pixel origin such as CRPIX.
    pub fn offset_from(&self, origin: [f64; 2]) -> (f64, f64) {
        (self.x - origin[0], self.y - origin[1])
    }

    /// Euclidean distance to another pixel position.
    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        (self.x - x).hypot(self.y - y)
    }
}
