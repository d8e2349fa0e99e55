//! World coordinate systems: the linear TAN WCS and its SIP-distorted extension.
//!
//! Both implement [`Wcs`], which is all the match statistics need. The fitting
//! engine additionally relies on the concrete accessors of [`TanWcs`] (CRVAL,
//! CRPIX, CD, tangent-plane projection) and on
//! [`TanSipWcs::undistort_pixel`] for numerical inversion.

pub mod sip;
pub mod tan;

pub use sip::{eval_sip_poly, zero_coeffs, TanSipWcs};
pub use tan::{cd_inverse, inverse_tan_project, tan_project, TanWcs};

use crate::sky::SkyCoord;

/// Mapping between 0-indexed pixel positions and sky positions.
pub trait Wcs {
    /// Sky position of pixel `(x, y)`.
    fn pixel_to_sky(&self, x: f64, y: f64) -> SkyCoord;

    /// Pixel position of `coord`, or `None` if it projects behind the tangent plane.
    fn sky_to_pixel(&self, coord: &SkyCoord) -> Option<(f64, f64)>;
}
