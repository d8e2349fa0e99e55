//! # tansip
//!
//! Fit **SIP polynomial distortion** onto a linear TAN (gnomonic) WCS from a
//! list of matched star positions.
//!
//! Given reference sky positions of catalog stars, the detector centroids where
//! those stars were observed, and an approximate linear WCS, `tansip` refines
//! CRPIX and the CD matrix and fits both the forward (A/B) and reverse (AP/BP)
//! coefficients of the FITS Simple Imaging Polynomial convention.
//!
//! ## Example
//!
//! ```no_run
//! use tansip::{create_wcs_with_sip, Centroid, Matrix2, ReferenceMatch, SipFitConfig, SkyCoord, TanWcs};
//!
//! let scale = (1.0_f64 / 3600.0).to_radians(); // 1 arcsec/pixel
//! let linear = TanWcs::new(
//!     SkyCoord::from_degrees(83.6, 22.0),
//!     [1024.0, 1024.0],
//!     Matrix2::new(-scale, 0.0, 0.0, scale),
//! );
//!
//! let matches = vec![
//!     ReferenceMatch::new(SkyCoord::from_degrees(83.62, 22.01), Centroid::new(950.3, 1060.1)),
//!     // ... more matches ...
//! ];
//!
//! let config = SipFitConfig { order: 3, ..Default::default() };
//! let fit = create_wcs_with_sip(&matches, &linear, &config).unwrap();
//! println!(
//!     "scatter {:.3} px (linear only {:.3} px)",
//!     fit.scatter_in_pixels(),
//!     fit.linear_scatter_in_pixels()
//! );
//! let wcs = fit.into_wcs();
//! ```
//!
//! ## Conventions
//!
//! - Pixel coordinates are 0-indexed everywhere except
//!   [`TanSipWcs::undistort_pixel`] and [`TanSipWcs::distort_pixel`], which
//!   follow the 1-indexed FITS convention.
//! - Angles are radians; the CD matrix is radians per pixel.
//! - A polynomial of order `n` has the `n(n+1)/2` terms `u^p v^q` with `p + q < n`.

mod bbox;
mod centroid;
pub mod distortion;
pub mod error;
pub mod matches;
mod sky;
pub mod wcs;

pub use bbox::BoundingBox;
pub use centroid::Centroid;
pub use distortion::{
    create_wcs_with_sip, create_wcs_with_sip_observed, fit_tan_sip_wcs, FitEvent, FitObserver,
    FitStage, FitTanSipConfig, FitTanSipResult, SipFit, SipFitConfig, SIP_ORDER_LIMIT,
};
pub use error::{Result, SipFitError};
pub use matches::{MatchStatistics, ReferenceMatch, StarMatch};
pub use sky::SkyCoord;
pub use wcs::{TanSipWcs, TanWcs, Wcs};

/// 2×2 matrix used for CD matrices and their inverses.
pub type Matrix2 = nalgebra::Matrix2<f64>;
pub type Vector2 = nalgebra::Vector2<f64>;
pub type Vector3 = nalgebra::Vector3<f64>;
