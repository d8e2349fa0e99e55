//! Iterated TAN-SIP fit with a scatter sanity check.
//!
//! The forward fit solves X and Y separately and applies the CRPIX shift only
//! after the polynomial has been fitted around the old CRPIX. Re-running the
//! fit from the refined linear part lets CRPIX and the polynomial settle
//! together; a few passes are enough.

use tracing::{debug, warn};

use crate::bbox::BoundingBox;
use crate::error::{Result, SipFitError};
use crate::matches::{match_distances_in_radians, StarMatch};
use crate::wcs::{TanSipWcs, TanWcs};

use super::create::create_wcs_with_sip;
use super::SipFitConfig;

/// Configuration for [`fit_tan_sip_wcs`].
#[derive(Debug, Clone)]
pub struct FitTanSipConfig {
    /// Polynomial distortion order (≥ 2). Default 4.
    pub order: u32,
    /// Number of fit passes, each seeded with the previous linear WCS. Default 3.
    pub num_iter: u32,
    /// Largest acceptable median on-sky scatter after the last pass. Default 10.0.
    pub max_scatter_arcsec: f64,
    /// Reverse-fit grid samples per axis; `None` uses `5 × (order + 1)`.
    pub ngrid: Option<usize>,
}

impl Default for FitTanSipConfig {
    fn default() -> Self {
        Self {
            order: 4,
            num_iter: 3,
            max_scatter_arcsec: 10.0,
            ngrid: None,
        }
    }
}

/// Result of [`fit_tan_sip_wcs`].
#[derive(Debug, Clone)]
pub struct FitTanSipResult {
    /// The fitted TAN-SIP WCS from the last pass.
    pub wcs: TanSipWcs,
    /// Median on-sky scatter of the matches, radians.
    pub scatter_on_sky_rad: f64,
    /// Median pixel scatter with the full TAN-SIP WCS.
    pub scatter_px: f64,
    /// Median pixel scatter with only the linear part of the final fit.
    pub linear_scatter_px: f64,
    /// On-sky distance (radians) of each match under the final WCS, in input order.
    pub match_distances_rad: Vec<f64>,
    /// Number of passes performed.
    pub iterations: u32,
}

/// Fit a TAN-SIP WCS, re-seeding the linear part `config.num_iter` times.
///
/// `bbox` is the validity region for the reverse fit; `None` infers it from
/// the observed centroids on every pass. At least one pass is always run.
///
/// Returns [`SipFitError::ScatterTooLarge`] if the final median on-sky scatter
/// exceeds `config.max_scatter_arcsec` (or cannot be computed).
pub fn fit_tan_sip_wcs<M: StarMatch>(
    matches: &[M],
    init_wcs: &TanWcs,
    bbox: Option<BoundingBox>,
    config: &FitTanSipConfig,
) -> Result<FitTanSipResult> {
    let sip_config = SipFitConfig {
        order: config.order,
        bbox,
        ngrid: config.ngrid,
    };
    let passes = config.num_iter.max(1);

    let mut seed = init_wcs.clone();
    let mut fit = create_wcs_with_sip(matches, &seed, &sip_config)?;
    for pass in 1..passes {
        debug!(
            "TAN-SIP pass {}/{}: scatter {:.4} px (linear {:.4} px)",
            pass,
            passes,
            fit.scatter_in_pixels(),
            fit.linear_scatter_in_pixels()
        );
        seed = fit.linear_wcs().clone();
        fit = create_wcs_with_sip(matches, &seed, &sip_config)?;
    }

    let scatter_on_sky_rad = fit.scatter_on_sky_rad();
    let scatter_arcsec = scatter_on_sky_rad.to_degrees() * 3600.0;
    // NaN compares false, so test for acceptance rather than rejection
    if !(scatter_arcsec <= config.max_scatter_arcsec) {
        warn!(
            "TAN-SIP fit rejected: median scatter {:.3}\" > {:.3}\"",
            scatter_arcsec, config.max_scatter_arcsec
        );
        return Err(SipFitError::ScatterTooLarge {
            scatter_arcsec,
            max_arcsec: config.max_scatter_arcsec,
        });
    }

    debug!(
        "TAN-SIP fit: {} matches, {} passes, scatter {:.4}\" / {:.4} px",
        matches.len(),
        passes,
        scatter_arcsec,
        fit.scatter_in_pixels()
    );

    let match_distances_rad = match_distances_in_radians(fit.new_wcs(), matches);

    Ok(FitTanSipResult {
        scatter_on_sky_rad,
        scatter_px: fit.scatter_in_pixels(),
        linear_scatter_px: fit.linear_scatter_in_pixels(),
        match_distances_rad,
        iterations: passes,
        wcs: fit.into_wcs(),
    })
}
