//! One-shot TAN-SIP fit: forward fit, provisional WCS, reverse fit, final WCS.

use std::sync::OnceLock;

use tracing::debug;

use crate::bbox::BoundingBox;
use crate::error::{Result, SipFitError};
use crate::matches::{make_match_statistics_in_pixels, make_match_statistics_in_radians, StarMatch};
use crate::wcs::{zero_coeffs, TanSipWcs, TanWcs};

use super::forward::fit_forward;
use super::reverse::fit_reverse;
use super::{FitObserver, SipFitConfig, SIP_ORDER_LIMIT};

/// A fitted TAN-SIP WCS together with the matches it was fitted to.
///
/// Only produced by a successful fit. The scatter queries are computed on
/// first use and cached.
#[derive(Debug)]
pub struct SipFit<'a, M> {
    matches: &'a [M],
    linear_wcs: TanWcs,
    new_wcs: TanSipWcs,
    bbox: BoundingBox,
    ngrid: usize,
    sip_order: u32,
    reverse_sip_order: u32,
    scatter_px: OnceLock<f64>,
    linear_scatter_px: OnceLock<f64>,
    scatter_sky_rad: OnceLock<f64>,
    linear_scatter_sky_rad: OnceLock<f64>,
}

/// Fit a TAN-SIP WCS to `matches`, starting from `linear_wcs`.
///
/// The polynomial `order` from `config` must be at least 2; the forward fit
/// uses `order + 1` and the reverse fit `order + 2`, both capped at
/// [`SIP_ORDER_LIMIT`]. At least `order + 1` matches are required.
pub fn create_wcs_with_sip<'a, M: StarMatch>(
    matches: &'a [M],
    linear_wcs: &TanWcs,
    config: &SipFitConfig,
) -> Result<SipFit<'a, M>> {
    create_wcs_with_sip_observed(matches, linear_wcs, config, None)
}

/// [`create_wcs_with_sip`] with an optional diagnostics observer.
pub fn create_wcs_with_sip_observed<'a, M: StarMatch>(
    matches: &'a [M],
    linear_wcs: &TanWcs,
    config: &SipFitConfig,
    observer: Option<&dyn FitObserver>,
) -> Result<SipFit<'a, M>> {
    let (sip_order, reverse_sip_order) = sip_orders(config.order)?;

    if matches.len() < sip_order as usize {
        return Err(SipFitError::InsufficientMatches {
            matches: matches.len(),
            order: sip_order,
        });
    }

    let ngrid = match config.ngrid {
        None | Some(0) => 5 * sip_order as usize,
        Some(1) => return Err(SipFitError::GridTooSmall { ngrid: 1 }),
        Some(n) => n,
    };

    let bbox = match config.bbox {
        Some(b) if !b.is_empty() => b,
        _ => infer_validity_region(matches),
    };

    let forward = fit_forward(matches, linear_wcs, sip_order, observer)?;

    // Everything known so far; the reverse fit inverts this WCS numerically
    let rev = reverse_sip_order as usize;
    let provisional = TanSipWcs::new(
        forward.linear_wcs.clone(),
        forward.a,
        forward.b,
        zero_coeffs(rev),
        zero_coeffs(rev),
    );

    let reverse = fit_reverse(&provisional, &bbox, ngrid, reverse_sip_order, observer)?;

    let new_wcs = TanSipWcs {
        ap: reverse.ap,
        bp: reverse.bp,
        ..provisional
    };

    debug!(
        "SIP fit: {} matches, order {}/{}, bbox [{:.1}, {:.1}]×[{:.1}, {:.1}], ngrid {}",
        matches.len(),
        sip_order,
        reverse_sip_order,
        bbox.min_x,
        bbox.max_x,
        bbox.min_y,
        bbox.max_y,
        ngrid
    );

    Ok(SipFit {
        matches,
        linear_wcs: forward.linear_wcs,
        new_wcs,
        bbox,
        ngrid,
        sip_order,
        reverse_sip_order,
        scatter_px: OnceLock::new(),
        linear_scatter_px: OnceLock::new(),
        scatter_sky_rad: OnceLock::new(),
        linear_scatter_sky_rad: OnceLock::new(),
    })
}

/// Forward and reverse SIP orders for a polynomial `order`, checked against the limits.
pub fn sip_orders(order: u32) -> Result<(u32, u32)> {
    if order < 2 {
        return Err(SipFitError::OrderTooLow { order });
    }
    let sip_order = order.saturating_add(1);
    if sip_order > SIP_ORDER_LIMIT {
        return Err(SipFitError::ForwardOrderExceedsLimit {
            order: sip_order,
            limit: SIP_ORDER_LIMIT,
        });
    }
    let reverse_sip_order = order.saturating_add(2);
    if reverse_sip_order > SIP_ORDER_LIMIT {
        return Err(SipFitError::ReverseOrderExceedsLimit {
            order: reverse_sip_order,
            limit: SIP_ORDER_LIMIT,
        });
    }
    Ok((sip_order, reverse_sip_order))
}

/// Bounding box of the observed centroids, grown by `1/√n` of its size on each side.
///
/// A finite set of stars rarely reaches the detector edge, so the box is
/// extrapolated a little; the fewer the stars, the more.
pub fn infer_validity_region<M: StarMatch>(matches: &[M]) -> BoundingBox {
    let mut bbox = BoundingBox::empty();
    for m in matches {
        let c = m.centroid();
        bbox.include(c.x, c.y);
    }
    if !matches.is_empty() {
        let border_frac = 1.0 / (matches.len() as f64).sqrt();
        bbox.grow(border_frac * bbox.width(), border_frac * bbox.height());
    }
    bbox
}

impl<'a, M: StarMatch> SipFit<'a, M> {
    /// The fitted TAN-SIP WCS.
    pub fn new_wcs(&self) -> &TanSipWcs {
        &self.new_wcs
    }

    /// Consume the fit, keeping only the TAN-SIP WCS.
    pub fn into_wcs(self) -> TanSipWcs {
        self.new_wcs
    }

    /// Linear part of the fit (refined CRPIX and CD, no distortion).
    pub fn linear_wcs(&self) -> &TanWcs {
        &self.linear_wcs
    }

    pub fn matches(&self) -> &'a [M] {
        self.matches
    }

    /// Region the reverse polynomial was sampled over.
    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    pub fn ngrid(&self) -> usize {
        self.ngrid
    }

    pub fn sip_order(&self) -> u32 {
        self.sip_order
    }

    pub fn reverse_sip_order(&self) -> u32 {
        self.reverse_sip_order
    }

    /// Median pixel distance between observed centroids and the positions the
    /// TAN-SIP WCS predicts for their reference stars.
    pub fn scatter_in_pixels(&self) -> f64 {
        *self
            .scatter_px
            .get_or_init(|| make_match_statistics_in_pixels(&self.new_wcs, self.matches).median)
    }

    /// [`scatter_in_pixels`](Self::scatter_in_pixels) using only the linear WCS.
    pub fn linear_scatter_in_pixels(&self) -> f64 {
        *self.linear_scatter_px.get_or_init(|| {
            make_match_statistics_in_pixels(&self.linear_wcs, self.matches).median
        })
    }

    /// Median on-sky separation (radians) between reference positions and
    /// the TAN-SIP WCS positions of their observed centroids.
    pub fn scatter_on_sky_rad(&self) -> f64 {
        *self.scatter_sky_rad.get_or_init(|| {
            make_match_statistics_in_radians(&self.new_wcs, self.matches).median
        })
    }

    /// [`scatter_on_sky_rad`](Self::scatter_on_sky_rad) using only the linear WCS.
    pub fn linear_scatter_on_sky_rad(&self) -> f64 {
        *self.linear_scatter_sky_rad.get_or_init(|| {
            make_match_statistics_in_radians(&self.linear_wcs, self.matches).median
        })
    }
}
