//! Reverse (sky → pixel) SIP fit.
//!
//! The forward polynomial has no closed-form inverse, so the reverse one is
//! fitted numerically. A regular grid is laid over the validity region; at
//! each grid pixel the forward correction gives the undistorted offset
//! `(U, V)`, and the reverse polynomial is fitted so that
//! `AP(U, V) ≈ u − U` and `BP(U, V) ≈ v − V`.
//!
//! Unlike the forward fit, every term is kept, including the constant and
//! linear ones: the reverse map has no linear part of its own to absorb them.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::bbox::BoundingBox;
use crate::error::{Result, SipFitError};
use crate::wcs::{zero_coeffs, TanSipWcs};

use super::forward::max_abs;
use super::lstsq::solve_stage;
use super::polynomial::{design_matrix, index_to_pq};
use super::{notify, FitEvent, FitObserver, FitStage};

/// Output of the reverse fit.
#[derive(Debug, Clone)]
pub struct ReverseFit {
    /// Reverse x correction, `reverse_order × reverse_order`.
    pub ap: DMatrix<f64>,
    /// Reverse y correction.
    pub bp: DMatrix<f64>,
    /// Normalization applied to `(U, V)` before fitting.
    pub norm: f64,
}

/// Fit reverse SIP coefficients for `wcs` over an `ngrid × ngrid` grid spanning `bbox`.
///
/// `wcs` must already carry its final forward coefficients and linear part;
/// its reverse coefficients are ignored.
pub fn fit_reverse(
    wcs: &TanSipWcs,
    bbox: &BoundingBox,
    ngrid: usize,
    reverse_order: u32,
    observer: Option<&dyn FitObserver>,
) -> Result<ReverseFit> {
    if ngrid < 2 {
        return Err(SipFitError::GridTooSmall { ngrid });
    }
    if bbox.is_empty() {
        return Err(SipFitError::EmptyValidityRegion);
    }

    let n = ngrid * ngrid;
    let x0 = bbox.min_x;
    let y0 = bbox.min_y;
    let dx = bbox.width() / (ngrid - 1) as f64;
    let dy = bbox.height() / (ngrid - 1) as f64;

    // 0-indexed pixel origin
    let crpix = wcs.tan.crpix;

    debug!(
        "Reverse SIP fit: x0,y0 {:.1},{:.1}, W,H {:.1},{:.1}, ngrid {}, dx,dy {:.3},{:.3}, CRPIX {:.3},{:.3}",
        x0,
        y0,
        bbox.width(),
        bbox.height(),
        ngrid,
        dx,
        dy,
        crpix[0],
        crpix[1]
    );

    let mut big_u = Vec::with_capacity(n);
    let mut big_v = Vec::with_capacity(n);
    let mut delta1 = DVector::zeros(n);
    let mut delta2 = DVector::zeros(n);

    let is_probe = |k: usize| k == 0 || k == ngrid - 1 || k == ngrid / 2;

    let mut k = 0;
    for i in 0..ngrid {
        let y = y0 + i as f64 * dy;
        for j in 0..ngrid {
            let x = x0 + j as f64 * dx;
            let u = x - crpix[0];
            let v = y - crpix[1];

            // undistort_pixel works in 1-indexed pixels; crpix is 0-indexed
            let (xu, yu) = wcs.undistort_pixel(x + 1.0, y + 1.0);
            let uu = xu - 1.0 - crpix[0];
            let vv = yu - 1.0 - crpix[1];

            if is_probe(i) && is_probe(j) {
                debug!(
                    "  x,y ({:.1}, {:.1}), u,v ({:.1}, {:.1}), U,V ({:.1}, {:.1})",
                    x, y, u, v, uu, vv
                );
            }
            notify(
                observer,
                FitEvent::GridSample {
                    row: i,
                    col: j,
                    x,
                    y,
                    u,
                    v,
                    big_u: uu,
                    big_v: vv,
                },
            );

            big_u.push(uu);
            big_v.push(vv);
            delta1[k] = u - uu;
            delta2[k] = v - vv;
            k += 1;
        }
    }

    let norm = max_abs(&big_u).max(max_abs(&big_v));
    let norm = if norm > 0.0 { norm } else { 1.0 };
    big_u.iter_mut().for_each(|x| *x /= norm);
    big_v.iter_mut().for_each(|x| *x /= norm);

    let c = design_matrix(&big_u, &big_v, reverse_order)?;
    let tmp_a = solve_stage(&delta1, &c, FitStage::Reverse, observer)?;
    let tmp_b = solve_stage(&delta2, &c, FitStage::Reverse, observer)?;

    let ord = reverse_order as usize;
    let mut ap = zero_coeffs(ord);
    let mut bp = zero_coeffs(ord);
    for j in 0..tmp_a.len() {
        let (p, q) = index_to_pq(j, reverse_order);
        let scale = norm.powi((p + q) as i32);
        ap[(p as usize, q as usize)] = tmp_a[j] / scale;
        bp[(p as usize, q as usize)] = tmp_b[j] / scale;
    }

    Ok(ReverseFit { ap, bp, norm })
}
