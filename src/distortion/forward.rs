//! Forward (pixel → sky) SIP fit.
//!
//! Each matched reference star is projected onto the tangent plane of the
//! linear WCS, giving intermediate world coordinates `(ξ, η)`. Both are fitted
//! as full polynomials in the observed offsets `(u, v)` from CRPIX:
//!
//! ```text
//! ξ = Σ mu_pq · u^p · v^q
//! η = Σ nu_pq · u^p · v^q
//! ```
//!
//! Since `(ξ, η) = CD · (u + A(u, v), v + B(u, v))`, the degree-1 terms are the
//! CD matrix, the degree-0 terms are a CRPIX shift, and every higher term
//! satisfies `(mu_pq, nu_pq) = CD · (A_pq, B_pq)`.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::error::{Result, SipFitError};
use crate::matches::StarMatch;
use crate::wcs::{cd_inverse, zero_coeffs, TanWcs};
use crate::{Matrix2, Vector2};

use super::lstsq::solve_stage;
use super::polynomial::{design_matrix, index_to_pq};
use super::{notify, FitEvent, FitObserver, FitStage};

/// Output of the forward fit.
#[derive(Debug, Clone)]
pub struct ForwardFit {
    /// New linear WCS: same CRVAL, refined CRPIX and CD.
    pub linear_wcs: TanWcs,
    /// Forward x distortion, `sip_order × sip_order`, zero for `p + q < 2`.
    pub a: DMatrix<f64>,
    /// Forward y distortion.
    pub b: DMatrix<f64>,
    /// Normalization applied to `(u, v)` before fitting.
    pub norm: f64,
}

/// Fit forward SIP coefficients and refine the linear part of `linear_wcs`.
///
/// `sip_order` is the forward polynomial order (terms with `p + q < sip_order`).
/// Callers are expected to have validated the order and match count; see
/// [`create_wcs_with_sip`](super::create_wcs_with_sip).
pub fn fit_forward<M: StarMatch>(
    matches: &[M],
    linear_wcs: &TanWcs,
    sip_order: u32,
    observer: Option<&dyn FitObserver>,
) -> Result<ForwardFit> {
    let crpix = linear_wcs.crpix;
    let n = matches.len();

    // Intermediate world coordinates of the references, observed offsets from CRPIX
    let mut u = Vec::with_capacity(n);
    let mut v = Vec::with_capacity(n);
    let mut iwc1 = DVector::zeros(n);
    let mut iwc2 = DVector::zeros(n);
    for (index, m) in matches.iter().enumerate() {
        let (xi, eta) = linear_wcs
            .sky_to_iwc(&m.sky())
            .ok_or(SipFitError::BehindTangentPlane { index })?;
        iwc1[index] = xi;
        iwc2[index] = eta;

        let (du, dv) = m.centroid().offset_from(crpix);
        u.push(du);
        v.push(dv);
    }

    // Scale u, v into [-1, 1] so high powers stay well conditioned
    let norm = max_abs(&u).max(max_abs(&v));
    let norm = if norm > 0.0 { norm } else { 1.0 };
    u.iter_mut().for_each(|x| *x /= norm);
    v.iter_mut().for_each(|x| *x /= norm);

    let c = design_matrix(&u, &v, sip_order)?;
    let mu = solve_stage(&iwc1, &c, FitStage::Forward, observer)?;
    let nu = solve_stage(&iwc2, &c, FitStage::Forward, observer)?;

    // The linear terms sit at fixed indices: 0 → (0,0), 1 → (0,1), order → (1,0)
    let ord = sip_order as usize;
    debug_assert_eq!(index_to_pq(0, sip_order), (0, 0));
    debug_assert_eq!(index_to_pq(1, sip_order), (0, 1));
    debug_assert_eq!(index_to_pq(ord, sip_order), (1, 0));

    let cd = Matrix2::new(
        mu[ord] / norm,
        mu[1] / norm,
        nu[ord] / norm,
        nu[1] / norm,
    );
    let cd_inv = cd_inverse(&cd).ok_or(SipFitError::SingularCdMatrix {
        det: cd.determinant(),
    })?;

    let shift = cd_inv * Vector2::new(mu[0], nu[0]);
    let new_crpix = [crpix[0] - shift[0], crpix[1] - shift[1]];

    // mu_pq = CD11·A_pq + CD12·B_pq, nu_pq = CD21·A_pq + CD22·B_pq
    let mut a = zero_coeffs(ord);
    let mut b = zero_coeffs(ord);
    for i in 1..mu.len() {
        let (p, q) = index_to_pq(i, sip_order);
        let degree = p + q;
        if degree > 1 && degree < sip_order {
            let ab = cd_inv * Vector2::new(mu[i], nu[i]);
            let scale = norm.powi(degree as i32);
            a[(p as usize, q as usize)] = ab[0] / scale;
            b[(p as usize, q as usize)] = ab[1] / scale;
        }
    }

    debug!(
        "Forward SIP fit: {} matches, order {}, CRPIX ({:.3}, {:.3}) → ({:.3}, {:.3})",
        n, sip_order, crpix[0], crpix[1], new_crpix[0], new_crpix[1]
    );
    notify(
        observer,
        FitEvent::ForwardRefined {
            crpix: new_crpix,
            cd,
            norm,
        },
    );

    Ok(ForwardFit {
        linear_wcs: TanWcs::new(linear_wcs.crval, new_crpix, cd),
        a,
        b,
        norm,
    })
}

/// Largest absolute value in `values` (0 if empty).
pub(crate) fn max_abs(values: &[f64]) -> f64 {
    values.iter().fold(0.0_f64, |acc, &x| acc.max(x.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matches::ReferenceMatch;
    use crate::wcs::{eval_sip_poly, TanSipWcs, Wcs};
    use crate::{Centroid, SkyCoord};
    use std::cell::RefCell;

    fn truth_wcs() -> TanWcs {
        let scale = 0.2_f64 / 3600.0;
        TanWcs::new(
            SkyCoord::from_degrees(150.0, 2.2),
            [1024.0, 1024.0],
            Matrix2::new(
                -scale.to_radians() * 0.998,
                0.004 * scale.to_radians(),
                0.003 * scale.to_radians(),
                scale.to_radians() * 1.001,
            ),
        )
    }

    fn grid_matches<W: Wcs>(wcs: &W, observed: impl Fn(f64, f64) -> (f64, f64)) -> Vec<ReferenceMatch> {
        let mut matches = Vec::new();
        for i in 0..8 {
            for j in 0..8 {
                let x = 37.0 + 270.0 * j as f64 + 3.0 * i as f64;
                let y = 15.0 + 280.0 * i as f64 - 2.0 * j as f64;
                let (xo, yo) = observed(x, y);
                matches.push(ReferenceMatch::new(wcs.pixel_to_sky(x, y), Centroid::new(xo, yo)));
            }
        }
        matches
    }

    #[test]
    fn test_pure_linear_data_recovers_linear_wcs() {
        let truth = truth_wcs();
        let matches = grid_matches(&truth, |x, y| (x, y));

        // Seed with CRPIX off by a few pixels and a slightly wrong scale
        let seed = TanWcs::new(truth.crval, [1030.5, 1019.0], truth.cd * 1.01);
        let fit = fit_forward(&matches, &seed, 4, None).unwrap();

        let cd_err = (fit.linear_wcs.cd - truth.cd).abs().max() / truth.cd.abs().max();
        assert!(cd_err < 1e-9, "CD relative error {cd_err:e}");
        assert!((fit.linear_wcs.crpix[0] - truth.crpix[0]).abs() < 1e-6);
        assert!((fit.linear_wcs.crpix[1] - truth.crpix[1]).abs() < 1e-6);
        assert_eq!(fit.linear_wcs.crval, truth.crval);

        // No distortion anywhere across the detector
        for &(u, v) in &[(1000.0, 1000.0), (-1000.0, 1000.0), (1000.0, -1000.0)] {
            assert!(eval_sip_poly(&fit.a, u, v).abs() < 1e-6);
            assert!(eval_sip_poly(&fit.b, u, v).abs() < 1e-6);
        }
    }

    #[test]
    fn test_quadratic_distortion_recovered() {
        let truth = truth_wcs();
        let mut sip = TanSipWcs::from_tan(truth.clone(), 3, 4);
        sip.a[(2, 0)] = 2.0e-6;
        sip.a[(1, 1)] = -1.0e-6;
        sip.b[(0, 2)] = 1.5e-6;

        // Observed pixels are where the distorted WCS puts each reference star:
        // sky = sip.pixel_to_sky(observed)
        let matches: Vec<ReferenceMatch> = grid_matches(&truth, |x, y| (x, y))
            .into_iter()
            .map(|m| ReferenceMatch::new(sip.pixel_to_sky(m.centroid.x, m.centroid.y), m.centroid))
            .collect();

        let fit = fit_forward(&matches, &truth, 3, None).unwrap();
        assert!((fit.a[(2, 0)] - 2.0e-6).abs() < 1e-10, "A20 = {:e}", fit.a[(2, 0)]);
        assert!((fit.a[(1, 1)] + 1.0e-6).abs() < 1e-10, "A11 = {:e}", fit.a[(1, 1)]);
        assert!((fit.b[(0, 2)] - 1.5e-6).abs() < 1e-10, "B02 = {:e}", fit.b[(0, 2)]);
        assert!(fit.b[(2, 0)].abs() < 1e-10);

        // Degree 0 and 1 are never stored in A/B
        assert_eq!(fit.a[(0, 0)], 0.0);
        assert_eq!(fit.a[(1, 0)], 0.0);
        assert_eq!(fit.b[(0, 1)], 0.0);
    }

    #[test]
    fn test_cubic_and_cross_terms_recovered() {
        let truth = truth_wcs();
        let mut sip = TanSipWcs::from_tan(truth.clone(), 4, 5);
        let terms = [
            (2, 0, 1.0e-6, -5.0e-7),
            (1, 1, -8.0e-7, 6.0e-7),
            (3, 0, 3.0e-10, -1.0e-10),
            (2, 1, -2.0e-10, 1.5e-10),
            (1, 2, 1.0e-10, 2.5e-10),
            (0, 3, -1.5e-10, -3.0e-10),
        ];
        for &(p, q, a, b) in &terms {
            sip.a[(p, q)] = a;
            sip.b[(p, q)] = b;
        }
        let matches: Vec<ReferenceMatch> = grid_matches(&truth, |x, y| (x, y))
            .into_iter()
            .map(|m| ReferenceMatch::new(sip.pixel_to_sky(m.centroid.x, m.centroid.y), m.centroid))
            .collect();

        let fit = fit_forward(&matches, &truth, 4, None).unwrap();
        for &(p, q, a, b) in &terms {
            let (fa, fb) = (fit.a[(p, q)], fit.b[(p, q)]);
            assert!((fa - a).abs() < 1e-4 * a.abs(), "A{p}{q} = {fa:e}, want {a:e}");
            assert!((fb - b).abs() < 1e-4 * b.abs(), "B{p}{q} = {fb:e}, want {b:e}");
        }
        assert!(fit.a[(0, 2)].abs() < 1e-12);
        assert!(fit.b[(2, 0)].abs() < 1e-12);
    }

    #[test]
    fn test_observer_sees_refined_linear_part() {
        let truth = truth_wcs();
        let matches = grid_matches(&truth, |x, y| (x, y));
        let events = RefCell::new(Vec::new());
        let observer = |e: &FitEvent| events.borrow_mut().push(e.clone());

        let fit = fit_forward(&matches, &truth, 3, Some(&observer)).unwrap();
        let events = events.into_inner();
        assert_eq!(events.len(), 1);
        match &events[0] {
            FitEvent::ForwardRefined { crpix, norm, .. } => {
                assert_eq!(*crpix, fit.linear_wcs.crpix);
                assert_eq!(*norm, fit.norm);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_reference_behind_tangent_plane() {
        let truth = truth_wcs();
        let mut matches = grid_matches(&truth, |x, y| (x, y));
        let antipode = SkyCoord::new(truth.crval.ra_rad + std::f64::consts::PI, -truth.crval.dec_rad);
        matches[5].sky = antipode;
        let err = fit_forward(&matches, &truth, 3, None).unwrap_err();
        assert_eq!(err, SipFitError::BehindTangentPlane { index: 5 });
    }
}
