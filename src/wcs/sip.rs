//! TAN-SIP world coordinate system.
//!
//! Adds Simple Imaging Polynomial distortion to a linear [`TanWcs`]:
//!
//! ```text
//! u, v = pixel − crpix
//! U = u + Σ A_pq · u^p · v^q          (pixel → sky, "forward")
//! V = v + Σ B_pq · u^p · v^q
//! (ξ, η) = CD · (U, V)
//! ```
//!
//! The reverse direction uses a separately fitted polynomial, since the
//! forward one has no closed-form inverse:
//!
//! ```text
//! (U, V) = CD⁻¹ · (ξ, η)
//! u = U + Σ AP_pq · U^p · V^q         (sky → pixel, "reverse")
//! v = V + Σ BP_pq · U^p · V^q
//! ```
//!
//! Coefficient matrices are square `order × order`; only entries with
//! `p + q < order` are ever non-zero. Coefficients are in raw pixel units
//! (no normalization), as in a FITS header.

use nalgebra::DMatrix;

use crate::sky::SkyCoord;

use super::tan::TanWcs;
use super::Wcs;

/// Linear TAN WCS plus forward (A, B) and reverse (AP, BP) SIP coefficients.
#[derive(Debug, Clone, PartialEq)]
pub struct TanSipWcs {
    /// Linear part: CRVAL, CRPIX (0-indexed) and CD.
    pub tan: TanWcs,
    /// Forward x correction.
    pub a: DMatrix<f64>,
    /// Forward y correction.
    pub b: DMatrix<f64>,
    /// Reverse x correction.
    pub ap: DMatrix<f64>,
    /// Reverse y correction.
    pub bp: DMatrix<f64>,
}

impl TanSipWcs {
    pub fn new(
        tan: TanWcs,
        a: DMatrix<f64>,
        b: DMatrix<f64>,
        ap: DMatrix<f64>,
        bp: DMatrix<f64>,
    ) -> Self {
        Self { tan, a, b, ap, bp }
    }

    /// A SIP WCS with all-zero coefficients: behaves exactly like `tan`.
    pub fn from_tan(tan: TanWcs, order: usize, reverse_order: usize) -> Self {
        Self::new(
            tan,
            zero_coeffs(order),
            zero_coeffs(order),
            zero_coeffs(reverse_order),
            zero_coeffs(reverse_order),
        )
    }

    /// Forward SIP order (size of A and B).
    pub fn order(&self) -> usize {
        self.a.nrows()
    }

    /// Reverse SIP order (size of AP and BP).
    pub fn reverse_order(&self) -> usize {
        self.ap.nrows()
    }

    /// Apply the forward (A, B) polynomial to an offset from CRPIX.
    pub fn forward_offset(&self, u: f64, v: f64) -> (f64, f64) {
        (
            u + eval_sip_poly(&self.a, u, v),
            v + eval_sip_poly(&self.b, u, v),
        )
    }

    /// Apply the reverse (AP, BP) polynomial to an undistorted offset.
    pub fn reverse_offset(&self, u: f64, v: f64) -> (f64, f64) {
        (
            u + eval_sip_poly(&self.ap, u, v),
            v + eval_sip_poly(&self.bp, u, v),
        )
    }

    /// Remove distortion from a pixel position using the forward polynomial.
    ///
    /// Takes and returns 1-indexed (FITS-style) pixel coordinates: the pixel
    /// origin used internally is `crpix + 1`.
    pub fn undistort_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let crpix_x = self.tan.crpix[0] + 1.0;
        let crpix_y = self.tan.crpix[1] + 1.0;
        let (uu, vv) = self.forward_offset(x - crpix_x, y - crpix_y);
        (uu + crpix_x, vv + crpix_y)
    }

    /// Reapply distortion to an undistorted pixel position using the reverse polynomial.
    ///
    /// 1-indexed in and out, like [`undistort_pixel`](Self::undistort_pixel).
    pub fn distort_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let crpix_x = self.tan.crpix[0] + 1.0;
        let crpix_y = self.tan.crpix[1] + 1.0;
        let (u, v) = self.reverse_offset(x - crpix_x, y - crpix_y);
        (u + crpix_x, v + crpix_y)
    }
}

impl Wcs for TanSipWcs {
    fn pixel_to_sky(&self, x: f64, y: f64) -> SkyCoord {
        let (u, v) = self.forward_offset(x - self.tan.crpix[0], y - self.tan.crpix[1]);
        let cd = &self.tan.cd;
        let xi = cd[(0, 0)] * u + cd[(0, 1)] * v;
        let eta = cd[(1, 0)] * u + cd[(1, 1)] * v;
        self.tan.iwc_to_sky(xi, eta)
    }

    fn sky_to_pixel(&self, coord: &SkyCoord) -> Option<(f64, f64)> {
        let (xi, eta) = self.tan.sky_to_iwc(coord)?;
        let cd_inv = self.tan.cd_inverse()?;
        let uu = cd_inv[(0, 0)] * xi + cd_inv[(0, 1)] * eta;
        let vv = cd_inv[(1, 0)] * xi + cd_inv[(1, 1)] * eta;
        let (u, v) = self.reverse_offset(uu, vv);
        Some((u + self.tan.crpix[0], v + self.tan.crpix[1]))
    }
}

// ── Polynomial helpers ──────────────────────────────────────────────────────

/// Zero-filled `order × order` coefficient matrix.
pub fn zero_coeffs(order: usize) -> DMatrix<f64> {
    DMatrix::zeros(order, order)
}

/// Evaluate `Σ c[p, q] · u^p · v^q` over `p + q < order`, where `order` is the
/// side length of `coeffs`. Entries outside the triangle are never read.
pub fn eval_sip_poly(coeffs: &DMatrix<f64>, u: f64, v: f64) -> f64 {
    let order = coeffs.nrows().min(coeffs.ncols());
    let mut result = 0.0;
    let mut u_pow = 1.0;
    for p in 0..order {
        let mut v_pow = 1.0;
        for q in 0..(order - p) {
            result += coeffs[(p, q)] * u_pow * v_pow;
            v_pow *= v;
        }
        u_pow *= u;
    }
    result
}
