//! Gnomonic (TAN) projection and the linear TAN WCS.
//!
//! The CD matrix (2×2) maps pixel offsets from the pixel origin (CRPIX) to
//! tangent-plane coordinates (radians) at the reference point (CRVAL). It
//! captures pixel scale, rotation, parity, and pixel-axis skew in a single
//! linear transform.

use crate::sky::SkyCoord;
use crate::Matrix2;

use super::Wcs;

// ── TAN projection ─────────────────────────────────────────────────────────

/// Forward gnomonic (TAN) projection.
///
/// Projects celestial point `(ra, dec)` onto the tangent plane at `(crval_ra, crval_dec)`.
/// Returns `(ξ, η)` in radians, or `None` if the point is on or behind the tangent plane.
///
/// Reference: Calabretta & Greisen (2002), FITS WCS Paper II, §5.1.1.
#[inline]
pub fn tan_project(ra: f64, dec: f64, crval_ra: f64, crval_dec: f64) -> Option<(f64, f64)> {
    let da = ra - crval_ra;
    let (sin_dec, cos_dec) = dec.sin_cos();
    let (sin_dec0, cos_dec0) = crval_dec.sin_cos();
    let (sin_da, cos_da) = da.sin_cos();

    let denom = sin_dec * sin_dec0 + cos_dec * cos_dec0 * cos_da;
    if denom <= 1e-12 {
        return None;
    }

    let xi = cos_dec * sin_da / denom;
    let eta = (sin_dec * cos_dec0 - cos_dec * sin_dec0 * cos_da) / denom;
    Some((xi, eta))
}

/// Inverse gnomonic (TAN) projection.
///
/// Given tangent-plane coordinates `(ξ, η)` in radians at reference point
/// `(crval_ra, crval_dec)`, returns celestial coordinates `(ra, dec)` in radians.
#[inline]
pub fn inverse_tan_project(xi: f64, eta: f64, crval_ra: f64, crval_dec: f64) -> (f64, f64) {
    let (sin_dec0, cos_dec0) = crval_dec.sin_cos();
    let rho_sq = xi * xi + eta * eta;

    if rho_sq < 1e-30 {
        return (crval_ra, crval_dec);
    }

    let rho = rho_sq.sqrt();
    let c = rho.atan();
    let (sin_c, cos_c) = c.sin_cos();

    let dec = (cos_c * sin_dec0 + eta * sin_c * cos_dec0 / rho).asin();
    let ra = crval_ra + (xi * sin_c).atan2(rho * cos_dec0 * cos_c - eta * sin_dec0 * sin_c);
    (ra.rem_euclid(std::f64::consts::TAU), dec)
}

// ── Linear TAN WCS ─────────────────────────────────────────────────────────

/// Linear TAN world coordinate system.
///
/// `pixel → (u, v) = pixel − crpix → (ξ, η) = CD · (u, v) → sky`.
#[derive(Debug, Clone, PartialEq)]
pub struct TanWcs {
    /// Reference point on the sky (tangent point of the projection).
    pub crval: SkyCoord,
    /// Pixel origin, 0-indexed.
    pub crpix: [f64; 2],
    /// `[[CD11, CD12], [CD21, CD22]]` in tangent-plane radians per pixel.
    pub cd: Matrix2,
}

impl TanWcs {
    pub fn new(crval: SkyCoord, crpix: [f64; 2], cd: Matrix2) -> Self {
        Self { crval, crpix, cd }
    }

    /// Project a sky position to intermediate world coordinates `(ξ, η)`.
    pub fn sky_to_iwc(&self, coord: &SkyCoord) -> Option<(f64, f64)> {
        tan_project(
            coord.ra_rad,
            coord.dec_rad,
            self.crval.ra_rad,
            self.crval.dec_rad,
        )
    }

    /// Deproject intermediate world coordinates back onto the sky.
    pub fn iwc_to_sky(&self, xi: f64, eta: f64) -> SkyCoord {
        let (ra, dec) = inverse_tan_project(xi, eta, self.crval.ra_rad, self.crval.dec_rad);
        SkyCoord::new(ra, dec)
    }

    /// Inverse of the CD matrix, `None` if singular.
    pub fn cd_inverse(&self) -> Option<Matrix2> {
        cd_inverse(&self.cd)
    }
}

impl Wcs for TanWcs {
    fn pixel_to_sky(&self, x: f64, y: f64) -> SkyCoord {
        let u = x - self.crpix[0];
        let v = y - self.crpix[1];
        let xi = self.cd[(0, 0)] * u + self.cd[(0, 1)] * v;
        let eta = self.cd[(1, 0)] * u + self.cd[(1, 1)] * v;
        self.iwc_to_sky(xi, eta)
    }

    fn sky_to_pixel(&self, coord: &SkyCoord) -> Option<(f64, f64)> {
        let (xi, eta) = self.sky_to_iwc(coord)?;
        let cd_inv = self.cd_inverse()?;
        let u = cd_inv[(0, 0)] * xi + cd_inv[(0, 1)] * eta;
        let v = cd_inv[(1, 0)] * xi + cd_inv[(1, 1)] * eta;
        Some((u + self.crpix[0], v + self.crpix[1]))
    }
}

// ── 2×2 matrix helpers ─────────────────────────────────────────────────────

/// Closed-form inverse of a 2×2 matrix. Returns `None` if singular (|det| < 1e-30).
#[inline]
pub fn cd_inverse(cd: &Matrix2) -> Option<Matrix2> {
    let det = cd.determinant();
    if det.abs() < 1e-30 {
        return None;
    }
    let inv_det = 1.0 / det;
    Some(Matrix2::new(
        cd[(1, 1)] * inv_det,
        -cd[(0, 1)] * inv_det,
        -cd[(1, 0)] * inv_det,
        cd[(0, 0)] * inv_det,
    ))
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tan_project_roundtrip() {
        let crval_ra = 1.2_f64;
        let crval_dec = 0.3_f64;

        let test_points = [
            (1.21, 0.31), // near reference
            (1.25, 0.25),
            (1.15, 0.35),
            (1.0, 0.0), // further away
        ];

        for &(ra, dec) in &test_points {
            let (xi, eta) = tan_project(ra, dec, crval_ra, crval_dec).unwrap();
            let (ra2, dec2) = inverse_tan_project(xi, eta, crval_ra, crval_dec);
            assert!(
                (ra - ra2).abs() < 1e-12 && (dec - dec2).abs() < 1e-12,
                "Roundtrip failed for ({}, {}): got ({}, {})",
                ra,
                dec,
                ra2,
                dec2,
            );
        }
    }

    #[test]
    fn test_tan_project_at_reference() {
        let (xi, eta) = tan_project(2.0, -0.5, 2.0, -0.5).unwrap();
        assert!(xi.abs() < 1e-15 && eta.abs() < 1e-15);
    }

    #[test]
    fn test_tan_project_behind() {
        assert!(tan_project(std::f64::consts::PI, 0.0, 0.0, 0.0).is_none());
    }

    #[test]
    fn test_cd_inverse_roundtrip() {
        let cd = Matrix2::new(1.2e-5, -3.0e-6, 2.5e-6, 1.1e-5);
        let inv = cd_inverse(&cd).unwrap();
        let ident = cd * inv;
        assert!((ident - Matrix2::identity()).abs().max() < 1e-12);
    }

    #[test]
    fn test_cd_inverse_singular() {
        let cd = Matrix2::new(1e-5, 2e-5, 2e-5, 4e-5);
        assert!(cd_inverse(&cd).is_none());
    }

    #[test]
    fn test_pixel_sky_roundtrip() {
        let wcs = TanWcs::new(
            SkyCoord::from_degrees(215.5, 53.0),
            [1500.0, 1500.0],
            Matrix2::new(-2.5e-7, 1.0e-8, 1.2e-8, 2.5e-7),
        );

        for &(x, y) in &[(0.0, 0.0), (1500.0, 1500.0), (2900.0, 120.0), (-50.0, 3100.0)] {
            let sky = wcs.pixel_to_sky(x, y);
            let (x2, y2) = wcs.sky_to_pixel(&sky).unwrap();
            assert!(
                (x - x2).abs() < 1e-7 && (y - y2).abs() < 1e-7,
                "({x}, {y}) -> ({x2}, {y2})"
            );
        }

        let centre = wcs.pixel_to_sky(1500.0, 1500.0);
        assert!(centre.separation(&wcs.crval) < 1e-15);
    }
}
