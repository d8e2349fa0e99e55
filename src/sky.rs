//! Positions on the celestial sphere.

use crate::Vector3;

/// A fixed-frame (ICRS) sky position.
///
/// Angles are stored in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyCoord {
    pub ra_rad: f64,
    pub dec_rad: f64,
}

impl SkyCoord {
    pub fn new(ra_rad: f64, dec_rad: f64) -> Self {
        Self { ra_rad, dec_rad }
    }

    pub fn from_degrees(ra_deg: f64, dec_deg: f64) -> Self {
        Self::new(ra_deg.to_radians(), dec_deg.to_radians())
    }

    /// Unit vector pointing to this position on the celestial sphere.
    pub fn uvec(&self) -> Vector3 {
        let (rasin, racos) = self.ra_rad.sin_cos();
        let (decsin, deccos) = self.dec_rad.sin_cos();
        Vector3::new(deccos * racos, deccos * rasin, decsin)
    }

    /// Great-circle separation to `other`, in radians.
    ///
    /// Uses `atan2(|a × b|, a · b)`, which stays accurate for both tiny and
    /// near-antipodal separations.
    pub fn separation(&self, other: &SkyCoord) -> f64 {
        let a = self.uvec();
        let b = other.uvec();
        a.cross(&b).norm().atan2(a.dot(&b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separation_small_angle() {
        let a = SkyCoord::from_degrees(215.5, 53.0);
        let b = SkyCoord::from_degrees(215.5, 53.0 + 1.0 / 3600.0);
        let sep_arcsec = a.separation(&b).to_degrees() * 3600.0;
        assert!((sep_arcsec - 1.0).abs() < 1e-6, "sep = {sep_arcsec}");
    }

    #[test]
    fn test_separation_symmetric_and_zero() {
        let a = SkyCoord::new(1.2, -0.4);
        let b = SkyCoord::new(1.25, -0.38);
        assert!((a.separation(&b) - b.separation(&a)).abs() < 1e-15);
        assert!(a.separation(&a).abs() < 1e-15);
    }

    #[test]
    fn test_uvec_is_unit() {
        let v = SkyCoord::from_degrees(83.0, -1.0).uvec();
        assert!((v.norm() - 1.0).abs() < 1e-15);
    }
}
