//! Matched reference/observed star pairs and their residual statistics.
//!
//! A match pairs a reference position on the sky with the centroid where that
//! star was observed on the detector. The fitting engine is generic over any
//! record that can provide both through [`StarMatch`].

use crate::centroid::Centroid;
use crate::sky::SkyCoord;
use crate::wcs::Wcs;

/// A matched pair: reference sky position and observed pixel position.
pub trait StarMatch {
    /// Reference (catalog) position in the fixed sky frame.
    fn sky(&self) -> SkyCoord;
    /// Observed (distorted) detector position, 0-indexed pixels.
    fn centroid(&self) -> Centroid;
}

/// Plain owned match record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceMatch {
    pub sky: SkyCoord,
    pub centroid: Centroid,
}

impl ReferenceMatch {
    pub fn new(sky: SkyCoord, centroid: Centroid) -> Self {
        Self { sky, centroid }
    }
}

impl StarMatch for ReferenceMatch {
    fn sky(&self) -> SkyCoord {
        self.sky
    }

    fn centroid(&self) -> Centroid {
        self.centroid
    }
}

impl StarMatch for (SkyCoord, Centroid) {
    fn sky(&self) -> SkyCoord {
        self.0
    }

    fn centroid(&self) -> Centroid {
        self.1
    }
}

impl<M: StarMatch> StarMatch for &M {
    fn sky(&self) -> SkyCoord {
        (*self).sky()
    }

    fn centroid(&self) -> Centroid {
        (*self).centroid()
    }
}

// ── Statistics ──────────────────────────────────────────────────────────────

/// Sigma threshold for the clipped statistics.
pub const CLIP_SIGMA: f64 = 3.0;
/// Maximum number of clipping passes.
pub const CLIP_ITERATIONS: usize = 3;

/// Summary statistics of a set of per-match distances.
///
/// All fields are `NaN` when `count == 0`; the standard deviations are also
/// `NaN` with fewer than two values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchStatistics {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation (divides by `n − 1`).
    pub stdev: f64,
    /// Interquartile range, `q75 − q25`.
    pub iqr: f64,
    pub min: f64,
    pub max: f64,
    /// Mean after iterative [`CLIP_SIGMA`] clipping about the median.
    pub mean_clip: f64,
    /// Sample standard deviation of the values that survive clipping.
    pub stdev_clip: f64,
    /// Number of values that survive clipping.
    pub count_clip: usize,
}

impl MatchStatistics {
    pub fn from_values(values: &[f64]) -> Self {
        let count = values.len();
        if count == 0 {
            return Self {
                count,
                mean: f64::NAN,
                median: f64::NAN,
                stdev: f64::NAN,
                iqr: f64::NAN,
                min: f64::NAN,
                max: f64::NAN,
                mean_clip: f64::NAN,
                stdev_clip: f64::NAN,
                count_clip: 0,
            };
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let (mean, stdev) = mean_stdev(&sorted);
        let clipped = sigma_clip(&sorted);
        let (mean_clip, stdev_clip) = mean_stdev(&clipped);

        Self {
            count,
            mean,
            median: quantile(&sorted, 0.5),
            stdev,
            iqr: quantile(&sorted, 0.75) - quantile(&sorted, 0.25),
            min: sorted[0],
            max: sorted[count - 1],
            mean_clip,
            stdev_clip,
            count_clip: clipped.len(),
        }
    }
}

/// Mean and sample standard deviation of a non-empty slice.
fn mean_stdev(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;
    let stdev = if n > 1 {
        let ss: f64 = values.iter().map(|&x| (x - mean) * (x - mean)).sum();
        (ss / (n - 1) as f64).sqrt()
    } else {
        f64::NAN
    };
    (mean, stdev)
}

/// Iteratively drop values further than `CLIP_SIGMA·σ` from the median, with
/// σ estimated as `1.4826·MAD`. Input and output are sorted.
fn sigma_clip(sorted: &[f64]) -> Vec<f64> {
    let mut kept = sorted.to_vec();
    for _ in 0..CLIP_ITERATIONS {
        let median = quantile(&kept, 0.5);
        let mut abs_devs: Vec<f64> = kept.iter().map(|&x| (x - median).abs()).collect();
        abs_devs.sort_by(|a, b| a.total_cmp(b));
        let sigma = quantile(&abs_devs, 0.5) * 1.4826;
        if sigma < 1e-12 {
            break;
        }

        let threshold = CLIP_SIGMA * sigma;
        let next: Vec<f64> = kept
            .iter()
            .copied()
            .filter(|&x| (x - median).abs() <= threshold)
            .collect();
        if next.len() == kept.len() {
            break;
        }
        kept = next;
    }
    kept
}

/// Linearly interpolated quantile of an already sorted, non-empty slice. `p` is in [0, 1].
fn quantile(sorted: &[f64], p: f64) -> f64 {
    let pos = p * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Pixel distance between each observed centroid and the position `wcs`
/// predicts for its reference star.
///
/// Matches whose reference position falls behind the tangent plane are skipped.
pub fn match_distances_in_pixels<W, M>(wcs: &W, matches: &[M]) -> Vec<f64>
where
    W: Wcs + ?Sized,
    M: StarMatch,
{
    matches
        .iter()
        .filter_map(|m| {
            let (x, y) = wcs.sky_to_pixel(&m.sky())?;
            Some(m.centroid().distance_to(x, y))
        })
        .collect()
}

/// On-sky separation (radians) between each reference position and the sky
/// position `wcs` assigns to its observed centroid.
pub fn match_distances_in_radians<W, M>(wcs: &W, matches: &[M]) -> Vec<f64>
where
    W: Wcs + ?Sized,
    M: StarMatch,
{
    matches
        .iter()
        .map(|m| {
            let c = m.centroid();
            wcs.pixel_to_sky(c.x, c.y).separation(&m.sky())
        })
        .collect()
}

/// Statistics of [`match_distances_in_pixels`].
pub fn make_match_statistics_in_pixels<W, M>(wcs: &W, matches: &[M]) -> MatchStatistics
where
    W: Wcs + ?Sized,
    M: StarMatch,
{
    MatchStatistics::from_values(&match_distances_in_pixels(wcs, matches))
}

/// Statistics of [`match_distances_in_radians`].
pub fn make_match_statistics_in_radians<W, M>(wcs: &W, matches: &[M]) -> MatchStatistics
where
    W: Wcs + ?Sized,
    M: StarMatch,
{
    MatchStatistics::from_values(&match_distances_in_radians(wcs, matches))
}
