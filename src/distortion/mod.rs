//! SIP distortion fitting.
//!
//! Refines a linear TAN WCS into a TAN-SIP WCS from a list of matched
//! (reference sky position, observed centroid) pairs.
//!
//! # Pipeline
//!
//! 1. [`forward::fit_forward`] fits a polynomial from pixel offsets to
//!    tangent-plane coordinates. Its constant and linear terms refine CRPIX and
//!    CD; the higher-order terms become the forward A/B coefficients.
//! 2. A provisional TAN-SIP WCS is built with zero reverse coefficients.
//! 3. [`reverse::fit_reverse`] samples that WCS's forward correction on a
//!    regular grid over the validity region and fits the reverse AP/BP
//!    coefficients that undo it.
//! 4. The final TAN-SIP WCS is assembled from all four coefficient matrices.
//!
//! [`create_wcs_with_sip`] runs one pass of this pipeline;
//! [`fit_tan_sip_wcs`] repeats it a few times and rejects fits whose on-sky
//! scatter is implausibly large.
//!
//! # Diagnostics
//!
//! Progress is logged through `tracing`. Callers who want the raw numbers
//! (sampled grid points, rank warnings) can pass a [`FitObserver`]; it only
//! watches, and the fit result is identical with or without one.

pub mod calibrate;
pub mod create;
pub mod forward;
pub mod lstsq;
pub mod polynomial;
pub mod reverse;

pub use calibrate::{fit_tan_sip_wcs, FitTanSipConfig, FitTanSipResult};
pub use create::{create_wcs_with_sip, create_wcs_with_sip_observed, SipFit};
pub use forward::{fit_forward, ForwardFit};
pub use lstsq::{least_squares_solve, LstsqSolution};
pub use polynomial::{design_matrix, index_to_pq, num_terms, term_pairs};
pub use reverse::{fit_reverse, ReverseFit};

use crate::bbox::BoundingBox;

/// Highest SIP order allowed by the FITS SIP convention.
pub const SIP_ORDER_LIMIT: u32 = 9;

/// Configuration for a single TAN-SIP fit.
#[derive(Debug, Clone)]
pub struct SipFitConfig {
    /// Polynomial order of the distortion (≥ 2). The forward fit uses
    /// `order + 1` terms per axis, the reverse fit `order + 2`. Default 4.
    pub order: u32,
    /// Region over which the fit should be valid and the reverse polynomial is
    /// sampled. `None` (or an empty box) derives it from the observed centroids,
    /// padded by `1/√n_matches` of its size on each side.
    pub bbox: Option<BoundingBox>,
    /// Samples per axis of the reverse-fit grid. `None` or `Some(0)` uses
    /// `5 × (order + 1)`.
    pub ngrid: Option<usize>,
}

impl Default for SipFitConfig {
    fn default() -> Self {
        Self {
            order: 4,
            bbox: None,
            ngrid: None,
        }
    }
}

/// Which least-squares problem an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStage {
    /// Pixel → tangent-plane fit of matched stars.
    Forward,
    /// Grid fit of the reverse correction.
    Reverse,
}

/// Diagnostic events reported to a [`FitObserver`].
#[derive(Debug, Clone, PartialEq)]
pub enum FitEvent {
    /// The design matrix had lower rank than it has columns.
    RankDeficient {
        stage: FitStage,
        rank: usize,
        terms: usize,
    },
    /// The forward fit produced a refined linear WCS.
    ForwardRefined {
        crpix: [f64; 2],
        cd: crate::Matrix2,
        norm: f64,
    },
    /// One sampled grid point of the reverse fit.
    GridSample {
        /// Grid row and column.
        row: usize,
        col: usize,
        /// Sample position, 0-indexed pixels.
        x: f64,
        y: f64,
        /// Offset from CRPIX before and after the forward correction.
        u: f64,
        v: f64,
        big_u: f64,
        big_v: f64,
    },
}

/// Receives diagnostic events while a fit runs.
///
/// Closures `Fn(&FitEvent)` implement this trait.
pub trait FitObserver {
    fn on_event(&self, event: &FitEvent);
}

impl<F: Fn(&FitEvent)> FitObserver for F {
    fn on_event(&self, event: &FitEvent) {
        self(event)
    }
}

/// Send `event` to the observer, if there is one.
pub(crate) fn notify(observer: Option<&dyn FitObserver>, event: FitEvent) {
    if let Some(obs) = observer {
        obs.on_event(&event);
    }
}
