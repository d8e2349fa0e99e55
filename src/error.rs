//! Error types for SIP distortion fitting.
//!
//! Configuration and data-sufficiency problems are detected before any numerical
//! work starts, so a failed fit never leaves a half-built WCS behind.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, SipFitError>;

/// Errors raised while fitting a TAN-SIP WCS.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SipFitError {
    /// The requested polynomial order is below 2.
    #[error("SIP must be at least 2nd order, got order {order}")]
    OrderTooLow { order: u32 },

    /// The forward SIP order (`order + 1`) is above the convention limit.
    #[error("SIP forward order {order} exceeds the convention limit of {limit}")]
    ForwardOrderExceedsLimit { order: u32, limit: u32 },

    /// The reverse SIP order (`order + 2`) is above the convention limit.
    #[error("SIP reverse order {order} exceeds the convention limit of {limit}")]
    ReverseOrderExceedsLimit { order: u32, limit: u32 },

    /// The reverse-fit grid needs at least two samples per axis.
    #[error("grid resolution {ngrid} is too small, need at least 2 samples per axis")]
    GridTooSmall { ngrid: usize },

    /// The reverse fit was asked to sample an empty region.
    #[error("validity region is empty")]
    EmptyValidityRegion,

    /// Fewer matches than the forward SIP order.
    #[error("number of matches ({matches}) less than requested SIP order ({order})")]
    InsufficientMatches { matches: usize, order: u32 },

    /// A reference position could not be projected onto the tangent plane.
    #[error("reference position of match {index} lies behind the tangent plane")]
    BehindTangentPlane { index: usize },

    /// The CD matrix recovered from the linear terms cannot be inverted.
    #[error("refined CD matrix is singular (det = {det:e})")]
    SingularCdMatrix { det: f64 },

    /// The singular value decomposition could not produce a solution.
    #[error("least-squares decomposition failed: {0}")]
    Decomposition(&'static str),

    /// Two inputs that must agree in length do not.
    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The fitted WCS scatters too much on the sky to be trusted.
    #[error("fit failed: median scatter on sky = {scatter_arcsec:.3} arcsec > {max_arcsec:.3} arcsec")]
    ScatterTooLarge { scatter_arcsec: f64, max_arcsec: f64 },
}
