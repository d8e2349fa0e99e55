//! Rank-tolerant linear least squares.

use nalgebra::{DMatrix, DVector};
use tracing::warn;

use crate::error::{Result, SipFitError};

use super::{notify, FitEvent, FitObserver, FitStage};

/// Solution of a least-squares problem.
#[derive(Debug, Clone)]
pub struct LstsqSolution {
    /// Minimum-norm coefficients minimising `‖A·x − b‖₂`.
    pub coeffs: DVector<f64>,
    /// Number of singular values above the cutoff.
    pub rank: usize,
}

impl LstsqSolution {
    /// `true` if the design matrix did not have full column rank.
    pub fn is_rank_deficient(&self) -> bool {
        self.rank < self.coeffs.len()
    }
}

/// Solve `A·x ≈ b` in the least-squares sense with a thin SVD.
///
/// Singular values below `σ_max · max(n, m) · ε` are treated as zero, so a
/// rank-deficient `A` yields the minimum-norm solution instead of blowing up.
pub fn least_squares_solve(b: &DVector<f64>, a: &DMatrix<f64>) -> Result<LstsqSolution> {
    if a.nrows() != b.len() {
        return Err(SipFitError::DimensionMismatch {
            context: "least-squares rows",
            expected: a.nrows(),
            actual: b.len(),
        });
    }

    let ncols = a.ncols();
    if a.nrows() == 0 || ncols == 0 {
        return Ok(LstsqSolution {
            coeffs: DVector::zeros(ncols),
            rank: 0,
        });
    }

    let svd = a.clone().svd(true, true);
    let sv_max = svd.singular_values.max();
    let eps = sv_max * a.nrows().max(ncols) as f64 * f64::EPSILON;
    let rank = svd.rank(eps);
    let coeffs = svd.solve(b, eps).map_err(SipFitError::Decomposition)?;

    Ok(LstsqSolution { coeffs, rank })
}

/// Solve one axis of a fit stage, reporting a rank-deficient design matrix.
///
/// Rank deficiency is not fatal: the minimum-norm coefficients are still returned.
pub(crate) fn solve_stage(
    b: &DVector<f64>,
    a: &DMatrix<f64>,
    stage: FitStage,
    observer: Option<&dyn FitObserver>,
) -> Result<DVector<f64>> {
    let sol = least_squares_solve(b, a)?;
    if sol.is_rank_deficient() {
        warn!(
            "{:?} SIP fit: design matrix rank {} < {} terms ({} samples)",
            stage,
            sol.rank,
            a.ncols(),
            a.nrows()
        );
        notify(
            observer,
            FitEvent::RankDeficient {
                stage,
                rank: sol.rank,
                terms: a.ncols(),
            },
        );
    }
    Ok(sol.coeffs)
}
