//! Polynomial term indexing and design-matrix construction.
//!
//! A polynomial of order `n` in two variables uses every monomial `u^p · v^q`
//! with `p + q < n`, giving `n·(n+1)/2` terms. Terms are indexed by walking the
//! `p = const` columns of the triangle:
//!
//! ```text
//! order 3:  0:(0,0) 1:(0,1) 2:(0,2) 3:(1,0) 4:(1,1) 5:(2,0)
//! ```
//!
//! Index 0 is always the constant term, index 1 the `v` term, and index
//! `order` the `u` term. The forward fit reads the linear part of the
//! solution straight out of those three slots.

use nalgebra::DMatrix;

use crate::error::{Result, SipFitError};

/// Number of polynomial terms for the given order: `order·(order+1)/2`.
pub fn num_terms(order: u32) -> usize {
    let n = order as usize;
    n * (n + 1) / 2
}

/// Exponents `(p, q)` of the `index`'th term `u^p · v^q` for a polynomial of `order`.
///
/// Bijective from `0..num_terms(order)` onto `{(p, q) : p + q < order}`.
pub fn index_to_pq(index: usize, order: u32) -> (u32, u32) {
    let mut p = 0u32;
    let mut q = index;
    let mut decrement = order as usize;
    while decrement > 0 && q >= decrement {
        q -= decrement;
        p += 1;
        decrement -= 1;
    }
    (p, q as u32)
}

/// All `(p, q)` pairs for the given order, in index order.
pub fn term_pairs(order: u32) -> Vec<(u32, u32)> {
    (0..num_terms(order))
        .map(|i| index_to_pq(i, order))
        .collect()
}

/// Build the regression design matrix for samples `(x_i, y_i)`.
///
/// Row `i`, column `j` holds `x_i^p · y_i^q` with `(p, q) = index_to_pq(j, order)`.
pub fn design_matrix(x: &[f64], y: &[f64], order: u32) -> Result<DMatrix<f64>> {
    if x.len() != y.len() {
        return Err(SipFitError::DimensionMismatch {
            context: "design matrix axes",
            expected: x.len(),
            actual: y.len(),
        });
    }

    let terms = term_pairs(order);
    Ok(DMatrix::from_fn(x.len(), terms.len(), |i, j| {
        let (p, q) = terms[j];
        x[i].powi(p as i32) * y[i].powi(q as i32)
    }))
}
