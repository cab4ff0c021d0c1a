//! Vector arithmetic spread over an [`Executor`]'s workers.
//!
//! Both operations allocate their result up front and run a single
//! parallel phase over it, so no partially computed value ever escapes.

#![deny(rust_2018_idioms, rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

use std::convert::Infallible;

use tandem_executor::{ComputeError, Executor};
use thiserror::Error;

mod matrix;
pub use matrix::Matrix;

/// Errors for vector operations.
#[derive(Debug, Error)]
pub enum VectorError {
    #[error("operand length mismatch: left has {left} elements, right has {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("result of {left}x{right} elements does not fit in memory")]
    TooLarge { left: usize, right: usize },

    #[error(transparent)]
    Compute(#[from] ComputeError<Infallible>),
}

/// Sums two vectors elementwise.
///
/// Both operands must have the same length. This is checked before any
/// worker is started.
pub fn add(ex: &Executor, left: &[f64], right: &[f64]) -> Result<Vec<f64>, VectorError> {
    if left.len() != right.len() {
        return Err(VectorError::LengthMismatch {
            left: left.len(),
            right: right.len(),
        });
    }

    let mut sum = vec![0.0; left.len()];
    ex.fill(&mut sum, |i| Ok::<_, Infallible>(left[i] + right[i]))?;

    Ok(sum)
}

/// Computes the outer product of two vectors of arbitrary lengths.
///
/// Entry `(i, j)` of the result is `left[i] * right[j]`. All entries are
/// computed in one phase over the flattened index space.
pub fn outer(ex: &Executor, left: &[f64], right: &[f64]) -> Result<Matrix, VectorError> {
    let (rows, cols) = (left.len(), right.len());
    let len = rows
        .checked_mul(cols)
        .ok_or(VectorError::TooLarge {
            left: rows,
            right: cols,
        })?;

    log::debug!("Computing {rows}x{cols} outer product");

    let mut product = vec![0.0; len];
    ex.fill(&mut product, |k| Ok::<_, Infallible>(left[k / cols] * right[k % cols]))?;

    Ok(Matrix::from_raw(rows, cols, product))
}
