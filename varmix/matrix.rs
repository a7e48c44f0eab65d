//! Column access to the design matrix.
//!
//! The update engine never indexes into matrix storage directly. It asks for one
//! column at a time through [`DesignColumns`], which copies the column into an
//! `f64` scratch buffer. Any `ndarray` 2-D array or view works, whatever its
//! memory order, and single-precision designs are widened on the fly.

use ndarray::{Array1, ArrayBase, ArrayView1, ArrayView2, Data, Ix2, ShapeBuilder};
use rayon::prelude::*;
use thiserror::Error;

/// Errors raised while building views over caller-supplied buffers.
#[derive(Error, Debug)]
pub enum MatrixError {
    #[error("A buffer of {found} values cannot hold a {rows} x {cols} design matrix.")]
    BufferLength {
        rows: usize,
        cols: usize,
        found: usize,
    },
    #[error("The response vector has {found} entries, but the design matrix has {expected} rows.")]
    ResponseLength { expected: usize, found: usize },
    #[error("The effect vector has {found} entries, but the design matrix has {expected} columns.")]
    EffectLength { expected: usize, found: usize },
    #[error("Sufficient statistics disagree in length: {xy} cross-products but {d} sums of squares.")]
    StatisticLength { xy: usize, d: usize },
    #[error("Invalid matrix shape: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Read-only, column-at-a-time access to an n x p design matrix.
pub trait DesignColumns {
    /// Number of observations (rows).
    fn num_samples(&self) -> usize;

    /// Number of regression variables (columns).
    fn num_variables(&self) -> usize;

    /// Copies column `index` into `out`, converting to `f64`.
    ///
    /// `out` must already have length `num_samples()`. Panics if `index` is out of
    /// range; callers validate indices before entering their loops.
    fn load_column(&self, index: usize, out: &mut Array1<f64>);
}

impl<A, S> DesignColumns for ArrayBase<S, Ix2>
where
    S: Data<Elem = A>,
    A: Copy + Into<f64>,
{
    fn num_samples(&self) -> usize {
        self.nrows()
    }

    fn num_variables(&self) -> usize {
        self.ncols()
    }

    fn load_column(&self, index: usize, out: &mut Array1<f64>) {
        debug_assert_eq!(out.len(), self.nrows());
        for (dst, &src) in out.iter_mut().zip(self.column(index).iter()) {
            *dst = src.into();
        }
    }
}

/// Views a flat column-major buffer (Fortran order) as an n x p matrix.
pub fn column_major<A>(values: &[A], rows: usize, cols: usize) -> Result<ArrayView2<'_, A>, MatrixError> {
    check_buffer_length(values.len(), rows, cols)?;
    Ok(ArrayView2::from_shape((rows, cols).f(), values)?)
}

/// Views a flat row-major buffer (C order) as an n x p matrix.
pub fn row_major<A>(values: &[A], rows: usize, cols: usize) -> Result<ArrayView2<'_, A>, MatrixError> {
    check_buffer_length(values.len(), rows, cols)?;
    Ok(ArrayView2::from_shape((rows, cols), values)?)
}

fn check_buffer_length(found: usize, rows: usize, cols: usize) -> Result<(), MatrixError> {
    if rows.checked_mul(cols) != Some(found) {
        return Err(MatrixError::BufferLength { rows, cols, found });
    }
    Ok(())
}

/// Recomputes `X · effects` from scratch.
///
/// Columns are independent, so the product is accumulated in parallel with one
/// partial sum per rayon job. Zero effects are skipped. This is the reference the
/// incremental fitted-response bookkeeping is checked against; the sweep itself
/// never calls it.
pub fn fitted_response<X>(design: &X, effects: ArrayView1<f64>) -> Result<Array1<f64>, MatrixError>
where
    X: DesignColumns + Sync + ?Sized,
{
    let n = design.num_samples();
    let p = design.num_variables();
    if effects.len() != p {
        return Err(MatrixError::EffectLength {
            expected: p,
            found: effects.len(),
        });
    }

    let fitted = (0..p)
        .into_par_iter()
        .filter(|&j| effects[j] != 0.0)
        .fold(
            || (Array1::<f64>::zeros(n), Array1::<f64>::zeros(n)),
            |(mut acc, mut column), j| {
                design.load_column(j, &mut column);
                acc.scaled_add(effects[j], &column);
                (acc, column)
            },
        )
        .map(|(acc, _)| acc)
        .reduce(|| Array1::<f64>::zeros(n), |a, b| a + b);

    Ok(fitted)
}
