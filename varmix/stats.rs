use crate::matrix::{DesignColumns, MatrixError};
use ndarray::{Array1, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-variable summaries of the design matrix and response.
///
/// * `xy[j] = X[:, j]' y`
/// * `d[j] = X[:, j]' X[:, j]`
///
/// These must describe the same `X` the update engine is given. Stale values do not
/// raise an error; they silently produce the wrong posterior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SufficientStatistics {
    pub xy: Array1<f64>,
    pub d: Array1<f64>,
}

impl SufficientStatistics {
    /// Wraps precomputed statistics. Both vectors must have one entry per variable.
    pub fn new(xy: Array1<f64>, d: Array1<f64>) -> Result<Self, MatrixError> {
        if xy.len() != d.len() {
            return Err(MatrixError::StatisticLength {
                xy: xy.len(),
                d: d.len(),
            });
        }
        Ok(Self { xy, d })
    }

    /// Computes `xy` and `d` from the design matrix and the response, one column per
    /// rayon task.
    pub fn from_data<X>(design: &X, y: ArrayView1<f64>) -> Result<Self, MatrixError>
    where
        X: DesignColumns + Sync + ?Sized,
    {
        let n = design.num_samples();
        if y.len() != n {
            return Err(MatrixError::ResponseLength {
                expected: n,
                found: y.len(),
            });
        }

        let per_column: Vec<(f64, f64)> = (0..design.num_variables())
            .into_par_iter()
            .map_init(
                || Array1::<f64>::zeros(n),
                |column, j| {
                    design.load_column(j, column);
                    let column = &*column;
                    (column.dot(&y), column.dot(column))
                },
            )
            .collect();

        let (xy, d): (Vec<f64>, Vec<f64>) = per_column.into_iter().unzip();
        log::debug!(
            "Computed sufficient statistics for {} variables over {} samples",
            xy.len(),
            n
        );
        Ok(Self {
            xy: Array1::from(xy),
            d: Array1::from(d),
        })
    }

    pub fn num_variables(&self) -> usize {
        self.xy.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array2, array};

    #[test]
    fn test_from_data_matches_hand_computation() {
        let x = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let y = array![1.0, -1.0, 2.0];
        let stats = SufficientStatistics::from_data(&x, y.view()).unwrap();
        assert_eq!(stats.num_variables(), 2);
        assert_abs_diff_eq!(stats.xy[0], 3.0, epsilon = 1e-15);
        assert_abs_diff_eq!(stats.xy[1], 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(stats.d[0], 2.0, epsilon = 1e-15);
        assert_abs_diff_eq!(stats.d[1], 2.0, epsilon = 1e-15);
    }

    #[test]
    fn test_from_data_accepts_single_precision() {
        let x: Array2<f32> = array![[0.5, 2.0], [1.5, -1.0]];
        let y = array![2.0, 1.0];
        let stats = SufficientStatistics::from_data(&x, y.view()).unwrap();
        assert_abs_diff_eq!(stats.xy[0], 2.5, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.d[1], 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_response_length_is_checked() {
        let x = Array2::<f64>::zeros((3, 2));
        let err = SufficientStatistics::from_data(&x, array![1.0, 2.0].view()).unwrap_err();
        assert!(matches!(
            err,
            MatrixError::ResponseLength {
                expected: 3,
                found: 2
            }
        ));
    }

    #[test]
    fn test_mismatched_precomputed_vectors_are_rejected() {
        assert!(SufficientStatistics::new(array![1.0, 2.0], array![1.0]).is_err());
    }
}
