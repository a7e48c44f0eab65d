use crate::matrix::{DesignColumns, MatrixError, fitted_response};
use crate::prior::MixturePrior;
use ndarray::{Array1, Array2, Axis, Zip};
use serde::{Deserialize, Serialize};

/// The variational posterior threaded through successive sweeps.
///
/// * `alpha[[k, j]]`: probability that variable `j`'s effect belongs to component `k`.
/// * `mu[[k, j]]`: posterior mean of that effect given membership in `k`.
/// * `fitted`: `X · E[beta]` with `E[beta_j] = sum_k alpha[[k, j]] * mu[[k, j]]`.
///
/// `alpha` and `mu` are K x p; `fitted` has length n.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosteriorState {
    pub alpha: Array2<f64>,
    pub mu: Array2<f64>,
    pub fitted: Array1<f64>,
}

impl PosteriorState {
    /// Bundles existing arrays. Shapes are checked when the state meets an engine.
    pub fn new(alpha: Array2<f64>, mu: Array2<f64>, fitted: Array1<f64>) -> Self {
        Self { alpha, mu, fitted }
    }

    /// All-zero state: every effect is zero and the fitted response is zero.
    pub fn zeros(num_components: usize, num_variables: usize, num_samples: usize) -> Self {
        Self {
            alpha: Array2::zeros((num_components, num_variables)),
            mu: Array2::zeros((num_components, num_variables)),
            fitted: Array1::zeros(num_samples),
        }
    }

    /// Starting point with every column of `alpha` equal to the normalized prior
    /// weights and all means zero. The fitted response is zero, which is already
    /// consistent because every expected effect is zero.
    pub fn from_prior(prior: &MixturePrior, num_variables: usize, num_samples: usize) -> Self {
        let weights = prior.normalized_weights();
        let mut state = Self::zeros(prior.num_components(), num_variables, num_samples);
        for mut column in state.alpha.axis_iter_mut(Axis(1)) {
            column.assign(&weights);
        }
        state
    }

    pub fn num_components(&self) -> usize {
        self.alpha.nrows()
    }

    pub fn num_variables(&self) -> usize {
        self.alpha.ncols()
    }

    /// `E[beta_j] = sum_k alpha[[k, j]] * mu[[k, j]]`.
    pub fn expected_effect(&self, j: usize) -> f64 {
        self.alpha.column(j).dot(&self.mu.column(j))
    }

    /// The posterior mean of every effect.
    pub fn expected_effects(&self) -> Array1<f64> {
        Zip::from(self.alpha.columns())
            .and(self.mu.columns())
            .map_collect(|a, m| a.dot(&m))
    }

    /// Replaces `fitted` with `X · E[beta]` computed from scratch.
    ///
    /// Use this once when seeding a state with nonzero means; sweeps keep it
    /// current afterwards.
    pub fn initialize_fitted<X>(&mut self, design: &X) -> Result<(), MatrixError>
    where
        X: DesignColumns + Sync + ?Sized,
    {
        self.fitted = fitted_response(design, self.expected_effects().view())?;
        Ok(())
    }

    /// Largest absolute difference between `fitted` and a fresh `X · E[beta]`.
    pub fn fitted_drift<X>(&self, design: &X) -> Result<f64, MatrixError>
    where
        X: DesignColumns + Sync + ?Sized,
    {
        let exact = fitted_response(design, self.expected_effects().view())?;
        if exact.len() != self.fitted.len() {
            return Err(MatrixError::ResponseLength {
                expected: exact.len(),
                found: self.fitted.len(),
            });
        }
        Ok(Zip::from(&exact)
            .and(&self.fitted)
            .fold(0.0_f64, |acc, &a, &b| worst(acc, (a - b).abs())))
    }

    /// Largest `|sum_k alpha[[k, j]] - 1|` over all variables.
    ///
    /// Columns that were never updated from an all-zero start report 1. A column
    /// holding NaN or infinity reports infinity.
    pub fn max_column_sum_error(&self) -> f64 {
        self.alpha
            .sum_axis(Axis(0))
            .iter()
            .fold(0.0_f64, |acc, &s| worst(acc, (s - 1.0).abs()))
    }
}

// `f64::max` discards NaN, which would hide a corrupted entry.
fn worst(acc: f64, error: f64) -> f64 {
    if error.is_finite() { acc.max(error) } else { f64::INFINITY }
}
