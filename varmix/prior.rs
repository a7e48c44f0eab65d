use crate::settings::UpdateSettings;
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a mixture prior is malformed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PriorError {
    #[error("The mixture prior must have at least one component.")]
    NoComponents,
    #[error("The prior has {variances} variance scales but {weights} mixture weights.")]
    LengthMismatch { variances: usize, weights: usize },
    #[error("Prior variance scale for component {component} must be finite and non-negative, but was {value}.")]
    InvalidVariance { component: usize, value: f64 },
    #[error("Mixture weight for component {component} must be finite and non-negative, but was {value}.")]
    InvalidWeight { component: usize, value: f64 },
    #[error(
        "Log mixture weight for component {component} is not finite ({value}). A zero weight needs a positive eps."
    )]
    NonFiniteLogWeight { component: usize, value: f64 },
    #[error("eps must be finite and non-negative, but was {0}.")]
    InvalidEps(f64),
}

/// A K-component mixture-of-normals prior on each effect size.
///
/// Component `k` says the effect is `N(0, sigma * sa_k)`. A component with
/// `sa_k = 0` is the spike at zero. Log-weights are fixed for the lifetime of the
/// prior, which is why they are derived from the raw weights here and not inside
/// the per-variable update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixturePrior {
    variances: Array1<f64>,
    log_weights: Array1<f64>,
}

impl MixturePrior {
    /// Builds the prior from raw mixture weights `q`, using `ln(q_k + eps)`.
    ///
    /// The weights do not need to sum to one; the softmax inside the update
    /// normalizes them.
    pub fn from_weights(
        variances: ArrayView1<f64>,
        weights: ArrayView1<f64>,
        eps: f64,
    ) -> Result<Self, PriorError> {
        check_lengths(variances.len(), weights.len())?;
        if !eps.is_finite() || eps < 0.0 {
            return Err(PriorError::InvalidEps(eps));
        }
        for (component, &value) in weights.iter().enumerate() {
            if !value.is_finite() || value < 0.0 {
                return Err(PriorError::InvalidWeight { component, value });
            }
        }
        let log_weights = weights.mapv(|q| (q + eps).ln());
        Self::from_log_weights(variances, log_weights.view())
    }

    /// Builds the prior from raw mixture weights with the offset from `settings.eps`.
    pub fn from_settings(
        variances: ArrayView1<f64>,
        weights: ArrayView1<f64>,
        settings: &UpdateSettings,
    ) -> Result<Self, PriorError> {
        Self::from_weights(variances, weights, settings.eps)
    }

    /// Builds the prior from precomputed log-weights.
    pub fn from_log_weights(
        variances: ArrayView1<f64>,
        log_weights: ArrayView1<f64>,
    ) -> Result<Self, PriorError> {
        check_lengths(variances.len(), log_weights.len())?;
        for (component, &value) in variances.iter().enumerate() {
            if !value.is_finite() || value < 0.0 {
                return Err(PriorError::InvalidVariance { component, value });
            }
        }
        for (component, &value) in log_weights.iter().enumerate() {
            if !value.is_finite() {
                return Err(PriorError::NonFiniteLogWeight { component, value });
            }
        }
        Ok(Self {
            variances: variances.to_owned(),
            log_weights: log_weights.to_owned(),
        })
    }

    pub fn num_components(&self) -> usize {
        self.variances.len()
    }

    /// Prior variance scales `sa`.
    pub fn variances(&self) -> ArrayView1<'_, f64> {
        self.variances.view()
    }

    /// Log mixture weights `logw`.
    pub fn log_weights(&self) -> ArrayView1<'_, f64> {
        self.log_weights.view()
    }

    /// True if component `k` is a point mass at zero.
    pub fn is_spike(&self, k: usize) -> bool {
        self.variances[k] == 0.0
    }

    /// Mixture weights normalized to sum to one.
    pub fn normalized_weights(&self) -> Array1<f64> {
        let scores = self.log_weights.to_vec();
        let mut weights = vec![0.0; scores.len()];
        crate::component::normalize_log_weights(&scores, &mut weights);
        Array1::from(weights)
    }
}

fn check_lengths(variances: usize, weights: usize) -> Result<(), PriorError> {
    if variances == 0 {
        return Err(PriorError::NoComponents);
    }
    if variances != weights {
        return Err(PriorError::LengthMismatch { variances, weights });
    }
    Ok(())
}
