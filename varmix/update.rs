//! # Coordinate-Ascent Updates for the Multi-Slab Spike-and-Slab Posterior
//!
//! One sweep visits the variables named by a schedule, strictly in order, and for
//! each variable `i`:
//!
//! 1.  Removes its current expected effect `e_i = sum_k alpha[k, i] mu[k, i]` from
//!     the fitted response: `Xr <- Xr - X[:, i] e_i`.
//! 2.  Computes, for every mixture component, the posterior variance `s_k` and the
//!     conditional mean `mu[k, i] = s_k (xy_i - X[:, i]' Xr) / sigma`.
//! 3.  Turns the per-component log scores into assignment probabilities with a
//!     max-shifted softmax.
//! 4.  Adds the new expected effect back: `Xr <- Xr + X[:, i] e_i'`.
//!
//! Step 4 for one variable changes what step 2 sees for every later variable, so
//! the sweep is Gauss-Seidel and must stay sequential. Running it over several
//! indices at once would compute the Jacobi iteration, which is a different
//! algorithm with different fixed-point dynamics.

use crate::component::{conditional_mean, log_score, normalize_log_weights, posterior_variance};
use crate::matrix::{DesignColumns, MatrixError};
use crate::prior::{MixturePrior, PriorError};
use crate::schedule::{ScheduleError, validate_indices};
use crate::settings::{SettingsError, UpdateSettings};
use crate::state::PosteriorState;
use crate::stats::SufficientStatistics;
use ndarray::{Array1, ArrayView1, ArrayView2};
use std::time::Instant;
use thiserror::Error;

/// Everything that can stop a sweep before it starts, plus the optional
/// post-sweep consistency check.
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("Residual variance must be finite and positive, but was {0}.")]
    InvalidResidualVariance(f64),

    #[error("{what} has shape {found:?}, but {expected:?} was required.")]
    ShapeMismatch {
        what: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("{what} has length {found}, but {expected} was required.")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("{what} for variable {index} is invalid ({value}); it must be finite{constraint}.")]
    InvalidStatistic {
        what: &'static str,
        index: usize,
        value: f64,
        constraint: &'static str,
    },

    #[error("Invalid update schedule: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Invalid mixture prior: {0}")]
    Prior(#[from] PriorError),

    #[error("Invalid update settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("Matrix error: {0}")]
    Matrix(#[from] MatrixError),

    #[error(
        "The fitted response drifted {drift:.3e} from X * E[beta], beyond the tolerance {tolerance:.3e}."
    )]
    FittedResponseDrift { drift: f64, tolerance: f64 },
}

/// What one sweep did, for the caller's convergence bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SweepSummary {
    /// Number of single-variable updates applied (the schedule length).
    pub updates: usize,
    /// Largest `|alpha_new - alpha_old|` over all updated entries.
    pub max_alpha_change: f64,
    /// Largest `|mu_new - mu_old|` over all updated entries.
    pub max_mean_change: f64,
}

/// The coordinate-ascent update engine for a fixed design, prior, and residual
/// variance.
///
/// The engine holds only shared borrows; the posterior it updates is passed to each
/// sweep, so one engine can serve many outer iterations.
pub struct CoordinateAscent<'a, X: ?Sized> {
    design: &'a X,
    sigma: f64,
    prior: &'a MixturePrior,
    stats: &'a SufficientStatistics,
    settings: UpdateSettings,
}

/// Scratch space for one sweep. Allocated once, dropped on every exit path.
struct SweepBuffers {
    column: Array1<f64>,
    variances: Vec<f64>,
    log_scores: Vec<f64>,
    probabilities: Vec<f64>,
    previous_alpha: Vec<f64>,
    previous_mu: Vec<f64>,
}

impl SweepBuffers {
    fn new(num_samples: usize, num_components: usize) -> Self {
        Self {
            column: Array1::zeros(num_samples),
            variances: vec![0.0; num_components],
            log_scores: vec![0.0; num_components],
            probabilities: vec![0.0; num_components],
            previous_alpha: vec![0.0; num_components],
            previous_mu: vec![0.0; num_components],
        }
    }
}

impl<'a, X> CoordinateAscent<'a, X>
where
    X: DesignColumns + Sync + ?Sized,
{
    /// Validates the fixed inputs of the model.
    ///
    /// The residual variance must be positive and finite. The statistics must have one
    /// finite entry per design column, with non-negative sums of squares.
    pub fn new(
        design: &'a X,
        sigma: f64,
        prior: &'a MixturePrior,
        stats: &'a SufficientStatistics,
    ) -> Result<Self, UpdateError> {
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(UpdateError::InvalidResidualVariance(sigma));
        }

        let p = design.num_variables();
        check_length("xy", p, stats.xy.len())?;
        check_length("d", p, stats.d.len())?;
        for (index, &value) in stats.xy.iter().enumerate() {
            if !value.is_finite() {
                return Err(UpdateError::InvalidStatistic {
                    what: "xy",
                    index,
                    value,
                    constraint: "",
                });
            }
        }
        for (index, &value) in stats.d.iter().enumerate() {
            if !value.is_finite() || value < 0.0 {
                return Err(UpdateError::InvalidStatistic {
                    what: "d",
                    index,
                    value,
                    constraint: " and non-negative",
                });
            }
        }

        Ok(Self {
            design,
            sigma,
            prior,
            stats,
            settings: UpdateSettings::default(),
        })
    }

    /// Replaces the default settings.
    ///
    /// The engine reads `consistency_tolerance`. The weight offset `eps` has
    /// already been applied by the time a `MixturePrior` exists; build the prior
    /// with `MixturePrior::from_settings` to take it from the same settings.
    pub fn with_settings(mut self, settings: UpdateSettings) -> Result<Self, UpdateError> {
        settings.validate()?;
        self.settings = settings;
        Ok(self)
    }

    pub fn settings(&self) -> &UpdateSettings {
        &self.settings
    }

    /// Runs the schedule on a copy of `initial` and returns the updated copy.
    pub fn run(
        &self,
        initial: &PosteriorState,
        schedule: &[usize],
    ) -> Result<(PosteriorState, SweepSummary), UpdateError> {
        let mut state = initial.clone();
        let summary = self.sweep(&mut state, schedule)?;
        Ok((state, summary))
    }

    /// Applies the schedule to `state` in place, one variable at a time.
    ///
    /// Shapes and every schedule index are checked before the first write, so a
    /// rejected call leaves `state` untouched. An empty schedule is a no-op.
    pub fn sweep(
        &self,
        state: &mut PosteriorState,
        schedule: &[usize],
    ) -> Result<SweepSummary, UpdateError> {
        self.check_state(state)?;
        validate_indices(schedule, self.design.num_variables())?;

        let mut summary = SweepSummary::default();
        if schedule.is_empty() {
            return Ok(summary);
        }

        let start = Instant::now();
        log::debug!(
            "Coordinate ascent sweep: {} updates over {} variables, {} samples, {} mixture components",
            schedule.len(),
            self.design.num_variables(),
            self.design.num_samples(),
            self.prior.num_components()
        );

        let mut buffers = SweepBuffers::new(self.design.num_samples(), self.prior.num_components());
        for &i in schedule {
            self.update_variable(i, state, &mut buffers, &mut summary);
        }

        log::debug!(
            "Sweep finished in {:.2?}: max |d alpha| = {:.3e}, max |d mu| = {:.3e}",
            start.elapsed(),
            summary.max_alpha_change,
            summary.max_mean_change
        );

        if let Some(tolerance) = self.settings.consistency_tolerance {
            let drift = state.fitted_drift(self.design)?;
            if drift > tolerance {
                log::warn!(
                    "Fitted response drifted {:.3e} from a fresh X * E[beta] (tolerance {:.3e})",
                    drift,
                    tolerance
                );
                return Err(UpdateError::FittedResponseDrift { drift, tolerance });
            }
        }

        Ok(summary)
    }

    fn check_state(&self, state: &PosteriorState) -> Result<(), UpdateError> {
        let expected = (self.prior.num_components(), self.design.num_variables());
        check_shape("alpha", expected, state.alpha.dim())?;
        check_shape("mu", expected, state.mu.dim())?;
        check_length("fitted response", self.design.num_samples(), state.fitted.len())?;
        Ok(())
    }

    /// Steps 1 to 4 of the module docs for variable `i`.
    fn update_variable(
        &self,
        i: usize,
        state: &mut PosteriorState,
        buffers: &mut SweepBuffers,
        summary: &mut SweepSummary,
    ) {
        let sigma = self.sigma;
        let xy = self.stats.xy[i];
        let d = self.stats.d[i];
        let variances = self.prior.variances();
        let log_weights = self.prior.log_weights();

        self.design.load_column(i, &mut buffers.column);
        let x = &buffers.column;

        let mut alpha = state.alpha.column_mut(i);
        let mut mu = state.mu.column_mut(i);
        for k in 0..alpha.len() {
            buffers.previous_alpha[k] = alpha[k];
            buffers.previous_mu[k] = mu[k];
        }

        let old_effect = alpha.dot(&mu);
        if old_effect != 0.0 {
            state.fitted.scaled_add(-old_effect, x);
        }
        let residual_cross_product = xy - x.dot(&state.fitted);

        for k in 0..variances.len() {
            let sa = variances[k];
            buffers.variances[k] = posterior_variance(sigma, sa, d);
            buffers.log_scores[k] = log_score(log_weights[k], sa, d, sigma, residual_cross_product);
            mu[k] = conditional_mean(sa, d, residual_cross_product);
        }
        normalize_log_weights(&buffers.log_scores, &mut buffers.probabilities);
        for (k, &prob) in buffers.probabilities.iter().enumerate() {
            alpha[k] = prob;
        }

        let new_effect = alpha.dot(&mu);
        if new_effect != 0.0 {
            state.fitted.scaled_add(new_effect, x);
        }

        for k in 0..alpha.len() {
            summary.max_alpha_change = summary
                .max_alpha_change
                .max((alpha[k] - buffers.previous_alpha[k]).abs());
            summary.max_mean_change = summary
                .max_mean_change
                .max((mu[k] - buffers.previous_mu[k]).abs());
        }
        summary.updates += 1;

        log::trace!(
            "variable {}: E[beta] {:.6e} -> {:.6e}, smallest posterior variance {:.3e}",
            i,
            old_effect,
            new_effect,
            buffers.variances.iter().copied().fold(f64::INFINITY, f64::min)
        );
    }
}

fn check_length(what: &'static str, expected: usize, found: usize) -> Result<(), UpdateError> {
    if expected != found {
        return Err(UpdateError::LengthMismatch {
            what,
            expected,
            found,
        });
    }
    Ok(())
}

fn check_shape(
    what: &'static str,
    expected: (usize, usize),
    found: (usize, usize),
) -> Result<(), UpdateError> {
    if expected != found {
        return Err(UpdateError::ShapeMismatch {
            what,
            expected,
            found,
        });
    }
    Ok(())
}

/// One-call form of the engine taking raw mixture weights `q`.
///
/// `logw_k = ln(q_k + eps)` is computed once for the whole call. The returned state
/// is a fresh copy; `alpha0`, `mu0`, and `fitted0` are not modified.
#[allow(clippy::too_many_arguments)]
pub fn update<X>(
    design: &X,
    sigma: f64,
    prior_variances: ArrayView1<f64>,
    weights: ArrayView1<f64>,
    xy: ArrayView1<f64>,
    d: ArrayView1<f64>,
    alpha0: ArrayView2<f64>,
    mu0: ArrayView2<f64>,
    fitted0: ArrayView1<f64>,
    schedule: &[usize],
    eps: f64,
) -> Result<PosteriorState, UpdateError>
where
    X: DesignColumns + Sync + ?Sized,
{
    let prior = MixturePrior::from_weights(prior_variances, weights, eps)?;
    run_once(design, sigma, &prior, xy, d, alpha0, mu0, fitted0, schedule)
}

/// One-call form of the engine taking precomputed log mixture weights.
#[allow(clippy::too_many_arguments)]
pub fn update_with_log_weights<X>(
    design: &X,
    sigma: f64,
    prior_variances: ArrayView1<f64>,
    log_weights: ArrayView1<f64>,
    xy: ArrayView1<f64>,
    d: ArrayView1<f64>,
    alpha0: ArrayView2<f64>,
    mu0: ArrayView2<f64>,
    fitted0: ArrayView1<f64>,
    schedule: &[usize],
) -> Result<PosteriorState, UpdateError>
where
    X: DesignColumns + Sync + ?Sized,
{
    let prior = MixturePrior::from_log_weights(prior_variances, log_weights)?;
    run_once(design, sigma, &prior, xy, d, alpha0, mu0, fitted0, schedule)
}

#[allow(clippy::too_many_arguments)]
fn run_once<X>(
    design: &X,
    sigma: f64,
    prior: &MixturePrior,
    xy: ArrayView1<f64>,
    d: ArrayView1<f64>,
    alpha0: ArrayView2<f64>,
    mu0: ArrayView2<f64>,
    fitted0: ArrayView1<f64>,
    schedule: &[usize],
) -> Result<PosteriorState, UpdateError>
where
    X: DesignColumns + Sync + ?Sized,
{
    let stats = SufficientStatistics::new(xy.to_owned(), d.to_owned())?;
    let engine = CoordinateAscent::new(design, sigma, prior, &stats)?;
    let mut state = PosteriorState::new(alpha0.to_owned(), mu0.to_owned(), fitted0.to_owned());
    engine.sweep(&mut state, schedule)?;
    Ok(state)
}
