//! Per-component posterior quantities for a single regression variable.
//!
//! Everything here is a pure scalar (or K-vector) function so that the two places
//! where NaN and division by zero like to creep in, the zero-variance "spike"
//! component and the softmax over log scores, can be tested without the sweep
//! around them.
//!
//! Notation for variable `i` and component `k`:
//!
//! * `sigma`: residual variance.
//! * `sa_k`: prior variance scale, so the prior on the effect is `N(0, sigma * sa_k)`.
//! * `d_i`: sum of squares of column `i`.
//! * `t_i`: `xy_i - X[:, i]' Xr`, with variable `i` removed from `Xr`.

/// Posterior variance of the effect given membership in component `k`.
///
/// `sigma * sa_k / (sa_k * d_i + 1)`, evaluated in the precision form
/// `sigma / (d_i + 1 / sa_k)` so that no product with `sa_k` can overflow. A zero
/// prior variance yields exactly zero.
#[inline]
pub fn posterior_variance(sigma: f64, prior_variance: f64, sum_of_squares: f64) -> f64 {
    if prior_variance == 0.0 {
        return 0.0;
    }
    sigma / (sum_of_squares + prior_variance.recip())
}

/// Posterior mean of the effect given membership, `s_k * t_i / sigma`.
///
/// The `sigma` cancels, leaving `t_i / (d_i + 1 / sa_k)`. This stays finite for a
/// zero column even when `s_k` itself overflows.
#[inline]
pub fn conditional_mean(prior_variance: f64, sum_of_squares: f64, residual_cross_product: f64) -> f64 {
    if prior_variance == 0.0 {
        return 0.0;
    }
    residual_cross_product / (sum_of_squares + prior_variance.recip())
}

/// `ln(sa_k * d_i + 1)`, falling back to `ln(sa_k) + ln(d_i + 1 / sa_k)` once the
/// product overflows.
#[inline]
fn log_variance_inflation(prior_variance: f64, sum_of_squares: f64) -> f64 {
    let product = prior_variance * sum_of_squares;
    if product.is_finite() {
        product.ln_1p()
    } else {
        prior_variance.ln() + (sum_of_squares + prior_variance.recip()).ln()
    }
}

/// Unnormalized log posterior probability of component `k`.
///
/// `logw_k + ln(s_k / (sigma sa_k)) / 2 + mu_k^2 / (2 s_k)`. The ratio inside the
/// logarithm equals `1 / (sa_k d_i + 1)`, and the quadratic term equals
/// `mu_k t_i / (2 sigma)`, so neither `s_k` nor `sigma * sa_k` is formed. A spike
/// component contributes its prior log weight and nothing else.
#[inline]
pub fn log_score(
    log_weight: f64,
    prior_variance: f64,
    sum_of_squares: f64,
    sigma: f64,
    residual_cross_product: f64,
) -> f64 {
    if prior_variance == 0.0 {
        return log_weight;
    }
    let mean = conditional_mean(prior_variance, sum_of_squares, residual_cross_product);
    log_weight - 0.5 * log_variance_inflation(prior_variance, sum_of_squares)
        + 0.5 * mean * residual_cross_product / sigma
}

/// Softmax of `log_scores` written into `probabilities`.
///
/// The maximum is subtracted before exponentiating, so the largest term is exactly
/// one and the normalizing sum is at least one. No offset is needed in the
/// denominator, and adding one would break the unit column sums. The output is
/// non-negative and sums to one up to rounding. If some scores overflowed to
/// `+inf`, the mass is split evenly among those entries instead of producing NaN.
pub fn normalize_log_weights(log_scores: &[f64], probabilities: &mut [f64]) {
    debug_assert_eq!(log_scores.len(), probabilities.len());
    if log_scores.is_empty() {
        return;
    }

    let max = log_scores
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);

    if max == f64::INFINITY {
        let count = log_scores.iter().filter(|&&v| v == f64::INFINITY).count() as f64;
        for (prob, &score) in probabilities.iter_mut().zip(log_scores) {
            *prob = if score == f64::INFINITY { 1.0 / count } else { 0.0 };
        }
        return;
    }

    let mut total = 0.0;
    for (prob, &score) in probabilities.iter_mut().zip(log_scores) {
        *prob = (score - max).exp();
        total += *prob;
    }
    for prob in probabilities.iter_mut() {
        *prob /= total;
    }
}
