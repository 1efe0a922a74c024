//! Phred score utilities and log-space probability calculations.
//!
//! All probability calculations are done in natural-log space for numerical
//! stability: read likelihoods, genotype likelihoods, and joint posteriors
//! are accumulated as `ln p` and only converted to linear or Phred scale at
//! the emission boundary.
//!
//! Key references:
//! - Equation (7) and (10) from <https://cran.r-project.org/web/packages/Rmpfr/vignettes/log1mexp-note.pdf>

use std::f64::consts::LN_10;

/// ln(10) / 10, the factor converting a Phred-scale cost to a natural-log probability
pub const LN_10_DIV_10: f64 = LN_10 / 10.0;

/// Natural log of 2, threshold in `ln_one_minus_exp` (Equation 7)
const LN_TWO: f64 = std::f64::consts::LN_2;

/// Phred score type
pub type PhredScore = u8;

/// Log probability type (natural log)
pub type LogProbability = f64;

/// Converts a Phred score to a natural-log probability of error.
///
/// Phred score Q relates to error probability P by Q = -10 * log10(P), so
/// ln(P) = -Q * ln(10) / 10.
///
/// # Examples
/// ```
/// use triocall_lib::phred::phred_to_ln_error_prob;
///
/// // Q20 corresponds to a 1% error rate
/// let ln_error = phred_to_ln_error_prob(20);
/// assert!((ln_error - 0.01_f64.ln()).abs() < 1e-10);
/// ```
#[inline]
#[must_use]
pub fn phred_to_ln_error_prob(phred: PhredScore) -> LogProbability {
    -f64::from(phred) * LN_10_DIV_10
}

/// Converts a Phred score to a natural-log probability of being correct.
#[inline]
#[must_use]
pub fn phred_to_ln_correct_prob(phred: PhredScore) -> LogProbability {
    ln_one_minus_exp(phred_to_ln_error_prob(phred))
}

/// Converts a linear probability to an (unclamped) Phred-scale value.
///
/// This is the emission-boundary conversion used for call posteriors:
/// the complement mass `p` of a posterior becomes `-10 * log10(p)`.
/// `p == 0` maps to `f64::INFINITY`; values are not clamped to the
/// base-quality range since posterior Phreds routinely exceed Q93.
///
/// # Examples
/// ```
/// use triocall_lib::phred::probability_to_phred;
///
/// assert!((probability_to_phred(0.01) - 20.0).abs() < 1e-10);
/// assert!((probability_to_phred(0.05) - 13.0103).abs() < 1e-4);
/// ```
#[inline]
#[must_use]
pub fn probability_to_phred(prob: f64) -> f64 {
    -10.0 * prob.log10()
}

/// Precise computation of ln(1 + exp(x)).
///
/// Implements Equation (10) from
/// <https://cran.r-project.org/web/packages/Rmpfr/vignettes/log1mexp-note.pdf>
///
/// Thresholds from the paper:
/// - x <= -37:   exp(x) is so small that ln(1 + exp(x)) ≈ exp(x)
/// - x <= 18:    use ln_1p(exp(x)) for precision
/// - x <= 33.3:  use x + exp(-x) approximation
/// - x > 33.3:   exp(-x) is negligible, so ln(1 + exp(x)) ≈ x
#[inline]
fn log1pexp(x: f64) -> f64 {
    if x <= -37.0 {
        x.exp()
    } else if x <= 18.0 {
        x.exp().ln_1p()
    } else if x <= 33.3 {
        x + (-x).exp()
    } else {
        x
    }
}

/// Computes ln(1 - exp(x)) for x < 0 in a numerically stable way.
///
/// Implements Equation (7) from
/// <https://cran.r-project.org/web/packages/Rmpfr/vignettes/log1mexp-note.pdf>
///
/// For x >= -ln(2) use ln(-expm1(x)) to avoid catastrophic cancellation when
/// exp(x) is close to 1; otherwise ln_1p(-exp(x)) is stable.
#[inline]
#[must_use]
pub fn ln_one_minus_exp(x: f64) -> f64 {
    if x >= 0.0 {
        f64::NEG_INFINITY
    } else if x >= -LN_TWO {
        (-x.exp_m1()).ln()
    } else {
        (-x.exp()).ln_1p()
    }
}

/// Computes ln(a + b) given ln(a) and ln(b).
///
/// ln(a + b) = ln(a) + ln(1 + exp(ln(b) - ln(a))), with the larger operand
/// factored out so the exponential never overflows.
///
/// # Examples
/// ```
/// use triocall_lib::phred::ln_sum_exp;
///
/// let result = ln_sum_exp(0.1_f64.ln(), 0.2_f64.ln());
/// assert!((result - 0.3_f64.ln()).abs() < 1e-10);
/// ```
#[must_use]
pub fn ln_sum_exp(ln_a: LogProbability, ln_b: LogProbability) -> LogProbability {
    if ln_a.is_infinite() && ln_a < 0.0 {
        return ln_b;
    }
    if ln_b.is_infinite() && ln_b < 0.0 {
        return ln_a;
    }
    let (lo, hi) = if ln_b < ln_a { (ln_b, ln_a) } else { (ln_a, ln_b) };
    hi + log1pexp(lo - hi)
}

/// Computes ln(sum(exp(values))) for a slice of log probabilities.
///
/// This is the normalization constant for converting log-likelihoods to
/// posteriors. Uses the max-shift log-sum-exp trick for stability.
///
/// # Examples
/// ```
/// use triocall_lib::phred::ln_sum_exp_slice;
///
/// let values = [0.1_f64.ln(), 0.2_f64.ln(), 0.3_f64.ln()];
/// let result = ln_sum_exp_slice(&values);
/// assert!((result - 0.6_f64.ln()).abs() < 1e-10);
/// ```
#[must_use]
pub fn ln_sum_exp_slice(values: &[LogProbability]) -> LogProbability {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if values.is_empty() || max.is_infinite() {
        return f64::NEG_INFINITY;
    }
    let sum: f64 = values.iter().map(|&v| (v - max).exp()).sum();
    max + sum.ln()
}
