//! Standard normal CDF and quantile.

use statrs::function::erf::{erfc, erfc_inv};
use std::f64::consts::SQRT_2;

/// Smallest probability handed to a quantile function by the copula path.
pub const PROBABILITY_EPSILON: f64 = 1e-12;

/// Standard normal cumulative distribution function Φ(x).
#[inline]
pub fn std_normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

/// Standard normal quantile Φ⁻¹(p) for `p` in (0, 1).
#[inline]
pub fn std_normal_quantile(p: f64) -> f64 {
    -SQRT_2 * erfc_inv(2.0 * p)
}

/// Clamps a probability into the open interval used for quantile lookups.
#[inline]
pub fn clamp_probability(p: f64) -> f64 {
    p.clamp(PROBABILITY_EPSILON, 1.0 - PROBABILITY_EPSILON)
}
