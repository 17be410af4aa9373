//! Tail metrics on the primary outcome.
//!
//! All metrics are expressed in loss units: the primary outcome is mapped
//! through [`LossOrientation::to_loss`] first, so a positive VaR is always a
//! loss regardless of whether the outcome is a cost or a return.

use crate::error::RiskError;
use crate::statistics::{percentile_sorted, sorted};
use serde::{Deserialize, Serialize};
use sim_scenarios::{LossOrientation, RiskThreshold};
use sim_core::types::SampleMatrix;
use std::collections::BTreeMap;

/// Default VaR confidence.
pub const DEFAULT_VAR_CONFIDENCE: f64 = 0.95;

/// Second, fixed VaR confidence reported alongside the configured one.
pub const TAIL_VAR_CONFIDENCE: f64 = 0.99;

/// Value at Risk and Expected Shortfall at one confidence.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TailRisk {
    /// Confidence level
    pub confidence: f64,
    /// Loss quantile at `confidence`
    pub var: f64,
    /// Mean of losses at or beyond `var`
    pub cvar: f64,
}

impl TailRisk {
    /// Tail risk of sorted losses.
    ///
    /// `cvar >= var` holds because the averaged set always contains the
    /// largest loss and only values at or above `var`.
    pub fn from_sorted_losses(sorted_losses: &[f64], confidence: f64) -> Self {
        let var = percentile_sorted(sorted_losses, confidence);
        let start = sorted_losses.partition_point(|&l| l < var);
        let tail = &sorted_losses[start..];
        let cvar = if tail.is_empty() {
            var
        } else {
            tail.iter().sum::<f64>() / tail.len() as f64
        };
        Self {
            confidence,
            var,
            cvar: cvar.max(var),
        }
    }
}

/// Breach statistics over the configured thresholds.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BreachProfile {
    /// Fraction of iterations breaching any threshold
    pub probability_of_failure: f64,
    /// Number of iterations breaching any threshold
    pub breach_count: usize,
    /// Per-threshold breach probabilities, keyed by column
    pub per_threshold: BTreeMap<String, f64>,
    /// Any-breach indicator per iteration
    #[serde(skip)]
    pub indicator: Vec<bool>,
}

impl BreachProfile {
    /// Evaluates every threshold against its column.
    ///
    /// # Errors
    ///
    /// `RiskError::MissingColumn` when a threshold names an absent column.
    pub fn evaluate(
        samples: &SampleMatrix,
        thresholds: &BTreeMap<String, RiskThreshold>,
    ) -> Result<Self, RiskError> {
        let rows = samples.rows();
        let mut indicator = vec![false; rows];
        let mut per_threshold = BTreeMap::new();
        for (name, threshold) in thresholds {
            let column = samples
                .column(name)
                .ok_or_else(|| RiskError::MissingColumn(name.clone()))?;
            let mut count = 0usize;
            for (flag, &x) in indicator.iter_mut().zip(column) {
                if threshold.is_breached(x) {
                    *flag = true;
                    count += 1;
                }
            }
            per_threshold.insert(name.clone(), fraction(count, rows));
        }
        let breach_count = indicator.iter().filter(|&&b| b).count();
        Ok(Self {
            probability_of_failure: fraction(breach_count, rows),
            breach_count,
            per_threshold,
            indicator,
        })
    }
}

/// Loss metrics on the primary outcome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Primary outcome column
    pub outcome: String,
    /// How outcome values map to losses
    pub orientation: LossOrientation,
    /// VaR/CVaR at the configured confidence
    pub tail: TailRisk,
    /// VaR/CVaR at 99%
    pub tail_99: TailRisk,
    /// Mean of max(loss, 0)
    pub expected_loss: f64,
    /// Threshold breach statistics
    pub breaches: BreachProfile,
}

impl RiskMetrics {
    /// VaR at the configured confidence.
    pub fn var(&self) -> f64 {
        self.tail.var
    }

    /// CVaR at the configured confidence.
    pub fn cvar(&self) -> f64 {
        self.tail.cvar
    }

    /// Probability of failure.
    pub fn probability_of_failure(&self) -> f64 {
        self.breaches.probability_of_failure
    }
}

/// Losses of an outcome column under an orientation.
pub fn losses(values: &[f64], orientation: LossOrientation) -> Vec<f64> {
    values.iter().map(|&v| orientation.to_loss(v)).collect()
}

/// Mean of the positive part of `losses`.
pub fn expected_loss(losses: &[f64]) -> f64 {
    if losses.is_empty() {
        return f64::NAN;
    }
    losses.iter().map(|l| l.max(0.0)).sum::<f64>() / losses.len() as f64
}

/// Computes [`RiskMetrics`] for `outcome`.
pub(crate) fn compute(
    outcome: &str,
    losses: &[f64],
    orientation: LossOrientation,
    confidence: f64,
    breaches: BreachProfile,
) -> RiskMetrics {
    let sorted_losses = sorted(losses);
    RiskMetrics {
        outcome: outcome.to_string(),
        orientation,
        tail: TailRisk::from_sorted_losses(&sorted_losses, confidence),
        tail_99: TailRisk::from_sorted_losses(&sorted_losses, TAIL_VAR_CONFIDENCE),
        expected_loss: expected_loss(losses),
        breaches,
    }
}

fn fraction(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_tail_risk_on_grid() {
        let losses: Vec<f64> = (1..=100).map(f64::from).collect();
        let tail = TailRisk::from_sorted_losses(&losses, 0.95);
        assert_relative_eq!(tail.var, 95.05, epsilon = 1e-12);
        // 96..=100
        assert_relative_eq!(tail.cvar, 98.0, epsilon = 1e-12);
    }

    #[test]
    fn test_expected_loss_ignores_gains() {
        assert_relative_eq!(expected_loss(&[-5.0, 2.0, 4.0, -1.0]), 1.5);
    }

    #[test]
    fn test_lower_is_worse_flips_sign() {
        let l = losses(&[0.1, -0.2], LossOrientation::LowerIsWorse);
        assert_eq!(l, vec![-0.1, 0.2]);
    }

    #[test]
    fn test_breach_profile_any_and_per_threshold() {
        let m = SampleMatrix::from_columns(
            vec!["x".into(), "y".into()],
            vec![vec![1.0, 5.0, 9.0, 2.0], vec![0.0, 0.0, 3.0, 3.0]],
        )
        .unwrap();
        let mut thresholds = BTreeMap::new();
        thresholds.insert("x".to_string(), RiskThreshold::above(4.0));
        thresholds.insert("y".to_string(), RiskThreshold::above(2.0));
        let b = BreachProfile::evaluate(&m, &thresholds).unwrap();
        assert_eq!(b.indicator, vec![false, true, true, true]);
        assert_relative_eq!(b.probability_of_failure, 0.75);
        assert_relative_eq!(b.per_threshold["x"], 0.5);
        assert_relative_eq!(b.per_threshold["y"], 0.5);
    }

    #[test]
    fn test_breach_profile_missing_column() {
        let m = SampleMatrix::from_columns(vec!["x".into()], vec![vec![1.0]]).unwrap();
        let mut thresholds = BTreeMap::new();
        thresholds.insert("z".to_string(), RiskThreshold::below(0.0));
        assert_eq!(
            BreachProfile::evaluate(&m, &thresholds).unwrap_err(),
            RiskError::MissingColumn("z".into())
        );
    }

    // =========================================================================
    // Property-based tests
    // =========================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn test_cvar_dominates_var(losses in prop::collection::vec(-1e6f64..1e6, 1..300), c in 0.5f64..0.999) {
            let s = sorted(&losses);
            let tail = TailRisk::from_sorted_losses(&s, c);
            prop_assert!(tail.cvar >= tail.var);
        }

        #[test]
        fn test_var_monotone_in_confidence(losses in prop::collection::vec(-1e3f64..1e3, 2..300), a in 0.5f64..0.99, b in 0.5f64..0.99) {
            let s = sorted(&losses);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(
                TailRisk::from_sorted_losses(&s, lo).var <= TailRisk::from_sorted_losses(&s, hi).var
            );
        }
    }
}
