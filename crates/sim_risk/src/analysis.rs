//! Case extraction, failure-mode analysis and risk prioritisation.

use crate::statistics::{correlation_or_zero, mean_std, percentile_sorted, sorted};
use serde::{Deserialize, Serialize};
use sim_core::types::SampleMatrix;
use std::cmp::Ordering;
use std::collections::BTreeMap;

// =============================================================================
// Cases
// =============================================================================

/// One iteration singled out from the sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaseSnapshot {
    /// Row index in the sample matrix
    pub iteration: usize,
    /// Primary outcome value
    pub outcome: f64,
    /// Loss at this iteration
    pub loss: f64,
    /// Every column at this iteration
    pub values: BTreeMap<String, f64>,
}

impl CaseSnapshot {
    fn at(samples: &SampleMatrix, outcome: &[f64], losses: &[f64], iteration: usize) -> Self {
        Self {
            iteration,
            outcome: outcome[iteration],
            loss: losses[iteration],
            values: samples.row(iteration),
        }
    }
}

/// Worst, average and best iterations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaseAnalysis {
    /// Largest loss
    pub worst_case: CaseSnapshot,
    /// Outcome nearest the sample mean
    pub average_case: CaseSnapshot,
    /// Smallest loss
    pub best_case: CaseSnapshot,
}

/// Extracts the worst, average and best iterations.
///
/// Ties resolve to the lowest iteration index. Returns `None` for an empty
/// sample.
pub fn extract_cases(samples: &SampleMatrix, outcome: &[f64], losses: &[f64]) -> Option<CaseAnalysis> {
    if losses.is_empty() {
        return None;
    }
    let (mean, _) = mean_std(outcome);
    let worst = arg_best(losses, |a, b| a.total_cmp(&b));
    let best = arg_best(losses, |a, b| b.total_cmp(&a));
    let average = arg_best(outcome, |a, b| (b - mean).abs().total_cmp(&(a - mean).abs()));
    Some(CaseAnalysis {
        worst_case: CaseSnapshot::at(samples, outcome, losses, worst),
        average_case: CaseSnapshot::at(samples, outcome, losses, average),
        best_case: CaseSnapshot::at(samples, outcome, losses, best),
    })
}

/// Index of the first element that no later element strictly beats.
fn arg_best(values: &[f64], cmp: impl Fn(f64, f64) -> Ordering) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if cmp(v, values[best]) == Ordering::Greater {
            best = i;
        }
    }
    best
}

// =============================================================================
// Failure modes
// =============================================================================

/// How one input behaves in breaching iterations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FailureMode {
    /// Input variable
    pub variable: String,
    /// Mean across the whole sample
    pub overall_mean: f64,
    /// Mean across breaching iterations
    pub breach_mean: f64,
    /// 5th percentile across breaching iterations
    pub breach_p5: f64,
    /// 95th percentile across breaching iterations
    pub breach_p95: f64,
    /// (breach mean − overall mean) / overall std-dev
    pub standardised_shift: f64,
    /// Correlation of the input with the 0/1 breach indicator
    pub point_biserial: f64,
}

/// Failure-mode analysis across inputs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FailureModeAnalysis {
    /// Number of breaching iterations
    pub breach_count: usize,
    /// One entry per input, largest absolute shift first; empty without
    /// breaches
    pub modes: Vec<FailureMode>,
}

/// Characterises inputs among breaching iterations.
pub fn failure_modes(samples: &SampleMatrix, inputs: &[String], indicator: &[bool]) -> FailureModeAnalysis {
    let breach_count = indicator.iter().filter(|&&b| b).count();
    if breach_count == 0 {
        return FailureModeAnalysis::default();
    }
    let flags: Vec<f64> = indicator.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect();
    let mut modes: Vec<FailureMode> = inputs
        .iter()
        .filter_map(|name| samples.column(name).map(|column| (name, column)))
        .map(|(name, column)| {
            let (overall_mean, overall_std) = mean_std(column);
            let breached: Vec<f64> = column
                .iter()
                .zip(indicator)
                .filter_map(|(&x, &b)| b.then_some(x))
                .collect();
            let (breach_mean, _) = mean_std(&breached);
            let breached = sorted(&breached);
            let standardised_shift = if overall_std > 0.0 {
                (breach_mean - overall_mean) / overall_std
            } else {
                0.0
            };
            FailureMode {
                variable: name.clone(),
                overall_mean,
                breach_mean,
                breach_p5: percentile_sorted(&breached, 0.05),
                breach_p95: percentile_sorted(&breached, 0.95),
                standardised_shift,
                point_biserial: correlation_or_zero(column, &flags),
            }
        })
        .collect();
    modes.sort_by(|a, b| {
        b.standardised_shift
            .abs()
            .total_cmp(&a.standardised_shift.abs())
            .then_with(|| a.variable.cmp(&b.variable))
    });
    FailureModeAnalysis { breach_count, modes }
}

// =============================================================================
// Prioritisation
// =============================================================================

/// Contribution of one input to tail variance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskPriority {
    /// 1-based rank
    pub rank: usize,
    /// Input variable
    pub variable: String,
    /// Correlation with the outcome over the tail
    pub tail_correlation: f64,
    /// Normalised share of tail variance; shares sum to 1 unless all are 0
    pub share: f64,
}

/// Ranks inputs by squared correlation with the outcome over the tail
/// (iterations whose loss is at or beyond `var`).
pub fn prioritise(
    samples: &SampleMatrix,
    inputs: &[String],
    outcome: &[f64],
    losses: &[f64],
    var: f64,
) -> Vec<RiskPriority> {
    let tail: Vec<usize> = (0..losses.len()).filter(|&i| losses[i] >= var).collect();
    let tail_outcome: Vec<f64> = tail.iter().map(|&i| outcome[i]).collect();

    let mut entries: Vec<(String, f64)> = inputs
        .iter()
        .filter_map(|name| samples.column(name).map(|column| (name, column)))
        .map(|(name, column)| {
            let tail_input: Vec<f64> = tail.iter().map(|&i| column[i]).collect();
            (name.clone(), correlation_or_zero(&tail_input, &tail_outcome))
        })
        .collect();
    let total: f64 = entries.iter().map(|(_, r)| r * r).sum();
    entries.sort_by(|a, b| (b.1 * b.1).total_cmp(&(a.1 * a.1)).then_with(|| a.0.cmp(&b.0)));

    entries
        .into_iter()
        .enumerate()
        .map(|(i, (variable, r))| RiskPriority {
            rank: i + 1,
            variable,
            tail_correlation: r,
            share: if total > 0.0 { r * r / total } else { 0.0 },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn matrix() -> SampleMatrix {
        SampleMatrix::from_columns(
            vec!["a".into(), "b".into(), "y".into()],
            vec![
                vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
                vec![5.0, 1.0, 5.0, 1.0, 5.0, 1.0],
                vec![2.0, 4.0, 6.0, 8.0, 10.0, 12.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_cases_pick_extremes() {
        let m = matrix();
        let y = m.column("y").unwrap().to_vec();
        let cases = extract_cases(&m, &y, &y).unwrap();
        assert_eq!(cases.worst_case.iteration, 5);
        assert_eq!(cases.best_case.iteration, 0);
        // mean 7: 6 and 8 tie, the lower index wins
        assert_eq!(cases.average_case.iteration, 2);
        assert_eq!(cases.worst_case.values["a"], 6.0);
        assert!(extract_cases(&m, &[], &[]).is_none());
    }

    #[test]
    fn test_failure_modes_rank_by_shift() {
        let m = matrix();
        let indicator = vec![false, false, false, true, true, true];
        let fm = failure_modes(&m, &["a".into(), "b".into()], &indicator);
        assert_eq!(fm.breach_count, 3);
        assert_eq!(fm.modes[0].variable, "a");
        assert_relative_eq!(fm.modes[0].breach_mean, 5.0);
        assert!(fm.modes[0].point_biserial > 0.8);
        assert!(fm.modes[0].breach_p5 <= fm.modes[0].breach_p95);
    }

    #[test]
    fn test_failure_modes_without_breaches() {
        let fm = failure_modes(&matrix(), &["a".into()], &[false; 6]);
        assert_eq!(fm, FailureModeAnalysis::default());
    }

    #[test]
    fn test_prioritisation_shares_sum_to_one() {
        let m = matrix();
        let y = m.column("y").unwrap().to_vec();
        let ranking = prioritise(&m, &["b".into(), "a".into()], &y, &y, 4.0);
        assert_eq!(ranking[0].variable, "a");
        assert_eq!(ranking[0].rank, 1);
        let total: f64 = ranking.iter().map(|r| r.share).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_prioritisation_ties_break_by_name() {
        let m = SampleMatrix::from_columns(
            vec!["z".into(), "c".into()],
            vec![vec![1.0; 4], vec![2.0; 4]],
        )
        .unwrap();
        let y = vec![1.0, 2.0, 3.0, 4.0];
        let ranking = prioritise(&m, &["z".into(), "c".into()], &y, &y, 0.0);
        assert_eq!(ranking[0].variable, "c");
        assert_eq!(ranking[0].share, 0.0);
    }
}
