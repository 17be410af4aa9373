//! Risk analyzer: turns a sample matrix into a [`RiskSummary`].

use crate::analysis::{
    extract_cases, failure_modes, prioritise, CaseAnalysis, FailureModeAnalysis, RiskPriority,
};
use crate::error::RiskError;
use crate::metrics::{self, losses, BreachProfile, RiskMetrics, DEFAULT_VAR_CONFIDENCE};
use crate::statistics::{summarise_columns, VariableSummary};
use serde::{Deserialize, Serialize};
use sim_core::types::SampleMatrix;
use sim_scenarios::{LossOrientation, RiskThreshold, Scenario};
use std::collections::BTreeMap;

/// What to analyse: the loss column, its orientation, the thresholds and
/// the input columns to attribute risk to.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisTarget {
    /// Primary outcome column
    pub primary: String,
    /// Loss orientation of the primary outcome
    pub orientation: LossOrientation,
    /// Failure thresholds by column
    pub thresholds: BTreeMap<String, RiskThreshold>,
    /// Input variable columns
    pub inputs: Vec<String>,
}

impl AnalysisTarget {
    /// Target described by a scenario.
    pub fn from_scenario(scenario: &Scenario) -> Self {
        Self {
            primary: scenario.primary_outcome().to_string(),
            orientation: scenario.orientation(),
            thresholds: scenario.thresholds().clone(),
            inputs: scenario.variable_names(),
        }
    }
}

/// Complete analysis of one run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskSummary {
    /// Statistics per column, inputs and outcomes alike
    pub per_variable: BTreeMap<String, VariableSummary>,
    /// Tail metrics on the primary outcome
    pub metrics: RiskMetrics,
    /// Worst, average and best iterations
    pub cases: CaseAnalysis,
    /// Inputs among breaching iterations
    pub failure_modes: FailureModeAnalysis,
    /// Inputs ranked by tail variance share
    pub prioritisation: Vec<RiskPriority>,
}

/// Stateless risk analyzer.
///
/// # Examples
///
/// ```rust
/// use sim_core::types::SampleMatrix;
/// use sim_risk::{AnalysisTarget, RiskAnalyzer};
/// use sim_scenarios::{LossOrientation, RiskThreshold};
///
/// let losses: Vec<f64> = (1..=100).map(f64::from).collect();
/// let samples = SampleMatrix::from_columns(vec!["cost".into()], vec![losses]).unwrap();
///
/// let target = AnalysisTarget {
///     primary: "cost".into(),
///     orientation: LossOrientation::HigherIsWorse,
///     thresholds: [("cost".to_string(), RiskThreshold::above(90.0))].into(),
///     inputs: vec![],
/// };
/// let summary = RiskAnalyzer::default().analyse_target(&samples, &target).unwrap();
/// assert_eq!(summary.metrics.probability_of_failure(), 0.1);
/// assert!(summary.metrics.cvar() >= summary.metrics.var());
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RiskAnalyzer {
    var_confidence: f64,
}

impl RiskAnalyzer {
    /// Analyzer reporting VaR at `var_confidence`.
    ///
    /// # Errors
    ///
    /// `RiskError::InvalidConfidence` unless `0 < var_confidence < 1`.
    pub fn new(var_confidence: f64) -> Result<Self, RiskError> {
        if !(var_confidence > 0.0 && var_confidence < 1.0) {
            return Err(RiskError::InvalidConfidence(var_confidence));
        }
        Ok(Self { var_confidence })
    }

    /// Configured VaR confidence.
    pub fn var_confidence(&self) -> f64 {
        self.var_confidence
    }

    /// Analyses samples produced for `scenario`.
    pub fn analyse(&self, samples: &SampleMatrix, scenario: &Scenario) -> Result<RiskSummary, RiskError> {
        self.analyse_target(samples, &AnalysisTarget::from_scenario(scenario))
    }

    /// Analyses samples against an explicit target.
    ///
    /// # Errors
    ///
    /// - `RiskError::EmptySamples` for a matrix without rows
    /// - `RiskError::MissingColumn` when the primary outcome or a threshold
    ///   column is absent
    pub fn analyse_target(
        &self,
        samples: &SampleMatrix,
        target: &AnalysisTarget,
    ) -> Result<RiskSummary, RiskError> {
        if samples.is_empty() {
            return Err(RiskError::EmptySamples);
        }
        let outcome = samples
            .column(&target.primary)
            .ok_or_else(|| RiskError::MissingColumn(target.primary.clone()))?;
        let losses = losses(outcome, target.orientation);
        let breaches = BreachProfile::evaluate(samples, &target.thresholds)?;

        let per_variable = summarise_columns(samples);
        let cases = extract_cases(samples, outcome, &losses).ok_or(RiskError::EmptySamples)?;
        let failure_modes = failure_modes(samples, &target.inputs, &breaches.indicator);
        let metrics = metrics::compute(
            &target.primary,
            &losses,
            target.orientation,
            self.var_confidence,
            breaches,
        );
        let prioritisation = prioritise(samples, &target.inputs, outcome, &losses, metrics.var());

        tracing::debug!(
            outcome = %target.primary,
            rows = samples.rows(),
            var = metrics.var(),
            cvar = metrics.cvar(),
            pof = metrics.probability_of_failure(),
            "risk analysis complete"
        );

        Ok(RiskSummary {
            per_variable,
            metrics,
            cases,
            failure_modes,
            prioritisation,
        })
    }
}

impl Default for RiskAnalyzer {
    fn default() -> Self {
        Self {
            var_confidence: DEFAULT_VAR_CONFIDENCE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_bounds() {
        assert!(RiskAnalyzer::new(0.95).is_ok());
        assert_eq!(RiskAnalyzer::new(1.0).unwrap_err(), RiskError::InvalidConfidence(1.0));
        assert!(RiskAnalyzer::new(0.0).is_err());
        assert!(RiskAnalyzer::new(f64::NAN).is_err());
    }

    #[test]
    fn test_empty_and_missing() {
        let analyzer = RiskAnalyzer::default();
        let target = AnalysisTarget {
            primary: "y".into(),
            orientation: LossOrientation::HigherIsWorse,
            thresholds: BTreeMap::new(),
            inputs: vec![],
        };
        let empty = SampleMatrix::new(vec!["y".into()]);
        assert_eq!(analyzer.analyse_target(&empty, &target).unwrap_err(), RiskError::EmptySamples);

        let other = SampleMatrix::from_columns(vec!["x".into()], vec![vec![1.0]]).unwrap();
        assert_eq!(
            analyzer.analyse_target(&other, &target).unwrap_err(),
            RiskError::MissingColumn("y".into())
        );
    }

    #[test]
    fn test_no_thresholds_means_no_failures() {
        let samples = SampleMatrix::from_columns(vec!["y".into()], vec![vec![1.0, 2.0, 3.0]]).unwrap();
        let target = AnalysisTarget {
            primary: "y".into(),
            orientation: LossOrientation::LowerIsWorse,
            thresholds: BTreeMap::new(),
            inputs: vec![],
        };
        let s = RiskAnalyzer::default().analyse_target(&samples, &target).unwrap();
        assert_eq!(s.metrics.probability_of_failure(), 0.0);
        assert!(s.failure_modes.modes.is_empty());
        // lower is worse: the smallest outcome is the worst case
        assert_eq!(s.cases.worst_case.outcome, 1.0);
    }
}
