//! Request and response shapes for callers outside the workspace.
//!
//! Field names are part of the external contract and must not change.
//!
//! ```json
//! {
//!   "scenario": {"profile": "financial_portfolio"},
//!   "iterations": 10000,
//!   "seed": 42,
//!   "parallelism": 4,
//!   "timeout_seconds": 30,
//!   "risk_thresholds": {"portfolio_return": -0.15}
//! }
//! ```

use crate::result::SimulationResult;
use crate::run::SimulationRun;
use serde::{Deserialize, Serialize};
use sim_core::types::ValidationError;
use sim_risk::{CaseSnapshot, Percentiles, RiskPriority};
use sim_scenarios::{RiskThreshold, Scenario, ScenarioSource};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Threshold in a request: a bare value or a full threshold.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThresholdOverride {
    /// Value only; the breach side is inherited.
    Value(f64),
    /// Value and breach side.
    Full(RiskThreshold),
}

impl ThresholdOverride {
    /// Resolves against a scenario.
    ///
    /// A bare value keeps the breach side of the scenario's existing
    /// threshold on that column; without one, it takes the side that means
    /// a loss under the scenario's orientation.
    pub fn resolve(&self, column: &str, scenario: &Scenario) -> RiskThreshold {
        match *self {
            Self::Full(threshold) => threshold,
            Self::Value(value) => RiskThreshold {
                value,
                breach: scenario
                    .thresholds()
                    .get(column)
                    .map(|t| t.breach)
                    .unwrap_or_else(|| scenario.orientation().breach()),
            },
        }
    }
}

/// Simulation request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    /// Template, profile or custom scenario
    pub scenario: ScenarioSource,
    /// Iteration count
    pub iterations: usize,
    /// Master seed; generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Worker thread hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<usize>,
    /// Wall-clock budget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<f64>,
    /// Threshold overrides by column
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_thresholds: Option<BTreeMap<String, ThresholdOverride>>,
}

impl SimulationRequest {
    /// Converts to a run over an already generated scenario.
    ///
    /// # Errors
    ///
    /// `ValidationError` for a negative or non-finite timeout.
    pub fn to_run(&self, scenario: Arc<Scenario>) -> Result<SimulationRun, ValidationError> {
        let thresholds: BTreeMap<String, RiskThreshold> = self
            .risk_thresholds
            .iter()
            .flatten()
            .map(|(column, t)| (column.clone(), t.resolve(column, &scenario)))
            .collect();

        let mut run = SimulationRun::new(scenario, self.iterations).with_thresholds(thresholds);
        if let Some(seed) = self.seed {
            run = run.with_seed(seed);
        }
        if let Some(workers) = self.parallelism {
            run = run.with_parallelism(workers);
        }
        if let Some(secs) = self.timeout_seconds {
            if !(secs.is_finite() && secs > 0.0) {
                return Err(ValidationError::value(
                    "timeout_seconds",
                    format!("must be a positive number, got {}", secs),
                ));
            }
            let timeout = Duration::try_from_secs_f64(secs)
                .map_err(|e| ValidationError::value("timeout_seconds", format!("{}: {}", secs, e)))?;
            run = run.with_timeout(timeout);
        }
        Ok(run)
    }
}

/// Summary of one column in a response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariableSummaryView {
    /// Sample mean
    pub mean: f64,
    /// Sample standard deviation
    pub std_dev: f64,
    /// Standard percentiles
    pub percentiles: Percentiles,
    /// 95% confidence interval of the mean, as `[lower, upper]`
    pub confidence_interval: [f64; 2],
}

/// Risk metrics in a response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskMetricsView {
    /// Fraction of iterations breaching any threshold
    pub probability_of_failure: f64,
    /// VaR at the configured confidence, in loss units
    pub var: f64,
    /// CVaR at the configured confidence, in loss units
    pub cvar: f64,
    /// Mean positive loss
    pub expected_loss: f64,
    /// Iteration with the largest loss
    pub worst_case: CaseSnapshot,
    /// Iteration with the smallest loss
    pub best_case: CaseSnapshot,
    /// Inputs ranked by share of tail variance
    pub failure_mode_ranking: Vec<RiskPriority>,
}

/// Execution record in a response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionView {
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// Iterations sampled
    pub effective_iterations: usize,
    /// Served from the cache
    pub cache_hit: bool,
    /// Some batches are missing
    pub partial_completion: bool,
    /// Master seed
    pub seed_used: u64,
}

/// Simulation response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationResponse {
    /// Statistics per column
    pub per_variable_summary: BTreeMap<String, VariableSummaryView>,
    /// Risk metrics on the primary outcome
    pub risk_metrics: RiskMetricsView,
    /// Execution record
    pub execution: ExecutionView,
}

impl From<&SimulationResult> for SimulationResponse {
    fn from(result: &SimulationResult) -> Self {
        let summary = &result.summary;
        let per_variable_summary = summary
            .per_variable
            .iter()
            .map(|(name, s)| {
                (
                    name.clone(),
                    VariableSummaryView {
                        mean: s.mean,
                        std_dev: s.std_dev,
                        percentiles: s.percentiles,
                        confidence_interval: [s.confidence_interval.lower, s.confidence_interval.upper],
                    },
                )
            })
            .collect();
        Self {
            per_variable_summary,
            risk_metrics: RiskMetricsView {
                probability_of_failure: summary.metrics.probability_of_failure(),
                var: summary.metrics.var(),
                cvar: summary.metrics.cvar(),
                expected_loss: summary.metrics.expected_loss,
                worst_case: summary.cases.worst_case.clone(),
                best_case: summary.cases.best_case.clone(),
                failure_mode_ranking: summary.prioritisation.clone(),
            },
            execution: ExecutionView {
                duration_ms: result.execution.duration_ms,
                effective_iterations: result.execution.effective_iterations,
                cache_hit: result.execution.cache_hit,
                partial_completion: result.execution.partial_completion,
                seed_used: result.execution.seed_used,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_scenarios::{Breach, ScenarioGenerator};

    fn request(json: &str) -> SimulationRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_minimal_request() {
        let r = request(r#"{"scenario":{"template":"supply_chain"},"iterations":100}"#);
        assert_eq!(r.iterations, 100);
        assert!(r.seed.is_none() && r.risk_thresholds.is_none());
    }

    #[test]
    fn test_bare_threshold_inherits_side() {
        let generator = ScenarioGenerator::default();
        let r = request(
            r#"{"scenario":{"profile":"defense_capability"},"iterations":10,
                "risk_thresholds":{"readiness_score":50,"logistics_support":{"value":0.2,"breach":"below"}}}"#,
        );
        let scenario = generator.generate(&r.scenario).unwrap();
        let run = r.to_run(scenario).unwrap();
        assert_eq!(run.thresholds()["readiness_score"], RiskThreshold::below(50.0));
        assert_eq!(run.thresholds()["logistics_support"].breach, Breach::Below);
    }

    #[test]
    fn test_bare_threshold_on_new_column_uses_orientation() {
        let generator = ScenarioGenerator::default();
        let r = request(
            r#"{"scenario":{"profile":"cybersecurity_threat"},"iterations":10,
                "risk_thresholds":{"breach_impact":500000}}"#,
        );
        let scenario = generator.generate(&r.scenario).unwrap();
        let run = r.to_run(scenario).unwrap();
        assert_eq!(run.thresholds()["breach_impact"], RiskThreshold::above(500_000.0));
    }

    #[test]
    fn test_invalid_timeout() {
        let generator = ScenarioGenerator::default();
        let r = request(r#"{"scenario":{"template":"compliance"},"iterations":10,"timeout_seconds":-1}"#);
        let scenario = generator.generate(&r.scenario).unwrap();
        assert!(r.to_run(scenario).is_err());
    }

    #[test]
    fn test_huge_timeout() {
        let generator = ScenarioGenerator::default();
        let r = request(r#"{"scenario":{"template":"compliance"},"iterations":10,"timeout_seconds":1e20}"#);
        let scenario = generator.generate(&r.scenario).unwrap();
        assert!(matches!(r.to_run(scenario), Err(ValidationError::InvalidValue { .. })));

        let r = request(r#"{"scenario":{"template":"compliance"},"iterations":10,"timeout_seconds":1e17}"#);
        let scenario = generator.generate(&r.scenario).unwrap();
        let run = r.to_run(scenario).unwrap();
        assert_eq!(run.timeout(), Some(Duration::from_secs(100_000_000_000_000_000)));
    }
}
