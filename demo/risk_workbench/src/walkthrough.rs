//! Reference walkthroughs run by the workbench.

use crate::error::WorkbenchError;
use serde::Serialize;
use sim_engine::{
    RunContext, SimulationEngine, SimulationError, SimulationRequest, SimulationResponse,
    SimulationResult, ThresholdOverride,
};
use sim_scenarios::{ScenarioOverrides, ScenarioSource};
use std::sync::Arc;
use std::time::Duration;

/// Batches in the slow workload
const SLOW_BATCHES: usize = 20;

/// Delay before each slow batch
const SLOW_PACING: Duration = Duration::from_secs(1);

/// One reference scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walkthrough {
    /// Correlated market factors, fixed seed
    PortfolioTailRisk,
    /// Independent capability factors, readiness threshold at 50
    DefenceReadiness,
    /// Paced batches against a 2 s budget
    SlowWorkload,
}

/// How a walkthrough ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// Every batch ran
    Completed,
    /// Some batches are missing
    Partial,
    /// Stopped with nothing to report
    Interrupted,
}

/// Outcome of a walkthrough.
#[derive(Debug, Clone, Serialize)]
pub struct WalkthroughReport {
    /// Walkthrough name
    pub walkthrough: &'static str,
    /// How it ended
    pub status: ReportStatus,
    /// Engine response, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<SimulationResponse>,
    /// Extra detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl WalkthroughReport {
    /// Pretty JSON rendering.
    pub fn to_json(&self) -> Result<String, WorkbenchError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Walkthrough {
    /// Every walkthrough, in presentation order.
    pub const ALL: [Walkthrough; 3] = [
        Self::PortfolioTailRisk,
        Self::DefenceReadiness,
        Self::SlowWorkload,
    ];

    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PortfolioTailRisk => "portfolio_tail_risk",
            Self::DefenceReadiness => "defence_readiness",
            Self::SlowWorkload => "slow_workload",
        }
    }

    /// Request submitted to the engine.
    pub fn request(&self, batch_size: usize) -> SimulationRequest {
        let profile = |name: &str| ScenarioSource::Profile {
            profile: name.to_string(),
            overrides: ScenarioOverrides::default(),
        };
        match self {
            Self::PortfolioTailRisk => SimulationRequest {
                scenario: profile("financial_portfolio"),
                iterations: 10_000,
                seed: Some(42),
                parallelism: None,
                timeout_seconds: None,
                risk_thresholds: None,
            },
            Self::DefenceReadiness => SimulationRequest {
                scenario: profile("defense_capability"),
                iterations: 10_000,
                seed: Some(7),
                parallelism: None,
                timeout_seconds: None,
                risk_thresholds: Some(
                    [("readiness_score".to_string(), ThresholdOverride::Value(50.0))].into(),
                ),
            },
            Self::SlowWorkload => SimulationRequest {
                scenario: profile("market_risk"),
                iterations: SLOW_BATCHES * batch_size,
                seed: Some(1),
                parallelism: Some(2),
                timeout_seconds: Some(2.0),
                risk_thresholds: None,
            },
        }
    }

    /// Runs the walkthrough.
    ///
    /// Interruptions are part of the report; only outright failures are
    /// errors.
    pub async fn run(&self, engine: Arc<SimulationEngine>) -> Result<WalkthroughReport, WorkbenchError> {
        let request = self.request(engine.config().batch_size);
        let scenario = engine.scenario(&request.scenario)?;
        let mut run = request
            .to_run(scenario)
            .map_err(|e| SimulationError::validation(RunContext::default(), e))?;
        if *self == Self::SlowWorkload {
            run = run.with_pacing(SLOW_PACING);
        }

        tracing::info!(walkthrough = self.name(), iterations = request.iterations, "starting");
        let report = |status, response, note| WalkthroughReport {
            walkthrough: self.name(),
            status,
            response,
            note,
        };

        match engine.run_async(run).await {
            Ok(result) => {
                let status = if result.is_complete() {
                    ReportStatus::Completed
                } else {
                    ReportStatus::Partial
                };
                let note = match self {
                    Self::DefenceReadiness => readiness_recount(&result),
                    _ => None,
                };
                Ok(report(status, Some(SimulationResponse::from(&result)), note))
            }
            Err(SimulationError::Timeout {
                completed_batches,
                total_batches,
                partial,
                ..
            }) => {
                let note = format!("timed out after {} of {} batches", completed_batches, total_batches);
                Ok(match partial {
                    Some(result) => report(
                        ReportStatus::Partial,
                        Some(SimulationResponse::from(result.as_ref())),
                        Some(note),
                    ),
                    None => report(ReportStatus::Interrupted, None, Some(note)),
                })
            }
            Err(e) if e.is_interrupted() => Ok(report(ReportStatus::Interrupted, None, Some(e.to_string()))),
            Err(e) => Err(e.into()),
        }
    }
}

fn readiness_recount(result: &SimulationResult) -> Option<String> {
    let readiness = result.samples.as_ref()?.column("readiness_score")?;
    let breaches = readiness.iter().filter(|&&x| x < 50.0).count();
    Some(format!(
        "{} of {} iterations below 50 (reported probability of failure {:.4})",
        breaches,
        readiness.len(),
        result.summary.metrics.probability_of_failure()
    ))
}
