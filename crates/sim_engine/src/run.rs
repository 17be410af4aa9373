//! Description of one simulation run.

use crate::control::CancellationToken;
use sim_scenarios::{RiskThreshold, Scenario};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// A run request: scenario, iteration count and execution options.
///
/// # Examples
///
/// ```rust
/// use sim_engine::SimulationRun;
/// use sim_scenarios::{ScenarioGenerator, ScenarioOverrides, Template};
/// use std::time::Duration;
///
/// let scenario = ScenarioGenerator::default()
///     .from_template(Template::SupplyChain, &ScenarioOverrides::default())
///     .unwrap();
/// let run = SimulationRun::new(scenario, 5_000)
///     .with_seed(7)
///     .with_parallelism(2)
///     .with_timeout(Duration::from_secs(30));
/// assert_eq!(run.seed(), Some(7));
/// ```
#[derive(Clone, Debug)]
pub struct SimulationRun {
    scenario: Arc<Scenario>,
    iterations: usize,
    seed: Option<u64>,
    parallelism: Option<usize>,
    timeout: Option<Duration>,
    cancellation: CancellationToken,
    thresholds: BTreeMap<String, RiskThreshold>,
    pacing: Option<Duration>,
}

impl SimulationRun {
    /// Run of `iterations` over `scenario` with default options.
    pub fn new(scenario: Arc<Scenario>, iterations: usize) -> Self {
        Self {
            scenario,
            iterations,
            seed: None,
            parallelism: None,
            timeout: None,
            cancellation: CancellationToken::new(),
            thresholds: BTreeMap::new(),
            pacing: None,
        }
    }

    /// Fixes the master seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Worker thread hint.
    pub fn with_parallelism(mut self, workers: usize) -> Self {
        self.parallelism = Some(workers);
        self
    }

    /// Wall-clock budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Token the caller can cancel.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Threshold replacing or adding to the scenario's.
    pub fn with_threshold(mut self, column: impl Into<String>, threshold: RiskThreshold) -> Self {
        self.thresholds.insert(column.into(), threshold);
        self
    }

    /// Thresholds replacing or adding to the scenario's.
    pub fn with_thresholds(mut self, thresholds: BTreeMap<String, RiskThreshold>) -> Self {
        self.thresholds.extend(thresholds);
        self
    }

    /// Delay before each batch. Diagnostic: models slow workloads.
    pub fn with_pacing(mut self, delay: Duration) -> Self {
        self.pacing = Some(delay);
        self
    }

    /// Scenario.
    pub fn scenario(&self) -> &Arc<Scenario> {
        &self.scenario
    }

    /// Requested iterations.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Fixed seed, if any.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Worker hint, if any.
    pub fn parallelism(&self) -> Option<usize> {
        self.parallelism
    }

    /// Wall-clock budget, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Threshold overrides.
    pub fn thresholds(&self) -> &BTreeMap<String, RiskThreshold> {
        &self.thresholds
    }

    /// Per-batch delay, if any.
    pub fn pacing(&self) -> Option<Duration> {
        self.pacing
    }
}
