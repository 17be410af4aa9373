//! Simulation results.

use crate::state::RunState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sim_core::correlation::{Copula, ProjectionDiagnostic};
use sim_core::types::SampleMatrix;
use sim_risk::RiskSummary;
use std::sync::Arc;

/// How correlation was applied in a run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CorrelationDiagnostics {
    /// Copula used
    pub copula: Copula,
    /// Whether marginals were drawn independently
    pub independent: bool,
    /// Whether the matrix was projected to PSD
    pub projected: bool,
    /// Projection record, when projected
    pub diagnostic: Option<ProjectionDiagnostic>,
}

/// Execution record of a run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExecutionMetadata {
    /// Engine-local run identifier
    pub run_id: u64,
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// Iterations requested
    pub requested_iterations: usize,
    /// Iterations actually sampled
    pub effective_iterations: usize,
    /// Batches that contributed samples
    pub completed_batches: usize,
    /// Batches planned
    pub total_batches: usize,
    /// Worker threads the run used
    pub workers: usize,
    /// Served from the cache (or a concurrent identical run)
    pub cache_hit: bool,
    /// Some batches are missing
    pub partial_completion: bool,
    /// Master seed, for replay
    pub seed_used: u64,
    /// Final run state
    pub state: RunState,
}

/// Immutable outcome of a run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimulationResult {
    /// Scenario name
    pub scenario: String,
    /// Scenario content hash
    pub scenario_hash: String,
    /// Raw samples, when retained
    #[serde(skip)]
    pub samples: Option<Arc<SampleMatrix>>,
    /// Blake3 digest of the sample matrix
    pub sample_digest: String,
    /// Risk analysis
    pub summary: RiskSummary,
    /// Correlation handling
    pub correlation: CorrelationDiagnostics,
    /// Execution record
    pub execution: ExecutionMetadata,
}

impl SimulationResult {
    /// Whether all planned batches contributed.
    pub fn is_complete(&self) -> bool {
        !self.execution.partial_completion
    }

    /// Copy marked as served from the cache.
    pub(crate) fn as_cache_hit(&self) -> Self {
        let mut hit = self.clone();
        hit.execution.cache_hit = true;
        hit
    }
}
