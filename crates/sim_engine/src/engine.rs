//! The simulation engine: validation, batch execution, analysis and caching.

use crate::admission::AdmissionGate;
use crate::batch::{execute_batches, BatchPlan};
use crate::cache::{CacheKey, Flight, MokaResultCache, ResultCache, SingleFlight};
use crate::config::{BatchFailurePolicy, EngineConfig, InterruptPolicy};
use crate::contract::{SimulationRequest, SimulationResponse};
use crate::control::{Interrupt, RunControl};
use crate::error::{ConfigError, RunContext, SimulationError};
use crate::result::{ExecutionMetadata, SimulationResult};
use crate::run::SimulationRun;
use crate::sampler::{BatchFailure, ScenarioSampler};
use crate::state::RunState;
use chrono::{DateTime, Utc};
use rayon::ThreadPool;
use sim_core::rng::generate_seed;
use sim_core::types::{CorrelationError, SampleMatrix, ValidationError};
use sim_risk::RiskAnalyzer;
use sim_scenarios::{ProfileCatalog, Scenario, ScenarioGenerator, ScenarioSource};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Monte Carlo simulation engine.
///
/// Holds the immutable configuration, the profile catalogue and the result
/// cache. One engine serves any number of concurrent callers; at most
/// `max_concurrent_runs` runs execute at once and the rest queue.
///
/// # Examples
///
/// ```rust
/// use sim_engine::{EngineConfig, SimulationEngine, SimulationRun};
/// use sim_scenarios::{ScenarioOverrides, Template};
///
/// let engine = SimulationEngine::new(EngineConfig::default().with_batch_size(500)).unwrap();
/// let scenario = engine
///     .generator()
///     .from_template(Template::RiskAssessment, &ScenarioOverrides::default())
///     .unwrap();
///
/// let result = engine.run(SimulationRun::new(scenario, 2_000).with_seed(1)).unwrap();
/// assert_eq!(result.execution.effective_iterations, 2_000);
/// assert!(result.summary.metrics.cvar() >= result.summary.metrics.var());
/// ```
pub struct SimulationEngine {
    config: EngineConfig,
    generator: ScenarioGenerator,
    analyzer: RiskAnalyzer,
    cache: Arc<dyn ResultCache>,
    flights: SingleFlight,
    gate: AdmissionGate,
    next_run_id: AtomicU64,
}

/// Everything validated before any batch runs.
struct PreparedRun {
    sampler: ScenarioSampler,
    plan: BatchPlan,
    pool: ThreadPool,
}

struct Timing {
    started: Instant,
    started_at: DateTime<Utc>,
}

impl SimulationEngine {
    /// Engine with the default in-memory cache.
    ///
    /// # Errors
    ///
    /// `ConfigError` for an invalid configuration or an unreadable profile
    /// file.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        let cache = Arc::new(MokaResultCache::new(config.cache_capacity, config.cache_ttl()));
        Self::with_cache(config, cache)
    }

    /// Engine with an injected cache.
    pub fn with_cache(config: EngineConfig, cache: Arc<dyn ResultCache>) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut catalog = ProfileCatalog::builtin();
        if let Some(path) = &config.profiles_path {
            let loaded = catalog.load_file(path)?;
            tracing::info!(path = %path.display(), loaded, "loaded domain profiles");
        }
        let analyzer = RiskAnalyzer::new(config.var_confidence)
            .map_err(|e| ConfigError::Validation(vec![e.to_string()]))?;
        tracing::info!(
            max_concurrent_runs = config.max_concurrent_runs,
            default_parallelism = config.default_parallelism,
            batch_size = config.batch_size,
            profiles = catalog.len(),
            "simulation engine ready"
        );
        Ok(Self {
            gate: AdmissionGate::new(config.max_concurrent_runs),
            generator: ScenarioGenerator::new(Arc::new(catalog)),
            analyzer,
            cache,
            flights: SingleFlight::new(),
            next_run_id: AtomicU64::new(0),
            config,
        })
    }

    /// Configuration in force.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Scenario generator over the engine's profile catalogue.
    pub fn generator(&self) -> &ScenarioGenerator {
        &self.generator
    }

    /// Profile catalogue.
    pub fn catalog(&self) -> &ProfileCatalog {
        self.generator.catalog()
    }

    /// Builds a scenario from a request source.
    pub fn scenario(&self, source: &ScenarioSource) -> Result<Arc<Scenario>, SimulationError> {
        self.generator
            .generate(source)
            .map_err(|e| SimulationError::validation(RunContext::default(), e))
    }

    /// Drops every cached result.
    pub fn clear_cache(&self) {
        if let Err(e) = self.cache.clear() {
            tracing::warn!(error = %e, "cache clear failed");
        }
    }

    /// Approximate number of cached results.
    pub fn cached_results(&self) -> u64 {
        self.cache.len()
    }

    /// Runs a simulation to completion, blocking the calling thread.
    ///
    /// # Errors
    ///
    /// - `Validation` for rejected inputs; no work is started
    /// - `Resource` when the sample matrix would exceed `max_sample_bytes`
    /// - `Computation` for failed batches under `BatchFailurePolicy::Abort`
    /// - `Timeout` when the budget expires (with a partial result under
    ///   `InterruptPolicy::ReturnPartial`)
    /// - `Cancelled` under `InterruptPolicy::Fail`, or when nothing completed
    ///
    /// The timeout covers the whole call, including time spent queued for
    /// admission or waiting on an identical run.
    pub fn run(&self, run: SimulationRun) -> Result<SimulationResult, SimulationError> {
        let timing = Timing {
            started: Instant::now(),
            started_at: Utc::now(),
        };
        let control = RunControl::new(run.cancellation().clone(), run.timeout());
        let seed = run.seed().unwrap_or_else(generate_seed);
        let mut context = RunContext {
            run_id: self.next_run_id.fetch_add(1, Ordering::Relaxed) + 1,
            scenario: run.scenario().name().to_string(),
            scenario_hash: run.scenario().content_hash().to_string(),
            seed,
        };

        let scenario = if run.thresholds().is_empty() {
            Arc::clone(run.scenario())
        } else {
            let merged = run
                .scenario()
                .with_thresholds(run.thresholds().clone())
                .map_err(|e| SimulationError::validation(context.clone(), e))?;
            Arc::new(merged)
        };
        context.scenario_hash = scenario.content_hash().to_string();

        tracing::info!(
            run_id = context.run_id,
            scenario = %context.scenario,
            seed,
            iterations = run.iterations(),
            "simulation run accepted"
        );

        let key = CacheKey::derive(
            scenario.content_hash(),
            run.iterations(),
            seed,
            &self.settings_descriptor(),
        );
        if let Some(hit) = self.cache_lookup(&key) {
            tracing::info!(run_id = context.run_id, key = %key, "served from cache");
            return Ok(hit.as_cache_hit());
        }

        match self.flights.join(&key) {
            Flight::Leader(guard) => {
                // another leader may have finished between lookup and join
                if let Some(hit) = self.cache_lookup(&key) {
                    guard.publish(Some(Arc::clone(&hit)));
                    return Ok(hit.as_cache_hit());
                }
                let outcome = self.execute(&run, &scenario, &context, &timing, &control);
                let shared = self.store(&key, &outcome);
                guard.publish(shared);
                outcome
            }
            Flight::Follower(waiter) => {
                tracing::debug!(run_id = context.run_id, key = %key, "waiting on identical run");
                match waiter.wait_or_interrupt(&control) {
                    Ok(Some(shared)) => Ok(shared.as_cache_hit()),
                    Ok(None) => {
                        let outcome = self.execute(&run, &scenario, &context, &timing, &control);
                        self.store(&key, &outcome);
                        outcome
                    }
                    Err(interrupt) => {
                        tracing::warn!(
                            run_id = context.run_id,
                            key = %key,
                            ?interrupt,
                            "interrupted while waiting on identical run"
                        );
                        Err(self.interrupted_before_start(&run, &context, interrupt))
                    }
                }
            }
        }
    }

    /// Runs a simulation on Tokio's blocking pool.
    pub async fn run_async(self: Arc<Self>, run: SimulationRun) -> Result<SimulationResult, SimulationError> {
        let context = RunContext {
            run_id: 0,
            scenario: run.scenario().name().to_string(),
            scenario_hash: run.scenario().content_hash().to_string(),
            seed: run.seed().unwrap_or_default(),
        };
        tokio::task::spawn_blocking(move || self.run(run))
            .await
            .map_err(|e| SimulationError::computation(context, None, None, format!("run task failed: {}", e)))?
    }

    /// Serves a request in the external contract shape.
    pub fn handle(&self, request: &SimulationRequest) -> Result<SimulationResponse, SimulationError> {
        let scenario = self.scenario(&request.scenario)?;
        let run = request
            .to_run(scenario)
            .map_err(|e| SimulationError::validation(RunContext::default(), e))?;
        self.run(run).map(|result| SimulationResponse::from(&result))
    }

    /// [`handle`](Self::handle) on Tokio's blocking pool.
    pub async fn handle_async(
        self: Arc<Self>,
        request: SimulationRequest,
    ) -> Result<SimulationResponse, SimulationError> {
        tokio::task::spawn_blocking(move || self.handle(&request))
            .await
            .map_err(|e| {
                SimulationError::computation(RunContext::default(), None, None, format!("request task failed: {}", e))
            })?
    }

    // =========================================================================
    // Run phases
    // =========================================================================

    fn interrupted_before_start(
        &self,
        run: &SimulationRun,
        context: &RunContext,
        interrupt: Interrupt,
    ) -> SimulationError {
        let total_batches = run.iterations().div_ceil(self.config.batch_size);
        match interrupt {
            Interrupt::TimedOut => SimulationError::Timeout {
                context: context.clone(),
                completed_batches: 0,
                total_batches,
                partial: None,
            },
            Interrupt::Cancelled => SimulationError::Cancelled {
                context: context.clone(),
                completed_batches: 0,
                total_batches,
            },
        }
    }

    fn execute(
        &self,
        run: &SimulationRun,
        scenario: &Scenario,
        context: &RunContext,
        timing: &Timing,
        control: &RunControl,
    ) -> Result<SimulationResult, SimulationError> {
        let _permit = self.gate.acquire();
        let mut state = RunState::Pending;

        transition(&mut state, RunState::Validating, context)?;
        let prepared = match self.prepare(run, scenario, context) {
            Ok(prepared) => prepared,
            Err(e) => {
                transition(&mut state, RunState::Failed, context)?;
                tracing::warn!(run_id = context.run_id, error = %e, "run rejected");
                return Err(e);
            }
        };

        transition(&mut state, RunState::Running, context)?;
        let outcome = self.run_batches(run, scenario, context, timing, control, prepared, &mut state);
        if let Err(e) = &outcome {
            if !state.is_terminal() {
                transition(&mut state, RunState::Failed, context)?;
            }
            tracing::warn!(run_id = context.run_id, state = %state, error = %e, "run did not complete");
        }
        outcome
    }

    fn prepare(
        &self,
        run: &SimulationRun,
        scenario: &Scenario,
        context: &RunContext,
    ) -> Result<PreparedRun, SimulationError> {
        let invalid = |e: ValidationError| SimulationError::validation(context.clone(), e);
        let iterations = run.iterations();
        if iterations == 0 {
            return Err(invalid(ValidationError::value("iterations", "must be greater than 0")));
        }
        if iterations > self.config.max_iterations {
            return Err(invalid(ValidationError::value(
                "iterations",
                format!("{} exceeds the limit of {}", iterations, self.config.max_iterations),
            )));
        }
        if run.parallelism() == Some(0) {
            return Err(invalid(ValidationError::value("parallelism", "must be greater than 0")));
        }
        scenario.check_drift_range(iterations).map_err(invalid)?;

        let columns = scenario.column_names().len();
        let bytes = SampleMatrix::estimated_bytes(iterations, columns);
        if bytes > self.config.max_sample_bytes {
            return Err(SimulationError::resource(
                context.clone(),
                format!(
                    "{} iterations x {} columns need {} bytes, limit is {}",
                    iterations, columns, bytes, self.config.max_sample_bytes
                ),
            ));
        }

        let sampler = ScenarioSampler::compile(
            scenario,
            self.config.copula,
            self.config.psd_policy,
            self.config.eigenvalue_floor,
            iterations,
            self.config.checkpoint_interval,
        )
        .map_err(|e| match e {
            CorrelationError::Validation(v) => invalid(v),
            CorrelationError::Numerical(n) => {
                SimulationError::computation(context.clone(), None, None, n.to_string())
            }
        })?;
        if sampler.diagnostics().projected {
            tracing::warn!(
                run_id = context.run_id,
                scenario = %context.scenario,
                diagnostic = ?sampler.diagnostics().diagnostic,
                "correlation matrix projected to PSD"
            );
        }

        let plan = BatchPlan::new(iterations, self.config.batch_size, context.seed);
        let workers = worker_count(
            run.parallelism().unwrap_or(self.config.default_parallelism),
            plan.len(),
            self.config.max_parallelism,
        );
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("sim-worker-{}", i))
            .build()
            .map_err(|e| SimulationError::resource(context.clone(), format!("worker pool: {}", e)))?;

        Ok(PreparedRun { sampler, plan, pool })
    }

    #[allow(clippy::too_many_arguments)]
    fn run_batches(
        &self,
        run: &SimulationRun,
        scenario: &Scenario,
        context: &RunContext,
        timing: &Timing,
        control: &RunControl,
        prepared: PreparedRun,
        state: &mut RunState,
    ) -> Result<SimulationResult, SimulationError> {
        let PreparedRun { sampler, plan, pool } = prepared;
        let workers = pool.current_num_threads();
        let abort = AtomicBool::new(false);
        let abort_on_failure = self.config.batch_failure_policy == BatchFailurePolicy::Abort;

        tracing::debug!(
            run_id = context.run_id,
            batches = plan.len(),
            workers,
            "running batches"
        );

        let outcomes = execute_batches(&pool, &plan, |batch| {
            if abort.load(Ordering::Acquire) {
                return Err(BatchFailure::Interrupted(Interrupt::Cancelled));
            }
            if let Some(interrupt) = control.check() {
                return Err(BatchFailure::Interrupted(interrupt));
            }
            if let Some(delay) = run.pacing() {
                if let Some(interrupt) = control.pause(delay) {
                    return Err(BatchFailure::Interrupted(interrupt));
                }
            }
            let outcome = sampler.sample_batch(batch, control);
            if abort_on_failure && matches!(outcome, Err(BatchFailure::Failed { .. })) {
                abort.store(true, Ordering::Release);
            }
            tracing::debug!(
                run_id = context.run_id,
                batch = batch.index,
                rows = batch.len,
                ok = outcome.is_ok(),
                "batch finished"
            );
            outcome
        });

        let mut parts = Vec::with_capacity(plan.len());
        let mut interrupted: Option<Interrupt> = None;
        let mut first_failure = None;
        for (spec, outcome) in plan.batches().iter().zip(outcomes) {
            match outcome {
                Ok(samples) => parts.push(samples),
                Err(BatchFailure::Interrupted(interrupt)) => {
                    interrupted = match (interrupted, interrupt) {
                        (Some(Interrupt::Cancelled), _) | (_, Interrupt::Cancelled) => {
                            Some(Interrupt::Cancelled)
                        }
                        _ => Some(Interrupt::TimedOut),
                    };
                }
                Err(BatchFailure::Failed { variable, message }) => {
                    tracing::warn!(
                        run_id = context.run_id,
                        batch = spec.index,
                        variable = %variable,
                        %message,
                        "batch failed"
                    );
                    if first_failure.is_none() {
                        first_failure = Some((spec.index, variable, message));
                    }
                }
            }
        }

        if abort_on_failure {
            if let Some((batch, variable, message)) = first_failure {
                return Err(SimulationError::computation(
                    context.clone(),
                    Some(batch),
                    Some(variable),
                    message,
                ));
            }
        }

        let completed = parts.len();
        let total = plan.len();

        if let Some(interrupt) = interrupted {
            let (next, label) = match interrupt {
                Interrupt::TimedOut => (RunState::TimedOut, "timed out"),
                Interrupt::Cancelled => (RunState::Cancelled, "cancelled"),
            };
            transition(state, next, context)?;
            tracing::warn!(
                run_id = context.run_id,
                completed_batches = completed,
                total_batches = total,
                "run {}",
                label
            );
            let partial = if self.config.interrupt_policy == InterruptPolicy::ReturnPartial && completed > 0 {
                Some(self.assemble(scenario, context, timing, &sampler, &plan, workers, parts, *state)?)
            } else {
                None
            };
            return match (interrupt, partial) {
                (Interrupt::TimedOut, partial) => Err(SimulationError::Timeout {
                    context: context.clone(),
                    completed_batches: completed,
                    total_batches: total,
                    partial: partial.map(Box::new),
                }),
                (Interrupt::Cancelled, Some(result)) => Ok(result),
                (Interrupt::Cancelled, None) => Err(SimulationError::Cancelled {
                    context: context.clone(),
                    completed_batches: completed,
                    total_batches: total,
                }),
            };
        }

        if completed == 0 {
            return Err(SimulationError::computation(
                context.clone(),
                None,
                None,
                "every batch failed",
            ));
        }

        transition(state, RunState::Completed, context)?;
        let result = self.assemble(scenario, context, timing, &sampler, &plan, workers, parts, *state)?;
        tracing::info!(
            run_id = context.run_id,
            scenario = %context.scenario,
            duration_ms = result.execution.duration_ms,
            partial = result.execution.partial_completion,
            var = result.summary.metrics.var(),
            cvar = result.summary.metrics.cvar(),
            pof = result.summary.metrics.probability_of_failure(),
            "simulation run completed"
        );
        Ok(result)
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        &self,
        scenario: &Scenario,
        context: &RunContext,
        timing: &Timing,
        sampler: &ScenarioSampler,
        plan: &BatchPlan,
        workers: usize,
        parts: Vec<SampleMatrix>,
        state: RunState,
    ) -> Result<SimulationResult, SimulationError> {
        let completed_batches = parts.len();
        let samples = SampleMatrix::concat(sampler.columns().to_vec(), parts);
        debug_assert_eq!(samples.n_columns(), sampler.n_columns());
        let summary = self
            .analyzer
            .analyse(&samples, scenario)
            .map_err(|e| SimulationError::computation(context.clone(), None, None, e.to_string()))?;

        Ok(SimulationResult {
            scenario: context.scenario.clone(),
            scenario_hash: context.scenario_hash.clone(),
            sample_digest: samples.digest(),
            summary,
            correlation: sampler.diagnostics().clone(),
            execution: ExecutionMetadata {
                run_id: context.run_id,
                started_at: timing.started_at,
                duration_ms: timing.started.elapsed().as_millis() as u64,
                requested_iterations: plan.total_iterations(),
                effective_iterations: samples.rows(),
                completed_batches,
                total_batches: plan.len(),
                workers,
                cache_hit: false,
                partial_completion: completed_batches < plan.len(),
                seed_used: context.seed,
                state,
            },
            samples: self.config.retain_samples.then(|| Arc::new(samples)),
        })
    }

    // =========================================================================
    // Cache
    // =========================================================================

    fn settings_descriptor(&self) -> String {
        format!(
            "psd={:?};floor={:e};copula={:?};batch={};confidence={}",
            self.config.psd_policy,
            self.config.eigenvalue_floor,
            self.config.copula,
            self.config.batch_size,
            self.config.var_confidence,
        )
    }

    fn cache_lookup(&self, key: &CacheKey) -> Option<Arc<SimulationResult>> {
        match self.cache.get(key) {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache lookup failed");
                None
            }
        }
    }

    /// Caches complete results; returns what followers may share.
    fn store(
        &self,
        key: &CacheKey,
        outcome: &Result<SimulationResult, SimulationError>,
    ) -> Option<Arc<SimulationResult>> {
        let result = match outcome {
            Ok(result) if result.is_complete() => Arc::new(result.clone()),
            _ => return None,
        };
        if let Err(e) = self.cache.insert(key.clone(), Arc::clone(&result)) {
            tracing::warn!(key = %key, error = %e, "cache insert failed");
        }
        Some(result)
    }
}

/// Threads for one run: the request, never more than there are batches or
/// than the configured limit.
fn worker_count(requested: usize, batches: usize, limit: usize) -> usize {
    requested.min(batches).min(limit).max(1)
}

fn transition(state: &mut RunState, next: RunState, context: &RunContext) -> Result<(), SimulationError> {
    let from = *state;
    state.advance(next).map_err(|(from, to)| {
        SimulationError::computation(
            context.clone(),
            None,
            None,
            format!("illegal run state transition {} -> {}", from, to),
        )
    })?;
    tracing::debug!(run_id = context.run_id, from = %from, to = %next, "run state");
    Ok(())
}
