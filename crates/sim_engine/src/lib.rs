//! # sim_engine: Simulation Runner (Layer 4)
//!
//! ## Layer 4 (Engine) Role
//!
//! sim_engine executes scenarios and serves results:
//! - [`SimulationEngine`]: validation, batch-parallel sampling, risk
//!   analysis, caching and the concurrency bound
//! - [`BatchPlan`] / [`execute_batches`]: fixed-size batch partition with an
//!   index-ordered join on a Rayon pool
//! - [`CancellationToken`]: cooperative cancellation; timeouts use the same
//!   checkpoints
//! - [`ResultCache`] / [`MokaResultCache`]: pluggable result store with a
//!   moka default, plus [`SingleFlight`] for concurrent identical requests
//! - [`EngineConfig`]: TOML file, `SIM_*` environment overrides, validation
//! - [`SimulationRequest`] / [`SimulationResponse`]: external contract
//!
//! ## Run lifecycle
//!
//! ```text
//! cache lookup ──hit──────────────────────────────→ result (cache_hit)
//!      │ miss
//!      ▼
//! single flight ──follower──→ wait for leader ────→ result (cache_hit)
//!      │ leader
//!      ▼
//! admission gate → Validating → Running → Completed → cache insert
//!                       │          ├───→ TimedOut / Cancelled (partial)
//!                       └──────────┴───→ Failed
//! ```
//!
//! Output is bit-identical for a given seed whatever the number of workers:
//! batch `i` always covers the same iterations and draws from
//! `derive_batch_seed(seed, i)`.
//!
//! ## Usage Example
//!
//! ```rust
//! use sim_engine::{EngineConfig, SimulationEngine, SimulationRequest};
//!
//! let engine = SimulationEngine::new(EngineConfig::default()).unwrap();
//! let request: SimulationRequest = serde_json::from_str(
//!     r#"{"scenario": {"profile": "financial_portfolio"}, "iterations": 2000, "seed": 42}"#,
//! )
//! .unwrap();
//!
//! let response = engine.handle(&request).unwrap();
//! assert_eq!(response.execution.seed_used, 42);
//! assert!(response.risk_metrics.cvar >= response.risk_metrics.var);
//! ```

#![warn(missing_docs)]

mod admission;
mod batch;
mod cache;
mod config;
mod contract;
mod control;
mod engine;
mod error;
mod result;
mod run;
mod sampler;
mod state;

pub use batch::{execute_batches, BatchPlan, BatchSpec};
pub use cache::{CacheKey, Flight, FlightGuard, FlightWaiter, MokaResultCache, ResultCache, SingleFlight};
pub use config::{BatchFailurePolicy, EngineConfig, InterruptPolicy, ENV_PREFIX};
pub use contract::{
    ExecutionView, RiskMetricsView, SimulationRequest, SimulationResponse, ThresholdOverride,
    VariableSummaryView,
};
pub use control::{CancellationToken, Interrupt};
pub use engine::SimulationEngine;
pub use error::{CacheError, ConfigError, RunContext, SimulationError};
pub use result::{CorrelationDiagnostics, ExecutionMetadata, SimulationResult};
pub use run::SimulationRun;
pub use state::RunState;
