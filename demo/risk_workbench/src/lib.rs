//! # Risk Workbench Demo
//!
//! Runs the reference scenarios end to end through [`sim_engine`]:
//!
//! - **Portfolio tail risk**: four correlated market factors, fixed seed,
//!   reproducible VaR/CVaR
//! - **Defence readiness**: ten independent capability factors with the
//!   readiness threshold lowered to 50
//! - **Slow workload**: paced batches against a short timeout, reporting
//!   partial progress
//!
//! The binary loads [`EngineConfig`](sim_engine::EngineConfig) from
//! `demo/risk_workbench/config/workbench.toml` (or the path given as the
//! first argument) with `SIM_*` environment overrides.

pub mod error;
pub mod walkthrough;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::WorkbenchError;
    pub use crate::walkthrough::{ReportStatus, Walkthrough, WalkthroughReport};
}
