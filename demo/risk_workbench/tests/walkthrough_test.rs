//! Walkthroughs run end to end against a file-configured engine.

use risk_workbench::prelude::*;
use sim_engine::{EngineConfig, SimulationEngine};
use std::io::Write;
use std::sync::Arc;

fn engine_from_file() -> Arc<SimulationEngine> {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "batch_size = 500\nmax_concurrent_runs = 2\ncache_capacity = 8").unwrap();
    let config = EngineConfig::from_file(file.path()).unwrap();
    Arc::new(SimulationEngine::new(config).unwrap())
}

#[tokio::test]
async fn test_portfolio_walkthrough_completes() {
    let engine = engine_from_file();
    let report = Walkthrough::PortfolioTailRisk.run(engine).await.unwrap();
    assert_eq!(report.status, ReportStatus::Completed);
    let response = report.response.unwrap();
    assert_eq!(response.execution.effective_iterations, 10_000);
    assert_eq!(response.execution.seed_used, 42);
    assert!(response.risk_metrics.cvar >= response.risk_metrics.var);
}

#[tokio::test]
async fn test_defence_walkthrough_reports_recount() {
    let engine = engine_from_file();
    let report = Walkthrough::DefenceReadiness.run(engine).await.unwrap();
    assert_eq!(report.status, ReportStatus::Completed);
    assert!(report.note.unwrap().contains("of 10000 iterations below 50"));
}

#[tokio::test]
async fn test_slow_walkthrough_is_partial() {
    let engine = engine_from_file();
    let report = Walkthrough::SlowWorkload.run(engine).await.unwrap();
    assert_ne!(report.status, ReportStatus::Completed);
    assert!(report.note.unwrap().contains("of 20 batches"));
    if let Some(response) = report.response {
        assert!(response.execution.partial_completion);
        assert!(response.execution.effective_iterations < 10_000);
    }
}
