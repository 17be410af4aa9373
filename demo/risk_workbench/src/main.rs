//! Risk Workbench CLI
//!
//! Runs every walkthrough and prints its report as JSON.

use anyhow::Result;
use risk_workbench::prelude::*;
use sim_engine::{EngineConfig, SimulationEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_CONFIG: &str = "demo/risk_workbench/config/workbench.toml";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("risk_workbench=info".parse()?)
                .add_directive("sim_engine=info".parse()?),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let config = if path.exists() {
        EngineConfig::load(Some(&path))?
    } else {
        tracing::warn!(path = %path.display(), "config file not found, using defaults");
        EngineConfig::load(None)?
    };
    tracing::info!(
        batch_size = config.batch_size,
        workers = config.default_parallelism,
        "Risk Workbench starting"
    );

    let engine = Arc::new(SimulationEngine::new(config)?);
    for walkthrough in Walkthrough::ALL {
        let report = walkthrough.run(Arc::clone(&engine)).await?;
        tracing::info!(
            walkthrough = report.walkthrough,
            status = ?report.status,
            "walkthrough finished"
        );
        println!("{}", report.to_json()?);
    }

    Ok(())
}
