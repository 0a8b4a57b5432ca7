//! PubForge Pipeline
//!
//! Command-line entry point for the publication metadata ETL:
//! - Loads configuration and credentials from files and environment
//! - Connects to the store
//! - Runs a single stage or the whole ingest to validate sequence

mod cli;
mod runner;
mod telemetry;
mod validate;

use anyhow::Context;
use clap::Parser;
use cli::Cli;
use pubforge_common::{config::AppConfig, db::DbPool};
use runner::PipelineRunner;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(&path.to_string_lossy()),
        None => AppConfig::load(),
    }
    .context("loading configuration")?;

    telemetry::init_tracing(&config.observability);
    telemetry::init_metrics(&config.observability)?;

    let run_id = Uuid::new_v4();
    let span = info_span!("pipeline", run_id = %run_id, service = %config.observability.service_name);

    async move {
        info!(version = pubforge_common::VERSION, command = ?cli.command, "Starting PubForge");

        let pool = DbPool::connect(&config.database).await?;
        let runner = PipelineRunner::new(Arc::new(config), pool);

        let reports = runner.execute(&cli.command).await?;
        for report in &reports {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        Ok::<(), anyhow::Error>(())
    }
    .instrument(span)
    .await
}
