//! Fuel Stats Worker
//!
//! Recomputes weekly statistics and current snapshots for every configured
//! granularity on a cron schedule. Run as a single instance; concurrent
//! passes for the same granularity are refused by the run lock.

use dotenvy::dotenv;
use fuelstats::config;
use fuelstats::core::runtime::{RuntimeConfig, StatsRuntime};
use fuelstats::core::scheduler::JobScheduler;
use fuelstats::db::{PostgresStore, StatsStore};
use fuelstats::logging;
use fuelstats::metrics::Metrics;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env if present
    dotenv().ok();

    // Initialize logging based on environment
    logging::init_logging();

    let env = config::get_environment();
    info!("Starting Fuel Stats Worker");
    info!(environment = %env, "Environment");

    let runtime_config = RuntimeConfig::from_env()?;
    info!(
        cron = %runtime_config.cron,
        granularities = ?runtime_config.granularities,
        run_on_start = runtime_config.run_on_start,
        "Worker configuration loaded"
    );

    // Initialize metrics
    let metrics = Arc::new(Metrics::new()?);

    info!("Initializing PostgreSQL connection...");
    let store = match PostgresStore::connect(&config::get_database_url()).await {
        Ok(store) => {
            info!("PostgreSQL connected");
            metrics.database_connected.set(1.0);
            Arc::new(store)
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to PostgreSQL");
            warn!("Worker requires PostgreSQL - exiting");
            return Err(format!("PostgreSQL connection required for worker: {}", e).into());
        }
    };
    let store: Arc<dyn StatsStore> = store;

    let runtime = Arc::new(StatsRuntime::from_env(
        store,
        &runtime_config.granularities,
        Some(metrics.clone()),
    )?);

    if runtime_config.run_on_start {
        info!("Running initial statistics pass...");
        for result in runtime.run_all().await {
            if !result.success {
                error!(
                    granularity = %result.granularity,
                    error = result.error.as_deref().unwrap_or("unknown"),
                    "Initial {} run failed",
                    result.granularity
                );
            }
        }
    }

    info!("Starting job scheduler...");
    let scheduler = JobScheduler::new(runtime, &runtime_config.cron)
        .map_err(|e| format!("Failed to create scheduler: {}", e))?
        .with_metrics(metrics.clone());
    scheduler
        .start()
        .await
        .map_err(|e| format!("Failed to start scheduler: {}", e))?;

    // Graceful shutdown
    info!("Worker started, waiting for shutdown signal...");
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutting down worker...");
            scheduler.stop().await;
            info!("Worker stopped");
        }
    }

    Ok(())
}
