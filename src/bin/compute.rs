//! One-shot statistics pass
//!
//! Runs the pipeline once for the chosen granularity (or all of them),
//! optionally restricted to a single geography, prints each run result as
//! JSON and exits non-zero when any run failed.

use clap::{Parser, ValueEnum};
use dotenvy::dotenv;
use fuelstats::config::{self, PipelineConfig};
use fuelstats::core::StatsPipeline;
use fuelstats::db::{PostgresStore, StatsStore};
use fuelstats::error::StatsError;
use fuelstats::logging;
use fuelstats::models::geography::{GeographyKey, Granularity};
use fuelstats::models::run::RunResult;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum GranularityArg {
    Zip3,
    County,
    All,
}

impl GranularityArg {
    fn granularities(self) -> Vec<Granularity> {
        match self {
            GranularityArg::Zip3 => vec![Granularity::ZipPrefix],
            GranularityArg::County => vec![Granularity::County],
            GranularityArg::All => Granularity::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "compute", about = "Run one fuel price statistics pass")]
struct Cli {
    /// Geography level to compute
    #[arg(long, value_enum, default_value = "all")]
    granularity: GranularityArg,

    /// Only recompute this geography: a 3-digit prefix or "County, ST"
    #[arg(long)]
    geography: Option<String>,

    /// Override DATABASE_URL
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let granularities = cli.granularity.granularities();
    if cli.geography.is_some() && granularities.len() != 1 {
        error!("--geography requires --granularity zip3 or county");
        return ExitCode::FAILURE;
    }

    let results = run(&cli, &granularities).await;

    let mut ok = true;
    for result in &results {
        ok &= result.success;
        match serde_json::to_string(result) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!(error = %e, "Failed to serialize run result");
                ok = false;
            }
        }
    }
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// One result per granularity, whether or not its pass could start
async fn run(cli: &Cli, granularities: &[Granularity]) -> Vec<RunResult> {
    let url = cli
        .database_url
        .clone()
        .unwrap_or_else(config::get_database_url);
    let store: Arc<dyn StatsStore> = match PostgresStore::connect(&url).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!(error = %e, "Failed to connect to database");
            return RunResult::aborted_all(granularities, &e.to_string());
        }
    };
    info!(granularities = ?granularities, "Running statistics pass");

    let mut results = Vec::with_capacity(granularities.len());
    for &granularity in granularities {
        let result = match run_one(store.clone(), granularity, cli.geography.as_deref()).await {
            Ok(result) => result,
            Err(e) => {
                error!(granularity = %granularity, error = %e, "Pass could not start");
                RunResult::aborted(granularity, e.to_string(), 0)
            }
        };
        results.push(result);
    }
    results
}

async fn run_one(
    store: Arc<dyn StatsStore>,
    granularity: Granularity,
    geography: Option<&str>,
) -> Result<RunResult, StatsError> {
    let pipeline = StatsPipeline::new(store, PipelineConfig::from_env(granularity)?);
    Ok(match geography {
        Some(raw) => {
            let key = GeographyKey::parse(granularity, raw).map_err(StatsError::Config)?;
            pipeline.compute_geography(&key).await
        }
        None => pipeline.compute().await,
    })
}
