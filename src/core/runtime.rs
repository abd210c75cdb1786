//! Runs the configured granularities back to back

use crate::config::{self, PipelineConfig};
use crate::core::orchestrator::StatsPipeline;
use crate::db::StatsStore;
use crate::error::StatsError;
use crate::metrics::Metrics;
use crate::models::geography::Granularity;
use crate::models::run::RunResult;
use std::sync::Arc;
use tracing::info;

/// Configuration for the statistics runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub cron: String,
    pub granularities: Vec<Granularity>,
    pub run_on_start: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cron: "0 15 3 * * *".to_string(),
            granularities: Granularity::ALL.to_vec(),
            run_on_start: false,
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, StatsError> {
        Ok(Self {
            cron: config::get_stats_cron(),
            granularities: config::get_granularities().map_err(StatsError::Config)?,
            run_on_start: config::get_run_on_start(),
        })
    }
}

pub struct StatsRuntime {
    pipelines: Vec<StatsPipeline>,
}

impl StatsRuntime {
    pub fn new(pipelines: Vec<StatsPipeline>) -> Self {
        Self { pipelines }
    }

    /// One pipeline per granularity, each configured from the environment
    pub fn from_env(
        store: Arc<dyn StatsStore>,
        granularities: &[Granularity],
        metrics: Option<Arc<Metrics>>,
    ) -> Result<Self, StatsError> {
        let mut pipelines = Vec::with_capacity(granularities.len());
        for &granularity in granularities {
            let mut pipeline =
                StatsPipeline::new(store.clone(), PipelineConfig::from_env(granularity)?);
            if let Some(ref m) = metrics {
                pipeline = pipeline.with_metrics(m.clone());
            }
            pipelines.push(pipeline);
        }
        Ok(Self::new(pipelines))
    }

    pub fn pipeline(&self, granularity: Granularity) -> Option<&StatsPipeline> {
        self.pipelines.iter().find(|p| p.granularity() == granularity)
    }

    pub fn granularities(&self) -> Vec<Granularity> {
        self.pipelines.iter().map(|p| p.granularity()).collect()
    }

    /// Run every pipeline in order. A failed granularity does not stop the
    /// next one.
    pub async fn run_all(&self) -> Vec<RunResult> {
        let mut results = Vec::with_capacity(self.pipelines.len());
        for pipeline in &self.pipelines {
            results.push(pipeline.compute().await);
        }

        info!(
            runs = results.len(),
            failed_runs = results.iter().filter(|r| !r.success).count(),
            "StatsRuntime: completed {} runs",
            results.len()
        );
        results
    }
}
