//! Cron-based scheduler for statistics passes

use crate::core::runtime::StatsRuntime;
use crate::error::StatsError;
use crate::metrics::Metrics;
use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// Scheduler that periodically runs every configured pipeline.
///
/// Each tick awaits the full run before waiting for the next one, so the
/// scheduler never overlaps with itself.
pub struct JobScheduler {
    runtime: Arc<StatsRuntime>,
    schedule: Schedule,
    cron_expr: String,
    metrics: Option<Arc<Metrics>>,
    handle: Arc<RwLock<Option<tokio::task::JoinHandle<()>>>>,
}

impl JobScheduler {
    /// Create a new scheduler
    ///
    /// # Arguments
    /// * `runtime` - Pipelines to run on every tick
    /// * `cron_expr` - Six-field cron expression (seconds first), UTC
    pub fn new(runtime: Arc<StatsRuntime>, cron_expr: &str) -> Result<Self, StatsError> {
        let schedule = Schedule::from_str(cron_expr).map_err(|e| {
            StatsError::Config(format!("Invalid cron expression '{}': {}", cron_expr, e))
        })?;

        info!(
            cron = %cron_expr,
            granularities = ?runtime.granularities(),
            "JobScheduler: created (cron: {})",
            cron_expr
        );

        Ok(Self {
            runtime,
            schedule,
            cron_expr: cron_expr.to_string(),
            metrics: None,
            handle: Arc::new(RwLock::new(None)),
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn cron_expr(&self) -> &str {
        &self.cron_expr
    }

    /// Next time the schedule fires after `after`
    pub fn next_tick_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), StatsError> {
        let runtime = self.runtime.clone();
        let schedule = self.schedule.clone();
        let metrics = self.metrics.clone();
        let handle_arc = self.handle.clone();

        let handle = tokio::spawn(async move {
            info!("JobScheduler: started, waiting for cron schedule...");

            loop {
                let mut upcoming = schedule.upcoming(Utc);
                if let Some(next_tick) = upcoming.next() {
                    let now = Utc::now();
                    if next_tick > now {
                        let duration = (next_tick - now).to_std().unwrap_or_default();
                        debug!(next_tick = %next_tick, "JobScheduler: sleeping until next tick");
                        tokio::time::sleep(duration).await;
                    }
                } else {
                    // No more scheduled times, wait a bit and check again
                    tokio::time::sleep(tokio::time::Duration::from_secs(60)).await;
                    continue;
                }

                info!("JobScheduler: cron tick, running statistics passes");
                let results = runtime.run_all().await;
                for result in results.iter().filter(|r| !r.success) {
                    error!(
                        granularity = %result.granularity,
                        error = result.error.as_deref().unwrap_or("unknown"),
                        "JobScheduler: {} run failed",
                        result.granularity
                    );
                }

                if let Some(ref m) = metrics {
                    match m.render() {
                        Ok(text) => debug!(metrics = %text, "JobScheduler: metrics after run"),
                        Err(e) => error!(error = %e, "JobScheduler: failed to render metrics"),
                    }
                }
            }
        });

        {
            let mut h = handle_arc.write().await;
            *h = Some(handle);
        }

        info!("JobScheduler: started successfully");
        Ok(())
    }

    /// Stop the scheduler
    pub async fn stop(&self) {
        let mut handle = self.handle.write().await;
        if let Some(h) = handle.take() {
            h.abort();
            info!("JobScheduler: stopped");
        }
    }

    /// Check if the scheduler is running
    pub async fn is_running(&self) -> bool {
        let handle = self.handle.read().await;
        handle.is_some()
    }
}
