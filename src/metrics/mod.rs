//! Prometheus metrics for statistics runs

use crate::models::run::RunResult;
use prometheus::{
    Encoder, Gauge, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

pub struct Metrics {
    registry: Registry,
    pub runs_total: IntCounterVec,
    pub run_failures_total: IntCounterVec,
    pub geographies_updated_total: IntCounterVec,
    pub geography_failures_total: IntCounterVec,
    pub geographies_skipped_total: IntCounterVec,
    pub weekly_rows_written_total: IntCounterVec,
    pub run_duration_seconds: HistogramVec,
    pub database_connected: Gauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let runs_total = IntCounterVec::new(
            Opts::new("fuelstats_runs_total", "Statistics passes started"),
            &["granularity"],
        )?;
        let run_failures_total = IntCounterVec::new(
            Opts::new("fuelstats_run_failures_total", "Statistics passes aborted"),
            &["granularity"],
        )?;
        let geographies_updated_total = IntCounterVec::new(
            Opts::new(
                "fuelstats_geographies_updated_total",
                "Geographies whose snapshots were fully written",
            ),
            &["granularity"],
        )?;
        let geography_failures_total = IntCounterVec::new(
            Opts::new(
                "fuelstats_geography_failures_total",
                "Geographies that failed within a pass",
            ),
            &["granularity"],
        )?;
        let geographies_skipped_total = IntCounterVec::new(
            Opts::new(
                "fuelstats_geographies_skipped_total",
                "Geographies skipped for lack of weekly history",
            ),
            &["granularity"],
        )?;
        let weekly_rows_written_total = IntCounterVec::new(
            Opts::new(
                "fuelstats_weekly_rows_written_total",
                "Weekly statistic rows upserted",
            ),
            &["granularity"],
        )?;
        let run_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "fuelstats_run_duration_seconds",
                "Wall-clock duration of statistics passes",
            )
            .buckets(vec![0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0]),
            &["granularity"],
        )?;
        let database_connected = Gauge::new(
            "fuelstats_database_connected",
            "1 when the data store connection is up",
        )?;

        registry.register(Box::new(runs_total.clone()))?;
        registry.register(Box::new(run_failures_total.clone()))?;
        registry.register(Box::new(geographies_updated_total.clone()))?;
        registry.register(Box::new(geography_failures_total.clone()))?;
        registry.register(Box::new(geographies_skipped_total.clone()))?;
        registry.register(Box::new(weekly_rows_written_total.clone()))?;
        registry.register(Box::new(run_duration_seconds.clone()))?;
        registry.register(Box::new(database_connected.clone()))?;

        Ok(Self {
            registry,
            runs_total,
            run_failures_total,
            geographies_updated_total,
            geography_failures_total,
            geographies_skipped_total,
            weekly_rows_written_total,
            run_duration_seconds,
            database_connected,
        })
    }

    /// Fold a finished run into the counters
    pub fn record_run(&self, result: &RunResult) {
        let label = [result.granularity.as_str()];
        self.runs_total.with_label_values(&label).inc();
        if !result.success {
            self.run_failures_total.with_label_values(&label).inc();
        }
        self.geographies_updated_total
            .with_label_values(&label)
            .inc_by(result.updated as u64);
        self.geography_failures_total
            .with_label_values(&label)
            .inc_by(result.failed as u64);
        self.geographies_skipped_total
            .with_label_values(&label)
            .inc_by(result.skipped as u64);
        self.run_duration_seconds
            .with_label_values(&label)
            .observe(result.duration_ms as f64 / 1000.0);
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
