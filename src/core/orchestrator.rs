//! One full statistics pass for a single granularity
//!
//! enumerate geographies → aggregate the window once → per geography:
//! history → trend → quality → community → snapshot.
//!
//! Failures inside one geography are logged and counted; only failures in
//! the shared stages abort the pass.

use crate::config::{PipelineConfig, RecencyBasis};
use crate::db::StatsStore;
use crate::error::StatsError;
use crate::geography::{CountyTable, GeographyIndex, ZipResolver};
use crate::metrics::Metrics;
use crate::models::geography::{GeographyKey, Granularity};
use crate::models::run::RunResult;
use crate::models::stats::WeeklyStat;
use crate::stats::{
    CommunityMetricsReader, QualityInputs, QualityScorer, SnapshotWriter, TrendAnalyzer,
    WeeklyAggregator,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

#[derive(Debug, Default, Clone, Copy)]
struct PassCounts {
    updated: usize,
    failed: usize,
    skipped: usize,
}

#[derive(Debug, PartialEq, Eq)]
enum GeographyOutcome {
    Updated { fuel_types: usize },
    Skipped,
}

/// Shared, read-only state for the per-geography loop
struct PassContext {
    scorer: QualityScorer,
    community: CommunityMetricsReader,
    writer: SnapshotWriter,
    computed_at: DateTime<Utc>,
}

pub struct StatsPipeline {
    store: Arc<dyn StatsStore>,
    config: PipelineConfig,
    metrics: Option<Arc<Metrics>>,
}

impl StatsPipeline {
    pub fn new(store: Arc<dyn StatsStore>, config: PipelineConfig) -> Self {
        Self {
            store,
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn granularity(&self) -> Granularity {
        self.config.granularity
    }

    /// Full pass over every covered geography
    pub async fn compute(&self) -> RunResult {
        self.compute_at(Utc::now(), None).await
    }

    /// Same pipeline restricted to one geography
    pub async fn compute_geography(&self, geography: &GeographyKey) -> RunResult {
        self.compute_at(Utc::now(), Some(geography)).await
    }

    /// Run a pass as of `now`. `now` anchors the window and stamps
    /// `last_computed_at`.
    pub async fn compute_at(
        &self,
        now: DateTime<Utc>,
        only: Option<&GeographyKey>,
    ) -> RunResult {
        let start = Instant::now();
        let granularity = self.config.granularity;
        let span = info_span!("stats_pass", granularity = %granularity);

        let outcome = self.run_locked(now, only).instrument(span).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(counts) => {
                info!(
                    granularity = %granularity,
                    updated = counts.updated,
                    failed = counts.failed,
                    skipped = counts.skipped,
                    duration_ms = duration_ms,
                    "StatsPipeline: {} pass finished, {} updated, {} failed, {} skipped",
                    granularity,
                    counts.updated,
                    counts.failed,
                    counts.skipped
                );
                RunResult::completed(
                    granularity,
                    counts.updated,
                    counts.failed,
                    counts.skipped,
                    duration_ms,
                )
            }
            Err(e) => {
                error!(
                    granularity = %granularity,
                    error = %e,
                    duration_ms = duration_ms,
                    "StatsPipeline: {} pass aborted: {}",
                    granularity,
                    e
                );
                RunResult::aborted(granularity, e.to_string(), duration_ms)
            }
        };

        if let Some(ref metrics) = self.metrics {
            metrics.record_run(&result);
            let connected = self.store.is_available().await;
            metrics
                .database_connected
                .set(if connected { 1.0 } else { 0.0 });
        }
        result
    }

    async fn run_locked(
        &self,
        now: DateTime<Utc>,
        only: Option<&GeographyKey>,
    ) -> Result<PassCounts, StatsError> {
        let granularity = self.config.granularity;
        if self.config.run_lock && !self.store.try_acquire_run_lock(granularity).await? {
            return Err(StatsError::RunInProgress(granularity));
        }

        let outcome = self.run_pass(now, only).await;

        if self.config.run_lock {
            if let Err(e) = self.store.release_run_lock(granularity).await {
                warn!(
                    granularity = %granularity,
                    error = %e,
                    "StatsPipeline: failed to release run lock"
                );
            }
        }
        outcome
    }

    async fn run_pass(
        &self,
        now: DateTime<Utc>,
        only: Option<&GeographyKey>,
    ) -> Result<PassCounts, StatsError> {
        let granularity = self.config.granularity;

        // Shared inputs first: nothing is written until all of them loaded.
        let suppliers = self.store.load_active_suppliers().await?;
        let counties = match granularity {
            Granularity::County => {
                let table = CountyTable::from_rows(&self.store.load_county_reference().await?);
                if table.is_empty() {
                    warn!("StatsPipeline: county reference is empty, every postal code is unmapped");
                } else {
                    debug!(county_rows = table.len(), "StatsPipeline: county reference loaded");
                }
                table
            }
            Granularity::ZipPrefix => CountyTable::default(),
        };
        let resolver = ZipResolver::new(granularity, counties);

        let mut index = GeographyIndex::build(&resolver, &suppliers);
        if let Some(key) = only {
            if key.granularity() != granularity || !index.contains(key) {
                return Err(StatsError::UnknownGeography(key.clone()));
            }
            index = index.restrict_to(key);
        }

        info!(
            granularity = %granularity,
            geographies = index.geography_count(),
            suppliers = index.supplier_count(),
            unmapped_postal_codes = index.unmapped_postal_codes(),
            "StatsPipeline: {} suppliers cover {} geographies",
            index.supplier_count(),
            index.geography_count()
        );

        let aggregator = WeeklyAggregator::from_config(&self.config);
        let window = aggregator.window(now);
        let observations = self
            .store
            .load_price_observations(window.start, window.end)
            .await?;
        let user_locations = self.store.load_user_locations().await?;
        let delivery_reports = self.store.load_delivery_reports().await?;

        // Every later stage reads the rows written here.
        let weekly = aggregator.aggregate(&observations, &index, &window);
        let written = self.store.upsert_weekly_stats(&weekly).await?;
        if let Some(ref metrics) = self.metrics {
            metrics
                .weekly_rows_written_total
                .with_label_values(&[granularity.as_str()])
                .inc_by(written as u64);
        }
        debug!(
            granularity = %granularity,
            window_start = %window.start,
            observations = observations.len(),
            weekly_rows = written,
            "StatsPipeline: weekly window refreshed"
        );

        let ctx = PassContext {
            scorer: QualityScorer::new(self.config.quality),
            community: CommunityMetricsReader::build(
                &resolver,
                &user_locations,
                &delivery_reports,
                self.config.community,
            ),
            writer: SnapshotWriter::new(self.store.clone()),
            computed_at: now,
        };

        let mut counts = PassCounts::default();
        for geography in index.geographies() {
            let span = info_span!("geography", geography = %geography);
            match self.process_geography(geography, &ctx).instrument(span).await {
                Ok(GeographyOutcome::Updated { fuel_types }) => {
                    counts.updated += 1;
                    debug!(
                        geography = %geography,
                        fuel_types = fuel_types,
                        "StatsPipeline: snapshots written for {}",
                        geography
                    );
                }
                Ok(GeographyOutcome::Skipped) => {
                    counts.skipped += 1;
                    debug!(
                        geography = %geography,
                        "StatsPipeline: no weekly history for {}, skipping",
                        geography
                    );
                }
                Err(e) => {
                    counts.failed += 1;
                    warn!(
                        geography = %geography,
                        error = %e,
                        "StatsPipeline: geography {} failed: {}",
                        geography,
                        e
                    );
                }
            }
        }

        Ok(counts)
    }

    async fn process_geography(
        &self,
        geography: &GeographyKey,
        ctx: &PassContext,
    ) -> Result<GeographyOutcome, StatsError> {
        let history = self
            .store
            .load_weekly_history(geography, self.config.history_weeks)
            .await?;
        if history.is_empty() {
            return Ok(GeographyOutcome::Skipped);
        }

        let mut by_fuel: BTreeMap<String, Vec<WeeklyStat>> = BTreeMap::new();
        for stat in history {
            by_fuel.entry(stat.fuel_type.clone()).or_default().push(stat);
        }

        let community = ctx.community.read(geography);
        let mut written = 0;
        let mut first_error = None;

        for (fuel_type, mut rows) in by_fuel {
            rows.sort_by(|a, b| b.week_start.cmp(&a.week_start));
            let latest = &rows[0];
            if latest.supplier_count == 0 {
                continue;
            }

            let trend = TrendAnalyzer::analyze(&rows);
            let data_age = match self.config.recency_basis {
                RecencyBasis::ComputedAt => Duration::zero(),
                RecencyBasis::LatestObservation => ctx.computed_at - latest.last_observed_at,
            };
            let score = ctx.scorer.score(&QualityInputs {
                supplier_count: latest.supplier_count,
                observation_count: latest.observation_count,
                weeks_available: trend.weeks_available,
                data_age,
            });

            let snapshot =
                SnapshotWriter::build(latest, &trend, score, community, ctx.computed_at);
            match ctx.writer.write(&snapshot).await {
                Ok(()) => written += 1,
                Err(e) => {
                    warn!(
                        geography = %geography,
                        fuel_type = %fuel_type,
                        error = %e,
                        "StatsPipeline: snapshot upsert failed"
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None if written == 0 => Ok(GeographyOutcome::Skipped),
            None => Ok(GeographyOutcome::Updated {
                fuel_types: written,
            }),
        }
    }
}
