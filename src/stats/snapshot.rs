//! Current-state materialization

use super::trend::TrendSummary;
use crate::db::StatsStore;
use crate::error::StoreResult;
use crate::models::stats::{CommunityMetrics, CurrentSnapshot, WeeklyStat};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub struct SnapshotWriter {
    store: Arc<dyn StatsStore>,
}

impl SnapshotWriter {
    pub fn new(store: Arc<dyn StatsStore>) -> Self {
        Self { store }
    }

    /// Assemble a snapshot purely from this pass's outputs. Nothing is
    /// carried over from a previous snapshot.
    pub fn build(
        latest: &WeeklyStat,
        trend: &TrendSummary,
        data_quality_score: f64,
        community: CommunityMetrics,
        computed_at: DateTime<Utc>,
    ) -> CurrentSnapshot {
        CurrentSnapshot {
            geography: latest.geography.clone(),
            fuel_type: latest.fuel_type.clone(),
            week_start: latest.week_start,
            median_price: latest.median_price,
            min_price: latest.min_price,
            max_price: latest.max_price,
            avg_price: latest.avg_price,
            supplier_count: latest.supplier_count,
            observation_count: latest.observation_count,
            weeks_available: trend.weeks_available,
            percent_change_6w: trend.percent_change_6w,
            first_week_price: trend.first_week_price,
            latest_week_price: trend.latest_week_price,
            data_quality_score,
            community,
            last_computed_at: computed_at,
        }
    }

    /// Upsert keyed on `(geography, fuel_type)`; every column is overwritten
    pub async fn write(&self, snapshot: &CurrentSnapshot) -> StoreResult<()> {
        self.store.upsert_snapshot(snapshot).await
    }
}
