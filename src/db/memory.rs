//! In-memory store for tests and dry runs
//!
//! Mirrors the upsert semantics of [`PostgresStore`](super::PostgresStore)
//! and can inject faults for a single geography or for the whole store.

use super::store::StatsStore;
use crate::error::{StoreError, StoreResult};
use crate::models::geography::{GeographyKey, Granularity};
use crate::models::observation::{
    CountyReference, DeliveryReport, PriceObservation, Supplier, UserLocation,
};
use crate::models::stats::{CurrentSnapshot, WeeklyStat};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;

type WeeklyKey = (GeographyKey, String, NaiveDate);
type SnapshotKey = (GeographyKey, String);

#[derive(Default)]
struct Inputs {
    suppliers: Vec<Supplier>,
    county_reference: Vec<CountyReference>,
    observations: Vec<PriceObservation>,
    user_locations: Vec<UserLocation>,
    delivery_reports: Vec<DeliveryReport>,
}

#[derive(Default)]
struct Faults {
    unavailable: bool,
    history: HashSet<GeographyKey>,
    snapshot: HashSet<GeographyKey>,
}

#[derive(Default)]
pub struct MemoryStore {
    inputs: RwLock<Inputs>,
    weekly: RwLock<BTreeMap<WeeklyKey, WeeklyStat>>,
    snapshots: RwLock<BTreeMap<SnapshotKey, CurrentSnapshot>>,
    locks: RwLock<HashSet<Granularity>>,
    faults: RwLock<Faults>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_supplier(&self, supplier: Supplier) {
        self.inputs.write().await.suppliers.push(supplier);
    }

    pub async fn add_county_reference(&self, row: CountyReference) {
        self.inputs.write().await.county_reference.push(row);
    }

    pub async fn add_observation(&self, observation: PriceObservation) {
        self.inputs.write().await.observations.push(observation);
    }

    pub async fn add_user_location(&self, user_id: i64, postal_code: &str) {
        self.inputs.write().await.user_locations.push(UserLocation {
            user_id,
            postal_code: postal_code.to_string(),
        });
    }

    pub async fn add_delivery_report(&self, id: i64, postal_code: &str, validated: bool) {
        self.inputs.write().await.delivery_reports.push(DeliveryReport {
            id,
            postal_code: postal_code.to_string(),
            validated,
        });
    }

    /// Seed a weekly row directly, e.g. history older than the window
    pub async fn insert_weekly(&self, stat: WeeklyStat) {
        let key = (stat.geography.clone(), stat.fuel_type.clone(), stat.week_start);
        self.weekly.write().await.insert(key, stat);
    }

    /// Make every call fail as if the store were unreachable
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.faults.write().await.unavailable = unavailable;
    }

    pub async fn fail_history_for(&self, geography: GeographyKey) {
        self.faults.write().await.history.insert(geography);
    }

    pub async fn fail_snapshot_for(&self, geography: GeographyKey) {
        self.faults.write().await.snapshot.insert(geography);
    }

    pub async fn clear_faults(&self) {
        *self.faults.write().await = Faults::default();
    }

    /// Hold the run lock as if another pass were in flight
    pub async fn hold_run_lock(&self, granularity: Granularity) {
        self.locks.write().await.insert(granularity);
    }

    pub async fn is_locked(&self, granularity: Granularity) -> bool {
        self.locks.read().await.contains(&granularity)
    }

    pub async fn weekly_stats(&self) -> Vec<WeeklyStat> {
        self.weekly.read().await.values().cloned().collect()
    }

    pub async fn weekly_for(&self, geography: &GeographyKey) -> Vec<WeeklyStat> {
        self.weekly
            .read()
            .await
            .values()
            .filter(|w| &w.geography == geography)
            .cloned()
            .collect()
    }

    pub async fn snapshots(&self) -> Vec<CurrentSnapshot> {
        self.snapshots.read().await.values().cloned().collect()
    }

    pub async fn snapshot(
        &self,
        geography: &GeographyKey,
        fuel_type: &str,
    ) -> Option<CurrentSnapshot> {
        self.snapshots
            .read()
            .await
            .get(&(geography.clone(), fuel_type.to_string()))
            .cloned()
    }

    async fn check_available(&self) -> StoreResult<()> {
        if self.faults.read().await.unavailable {
            return Err(StoreError::NotConnected);
        }
        Ok(())
    }
}

#[async_trait]
impl StatsStore for MemoryStore {
    async fn is_available(&self) -> bool {
        !self.faults.read().await.unavailable
    }

    async fn try_acquire_run_lock(&self, granularity: Granularity) -> StoreResult<bool> {
        self.check_available().await?;
        Ok(self.locks.write().await.insert(granularity))
    }

    async fn release_run_lock(&self, granularity: Granularity) -> StoreResult<()> {
        self.locks.write().await.remove(&granularity);
        Ok(())
    }

    async fn load_active_suppliers(&self) -> StoreResult<Vec<Supplier>> {
        self.check_available().await?;
        Ok(self
            .inputs
            .read()
            .await
            .suppliers
            .iter()
            .filter(|s| s.participates())
            .cloned()
            .collect())
    }

    async fn load_county_reference(&self) -> StoreResult<Vec<CountyReference>> {
        self.check_available().await?;
        Ok(self.inputs.read().await.county_reference.clone())
    }

    async fn load_price_observations(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> StoreResult<Vec<PriceObservation>> {
        self.check_available().await?;
        Ok(self
            .inputs
            .read()
            .await
            .observations
            .iter()
            .filter(|o| o.is_valid && o.observed_at >= since && o.observed_at < until)
            .cloned()
            .collect())
    }

    async fn load_user_locations(&self) -> StoreResult<Vec<UserLocation>> {
        self.check_available().await?;
        Ok(self.inputs.read().await.user_locations.clone())
    }

    async fn load_delivery_reports(&self) -> StoreResult<Vec<DeliveryReport>> {
        self.check_available().await?;
        Ok(self.inputs.read().await.delivery_reports.clone())
    }

    async fn upsert_weekly_stats(&self, stats: &[WeeklyStat]) -> StoreResult<usize> {
        self.check_available().await?;
        let mut weekly = self.weekly.write().await;
        for stat in stats {
            let key = (stat.geography.clone(), stat.fuel_type.clone(), stat.week_start);
            weekly.insert(key, stat.clone());
        }
        Ok(stats.len())
    }

    async fn load_weekly_history(
        &self,
        geography: &GeographyKey,
        per_fuel_limit: usize,
    ) -> StoreResult<Vec<WeeklyStat>> {
        self.check_available().await?;
        if self.faults.read().await.history.contains(geography) {
            return Err(StoreError::Injected(format!("history for {}", geography)));
        }

        let weekly = self.weekly.read().await;
        let mut by_fuel: BTreeMap<&str, Vec<&WeeklyStat>> = BTreeMap::new();
        for stat in weekly.values().filter(|w| &w.geography == geography) {
            by_fuel.entry(stat.fuel_type.as_str()).or_default().push(stat);
        }

        let mut history = Vec::new();
        for (_, mut rows) in by_fuel {
            rows.sort_by(|a, b| b.week_start.cmp(&a.week_start));
            history.extend(rows.into_iter().take(per_fuel_limit).cloned());
        }
        Ok(history)
    }

    async fn upsert_snapshot(&self, snapshot: &CurrentSnapshot) -> StoreResult<()> {
        self.check_available().await?;
        if self.faults.read().await.snapshot.contains(&snapshot.geography) {
            return Err(StoreError::Injected(format!(
                "snapshot upsert for {}",
                snapshot.geography
            )));
        }

        let key = (snapshot.geography.clone(), snapshot.fuel_type.clone());
        self.snapshots.write().await.insert(key, snapshot.clone());
        Ok(())
    }
}
