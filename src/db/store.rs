//! Storage interface for the statistics pipeline.

use crate::error::StoreResult;
use crate::models::geography::{GeographyKey, Granularity};
use crate::models::observation::{
    CountyReference, DeliveryReport, PriceObservation, Supplier, UserLocation,
};
use crate::models::stats::{CurrentSnapshot, WeeklyStat};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Whether the backing connection is currently up
    async fn is_available(&self) -> bool;

    /// Try to take the run lock for one granularity. `false` means another
    /// run holds it, in this process or elsewhere. The lock is not
    /// reentrant: a second acquire before release returns `false`.
    async fn try_acquire_run_lock(&self, granularity: Granularity) -> StoreResult<bool>;

    async fn release_run_lock(&self, granularity: Granularity) -> StoreResult<()>;

    /// Active suppliers with non-empty coverage
    async fn load_active_suppliers(&self) -> StoreResult<Vec<Supplier>>;

    async fn load_county_reference(&self) -> StoreResult<Vec<CountyReference>>;

    /// Valid observations with `since <= observed_at < until`
    async fn load_price_observations(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> StoreResult<Vec<PriceObservation>>;

    async fn load_user_locations(&self) -> StoreResult<Vec<UserLocation>>;

    async fn load_delivery_reports(&self) -> StoreResult<Vec<DeliveryReport>>;

    /// Upsert weekly rows; an existing `(geography, fuel_type, week_start)`
    /// row is overwritten. Returns the number of rows written.
    async fn upsert_weekly_stats(&self, stats: &[WeeklyStat]) -> StoreResult<usize>;

    /// Up to `per_fuel_limit` most recent weekly rows per fuel type for one
    /// geography, ordered by fuel type then week descending
    async fn load_weekly_history(
        &self,
        geography: &GeographyKey,
        per_fuel_limit: usize,
    ) -> StoreResult<Vec<WeeklyStat>>;

    /// Upsert keyed on `(geography, fuel_type)`
    async fn upsert_snapshot(&self, snapshot: &CurrentSnapshot) -> StoreResult<()>;
}
