//! Unit tests for the cron scheduler

use chrono::{TimeZone, Utc};
use fuelstats::core::runtime::StatsRuntime;
use fuelstats::core::scheduler::JobScheduler;
use fuelstats::error::StatsError;
use std::sync::Arc;

fn empty_runtime() -> Arc<StatsRuntime> {
    Arc::new(StatsRuntime::new(Vec::new()))
}

#[test]
fn test_invalid_cron_is_rejected() {
    let result = JobScheduler::new(empty_runtime(), "every night");
    assert!(matches!(result, Err(StatsError::Config(_))));
}

#[test]
fn test_next_tick_follows_cron() {
    let scheduler = JobScheduler::new(empty_runtime(), "0 15 3 * * *").unwrap();
    assert_eq!(scheduler.cron_expr(), "0 15 3 * * *");

    let noon = Utc.with_ymd_and_hms(2024, 3, 13, 12, 0, 0).unwrap();
    assert_eq!(
        scheduler.next_tick_after(noon),
        Some(Utc.with_ymd_and_hms(2024, 3, 14, 3, 15, 0).unwrap())
    );

    let early = Utc.with_ymd_and_hms(2024, 3, 13, 1, 0, 0).unwrap();
    assert_eq!(
        scheduler.next_tick_after(early),
        Some(Utc.with_ymd_and_hms(2024, 3, 13, 3, 15, 0).unwrap())
    );
}

#[tokio::test]
async fn test_start_and_stop() {
    let scheduler = JobScheduler::new(empty_runtime(), "0 15 3 * * *").unwrap();
    assert!(!scheduler.is_running().await);

    scheduler.start().await.unwrap();
    assert!(scheduler.is_running().await);

    scheduler.stop().await;
    assert!(!scheduler.is_running().await);
}
