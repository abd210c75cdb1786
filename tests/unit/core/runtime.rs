//! Unit tests for the statistics runtime

use fuelstats::config::PipelineConfig;
use fuelstats::core::runtime::{RuntimeConfig, StatsRuntime};
use fuelstats::core::StatsPipeline;
use fuelstats::db::{MemoryStore, StatsStore};
use fuelstats::models::geography::Granularity;
use std::sync::Arc;

#[test]
fn test_runtime_config_default() {
    let config = RuntimeConfig::default();
    assert_eq!(config.cron, "0 15 3 * * *");
    assert_eq!(config.granularities, Granularity::ALL.to_vec());
    assert!(!config.run_on_start);
}

#[test]
fn test_run_all_runs_each_granularity_in_order() {
    let store: Arc<dyn StatsStore> = Arc::new(MemoryStore::new());
    let runtime = StatsRuntime::new(vec![
        StatsPipeline::new(store.clone(), PipelineConfig::for_granularity(Granularity::County)),
        StatsPipeline::new(store, PipelineConfig::for_granularity(Granularity::ZipPrefix)),
    ]);
    assert_eq!(
        runtime.granularities(),
        vec![Granularity::County, Granularity::ZipPrefix]
    );
    assert!(runtime.pipeline(Granularity::ZipPrefix).is_some());

    let results = tokio_test::block_on(runtime.run_all());
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].granularity, Granularity::County);
    assert_eq!(results[1].granularity, Granularity::ZipPrefix);
    // No suppliers: nothing to do, but both passes complete.
    assert!(results.iter().all(|r| r.success && r.total == 0));
}

#[test]
fn test_failed_granularity_does_not_stop_the_next() {
    let memory = Arc::new(MemoryStore::new());
    tokio_test::block_on(memory.hold_run_lock(Granularity::ZipPrefix));

    let store: Arc<dyn StatsStore> = memory;
    let runtime = StatsRuntime::new(
        Granularity::ALL
            .iter()
            .map(|&g| StatsPipeline::new(store.clone(), PipelineConfig::for_granularity(g)))
            .collect(),
    );

    let results = tokio_test::block_on(runtime.run_all());
    assert!(!results[0].success);
    assert!(results[1].success);
}
