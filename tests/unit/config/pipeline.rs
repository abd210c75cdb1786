//! Unit tests for configuration loading

use fuelstats::config::{
    parse_granularities, CommunityThresholds, PipelineConfig, QualityConfig, RecencyBasis,
};
use fuelstats::error::StatsError;
use fuelstats::models::geography::Granularity;
use std::collections::HashMap;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| vars.get(key).cloned()
}

#[test]
fn test_defaults_without_overrides() {
    for granularity in Granularity::ALL {
        let config = PipelineConfig::from_lookup(granularity, &lookup(&[])).unwrap();
        assert_eq!(config, PipelineConfig::for_granularity(granularity));
    }

    let zip = PipelineConfig::for_granularity(Granularity::ZipPrefix);
    assert_eq!(zip.window_weeks, 12);
    assert_eq!(zip.community, CommunityThresholds::default());
    assert_eq!(zip.recency_basis, RecencyBasis::ComputedAt);
    assert!(zip.run_lock);
}

#[test]
fn test_quality_defaults_differ_per_granularity() {
    let zip = QualityConfig::zip_prefix();
    let county = QualityConfig::county();
    assert_eq!(zip.target_suppliers, 5.0);
    assert_eq!(county.target_suppliers, 3.0);
    assert_eq!(county.weights.history, 0.40);
    assert!(zip.validate().is_ok());
    assert!(county.validate().is_ok());
}

#[test]
fn test_overrides_apply_to_their_granularity_only() {
    let env = lookup(&[
        ("ZIP3_QUALITY_TARGET_SUPPLIERS", "10"),
        ("COMMUNITY_MIN_USER_COUNT", "2"),
        ("STATS_WINDOW_WEEKS", "8"),
        ("STATS_RECENCY_BASIS", "latest_observation"),
        ("STATS_RUN_LOCK", "false"),
    ]);

    let zip = PipelineConfig::from_lookup(Granularity::ZipPrefix, &env).unwrap();
    assert_eq!(zip.quality.target_suppliers, 10.0);
    assert_eq!(zip.community.min_user_count, 2);
    assert_eq!(zip.community.min_delivery_count, 3);
    assert_eq!(zip.window_weeks, 8);
    assert_eq!(zip.recency_basis, RecencyBasis::LatestObservation);
    assert!(!zip.run_lock);

    let county = PipelineConfig::from_lookup(Granularity::County, &env).unwrap();
    assert_eq!(county.quality.target_suppliers, 3.0);
}

#[test]
fn test_weights_must_sum_to_one() {
    let env = lookup(&[("COUNTY_QUALITY_WEIGHT_SUPPLIER", "0.9")]);
    let err = PipelineConfig::from_lookup(Granularity::County, &env).unwrap_err();
    assert!(matches!(err, StatsError::Config(_)));

    // A rebalanced set is accepted.
    let env = lookup(&[
        ("ZIP3_QUALITY_WEIGHT_SUPPLIER", "0.40"),
        ("ZIP3_QUALITY_WEIGHT_DENSITY", "0.20"),
    ]);
    assert!(PipelineConfig::from_lookup(Granularity::ZipPrefix, &env).is_ok());
}

#[test]
fn test_invalid_values_are_rejected() {
    for pairs in [
        [("STATS_WINDOW_WEEKS", "0")],
        [("STATS_WINDOW_WEEKS", "twelve")],
        [("COMMUNITY_MIN_DELIVERY_COUNT", "-")],
        [("STATS_RECENCY_BASIS", "yesterday")],
        [("ZIP3_QUALITY_TARGET_WEEKS", "0")],
    ] {
        let result = PipelineConfig::from_lookup(Granularity::ZipPrefix, &lookup(&pairs));
        assert!(
            matches!(result, Err(StatsError::Config(_))),
            "{:?} should be rejected",
            pairs
        );
    }
}

#[test]
fn test_parse_granularities() {
    assert_eq!(
        parse_granularities("zip3, county, zip3").unwrap(),
        vec![Granularity::ZipPrefix, Granularity::County]
    );
    assert_eq!(parse_granularities("county").unwrap(), vec![Granularity::County]);
    assert_eq!(parse_granularities("all").unwrap(), Granularity::ALL.to_vec());
    assert!(parse_granularities(" , ").is_err());
    assert!(parse_granularities("zip3,city").is_err());
}
