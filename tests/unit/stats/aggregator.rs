//! Unit tests for weekly aggregation

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use fuelstats::geography::{CountyTable, GeographyIndex, ZipResolver};
use fuelstats::models::geography::{GeographyKey, Granularity};
use fuelstats::models::observation::{CountyReference, PriceObservation, Supplier};
use fuelstats::stats::{week_start, WeeklyAggregator};
use std::ops::Range;

fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

/// Window of a pass run on Wednesday 2024-03-13 at noon
fn window() -> Range<DateTime<Utc>> {
    at(2023, 12, 25, 0)..at(2024, 3, 13, 12)
}

fn zip_index(suppliers: &[Supplier]) -> GeographyIndex {
    GeographyIndex::build(&ZipResolver::ZipPrefix, suppliers)
}

#[test]
fn test_week_start_is_monday() {
    let monday = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
    assert_eq!(week_start(at(2024, 3, 11, 0)), monday);
    assert_eq!(week_start(at(2024, 3, 13, 12)), monday);
    assert_eq!(week_start(at(2024, 3, 17, 23)), monday);
    assert_eq!(
        week_start(at(2024, 3, 18, 0)),
        NaiveDate::from_ymd_opt(2024, 3, 18).unwrap()
    );
}

#[test]
fn test_window_start_covers_whole_weeks() {
    let aggregator = WeeklyAggregator::new(Granularity::ZipPrefix, 12);
    let start = aggregator.window_start(at(2024, 3, 13, 12));
    assert_eq!(start, at(2023, 12, 25, 0));

    assert_eq!(
        aggregator.window(at(2024, 3, 13, 12)),
        at(2023, 12, 25, 0)..at(2024, 3, 13, 12)
    );

    let single = WeeklyAggregator::new(Granularity::ZipPrefix, 1);
    assert_eq!(single.window_start(at(2024, 3, 13, 12)), at(2024, 3, 11, 0));
}

#[test]
fn test_aggregate_order_statistics() {
    let suppliers = vec![
        Supplier::new(1, &["02139"]),
        Supplier::new(2, &["02140"]),
        Supplier::new(3, &["02141"]),
    ];
    let index = zip_index(&suppliers);
    let observations = vec![
        PriceObservation::new(1, "heating_oil", 3.0, at(2024, 3, 11, 9)),
        PriceObservation::new(2, "heating_oil", 2.0, at(2024, 3, 12, 9)),
        PriceObservation::new(3, "heating_oil", 2.5, at(2024, 3, 13, 9)),
    ];

    let aggregator = WeeklyAggregator::new(Granularity::ZipPrefix, 12);
    let stats = aggregator.aggregate(&observations, &index, &window());

    assert_eq!(stats.len(), 1);
    let week = &stats[0];
    assert_eq!(week.geography, GeographyKey::zip_prefix("021"));
    assert_eq!(week.week_start, NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
    assert_eq!(week.median_price, 2.5);
    assert_eq!(week.min_price, 2.0);
    assert_eq!(week.max_price, 3.0);
    assert_eq!(week.avg_price, None);
    assert_eq!(week.supplier_count, 3);
    assert_eq!(week.observation_count, 3);
    assert_eq!(week.last_observed_at, at(2024, 3, 13, 9));
}

#[test]
fn test_supplier_counted_once_across_postal_codes() {
    // Five postal codes, one county: a single price must stay a single row.
    let zips = ["01701", "01702", "01720", "01730", "01731"];
    let reference: Vec<CountyReference> = zips
        .iter()
        .map(|z| CountyReference::new(z, "Middlesex", "MA"))
        .collect();
    let resolver = ZipResolver::new(Granularity::County, CountyTable::from_rows(&reference));
    let index = GeographyIndex::build(&resolver, &[Supplier::new(7, &zips)]);

    let observations = vec![PriceObservation::new(7, "heating_oil", 3.49, at(2024, 3, 12, 9))];
    let aggregator = WeeklyAggregator::new(Granularity::County, 12);
    let stats = aggregator.aggregate(&observations, &index, &window());

    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].geography, GeographyKey::county("Middlesex", "MA"));
    assert_eq!(stats[0].supplier_count, 1);
    assert_eq!(stats[0].observation_count, 1);
    assert_eq!(stats[0].avg_price, Some(3.49));
}

#[test]
fn test_supplier_in_several_geographies_counts_in_each() {
    let index = zip_index(&[Supplier::new(1, &["02139", "02140", "03101"])]);
    let observations = vec![PriceObservation::new(1, "propane", 2.1, at(2024, 3, 12, 9))];

    let aggregator = WeeklyAggregator::new(Granularity::ZipPrefix, 12);
    let stats = aggregator.aggregate(&observations, &index, &window());

    let keys: Vec<_> = stats.iter().map(|s| s.geography.clone()).collect();
    assert_eq!(
        keys,
        vec![GeographyKey::zip_prefix("021"), GeographyKey::zip_prefix("031")]
    );
    assert!(stats.iter().all(|s| s.observation_count == 1));
}

#[test]
fn test_aggregate_filters_unusable_observations() {
    let index = zip_index(&[Supplier::new(1, &["02139"])]);
    let observations = vec![
        PriceObservation::new(1, "heating_oil", 3.0, at(2024, 3, 12, 9)).invalid(),
        PriceObservation::new(1, "heating_oil", 0.0, at(2024, 3, 12, 9)),
        PriceObservation::new(1, "heating_oil", f64::NAN, at(2024, 3, 12, 9)),
        PriceObservation::new(1, "  ", 3.0, at(2024, 3, 12, 9)),
        PriceObservation::new(1, "heating_oil", 3.0, at(2023, 12, 24, 23)),
        // unknown supplier
        PriceObservation::new(99, "heating_oil", 3.0, at(2024, 3, 12, 9)),
        PriceObservation::new(1, " Heating_Oil ", 3.2, at(2024, 3, 12, 9)),
    ];

    let aggregator = WeeklyAggregator::new(Granularity::ZipPrefix, 12);
    let stats = aggregator.aggregate(&observations, &index, &window());

    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].fuel_type, "heating_oil");
    assert_eq!(stats[0].observation_count, 1);
    assert_eq!(stats[0].median_price, 3.2);
}

#[test]
fn test_aggregate_splits_weeks_and_fuels() {
    let index = zip_index(&[Supplier::new(1, &["02139"])]);
    let observations = vec![
        PriceObservation::new(1, "heating_oil", 3.0, at(2024, 3, 4, 9)),
        PriceObservation::new(1, "heating_oil", 3.1, at(2024, 3, 11, 9)),
        PriceObservation::new(1, "propane", 2.0, at(2024, 3, 11, 9)),
    ];

    let aggregator = WeeklyAggregator::new(Granularity::ZipPrefix, 12);
    let stats = aggregator.aggregate(&observations, &index, &window());

    assert_eq!(stats.len(), 3);
    assert!(aggregator
        .aggregate(&[], &index, &window())
        .is_empty());
}

#[test]
fn test_aggregate_ignores_observations_after_now() {
    let index = zip_index(&[Supplier::new(1, &["02139"])]);
    let observations = vec![
        PriceObservation::new(1, "heating_oil", 3.0, at(2024, 3, 12, 9)),
        // Later the same week, and the following week: both after the pass.
        PriceObservation::new(1, "heating_oil", 5.0, at(2024, 3, 13, 12)),
        PriceObservation::new(1, "heating_oil", 9.0, at(2024, 3, 21, 9)),
    ];

    let aggregator = WeeklyAggregator::new(Granularity::ZipPrefix, 12);
    let stats = aggregator.aggregate(&observations, &index, &window());

    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].week_start, NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
    assert_eq!(stats[0].observation_count, 1);
    assert_eq!(stats[0].max_price, 3.0);
}
