//! Unit tests for trend analysis

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use fuelstats::models::geography::GeographyKey;
use fuelstats::models::stats::WeeklyStat;
use fuelstats::stats::trend::percent_change;
use fuelstats::stats::TrendAnalyzer;

/// Weekly rows newest first, one per price
fn history(prices: &[f64]) -> Vec<WeeklyStat> {
    let newest = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
    prices
        .iter()
        .enumerate()
        .map(|(i, &price)| WeeklyStat {
            geography: GeographyKey::zip_prefix("021"),
            fuel_type: "heating_oil".to_string(),
            week_start: newest - Duration::weeks(i as i64),
            median_price: price,
            min_price: price,
            max_price: price,
            avg_price: None,
            supplier_count: 1,
            observation_count: 1,
            last_observed_at: Utc.with_ymd_and_hms(2024, 3, 12, 9, 0, 0).unwrap(),
        })
        .collect()
}

#[test]
fn test_six_week_change() {
    let trend = TrendAnalyzer::analyze(&history(&[3.3, 3.0, 3.0, 3.0, 3.0, 3.0, 3.0]));
    assert_eq!(trend.weeks_available, 7);
    assert_eq!(trend.percent_change_6w, Some(10.0));
    assert_eq!(trend.latest_week_price, Some(3.3));
    assert_eq!(trend.first_week_price, Some(3.0));
}

#[test]
fn test_reference_is_sixth_newest_week() {
    // Only the row five back from the newest is the reference.
    let trend = TrendAnalyzer::analyze(&history(&[4.0, 9.0, 9.0, 9.0, 9.0, 2.0, 1.0, 1.0]));
    assert_eq!(trend.percent_change_6w, Some(100.0));
    assert_eq!(trend.first_week_price, Some(1.0));
}

#[test]
fn test_short_history_uses_oldest_week() {
    let trend = TrendAnalyzer::analyze(&history(&[2.2, 2.1, 2.0]));
    assert_eq!(trend.percent_change_6w, Some(10.0));
    assert_eq!(trend.weeks_available, 3);
}

#[test]
fn test_single_week_has_no_change() {
    let trend = TrendAnalyzer::analyze(&history(&[3.0]));
    assert_eq!(trend.weeks_available, 1);
    assert_eq!(trend.percent_change_6w, None);
    assert_eq!(trend.first_week_price, Some(3.0));
    assert_eq!(trend.latest_week_price, Some(3.0));
}

#[test]
fn test_empty_history() {
    let trend = TrendAnalyzer::analyze(&[]);
    assert_eq!(trend.weeks_available, 0);
    assert_eq!(trend.percent_change_6w, None);
    assert_eq!(trend.latest_week_price, None);
}

#[test]
fn test_zero_reference_is_undefined() {
    assert_eq!(percent_change(3.0, 0.0), None);
    assert_eq!(percent_change(f64::NAN, 3.0), None);
    assert_eq!(percent_change(2.7, 3.0), Some(-10.0));
}
