use crate::models::geography::GeographyKey;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One week of order statistics for a geography and fuel type.
///
/// Unique per `(geography, fuel_type, week_start)`. `supplier_count` is the
/// number of distinct suppliers, never the number of rows or postal matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyStat {
    pub geography: GeographyKey,
    pub fuel_type: String,
    pub week_start: NaiveDate,
    pub median_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    /// Only populated at county granularity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_price: Option<f64>,
    pub supplier_count: i64,
    pub observation_count: i64,
    pub last_observed_at: DateTime<Utc>,
}

/// Community engagement counts plus their display gates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityMetrics {
    pub user_count: i64,
    pub delivery_count: i64,
    pub show_user_count: bool,
    pub show_delivery_count: bool,
}

/// Materialized latest state for a geography and fuel type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentSnapshot {
    pub geography: GeographyKey,
    pub fuel_type: String,
    pub week_start: NaiveDate,
    pub median_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_price: Option<f64>,
    pub supplier_count: i64,
    pub observation_count: i64,
    pub weeks_available: i64,
    pub percent_change_6w: Option<f64>,
    pub first_week_price: Option<f64>,
    pub latest_week_price: Option<f64>,
    pub data_quality_score: f64,
    #[serde(flatten)]
    pub community: CommunityMetrics,
    pub last_computed_at: DateTime<Utc>,
}
