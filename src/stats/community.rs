//! Community engagement counts per geography
//!
//! The counts only gate what the presentation layer shows; they never feed
//! into the price math.

use crate::config::CommunityThresholds;
use crate::geography::ZipResolver;
use crate::models::geography::GeographyKey;
use crate::models::observation::{DeliveryReport, UserLocation};
use crate::models::stats::CommunityMetrics;
use std::collections::{HashMap, HashSet};

pub struct CommunityMetricsReader {
    users: HashMap<GeographyKey, HashSet<i64>>,
    deliveries: HashMap<GeographyKey, i64>,
    thresholds: CommunityThresholds,
}

impl CommunityMetricsReader {
    /// Index both logs by geography through the same resolver used for
    /// supplier coverage
    pub fn build(
        resolver: &ZipResolver,
        user_locations: &[UserLocation],
        delivery_reports: &[DeliveryReport],
        thresholds: CommunityThresholds,
    ) -> Self {
        let mut users: HashMap<GeographyKey, HashSet<i64>> = HashMap::new();
        for location in user_locations {
            if let Some(key) = resolver.resolve(&location.postal_code) {
                users.entry(key).or_default().insert(location.user_id);
            }
        }

        let mut deliveries: HashMap<GeographyKey, i64> = HashMap::new();
        for report in delivery_reports.iter().filter(|r| r.validated) {
            if let Some(key) = resolver.resolve(&report.postal_code) {
                *deliveries.entry(key).or_insert(0) += 1;
            }
        }

        Self {
            users,
            deliveries,
            thresholds,
        }
    }

    pub fn empty(thresholds: CommunityThresholds) -> Self {
        Self {
            users: HashMap::new(),
            deliveries: HashMap::new(),
            thresholds,
        }
    }

    pub fn read(&self, geography: &GeographyKey) -> CommunityMetrics {
        let user_count = self.users.get(geography).map_or(0, |u| u.len() as i64);
        let delivery_count = self.deliveries.get(geography).copied().unwrap_or(0);
        gate(user_count, delivery_count, &self.thresholds)
    }
}

/// Derive the display gates for a pair of raw counts
pub fn gate(
    user_count: i64,
    delivery_count: i64,
    thresholds: &CommunityThresholds,
) -> CommunityMetrics {
    CommunityMetrics {
        user_count,
        delivery_count,
        show_user_count: user_count >= thresholds.min_user_count,
        show_delivery_count: delivery_count >= thresholds.min_delivery_count,
    }
}
