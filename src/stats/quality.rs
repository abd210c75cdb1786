//! Data quality score: a bounded confidence in a geography's statistics

use super::math::round_to;
use crate::config::QualityConfig;
use chrono::Duration;

/// Signals blended into the quality score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityInputs {
    pub supplier_count: i64,
    pub observation_count: i64,
    pub weeks_available: i64,
    /// Time since the data was last refreshed
    pub data_age: Duration,
}

pub struct QualityScorer {
    config: QualityConfig,
}

impl QualityScorer {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Weighted sum of the four component scores, rounded to 2 decimals and
    /// clamped to `[0, 1]`
    pub fn score(&self, inputs: &QualityInputs) -> f64 {
        let c = &self.config;
        let w = &c.weights;

        let supplier = ratio(inputs.supplier_count, c.target_suppliers);
        let density = ratio(inputs.observation_count, c.target_observations);
        let history = ratio(inputs.weeks_available, c.target_weeks);
        let recency = recency_score(inputs.data_age);

        let raw = supplier * w.supplier
            + density * w.density
            + history * w.history
            + recency * w.recency;
        round_to(raw.clamp(0.0, 1.0), 2)
    }
}

pub fn recency_score(age: Duration) -> f64 {
    if age <= Duration::hours(24) {
        1.0
    } else if age <= Duration::hours(48) {
        0.7
    } else if age <= Duration::hours(72) {
        0.4
    } else {
        0.1
    }
}

fn ratio(count: i64, target: f64) -> f64 {
    if target <= 0.0 {
        return 1.0;
    }
    (count.max(0) as f64 / target).min(1.0)
}
