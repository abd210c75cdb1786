//! Multi-week trend over a geography's weekly history

use super::math::round_to;
use crate::models::stats::WeeklyStat;
use serde::{Deserialize, Serialize};

/// Rows back from the newest week used as the trend reference ("6 weeks")
pub const TREND_LOOKBACK: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrendSummary {
    pub weeks_available: i64,
    pub percent_change_6w: Option<f64>,
    pub first_week_price: Option<f64>,
    pub latest_week_price: Option<f64>,
}

pub struct TrendAnalyzer;

impl TrendAnalyzer {
    /// `history` holds one fuel type's weekly rows, newest first.
    ///
    /// The reference week is `TREND_LOOKBACK` rows back, or the oldest row
    /// when less history is available.
    pub fn analyze(history: &[WeeklyStat]) -> TrendSummary {
        let latest = history.first().map(|w| w.median_price);
        let oldest = history.last().map(|w| w.median_price);

        let percent_change_6w = if history.len() >= 2 {
            let reference = history[TREND_LOOKBACK.min(history.len() - 1)].median_price;
            latest.and_then(|latest| percent_change(latest, reference))
        } else {
            None
        };

        TrendSummary {
            weeks_available: history.len() as i64,
            percent_change_6w,
            first_week_price: oldest,
            latest_week_price: latest,
        }
    }
}

/// Percent change rounded to 2 decimals; `None` for a zero or non-finite
/// reference
pub fn percent_change(latest: f64, reference: f64) -> Option<f64> {
    if reference == 0.0 || !reference.is_finite() || !latest.is_finite() {
        return None;
    }
    Some(round_to((latest - reference) / reference * 100.0, 2))
}
