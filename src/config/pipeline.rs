use super::{env_bool, env_parse, QualityConfig};
use crate::error::StatsError;
use crate::models::geography::Granularity;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Trailing window recomputed by every pass, in calendar weeks
pub const DEFAULT_WINDOW_WEEKS: u32 = 12;
/// Weekly rows per fuel type handed to the trend analyzer
pub const DEFAULT_HISTORY_WEEKS: usize = 12;

/// Minimum counts before community numbers are surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityThresholds {
    pub min_user_count: i64,
    pub min_delivery_count: i64,
}

impl Default for CommunityThresholds {
    fn default() -> Self {
        Self {
            min_user_count: 5,
            min_delivery_count: 3,
        }
    }
}

/// What "fresh" is measured against when scoring recency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecencyBasis {
    /// The pass itself counts as the refresh; recency is always 1.0
    #[default]
    ComputedAt,
    /// Age of the newest observation in the latest week
    LatestObservation,
}

impl FromStr for RecencyBasis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "computed_at" => Ok(RecencyBasis::ComputedAt),
            "latest_observation" => Ok(RecencyBasis::LatestObservation),
            other => Err(format!("unknown recency basis '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub granularity: Granularity,
    pub window_weeks: u32,
    pub history_weeks: usize,
    pub quality: QualityConfig,
    pub community: CommunityThresholds,
    pub recency_basis: RecencyBasis,
    pub run_lock: bool,
}

impl PipelineConfig {
    pub fn for_granularity(granularity: Granularity) -> Self {
        Self {
            granularity,
            window_weeks: DEFAULT_WINDOW_WEEKS,
            history_weeks: DEFAULT_HISTORY_WEEKS,
            quality: QualityConfig::for_granularity(granularity),
            community: CommunityThresholds::default(),
            recency_basis: RecencyBasis::default(),
            run_lock: true,
        }
    }

    pub fn from_env(granularity: Granularity) -> Result<Self, StatsError> {
        Self::from_lookup(granularity, &|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(granularity: Granularity, lookup: &F) -> Result<Self, StatsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::for_granularity(granularity);
        let window_weeks: u32 = env_parse(lookup, "STATS_WINDOW_WEEKS", defaults.window_weeks)
            .map_err(StatsError::Config)?;
        if window_weeks == 0 {
            return Err(StatsError::Config("STATS_WINDOW_WEEKS must be > 0".to_string()));
        }

        Ok(Self {
            granularity,
            window_weeks,
            history_weeks: defaults.history_weeks,
            quality: QualityConfig::from_lookup(granularity, lookup).map_err(StatsError::Config)?,
            community: CommunityThresholds {
                min_user_count: env_parse(
                    lookup,
                    "COMMUNITY_MIN_USER_COUNT",
                    defaults.community.min_user_count,
                )
                .map_err(StatsError::Config)?,
                min_delivery_count: env_parse(
                    lookup,
                    "COMMUNITY_MIN_DELIVERY_COUNT",
                    defaults.community.min_delivery_count,
                )
                .map_err(StatsError::Config)?,
            },
            recency_basis: env_parse(lookup, "STATS_RECENCY_BASIS", defaults.recency_basis)
                .map_err(StatsError::Config)?,
            run_lock: env_bool(lookup, "STATS_RUN_LOCK", defaults.run_lock),
        })
    }
}
