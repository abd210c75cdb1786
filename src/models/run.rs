use crate::models::geography::Granularity;
use serde::{Deserialize, Serialize};

/// Terminal result of one pipeline pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub granularity: Granularity,
    pub success: bool,
    pub updated: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total: usize,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunResult {
    pub fn completed(
        granularity: Granularity,
        updated: usize,
        failed: usize,
        skipped: usize,
        duration_ms: u64,
    ) -> Self {
        Self {
            granularity,
            success: true,
            updated,
            failed,
            skipped,
            total: updated + failed + skipped,
            duration_ms,
            error: None,
        }
    }

    pub fn aborted(granularity: Granularity, error: String, duration_ms: u64) -> Self {
        Self {
            granularity,
            success: false,
            updated: 0,
            failed: 0,
            skipped: 0,
            total: 0,
            duration_ms,
            error: Some(error),
        }
    }

    /// One aborted result per granularity, for failures before any pass
    /// could start (e.g. the store is unreachable)
    pub fn aborted_all(granularities: &[Granularity], error: &str) -> Vec<Self> {
        granularities
            .iter()
            .map(|&g| Self::aborted(g, error.to_string(), 0))
            .collect()
    }
}
