//! Statistics stages of the pipeline

pub mod aggregator;
pub mod community;
pub mod math;
pub mod quality;
pub mod snapshot;
pub mod trend;

pub use aggregator::{week_start, WeeklyAggregator};
pub use community::CommunityMetricsReader;
pub use quality::{QualityInputs, QualityScorer};
pub use snapshot::SnapshotWriter;
pub use trend::{TrendAnalyzer, TrendSummary};
