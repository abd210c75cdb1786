//! Shared data models spanning the engine layers.

pub mod geography;
pub mod observation;
pub mod run;
pub mod stats;

pub use geography::{GeographyKey, Granularity};
pub use observation::{CountyReference, DeliveryReport, PriceObservation, Supplier, UserLocation};
pub use run::RunResult;
pub use stats::{CommunityMetrics, CurrentSnapshot, WeeklyStat};
