//! Core application primitives (pipeline, runtime, scheduler)

pub mod orchestrator;
pub mod runtime;
pub mod scheduler;

pub use orchestrator::StatsPipeline;
pub use runtime::{RuntimeConfig, StatsRuntime};
pub use scheduler::JobScheduler;
