//! Regional fuel price statistics engine.
//!
//! Turns raw per-supplier price observations into weekly history and a
//! current snapshot per geography, at zip-prefix and county granularity.

pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod geography;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod stats;

pub use error::{StatsError, StoreError};
