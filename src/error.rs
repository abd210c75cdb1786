//! Error types for the statistics engine.

use crate::models::geography::{GeographyKey, Granularity};
use thiserror::Error;

/// Errors raised by a [`StatsStore`](crate::db::StatsStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No live connection to the data store.
    #[error("database connection not available")]
    NotConnected,
    /// Establishing the connection failed.
    #[error("failed to connect to database: {0}")]
    Connection(String),
    /// A statement failed while executing.
    #[error("{context}: {source}")]
    Query {
        context: &'static str,
        #[source]
        source: tokio_postgres::Error,
    },
    /// A row came back in a shape the engine cannot use.
    #[error("invalid data: {0}")]
    InvalidData(String),
    /// Fault injected by the in-memory store.
    #[error("injected fault: {0}")]
    Injected(String),
}

impl StoreError {
    pub(crate) fn query(context: &'static str) -> impl FnOnce(tokio_postgres::Error) -> Self {
        move |source| StoreError::Query { context, source }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the pipeline itself.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("another {0} run is already in progress")]
    RunInProgress(Granularity),
    #[error("geography {0} has no active supplier coverage")]
    UnknownGeography(GeographyKey),
}
