//! Error kinds raised by the clustering engine.
//!
//! Record-level problems ([`RecordError`]) only ever drop the offending row.
//! Configuration problems ([`ConfigError`]) stop a run before any work starts.

use thiserror::Error;

/// A configuration value that cannot be used.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be a finite number greater than zero (got {value})")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{field} must be at least 1")]
    ZeroCount { field: &'static str },
}

/// Why a single raw row was excluded from a run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RecordError {
    #[error("no capture or creation timestamp")]
    MissingTimestamp,

    #[error("unparsable timestamp {0:?}")]
    BadTimestamp(String),

    #[error("unparsable embedding: {0}")]
    BadEmbedding(String),

    #[error("embedding has {found} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, found: usize },
}

impl RecordError {
    /// True for errors caused by the timestamp columns.
    pub fn is_timestamp(&self) -> bool {
        matches!(self, RecordError::MissingTimestamp | RecordError::BadTimestamp(_))
    }
}

/// Fatal errors for a clustering invocation.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A logic defect inside the engine. Never expected for any input.
    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

pub type ClusterResult<T> = std::result::Result<T, ClusterError>;
