//! Engine and normalization error types.

use chrono::{DateTime, Utc};

/// Errors raised by the merge-and-scoring engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The forecast series contained no points.
    #[error("malformed forecast series: no points")]
    EmptyForecastSeries,

    /// A forecast point is not strictly later than its predecessor.
    #[error("malformed forecast series: point {index} at {at} does not follow {previous}")]
    NonMonotonicForecastSeries {
        index: usize,
        previous: DateTime<Utc>,
        at: DateTime<Utc>,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

/// Errors raised while turning a raw sensor record into a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("sensor record is not a JSON object")]
    NotAnObject,

    #[error("sensor record has no timestamp")]
    MissingTimestamp,

    #[error("invalid timestamp '{value}'")]
    InvalidTimestamp { value: String },

    #[error("invalid number for '{key}': {value}")]
    InvalidNumber { key: String, value: String },
}
