//! Error types for the similarity cache.

use std::fmt;

/// Errors produced by the cache, its index, its store, and its policies.
#[derive(Debug)]
pub enum CacheError {
    /// A vector's length does not match the dimension fixed by the first
    /// vector ever saved into the index.
    DimensionMismatch { expected: usize, actual: usize },

    /// The metric recorded in a persisted index's sidecar disagrees with the
    /// metric requested when reopening it.
    MetricConflict {
        persisted: &'static str,
        requested: &'static str,
    },

    /// An `on_miss` call omitted the timing observation its policy requires
    /// (`llm_latency`, `llm_delay`, or `llm_response_time`).
    MissingExtra { expected: &'static str },

    /// `RequestIndex` has a key that `ResponseStore` does not: the two
    /// stores have drifted apart.
    MissingResponse { key: String },

    /// A configuration value violates a documented constraint.
    InvalidConfig(String),

    /// The underlying index or store could not complete an I/O operation.
    StoreIo(String),

    /// Persisted JSON could not be parsed, or a value could not be
    /// serialized back to JSON.
    Serde(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DimensionMismatch { expected, actual } => write!(
                f,
                "vector dimension mismatch: expected {}, got {}",
                expected, actual
            ),
            Self::MetricConflict {
                persisted,
                requested,
            } => write!(
                f,
                "index metric conflict: persisted as {}, requested as {}",
                persisted, requested
            ),
            Self::MissingExtra { expected } => {
                write!(f, "on_miss is missing required observation: {}", expected)
            }
            Self::MissingResponse { key } => {
                write!(f, "response store has no record for request key {}", key)
            }
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            Self::StoreIo(msg) => write!(f, "store I/O error: {}", msg),
            Self::Serde(msg) => write!(f, "serialization error: {}", msg),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<std::io::Error> for CacheError {
    fn from(e: std::io::Error) -> Self {
        Self::StoreIo(e.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}

impl From<rusqlite::Error> for CacheError {
    fn from(e: rusqlite::Error) -> Self {
        Self::StoreIo(e.to_string())
    }
}

/// Result type used throughout the crate.
pub type CacheResult<T> = Result<T, CacheError>;
