//! The ANN vector index over prompt embeddings.

pub mod flat;
pub mod persistence;

use crate::error::CacheResult;
use crate::metric::IndexMetric;

/// A vector returned from the index, always in *original* (pre-cosine-
/// normalization) space.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredVector {
    pub key: String,
    pub vector: Vec<f32>,
}

/// An ANN vector index over prompt embeddings.
///
/// This crate ships one concrete backend ([`flat::FlatRequestIndex`]): a
/// brute-force scan scored under the configured metric, with heap-based
/// top-k selection. `RequestIndex` is a trait so a sub-linear backend can be
/// substituted without changing [`crate::cache::SimilarityCache`].
pub trait RequestIndex: Send + Sync {
    /// The metric this index was opened with.
    fn metric(&self) -> IndexMetric;

    /// The dimension fixed by the first vector ever saved, if any has been.
    fn dim(&self) -> Option<usize>;

    /// Top-k candidates under the index metric, best match first, in
    /// original (un-normalized) vector space. Empty index returns an empty
    /// list; `k == 0` is an error.
    fn fetch_nearest_k(&self, query: &[f32], k: usize) -> CacheResult<Vec<StoredVector>>;

    /// Idempotent insert: if `key` already exists, returns it unchanged.
    /// The first call fixes the index dimension; later calls with a
    /// different length fail with `DimensionMismatch`.
    fn save(&mut self, vector: Vec<f32>, key: &str) -> CacheResult<String>;

    /// Removes `key`; returns whether it was present.
    fn remove(&mut self, key: &str) -> CacheResult<bool>;

    fn size(&self) -> usize;

    /// Persist this index's durable state to `dir` at `path`, if the backend
    /// has one distinct from its in-process representation. The flat
    /// backend shipped in this crate treats its sidecar JSON as its entire
    /// durable state ([`flat::FlatRequestIndex`]'s override); a future
    /// sub-linear backend with its own binary format would write that file
    /// here instead and may still no-op this call if it persists eagerly on
    /// every mutation already.
    fn persist(&self, _dir: &dyn persistence::Directory, _path: &str) -> CacheResult<()> {
        Ok(())
    }
}
