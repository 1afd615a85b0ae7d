//! The keyed persistent response store.

pub mod memory;
pub mod sqlite;

use crate::error::CacheResult;
use crate::record::ResponseRecord;

/// A persistent keyed map from response key to response text, linked back
/// to the request key that produced it.
///
/// This crate ships two backends: [`sqlite::SqliteResponseStore`] (the
/// concrete persistence target) and [`memory::MemoryResponseStore`] (for
/// tests and ephemeral, no-persistence cache instances). Both implement
/// this trait so [`crate::cache::SimilarityCache`] never depends on either
/// directly.
pub trait ResponseStore: Send + Sync {
    fn fetch(&self, key: &str) -> CacheResult<Option<ResponseRecord>>;

    /// Returns the first matching record in insertion order. The cache only
    /// ever creates one response per request key, so "first" is also
    /// "only" in practice.
    fn fetch_by_request(&self, request_key: &str) -> CacheResult<Option<ResponseRecord>>;

    /// Upsert: inserts a new record, or replaces the non-key columns of an
    /// existing one with the same key.
    fn save(&mut self, record: ResponseRecord) -> CacheResult<String>;

    fn remove(&mut self, key: &str) -> CacheResult<bool>;

    fn remove_by_request(&mut self, request_key: &str) -> CacheResult<bool>;

    fn exists(&self, key: &str) -> CacheResult<bool>;

    fn size(&self) -> CacheResult<usize>;
}
