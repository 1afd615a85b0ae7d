//! The embedding boundary: anything that maps text to a fixed-dimension
//! vector.
//!
//! This crate never ships a real embedding backend (sentence-transformers,
//! an API call, a local model); `Embedder` is the seam at which one is
//! plugged in. Callers must be deterministic — the cache's correctness
//! depends on the same prompt always embedding to the same vector.

/// Maps text to a fixed-dimension embedding vector.
///
/// Called on every [`crate::cache::SimilarityCache::is_hit`] and every
/// `on_miss`, so implementations should be cheap relative to the LLM call
/// they sit in front of.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Vec<f32>;
}

impl<F> Embedder for F
where
    F: Fn(&str) -> Vec<f32> + Send + Sync,
{
    fn embed(&self, text: &str) -> Vec<f32> {
        self(text)
    }
}

/// Lets an `Arc`-shared embedder be plugged in directly, so tests (and
/// callers) can keep a handle to configure it after it has been boxed into
/// a cache.
impl<T> Embedder for std::sync::Arc<T>
where
    T: Embedder + ?Sized,
{
    fn embed(&self, text: &str) -> Vec<f32> {
        (**self).embed(text)
    }
}
