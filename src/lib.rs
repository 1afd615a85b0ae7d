//! A semantic response cache for LLM queries.
//!
//! A client submits a prompt and gets back a previously computed response
//! for a *semantically similar* prompt when one is close enough, instead of
//! paying for another LLM call. The cache is built from four cooperating
//! parts:
//!
//! - [`index`] — an ANN vector index over prompt embeddings ([`metric`]
//!   covers the distance functions it and the re-ranking stage use).
//! - [`store`] — a persistent keyed map from request key to response text.
//! - [`policy`] — eviction orderings (LRU, LFU, an adaptive scorer, and the
//!   per-key delay statistics backing the streaming prefix variant).
//! - [`cache`] — [`cache::SimilarityCache`], the façade tying the three
//!   together into the hit/miss decision and insertion protocol.
//!
//! [`orchestrator`] sits a [`llm::Llm`] in front of a cache, both
//! non-streaming ([`orchestrator::Orchestrator`]) and streaming
//! ([`orchestrator::StreamingOrchestrator`]).
//!
//! This crate ships one concrete [`index::RequestIndex`] backend (a flat,
//! brute-force vector store, [`index::flat::FlatRequestIndex`]) and two
//! [`store::ResponseStore`] backends (a SQLite table and an in-memory map).
//! The LLM and embedding boundaries ([`llm::Llm`], [`embed::Embedder`]) are
//! traits only — no real network client or embedding model ships here.
//!
//! # Example
//!
//! ```
//! use llm_semantic_cache::cache::SimilarityCache;
//! use llm_semantic_cache::config::CacheConfig;
//! use llm_semantic_cache::metric::{IndexMetric, RankingMetric};
//!
//! let config = CacheConfig::builder()
//!     .max_size(1000)
//!     .hit_distance_threshold(0.2)
//!     .ranking_distance_method(RankingMetric::Cosine)
//!     .db_distance_method(IndexMetric::Cosine)
//!     .build()
//!     .unwrap();
//!
//! let embedder = |text: &str| -> Vec<f32> {
//!     // A real embedder would call out to a model; this one is a stand-in.
//!     vec![text.len() as f32, 0.0]
//! };
//!
//! let mut cache = SimilarityCache::lru(config, Box::new(embedder));
//! assert!(!cache.is_hit("hello").unwrap());
//! cache.on_miss("hello", "hi there", None).unwrap();
//! assert!(cache.is_hit("hello").unwrap());
//! ```

pub mod cache;
pub mod config;
pub mod embed;
pub mod error;
pub mod index;
pub mod llm;
pub mod metric;
pub mod orchestrator;
pub mod policy;
pub mod record;
pub mod simd;
pub mod store;

pub use cache::{CacheVariant, SimilarityCache};
pub use config::CacheConfig;
pub use error::{CacheError, CacheResult};
pub use orchestrator::{Orchestrator, StreamingOrchestrator};
