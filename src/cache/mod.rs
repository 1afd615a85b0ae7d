//! `SimilarityCache`: the public façade over the embedding index, the
//! response store, and the eviction policy.

use crate::config::CacheConfig;
use crate::embed::Embedder;
use crate::error::{CacheError, CacheResult};
use crate::index::flat::FlatRequestIndex;
use crate::index::persistence::{self, Directory, FsDirectory};
use crate::index::RequestIndex;
use crate::metric::IndexMetric;
use crate::policy::adaptive::AdaptivePipeline;
use crate::policy::lfu::Lfu;
use crate::policy::lru::Lru;
use crate::policy::prefix::PrefixPolicy;
use crate::policy::{EvictionKind, EvictionPolicy, MissEvent, Timing, TimingKind};
use crate::record::{index_id_from_key, key_from_text, ResponseRecord};
use crate::store::memory::MemoryResponseStore;
use crate::store::sqlite::SqliteResponseStore;
use crate::store::ResponseStore;
use std::path::Path;

/// Sidecar filename under a cache's persistence directory, matching the
/// layout documented in `SPEC_FULL.md` §6.
const SIDECAR_FILENAME: &str = "requests.meta.json";
/// SQLite response store filename under a cache's persistence directory.
const RESPONSES_FILENAME: &str = "responses.db";

/// Which of the four named cache variants an instance was built as. Carried
/// only for logging; behavior is fully determined by `policy`/`prefix`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheVariant {
    Lru,
    Lfu,
    AdaptivePipeline,
    PrefixLru,
}

impl CacheVariant {
    fn as_str(self) -> &'static str {
        match self {
            Self::Lru => "lru",
            Self::Lfu => "lfu",
            Self::AdaptivePipeline => "adaptive_pipeline",
            Self::PrefixLru => "prefix_lru",
        }
    }
}

/// Policy-parametric semantic cache: owns an embedding index, a response
/// store, and an eviction policy, and implements the hit/miss decision and
/// insertion protocol.
pub struct SimilarityCache {
    variant: CacheVariant,
    config: CacheConfig,
    embedder: Box<dyn Embedder>,
    index: Box<dyn RequestIndex>,
    store: Box<dyn ResponseStore>,
    policy: EvictionKind,
    prefix: Option<PrefixPolicy>,
    /// `Some` for a cache opened against a directory via [`Self::open_lru`]
    /// and friends; the index's sidecar is rewritten through it after every
    /// mutation. `None` for the ephemeral, in-memory constructors.
    persistence: Option<Box<dyn Directory>>,
}

impl SimilarityCache {
    /// Construct a cache from explicit collaborators. Most callers should
    /// prefer the named constructors ([`Self::lru`], [`Self::lfu`],
    /// [`Self::adaptive_pipeline`], [`Self::prefix_lru`]) instead.
    pub fn new(
        variant: CacheVariant,
        config: CacheConfig,
        embedder: Box<dyn Embedder>,
        index: Box<dyn RequestIndex>,
        store: Box<dyn ResponseStore>,
        policy: EvictionKind,
        prefix: Option<PrefixPolicy>,
    ) -> Self {
        Self {
            variant,
            config,
            embedder,
            index,
            store,
            policy,
            prefix,
            persistence: None,
        }
    }

    /// An ephemeral (in-memory, no persistence) LRU cache.
    pub fn lru(config: CacheConfig, embedder: Box<dyn Embedder>) -> Self {
        let policy = EvictionKind::Lru(Lru::new(config.max_size));
        Self::ephemeral(CacheVariant::Lru, config, embedder, policy, None)
    }

    /// An ephemeral LFU cache.
    pub fn lfu(config: CacheConfig, embedder: Box<dyn Embedder>) -> Self {
        let policy = EvictionKind::Lfu(Lfu::new(config.max_size));
        Self::ephemeral(CacheVariant::Lfu, config, embedder, policy, None)
    }

    /// An ephemeral AdaptivePipeline cache, using the default scorer.
    pub fn adaptive_pipeline(config: CacheConfig, embedder: Box<dyn Embedder>) -> Self {
        let policy = EvictionKind::Adaptive(AdaptivePipeline::new(config.max_size));
        Self::ephemeral(CacheVariant::AdaptivePipeline, config, embedder, policy, None)
    }

    /// An ephemeral streaming Prefix-LRU cache. `config.prefix` must be set.
    pub fn prefix_lru(config: CacheConfig, embedder: Box<dyn Embedder>) -> CacheResult<Self> {
        let prefix_config = config.prefix.ok_or_else(|| {
            CacheError::InvalidConfig("prefix_lru requires CacheConfig::prefix".to_string())
        })?;
        let policy = EvictionKind::Lru(Lru::new(config.max_size));
        let prefix = Some(PrefixPolicy::new(prefix_config));
        Ok(Self::ephemeral(CacheVariant::PrefixLru, config, embedder, policy, prefix))
    }

    fn ephemeral(
        variant: CacheVariant,
        config: CacheConfig,
        embedder: Box<dyn Embedder>,
        policy: EvictionKind,
        prefix: Option<PrefixPolicy>,
    ) -> Self {
        let index = Box::new(FlatRequestIndex::new(config.db_distance_method));
        let store = Box::new(MemoryResponseStore::new());
        Self::new(variant, config, embedder, index, store, policy, prefix)
    }

    /// A persistent LRU cache backed by `dir` (sidecar JSON + SQLite
    /// response table, per `SPEC_FULL.md` §6). Reopens whatever state is
    /// already there if `dir` holds a prior sidecar and responses database;
    /// creates both fresh otherwise.
    pub fn open_lru(
        config: CacheConfig,
        embedder: Box<dyn Embedder>,
        dir: impl AsRef<Path>,
    ) -> CacheResult<Self> {
        let policy = EvictionKind::Lru(Lru::new(config.max_size));
        Self::open_with_policy(CacheVariant::Lru, config, embedder, dir, policy, None)
    }

    /// A persistent LFU cache backed by `dir`.
    pub fn open_lfu(
        config: CacheConfig,
        embedder: Box<dyn Embedder>,
        dir: impl AsRef<Path>,
    ) -> CacheResult<Self> {
        let policy = EvictionKind::Lfu(Lfu::new(config.max_size));
        Self::open_with_policy(CacheVariant::Lfu, config, embedder, dir, policy, None)
    }

    /// A persistent AdaptivePipeline cache backed by `dir`, using the
    /// default scorer.
    pub fn open_adaptive_pipeline(
        config: CacheConfig,
        embedder: Box<dyn Embedder>,
        dir: impl AsRef<Path>,
    ) -> CacheResult<Self> {
        let policy = EvictionKind::Adaptive(AdaptivePipeline::new(config.max_size));
        Self::open_with_policy(
            CacheVariant::AdaptivePipeline,
            config,
            embedder,
            dir,
            policy,
            None,
        )
    }

    /// A persistent streaming Prefix-LRU cache backed by `dir`.
    /// `config.prefix` must be set.
    pub fn open_prefix_lru(
        config: CacheConfig,
        embedder: Box<dyn Embedder>,
        dir: impl AsRef<Path>,
    ) -> CacheResult<Self> {
        let prefix_config = config.prefix.ok_or_else(|| {
            CacheError::InvalidConfig("prefix_lru requires CacheConfig::prefix".to_string())
        })?;
        let policy = EvictionKind::Lru(Lru::new(config.max_size));
        let prefix = Some(PrefixPolicy::new(prefix_config));
        Self::open_with_policy(CacheVariant::PrefixLru, config, embedder, dir, policy, prefix)
    }

    fn open_with_policy(
        variant: CacheVariant,
        config: CacheConfig,
        embedder: Box<dyn Embedder>,
        dir: impl AsRef<Path>,
        policy: EvictionKind,
        prefix: Option<PrefixPolicy>,
    ) -> CacheResult<Self> {
        let directory = FsDirectory::new(dir.as_ref())?;

        let index: Box<dyn RequestIndex> =
            match persistence::load_sidecar(&directory, SIDECAR_FILENAME, config.db_distance_method)? {
                Some(loaded) => Box::new(loaded),
                None => Box::new(FlatRequestIndex::new(config.db_distance_method)),
            };

        let responses_path = dir.as_ref().join(RESPONSES_FILENAME);
        let responses_path = responses_path.to_str().ok_or_else(|| {
            CacheError::StoreIo("response store path is not valid UTF-8".to_string())
        })?;
        let store: Box<dyn ResponseStore> = Box::new(SqliteResponseStore::open(responses_path)?);

        let mut cache = Self::new(variant, config, embedder, index, store, policy, prefix);
        cache.persistence = Some(Box::new(directory));
        Ok(cache)
    }

    /// Rewrite the index sidecar through `self.persistence`, if this cache
    /// was opened against a directory. A no-op for ephemeral caches.
    fn persist_index(&self) -> CacheResult<()> {
        match &self.persistence {
            Some(dir) => {
                if let Err(e) = self.index.persist(dir.as_ref(), SIDECAR_FILENAME) {
                    tracing::warn!(error = %e, "failed to persist request index sidecar");
                    return Err(e);
                }
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub fn variant(&self) -> CacheVariant {
        self.variant
    }

    /// Number of stored responses. Invariant: always equal to the index
    /// size, always `<= max_size`.
    pub fn current_size(&self) -> usize {
        self.index.size()
    }

    /// Embed `prompt`, fetch ANN candidates, and re-rank them, returning the
    /// winning key and its ranking distance. `None` if the index is empty.
    fn best_candidate(&self, prompt: &str) -> CacheResult<Option<(String, f32)>> {
        let query = self.embedder.embed(prompt);
        let candidates = self
            .index
            .fetch_nearest_k(&query, self.config.candidates_number)?;

        let mut best: Option<(String, f32, i64)> = None;
        for candidate in candidates {
            let distance = self
                .config
                .ranking_distance_method
                .distance(&query, &candidate.vector);
            let id = index_id_from_key(&candidate.key);
            let better = match &best {
                None => true,
                Some((_, best_distance, best_id)) => {
                    distance < *best_distance || (distance == *best_distance && id < *best_id)
                }
            };
            if better {
                best = Some((candidate.key, distance, id));
            }
        }

        Ok(best.map(|(key, distance, _)| (key, distance)))
    }

    /// True iff the nearest re-ranked candidate is within
    /// `hit_distance_threshold`.
    pub fn is_hit(&self, prompt: &str) -> CacheResult<bool> {
        Ok(self
            .best_candidate(prompt)?
            .map(|(_, distance)| distance <= self.config.hit_distance_threshold)
            .unwrap_or(false))
    }

    /// Return the cached response for the nearest stored prompt, recording
    /// an access with the eviction policy.
    ///
    /// Callers are expected to have already checked [`Self::is_hit`]; this
    /// does not re-check the threshold, only that a candidate and its
    /// linked response both exist.
    pub fn on_hit(&mut self, prompt: &str) -> CacheResult<String> {
        let (key, _distance) = self
            .best_candidate(prompt)?
            .ok_or_else(|| CacheError::MissingResponse {
                key: "<no candidate in empty index>".to_string(),
            })?;

        self.policy.touch(&key);
        let record = self
            .store
            .fetch_by_request(&key)?
            .ok_or_else(|| CacheError::MissingResponse { key: key.clone() })?;

        tracing::debug!(cache = self.variant.as_str(), key = %key, "cache hit");
        Ok(record.response)
    }

    /// Insert a new (prompt, response) pair, propagating any resulting
    /// eviction to both the index and the store.
    ///
    /// `observation` must match the timing kind the configured policy (or,
    /// for the streaming variant, the prefix policy) requires; a mismatch
    /// or missing observation fails with [`CacheError::MissingExtra`]
    /// *before* any state is mutated.
    pub fn on_miss(
        &mut self,
        prompt: &str,
        response: &str,
        observation: Option<Timing>,
    ) -> CacheResult<()> {
        if self.prefix.is_some() {
            match observation {
                Some(t) if t.kind == TimingKind::FirstTokenDelay => {}
                _ => {
                    return Err(CacheError::MissingExtra {
                        expected: "llm_delay",
                    })
                }
            }
        }

        let key = key_from_text(prompt);
        let vector = self.embedder.embed(prompt);
        let event = MissEvent {
            key: key.clone(),
            response_len: response.chars().count(),
            observation,
        };
        self.policy.insert(&event)?;

        if let Some(evicted) = self.policy.overflow() {
            self.index.remove(&evicted)?;
            self.store.remove_by_request(&evicted)?;
            if let Some(prefix) = &mut self.prefix {
                prefix.remove(&evicted);
            }
            tracing::debug!(cache = self.variant.as_str(), victim = %evicted, "evicted cache entry");
        }

        self.index.save(vector, &key)?;
        self.persist_index()?;

        let stored_response = match &mut self.prefix {
            Some(prefix) => {
                // Validated above: observation is Some(FirstTokenDelay).
                let delay_ms = observation.expect("checked above").value_ms;
                let stats = prefix.observe(&key, delay_ms);
                let chars = prefix.prefix_chars(&stats, response);
                response[..chars].to_string()
            }
            None => response.to_string(),
        };

        // Keyed off the full LLM response, not the truncated stored value,
        // matching the prefix variant's own key derivation.
        let response_key = key_from_text(response);
        self.store.save(ResponseRecord {
            key: response_key,
            request_key: key.clone(),
            response: stored_response,
        })?;

        tracing::debug!(cache = self.variant.as_str(), key = %key, "cache miss stored");
        Ok(())
    }

    pub fn index_metric(&self) -> IndexMetric {
        self.config.db_distance_method
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::embed::fake::FakeEmbedder;
    use crate::metric::{IndexMetric, RankingMetric};

    fn cache(max_size: usize, threshold: f32) -> (SimilarityCache, std::sync::Arc<FakeEmbedder>) {
        let embedder = std::sync::Arc::new(FakeEmbedder::new(2));
        let config = CacheConfig::builder()
            .max_size(max_size)
            .hit_distance_threshold(threshold)
            .ranking_distance_method(RankingMetric::Cosine)
            .db_distance_method(IndexMetric::Cosine)
            .build()
            .unwrap();
        let cache = SimilarityCache::lru(config, Box::new(embedder.clone()));
        (cache, embedder)
    }

    #[test]
    fn trivial_miss_then_hit() {
        let (mut cache, embedder) = cache(10, 0.2);
        embedder.set("A", vec![1.0, 0.0]);

        assert!(!cache.is_hit("A").unwrap());
        cache.on_miss("A", "r1", None).unwrap();

        assert!(cache.is_hit("A").unwrap());
        assert_eq!(cache.on_hit("A").unwrap(), "r1");
    }

    #[test]
    fn unrelated_prompt_is_a_miss() {
        let (mut cache, embedder) = cache(10, 0.2);
        embedder.set("A", vec![1.0, 0.0]);
        embedder.set("Hi", vec![0.0, 1.0]);
        cache.on_miss("A", "r1", None).unwrap();

        assert!(!cache.is_hit("Hi").unwrap());
    }

    #[test]
    fn empty_index_is_never_a_hit() {
        let (cache, _embedder) = cache(10, 0.2);
        assert!(!cache.is_hit("anything").unwrap());
    }

    #[test]
    fn eviction_removes_from_both_index_and_store() {
        let (mut cache, embedder) = cache(2, 0.05);
        embedder.set("k1", vec![1.0, 0.0]);
        embedder.set("k2", vec![0.0, 1.0]);
        embedder.set("k3", vec![-1.0, 0.0]);

        cache.on_miss("k1", "r1", None).unwrap();
        cache.on_miss("k2", "r2", None).unwrap();
        cache.on_miss("k3", "r3", None).unwrap();

        assert_eq!(cache.current_size(), 2);
        assert!(!cache.is_hit("k1").unwrap());
        assert!(cache.is_hit("k2").unwrap());
        assert!(cache.is_hit("k3").unwrap());
    }

    #[test]
    fn adaptive_pipeline_without_response_time_is_rejected() {
        let embedder = FakeEmbedder::new(2);
        let config = CacheConfig::builder().max_size(2).build().unwrap();
        let mut cache = SimilarityCache::adaptive_pipeline(config, Box::new(embedder));

        let err = cache.on_miss("A", "r1", None).unwrap_err();
        assert!(matches!(err, CacheError::MissingExtra { .. }));
        assert_eq!(cache.current_size(), 0);
    }

    #[test]
    fn prefix_cache_without_llm_delay_is_rejected_and_unmutated() {
        let embedder = FakeEmbedder::new(2);
        let config = CacheConfig::builder()
            .max_size(2)
            .prefix(1.0, 0.5, 2.0)
            .build()
            .unwrap();
        let mut cache = SimilarityCache::prefix_lru(config, Box::new(embedder)).unwrap();

        let err = cache.on_miss("A", "response text", None).unwrap_err();
        assert!(matches!(err, CacheError::MissingExtra { .. }));
        assert_eq!(cache.current_size(), 0);
    }

    #[test]
    fn prefix_cache_stores_only_the_sized_prefix() {
        let embedder = FakeEmbedder::new(2);
        let config = CacheConfig::builder()
            .max_size(2)
            .hit_distance_threshold(2.0)
            .prefix(1.0, 0.5, 2.0)
            .build()
            .unwrap();
        let mut cache = SimilarityCache::prefix_lru(config, Box::new(embedder)).unwrap();

        let observation = Some(Timing {
            kind: TimingKind::FirstTokenDelay,
            value_ms: 100.0,
        });
        let response = "x".repeat(200);
        cache.on_miss("A", &response, observation).unwrap();

        let stored = cache.on_hit("A").unwrap();
        // bandwidth=1.0, mean=100, std=0 on first observation => 100 chars.
        assert_eq!(stored.len(), 100);
    }

    #[test]
    fn persisted_cache_answers_identically_after_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let embedder = std::sync::Arc::new(FakeEmbedder::new(2));
        embedder.set("A", vec![1.0, 0.0]);
        let config = || {
            CacheConfig::builder()
                .max_size(10)
                .hit_distance_threshold(0.01)
                .ranking_distance_method(RankingMetric::Cosine)
                .db_distance_method(IndexMetric::Cosine)
                .build()
                .unwrap()
        };

        {
            let mut cache =
                SimilarityCache::open_lru(config(), Box::new(embedder.clone()), tmp.path()).unwrap();
            assert!(!cache.is_hit("A").unwrap());
            cache.on_miss("A", "r1", None).unwrap();
            assert!(cache.is_hit("A").unwrap());
        }

        let reopened =
            SimilarityCache::open_lru(config(), Box::new(embedder.clone()), tmp.path()).unwrap();
        assert!(reopened.is_hit("A").unwrap());
        assert_eq!(reopened.current_size(), 1);
    }

    #[test]
    fn reopened_cache_rejects_conflicting_metric() {
        let tmp = tempfile::tempdir().unwrap();
        let embedder = FakeEmbedder::new(2);
        let l2_config = CacheConfig::builder()
            .max_size(10)
            .db_distance_method(IndexMetric::L2)
            .build()
            .unwrap();
        {
            let mut cache =
                SimilarityCache::open_lru(l2_config, Box::new(embedder), tmp.path()).unwrap();
            cache.on_miss("A", "r1", None).unwrap();
        }

        let embedder = FakeEmbedder::new(2);
        let cosine_config = CacheConfig::builder()
            .max_size(10)
            .db_distance_method(IndexMetric::Cosine)
            .build()
            .unwrap();
        let err = SimilarityCache::open_lru(cosine_config, Box::new(embedder), tmp.path())
            .unwrap_err();
        assert!(matches!(err, CacheError::MetricConflict { .. }));
    }
}
