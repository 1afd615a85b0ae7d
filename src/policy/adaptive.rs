//! Adaptive-pipeline eviction: victims are chosen by a pluggable score that
//! must be monotonic in both LLM response time and response length (longer,
//! slower-to-produce responses are worth more to keep cached).

use super::{EvictionPolicy, MissEvent, TimingKind};
use crate::error::{CacheError, CacheResult};
use std::collections::HashMap;

/// Computes the "worth keeping" score for a cached response from the timing
/// and length observed when it was produced. Higher is more valuable; the
/// policy evicts the *smallest*-scoring key.
///
/// `SPEC_FULL.md` §9 leaves the exact function open; the only hard
/// requirement is monotonicity in both inputs.
pub trait AdaptiveScorer: Send + Sync {
    fn score(&self, response_time_ms: f64, response_len: usize) -> f64;
}

/// `score = response_time_ms * response_len`: monotonic increasing in both
/// the time spent producing the response and its length, so a response that
/// was expensive to generate and is large to recompute is the last to go.
pub struct DefaultScorer;

impl AdaptiveScorer for DefaultScorer {
    fn score(&self, response_time_ms: f64, response_len: usize) -> f64 {
        response_time_ms * response_len as f64
    }
}

struct Entry {
    score: f64,
}

pub struct AdaptivePipeline {
    max_size: usize,
    scorer: Box<dyn AdaptiveScorer>,
    entries: HashMap<String, Entry>,
    evicted: Option<String>,
}

impl AdaptivePipeline {
    pub fn new(max_size: usize) -> Self {
        Self::with_scorer(max_size, Box::new(DefaultScorer))
    }

    pub fn with_scorer(max_size: usize, scorer: Box<dyn AdaptiveScorer>) -> Self {
        Self {
            max_size,
            scorer,
            entries: HashMap::new(),
            evicted: None,
        }
    }

    fn victim(&self) -> Option<String> {
        self.entries
            .iter()
            .min_by(|(_, a), (_, b)| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(k, _)| k.clone())
    }
}

impl EvictionPolicy for AdaptivePipeline {
    fn touch(&mut self, _key: &str) {
        // Recency does not factor into the adaptive score; access alone
        // does not change how expensive a response was to produce.
    }

    fn insert(&mut self, event: &MissEvent) -> CacheResult<()> {
        let observation = event.observation.ok_or(CacheError::MissingExtra {
            expected: "llm_response_time",
        })?;
        if observation.kind != TimingKind::ResponseTime {
            return Err(CacheError::MissingExtra {
                expected: "llm_response_time",
            });
        }

        let score = self.scorer.score(observation.value_ms, event.response_len);
        self.entries
            .insert(event.key.clone(), Entry { score });

        if self.entries.len() > self.max_size {
            if let Some(victim) = self.victim() {
                self.entries.remove(&victim);
                self.evicted = Some(victim);
            }
        }
        Ok(())
    }

    fn overflow(&mut self) -> Option<String> {
        self.evicted.take()
    }

    fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
