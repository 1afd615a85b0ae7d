//! Front-end collaborators that sit a cache in front of an [`Llm`].
//!
//! `Orchestrator` drives the non-streaming `ask`; `StreamingOrchestrator`
//! drives `stream_ask`, priming a hit with its stored prefix before handing
//! control to a continuation prompt over the real LLM.

use crate::cache::SimilarityCache;
use crate::error::CacheResult;
use crate::llm::{Llm, LlmChunk};
use crate::policy::{Timing, TimingKind};

/// Renders the continuation prompt an LLM is asked to extend a cached
/// prefix with. Kept as a free function (rather than baked into the
/// orchestrator) so callers can swap the wording without forking the crate.
pub fn render_continuation_prompt(prompt: &str, prefix: &str) -> String {
    format!(
        "Continue this response to the prompt \"{prompt}\" starting exactly \
         from where it leaves off, with no repetition:\n\n{prefix}"
    )
}

/// Non-streaming orchestrator: cache-then-LLM for a single complete answer.
pub struct Orchestrator {
    cache: Option<SimilarityCache>,
    llm: Box<dyn Llm>,
}

impl Orchestrator {
    pub fn new(cache: Option<SimilarityCache>, llm: Box<dyn Llm>) -> Self {
        Self { cache, llm }
    }

    /// Answer `prompt`, consulting the cache unless `force_llm` is set or no
    /// cache was configured.
    pub fn ask(&mut self, prompt: &str, force_llm: bool) -> CacheResult<String> {
        let Some(cache) = self.cache.as_mut() else {
            return Ok(self.llm.ask(prompt).response);
        };
        if force_llm {
            return Ok(self.llm.ask(prompt).response);
        }

        if cache.is_hit(prompt)? {
            return cache.on_hit(prompt);
        }

        let answer = self.llm.ask(prompt);
        let observation = Timing {
            kind: TimingKind::Latency,
            value_ms: answer.latency_ms,
        };
        cache.on_miss(prompt, &answer.response, Some(observation))?;
        Ok(answer.response)
    }
}

/// Streaming orchestrator: yields a lazy sequence of text chunks, priming a
/// hit with its stored prefix before continuing over the real LLM.
pub struct StreamingOrchestrator {
    cache: Option<SimilarityCache>,
    llm: Box<dyn Llm>,
}

impl StreamingOrchestrator {
    pub fn new(cache: Option<SimilarityCache>, llm: Box<dyn Llm>) -> Self {
        Self { cache, llm }
    }

    /// Stream an answer to `prompt`.
    ///
    /// On a hit, the stored prefix is yielded immediately (without updating
    /// any statistics — this is a `retrieve_only` read), then the LLM is
    /// asked to extend it via [`render_continuation_prompt`]. On a miss, the
    /// LLM is streamed directly; the first chunk's delay is recorded and,
    /// once the stream is fully drained, `on_miss` stores the full
    /// response. Any `CacheError` from that final `on_miss` call surfaces as
    /// the stream's last item rather than being swallowed.
    ///
    /// Cancellation is simply dropping the returned iterator mid-stream:
    /// `on_miss` is only reached from the iterator's own exhaustion path,
    /// so a dropped stream never mutates cache state.
    pub fn stream_ask(
        &mut self,
        prompt: &str,
        force_llm: bool,
    ) -> CacheResult<Box<dyn Iterator<Item = CacheResult<LlmChunk>> + '_>> {
        let use_cache = !force_llm && self.cache.is_some();
        if !use_cache {
            return Ok(Box::new(self.llm.stream_ask(prompt).map(Ok)));
        }

        let cache = self.cache.as_mut().expect("use_cache implies cache is Some");
        if cache.is_hit(prompt)? {
            let prefix = cache.on_hit(prompt)?;
            let continuation = render_continuation_prompt(prompt, &prefix);
            let prefix_chunk = std::iter::once(LlmChunk {
                response_chunk: prefix,
                chunk_number: 1,
                delay_ms_since_start: 0.0,
            });
            let continuation_chunks = self
                .llm
                .stream_ask(&continuation)
                .enumerate()
                .map(|(i, mut chunk)| {
                    chunk.chunk_number = (i + 2) as u64;
                    chunk
                });
            return Ok(Box::new(prefix_chunk.chain(continuation_chunks).map(Ok)));
        }

        let inner = self.llm.stream_ask(prompt);
        Ok(Box::new(MissStream {
            inner,
            cache,
            prompt: prompt.to_string(),
            full_response: String::new(),
            first_token_delay: None,
            finalized: false,
        }))
    }
}

/// Drains an LLM stream while accumulating the full response, recording the
/// miss with the cache only once the stream is actually exhausted. Dropping
/// this iterator mid-stream (cancellation) simply never reaches that branch,
/// so cache state is left untouched — no background thread or `Drop` impl
/// needed to get cancellation right.
struct MissStream<'a, I> {
    inner: I,
    cache: &'a mut SimilarityCache,
    prompt: String,
    full_response: String,
    first_token_delay: Option<f64>,
    finalized: bool,
}

impl<'a, I: Iterator<Item = LlmChunk>> Iterator for MissStream<'a, I> {
    type Item = CacheResult<LlmChunk>;

    fn next(&mut self) -> Option<CacheResult<LlmChunk>> {
        match self.inner.next() {
            Some(chunk) => {
                if chunk.chunk_number == 1 {
                    self.first_token_delay = Some(chunk.delay_ms_since_start);
                }
                self.full_response.push_str(&chunk.response_chunk);
                Some(Ok(chunk))
            }
            None => {
                if !self.finalized {
                    self.finalized = true;
                    let observation = self.first_token_delay.map(|ms| Timing {
                        kind: TimingKind::FirstTokenDelay,
                        value_ms: ms,
                    });
                    if let Err(e) = self.cache.on_miss(&self.prompt, &self.full_response, observation) {
                        return Some(Err(e));
                    }
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SimilarityCache;
    use crate::config::CacheConfig;
    use crate::embed::fake::FakeEmbedder;
    use crate::llm::fake::FakeLlm;
    use crate::metric::{IndexMetric, RankingMetric};

    fn built_cache(threshold: f32) -> SimilarityCache {
        let config = CacheConfig::builder()
            .max_size(10)
            .hit_distance_threshold(threshold)
            .ranking_distance_method(RankingMetric::Cosine)
            .db_distance_method(IndexMetric::Cosine)
            .build()
            .unwrap();
        SimilarityCache::lru(config, Box::new(FakeEmbedder::new(2)))
    }

    #[test]
    fn ask_without_cache_always_calls_llm() {
        let llm = FakeLlm::new(10.0, 5.0, 1.0);
        let mut orchestrator = Orchestrator::new(None, Box::new(llm));
        let first = orchestrator.ask("hello", false).unwrap();
        let second = orchestrator.ask("hello", false).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn ask_caches_second_identical_prompt() {
        let cache = built_cache(0.01);
        let llm = FakeLlm::new(10.0, 5.0, 1.0);
        let mut orchestrator = Orchestrator::new(Some(cache), Box::new(llm));

        orchestrator.ask("hello", false).unwrap();
        let answer = orchestrator.ask("hello", false).unwrap();
        assert_eq!(answer, "response-to: hello");
    }

    #[test]
    fn force_llm_bypasses_cache() {
        let cache = built_cache(0.01);
        let llm = std::sync::Arc::new(FakeLlm::new(10.0, 5.0, 1.0));
        let mut orchestrator = Orchestrator::new(Some(cache), Box::new(llm.clone()));

        orchestrator.ask("hello", false).unwrap();
        orchestrator.ask("hello", true).unwrap();

        // Forced call skips the cache read but still goes to the LLM, so two
        // `ask` calls happen (the original miss plus the forced one), yet
        // only the first is ever recorded as a miss.
        assert_eq!(llm.call_count(), 2);
        assert_eq!(orchestrator.cache.as_ref().unwrap().current_size(), 1);
    }

    #[test]
    fn stream_ask_miss_drains_fully_and_stores() {
        let cache = built_cache(0.01);
        let llm = FakeLlm::new(10.0, 5.0, 1.0);
        let mut orchestrator = StreamingOrchestrator::new(Some(cache), Box::new(llm));

        let chunks: Vec<_> = orchestrator
            .stream_ask("hello", false)
            .unwrap()
            .collect::<CacheResult<Vec<_>>>()
            .unwrap();
        assert!(!chunks.is_empty());

        assert!(orchestrator
            .cache
            .as_ref()
            .unwrap()
            .is_hit("hello")
            .unwrap());
    }

    #[test]
    fn stream_ask_dropped_early_never_mutates_cache() {
        let cache = built_cache(0.01);
        let llm = FakeLlm::new(10.0, 5.0, 1.0);
        let mut orchestrator = StreamingOrchestrator::new(Some(cache), Box::new(llm));

        {
            let mut stream = orchestrator.stream_ask("hello", false).unwrap();
            stream.next();
            // dropped here, before exhaustion
        }

        assert_eq!(orchestrator.cache.as_ref().unwrap().current_size(), 0);
    }
}
