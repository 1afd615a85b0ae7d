//! Semantic caching for LLM applications, end to end.
//!
//! Wires an [`Orchestrator`] in front of a [`SimilarityCache`] and a toy
//! in-process [`Llm`], and runs a handful of queries through it: near-
//! duplicate prompts are served from the cache, unrelated ones fall through
//! to the LLM. Run with `cargo run --example semantic_caching`.

use llm_semantic_cache::cache::SimilarityCache;
use llm_semantic_cache::config::CacheConfig;
use llm_semantic_cache::llm::{Llm, LlmChunk, LlmResponse};
use llm_semantic_cache::metric::{IndexMetric, RankingMetric};
use llm_semantic_cache::orchestrator::Orchestrator;

/// A toy embedder: hashes each byte of the prompt into a fixed-size
/// bag-of-bytes vector, then L2-normalizes it. Good enough to demonstrate
/// near-duplicate prompts landing close together under cosine distance;
/// nowhere near a real sentence embedding model.
fn toy_embed(prompt: &str) -> Vec<f32> {
    const DIM: usize = 64;
    let mut v = vec![0.0f32; DIM];
    for (i, byte) in prompt.as_bytes().iter().enumerate() {
        v[i % DIM] += *byte as f32 / 255.0;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-9 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

/// A toy in-process LLM: echoes the prompt back with a fixed prefix and a
/// simulated latency, so the example runs without any network access.
struct ToyLlm;

impl Llm for ToyLlm {
    fn ask(&self, prompt: &str) -> LlmResponse {
        LlmResponse {
            response: format!("Here is an answer about: {prompt}"),
            latency_ms: 120.0,
        }
    }

    fn stream_ask(&self, prompt: &str) -> Box<dyn Iterator<Item = LlmChunk> + '_> {
        let words: Vec<String> = format!("Here is an answer about: {prompt}")
            .split(' ')
            .map(str::to_string)
            .collect();
        Box::new(words.into_iter().enumerate().map(|(i, word)| LlmChunk {
            response_chunk: word,
            chunk_number: (i + 1) as u64,
            delay_ms_since_start: 40.0 + (i as f64) * 5.0,
        }))
    }
}

fn main() {
    let config = CacheConfig::builder()
        .max_size(100)
        .hit_distance_threshold(0.15)
        .ranking_distance_method(RankingMetric::Cosine)
        .db_distance_method(IndexMetric::Cosine)
        .build()
        .expect("valid configuration");

    let cache = SimilarityCache::lru(config, Box::new(toy_embed));
    let mut orchestrator = Orchestrator::new(Some(cache), Box::new(ToyLlm));

    let queries = [
        "What is machine learning?",
        "What is machine learning?", // exact repeat: cheap hit
        "What is machine learning? ", // near-duplicate: trailing space
        "Tell me a story about dragons", // unrelated: miss
    ];

    for query in queries {
        let answer = orchestrator.ask(query, false).expect("cache/llm call");
        println!("query: {query:?}\nanswer: {answer}\n");
    }
}
