//! The LLM boundary: anything that turns a prompt into text, synchronously
//! or as a stream of chunks.
//!
//! Modeled on the `ask` / `stream_ask` split of the collaborator this cache
//! sits in front of. No real network client ships with this crate; `Llm` is
//! the seam a caller plugs one into.

/// A complete (non-streaming) LLM answer.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmResponse {
    pub response: String,
    pub latency_ms: f64,
}

/// One chunk of a streamed LLM answer. `chunk_number == 1` marks the first
/// token, the one the prefix policy times.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmChunk {
    pub response_chunk: String,
    pub chunk_number: u64,
    pub delay_ms_since_start: f64,
}

/// An LLM collaborator: produces text, synchronously or as a lazily-pulled
/// stream of chunks.
///
/// `stream_ask` returns a boxed iterator rather than an `impl Iterator`
/// because the trait is used as a trait object (`Box<dyn Llm>`) by the
/// orchestrators; callers drive it by iterating, and cancellation is simply
/// dropping the iterator before it is exhausted.
pub trait Llm: Send + Sync {
    fn ask(&self, prompt: &str) -> LlmResponse;

    fn stream_ask(&self, prompt: &str) -> Box<dyn Iterator<Item = LlmChunk> + '_>;
}

/// Lets an `Arc`-shared LLM be plugged in directly, so tests (and callers)
/// can keep a handle to inspect it after it has been boxed into an
/// orchestrator.
impl<T> Llm for std::sync::Arc<T>
where
    T: Llm + ?Sized,
{
    fn ask(&self, prompt: &str) -> LlmResponse {
        (**self).ask(prompt)
    }

    fn stream_ask(&self, prompt: &str) -> Box<dyn Iterator<Item = LlmChunk> + '_> {
        (**self).stream_ask(prompt)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::{Llm, LlmChunk, LlmResponse};
    use std::sync::atomic::{AtomicU64, Ordering};

    /// A deterministic, in-process LLM: echoes the prompt with a fixed
    /// prefix and reports caller-configured timings. Used across
    /// orchestrator and policy tests; never touches the network.
    pub struct FakeLlm {
        pub latency_ms: f64,
        pub first_token_delay_ms: f64,
        pub chunk_delay_ms: f64,
        calls: AtomicU64,
    }

    impl FakeLlm {
        pub fn new(latency_ms: f64, first_token_delay_ms: f64, chunk_delay_ms: f64) -> Self {
            Self {
                latency_ms,
                first_token_delay_ms,
                chunk_delay_ms,
                calls: AtomicU64::new(0),
            }
        }

        pub fn call_count(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }

        fn respond_to(&self, prompt: &str) -> String {
            format!("response-to: {prompt}")
        }
    }

    impl Llm for FakeLlm {
        fn ask(&self, prompt: &str) -> LlmResponse {
            self.calls.fetch_add(1, Ordering::SeqCst);
            LlmResponse {
                response: self.respond_to(prompt),
                latency_ms: self.latency_ms,
            }
        }

        fn stream_ask(&self, prompt: &str) -> Box<dyn Iterator<Item = LlmChunk> + '_> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let text = self.respond_to(prompt);
            let words: Vec<String> = text.split(' ').map(str::to_string).collect();
            let first_delay = self.first_token_delay_ms;
            let chunk_delay = self.chunk_delay_ms;
            Box::new(words.into_iter().enumerate().map(move |(i, word)| LlmChunk {
                response_chunk: word,
                chunk_number: (i + 1) as u64,
                delay_ms_since_start: first_delay + (i as f64) * chunk_delay,
            }))
        }
    }
}
