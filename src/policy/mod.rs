//! Eviction policies: an abstract ordering over cache keys, with a uniform
//! `touch` / `insert` / `overflow` / `contains` contract.
//!
//! Different policies need different observations out of an `on_miss` call
//! (a response time for [`adaptive::AdaptivePipeline`], nothing extra for
//! [`lru::Lru`]/[`lfu::Lfu`]). Rather than a variadic keyword-argument
//! signature, callers pass a single tagged [`MissEvent`]; a policy that needs
//! an observation the event doesn't carry rejects it with
//! [`CacheError::MissingExtra`].

pub mod adaptive;
pub mod lfu;
pub mod lru;
pub mod prefix;

use crate::error::CacheResult;

/// What an `on_miss` call observed about the LLM call that just completed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimingKind {
    /// Total round-trip latency of a non-streaming `ask`.
    Latency,
    /// Time to the first streamed chunk.
    FirstTokenDelay,
    /// Total wall-clock time the LLM spent producing the response
    /// (consumed by [`adaptive::AdaptivePipeline`]).
    ResponseTime,
}

/// A timing observation tagged with the kind of measurement it is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    pub kind: TimingKind,
    pub value_ms: f64,
}

/// Everything an eviction policy's `insert` needs to know about a miss.
#[derive(Debug, Clone, PartialEq)]
pub struct MissEvent {
    pub key: String,
    pub response_len: usize,
    pub observation: Option<Timing>,
}

/// Uniform contract implemented by every eviction policy.
///
/// Invariant: `len() <= max_size` always holds; [`EvictionPolicy::overflow`]
/// reports the victim *after* it has already been removed from the policy's
/// own bookkeeping, exactly once per insert that caused an overflow.
pub trait EvictionPolicy: Send + Sync {
    /// Record an access (hit or insert) for `key`.
    fn touch(&mut self, key: &str);

    /// Record an insert. May cause the policy to exceed `max_size`, in which
    /// case the next call to [`EvictionPolicy::overflow`] returns the
    /// evicted victim.
    fn insert(&mut self, event: &MissEvent) -> CacheResult<()>;

    /// Returns the key evicted by the most recent [`EvictionPolicy::insert`]
    /// call, if any. Returns `None` on every call after the first unless a
    /// new insert causes another overflow.
    fn overflow(&mut self) -> Option<String>;

    fn contains(&self, key: &str) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Closed set of the eviction policies this crate ships, plus a `Custom`
/// variant keeping the trait itself open as an extension point for a
/// policy outside the set.
pub enum EvictionKind {
    Lru(lru::Lru),
    Lfu(lfu::Lfu),
    Adaptive(adaptive::AdaptivePipeline),
    Custom(Box<dyn EvictionPolicy>),
}

impl EvictionPolicy for EvictionKind {
    fn touch(&mut self, key: &str) {
        match self {
            Self::Lru(p) => p.touch(key),
            Self::Lfu(p) => p.touch(key),
            Self::Adaptive(p) => p.touch(key),
            Self::Custom(p) => p.touch(key),
        }
    }

    fn insert(&mut self, event: &MissEvent) -> CacheResult<()> {
        match self {
            Self::Lru(p) => p.insert(event),
            Self::Lfu(p) => p.insert(event),
            Self::Adaptive(p) => p.insert(event),
            Self::Custom(p) => p.insert(event),
        }
    }

    fn overflow(&mut self) -> Option<String> {
        match self {
            Self::Lru(p) => p.overflow(),
            Self::Lfu(p) => p.overflow(),
            Self::Adaptive(p) => p.overflow(),
            Self::Custom(p) => p.overflow(),
        }
    }

    fn contains(&self, key: &str) -> bool {
        match self {
            Self::Lru(p) => p.contains(key),
            Self::Lfu(p) => p.contains(key),
            Self::Adaptive(p) => p.contains(key),
            Self::Custom(p) => p.contains(key),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Lru(p) => p.len(),
            Self::Lfu(p) => p.len(),
            Self::Adaptive(p) => p.len(),
            Self::Custom(p) => p.len(),
        }
    }
}

#[cfg(test)]
pub(crate) fn latency_event(key: &str, response_len: usize, ms: f64) -> MissEvent {
    MissEvent {
        key: key.to_string(),
        response_len,
        observation: Some(Timing {
            kind: TimingKind::Latency,
            value_ms: ms,
        }),
    }
}

#[cfg(test)]
pub(crate) fn bare_event(key: &str, response_len: usize) -> MissEvent {
    MissEvent {
        key: key.to_string(),
        response_len,
        observation: None,
    }
}
