//! Core data entities shared across the index, the store, and the policies.

use md5::{Digest, Md5};

/// A request's stored embedding, keyed by the MD5-hex digest of its prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestRecord {
    pub key: String,
    pub vector: Vec<f32>,
}

/// A cached LLM response, linked back to the request that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseRecord {
    pub key: String,
    pub request_key: String,
    pub response: String,
}

/// First-token delay statistics tracked per request key by the prefix
/// policy. See [`crate::policy::prefix`] for the EWMA update rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemStats {
    pub mean: f64,
    pub m2: f64,
    pub observations: u64,
}

impl ItemStats {
    /// Standard deviation derived from the second moment, clamped so floating
    /// point drift never yields a negative variance.
    pub fn std(&self) -> f64 {
        (self.m2 - self.mean * self.mean).max(0.0).sqrt()
    }
}

/// Derive the stable, non-negative 63-bit integer ID used internally by the
/// vector index for a given request key.
///
/// `id = first 8 bytes of MD5(key) & (2^63 - 1)`, matching the scheme the
/// ANN backend this crate was ported from used to hand out integer IDs for
/// string keys.
pub fn index_id_from_key(key: &str) -> i64 {
    let digest = Md5::digest(key.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    let raw = i64::from_be_bytes(bytes);
    raw & i64::MAX
}

/// Derive a cache key (MD5-hex digest) from arbitrary text. Used for both
/// the request key (over the prompt) and the response key (over the
/// response text).
pub fn key_from_text(text: &str) -> String {
    let digest = Md5::digest(text.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
