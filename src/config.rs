//! Validated cache configuration.
//!
//! `CacheConfig` is a plain, fully-validated value: every cross-field
//! constraint in `SPEC_FULL.md` §6/§10.3 is checked once, at `build()` time,
//! so a misconfigured cache fails fast with [`CacheError::InvalidConfig`]
//! rather than misbehaving on the first request.

use crate::error::{CacheError, CacheResult};
use crate::metric::{IndexMetric, RankingMetric};

/// Default number of ANN candidates fetched before re-ranking.
pub const DEFAULT_CANDIDATES_NUMBER: usize = 100;

/// Default multiplier of `std` added to `mean` when sizing a stored prefix.
pub const DEFAULT_PREFIX_CONFIDENCE_FACTOR: f64 = 2.0;

/// Fully-validated configuration for a [`crate::cache::SimilarityCache`].
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub max_size: usize,
    pub hit_distance_threshold: f32,
    pub candidates_number: usize,
    pub ranking_distance_method: RankingMetric,
    pub db_distance_method: IndexMetric,
    /// Only meaningful for the Prefix-LRU variant; `None` otherwise.
    pub prefix: Option<PrefixConfig>,
}

/// Prefix-sizing configuration, required only by the streaming (Prefix-LRU)
/// cache variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrefixConfig {
    /// Throughput budget in characters per millisecond. This crate accepts
    /// only this convention (see `SPEC_FULL.md` §9, Open Question b); other
    /// bandwidth units must be converted by the caller before construction.
    pub bandwidth_chars_per_ms: f64,
    /// EWMA smoothing factor, `alpha`, validated to `(0, 1]`.
    pub delay_ewma_smoothing_factor: f64,
    /// Multiplier of `std` added to `mean` when sizing a stored prefix.
    pub prefix_size_confidence_factor: f64,
}

impl CacheConfig {
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }
}

/// Builder for [`CacheConfig`]. Unset numeric fields fall back to the
/// documented defaults; `build()` performs all validation.
pub struct CacheConfigBuilder {
    max_size: usize,
    hit_distance_threshold: f32,
    candidates_number: usize,
    ranking_distance_method: RankingMetric,
    db_distance_method: IndexMetric,
    prefix: Option<PrefixConfigBuilder>,
}

impl Default for CacheConfigBuilder {
    fn default() -> Self {
        Self {
            max_size: 1000,
            hit_distance_threshold: 0.2,
            candidates_number: DEFAULT_CANDIDATES_NUMBER,
            ranking_distance_method: RankingMetric::Cosine,
            db_distance_method: IndexMetric::Cosine,
            prefix: None,
        }
    }
}

struct PrefixConfigBuilder {
    bandwidth_chars_per_ms: f64,
    delay_ewma_smoothing_factor: f64,
    prefix_size_confidence_factor: f64,
}

impl CacheConfigBuilder {
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn hit_distance_threshold(mut self, threshold: f32) -> Self {
        self.hit_distance_threshold = threshold;
        self
    }

    pub fn candidates_number(mut self, candidates_number: usize) -> Self {
        self.candidates_number = candidates_number;
        self
    }

    pub fn ranking_distance_method(mut self, metric: RankingMetric) -> Self {
        self.ranking_distance_method = metric;
        self
    }

    pub fn db_distance_method(mut self, metric: IndexMetric) -> Self {
        self.db_distance_method = metric;
        self
    }

    /// Enable prefix sizing for the streaming cache variant.
    pub fn prefix(
        mut self,
        bandwidth_chars_per_ms: f64,
        delay_ewma_smoothing_factor: f64,
        prefix_size_confidence_factor: f64,
    ) -> Self {
        self.prefix = Some(PrefixConfigBuilder {
            bandwidth_chars_per_ms,
            delay_ewma_smoothing_factor,
            prefix_size_confidence_factor,
        });
        self
    }

    pub fn build(self) -> CacheResult<CacheConfig> {
        if self.max_size == 0 {
            return Err(CacheError::InvalidConfig(
                "max_size must be >= 1".to_string(),
            ));
        }
        if self.candidates_number == 0 {
            return Err(CacheError::InvalidConfig(
                "candidates_number must be >= 1".to_string(),
            ));
        }
        if !self.hit_distance_threshold.is_finite() || self.hit_distance_threshold < 0.0 {
            return Err(CacheError::InvalidConfig(
                "hit_distance_threshold must be a non-negative finite number".to_string(),
            ));
        }

        let prefix = match self.prefix {
            None => None,
            Some(p) => {
                if !(p.delay_ewma_smoothing_factor > 0.0 && p.delay_ewma_smoothing_factor <= 1.0) {
                    return Err(CacheError::InvalidConfig(
                        "delay_ewma_smoothing_factor must be in (0, 1]".to_string(),
                    ));
                }
                if !(p.bandwidth_chars_per_ms > 0.0) {
                    return Err(CacheError::InvalidConfig(
                        "bandwidth_chars_per_ms must be > 0".to_string(),
                    ));
                }
                if !(p.prefix_size_confidence_factor >= 0.0) {
                    return Err(CacheError::InvalidConfig(
                        "prefix_size_confidence_factor must be >= 0".to_string(),
                    ));
                }
                Some(PrefixConfig {
                    bandwidth_chars_per_ms: p.bandwidth_chars_per_ms,
                    delay_ewma_smoothing_factor: p.delay_ewma_smoothing_factor,
                    prefix_size_confidence_factor: p.prefix_size_confidence_factor,
                })
            }
        };

        Ok(CacheConfig {
            max_size: self.max_size,
            hit_distance_threshold: self.hit_distance_threshold,
            candidates_number: self.candidates_number,
            ranking_distance_method: self.ranking_distance_method,
            db_distance_method: self.db_distance_method,
            prefix,
        })
    }
}
