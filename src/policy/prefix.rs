//! Per-key first-token delay statistics for the streaming (Prefix-LRU)
//! cache variant, and the prefix-length sizing derived from them.
//!
//! This is not an [`super::EvictionPolicy`] itself — the streaming variant
//! pairs [`super::lru::Lru`] for eviction with a `PrefixPolicy` tracked
//! alongside it for prefix sizing.

use crate::config::PrefixConfig;
use crate::record::ItemStats;
use std::collections::HashMap;

/// Tracks an EWMA of first-token delay per key, and sizes stored response
/// prefixes from it.
pub struct PrefixPolicy {
    config: PrefixConfig,
    stats: HashMap<String, ItemStats>,
}

impl PrefixPolicy {
    pub fn new(config: PrefixConfig) -> Self {
        Self {
            config,
            stats: HashMap::new(),
        }
    }

    /// Record a first-token delay observation for `key`, updating its EWMA
    /// in place, and return the resulting statistics.
    ///
    /// ```text
    /// mean <- (1 - a) * mean_prev + a * delay
    /// m2   <- (1 - a) * m2_prev   + a * delay^2
    /// ```
    /// On the first observation, `mean = delay`, `m2 = delay^2`.
    pub fn observe(&mut self, key: &str, delay_ms: f64) -> ItemStats {
        let alpha = self.config.delay_ewma_smoothing_factor;
        let updated = match self.stats.get(key) {
            None => ItemStats {
                mean: delay_ms,
                m2: delay_ms * delay_ms,
                observations: 1,
            },
            Some(prev) => ItemStats {
                mean: (1.0 - alpha) * prev.mean + alpha * delay_ms,
                m2: (1.0 - alpha) * prev.m2 + alpha * delay_ms * delay_ms,
                observations: prev.observations + 1,
            },
        };
        self.stats.insert(key.to_string(), updated);
        updated
    }

    pub fn stats_for(&self, key: &str) -> Option<ItemStats> {
        self.stats.get(key).copied()
    }

    /// Drop a key's statistics, called when its request record is evicted.
    pub fn remove(&mut self, key: &str) {
        self.stats.remove(key);
    }

    /// `prefix_chars ~= bandwidth * (mean + confidence_factor * std)`,
    /// clamped to `response.len()` and truncated at the nearest character
    /// boundary.
    pub fn prefix_chars(&self, stats: &ItemStats, response: &str) -> usize {
        let budget = self.config.bandwidth_chars_per_ms
            * (stats.mean + self.config.prefix_size_confidence_factor * stats.std());
        let budget_chars = budget.max(0.0).floor() as usize;
        response
            .char_indices()
            .nth(budget_chars)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(response.len())
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::config::PrefixConfig;
    use proptest::prelude::*;

    fn cfg(alpha: f64) -> PrefixConfig {
        PrefixConfig {
            bandwidth_chars_per_ms: 1.0,
            delay_ewma_smoothing_factor: alpha,
            prefix_size_confidence_factor: 2.0,
        }
    }

    proptest! {
        /// The EWMA recurrence holds exactly for an arbitrary observation
        /// sequence: each step's `mean`/`m2` are the documented blend of the
        /// previous statistics and the new delay, and `std` never goes
        /// imaginary (the `m2 - mean^2` clamp in `ItemStats::std` holds).
        #[test]
        fn ewma_recurrence_holds_for_any_sequence(
            alpha in 0.01f64..1.0,
            delays in proptest::collection::vec(0.0f64..10_000.0, 1..30),
        ) {
            let mut policy = PrefixPolicy::new(cfg(alpha));
            let mut expected_mean = None;
            let mut expected_m2 = None;

            for (i, delay) in delays.iter().enumerate() {
                let stats = policy.observe("k", *delay);

                let (want_mean, want_m2) = match (expected_mean, expected_m2) {
                    (None, None) => (*delay, delay * delay),
                    (Some(prev_mean), Some(prev_m2)) => (
                        (1.0 - alpha) * prev_mean + alpha * delay,
                        (1.0 - alpha) * prev_m2 + alpha * delay * delay,
                    ),
                    _ => unreachable!(),
                };

                prop_assert!((stats.mean - want_mean).abs() < 1e-6);
                prop_assert!((stats.m2 - want_m2).abs() < 1e-3);
                prop_assert_eq!(stats.observations, (i + 1) as u64);
                prop_assert!(stats.std().is_finite());
                prop_assert!(stats.std() >= 0.0);

                expected_mean = Some(want_mean);
                expected_m2 = Some(want_m2);
            }
        }

        /// `prefix_chars` is always within `[0, response.chars().count()]`.
        #[test]
        fn prefix_chars_always_in_bounds(
            alpha in 0.01f64..1.0,
            delay in 0.0f64..5_000.0,
            response_len in 0usize..500,
        ) {
            let mut policy = PrefixPolicy::new(cfg(alpha));
            let stats = policy.observe("k", delay);
            let response = "x".repeat(response_len);
            let chars = policy.prefix_chars(&stats, &response);
            prop_assert!(chars <= response.len());
        }
    }
}
