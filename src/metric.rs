//! Distance and similarity metrics used by the index and the ranking stage.
//!
//! Two closed sets of metrics exist, deliberately kept as distinct types so a
//! caller cannot configure ranking with a similarity (Inner Product is not a
//! distance and is rejected as a ranking metric — see
//! [`crate::config::CacheConfig`]):
//!
//! - [`IndexMetric`]: what the vector index scores candidates by.
//! - [`RankingMetric`]: what the re-ranking step picks the winner by.

use crate::simd;

/// Metric the [`crate::index::RequestIndex`] scores candidates by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexMetric {
    /// Squared Euclidean distance (lower is closer).
    L2,
    /// Raw dot product (higher is closer).
    InnerProduct,
    /// Inner product over L2-normalized vectors (higher is closer).
    Cosine,
}

impl IndexMetric {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::L2 => "l2",
            Self::InnerProduct => "ip",
            Self::Cosine => "cosine",
        }
    }

    /// Whether a larger raw score means a closer match under this metric.
    pub fn higher_is_closer(self) -> bool {
        matches!(self, Self::InnerProduct | Self::Cosine)
    }
}

/// Metric the re-ranking stage orders candidates by. Restricted to
/// distance-valued metrics so `hit_distance_threshold` has an unambiguous
/// "smaller is better" reading (see `SPEC_FULL.md` §9, Open Question c).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingMetric {
    Euclidean,
    Manhattan,
    Cosine,
}

impl RankingMetric {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Euclidean => "euclidean",
            Self::Manhattan => "manhattan",
            Self::Cosine => "cosine",
        }
    }

    /// Distance between two vectors of equal length under this metric.
    ///
    /// Zero-norm conventions for cosine distance: both vectors zero yields
    /// `0.0` (maximally similar, nothing to distinguish them by), exactly one
    /// zero yields `1.0` (maximally distant under the `[0, 1]`-bounded
    /// `1 - cosine_similarity` convention used here, since the zero vector
    /// carries no directional information to compare against).
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Euclidean => euclidean_distance(a, b),
            Self::Manhattan => manhattan_distance(a, b),
            Self::Cosine => cosine_distance(a, b),
        }
    }
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

fn manhattan_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
}

/// `1 - cosine_similarity`, bounded to `[0, 2]` in general and `[0, 1]` for
/// non-negative embeddings.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let na = simd::norm(a);
    let nb = simd::norm(b);
    if na <= 1e-9 && nb <= 1e-9 {
        0.0
    } else if na <= 1e-9 || nb <= 1e-9 {
        1.0
    } else {
        1.0 - simd::cosine(a, b)
    }
}
