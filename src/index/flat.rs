//! Brute-force flat vector index.
//!
//! Scores every stored vector against the query under the configured
//! metric, O(n*d) per query. Adapted from a brute-force cosine retriever
//! whose own documentation blesses this approach at any scale where
//! "simplicity is preferred over scale" — the right trade-off for a cache
//! whose corpus size is bounded by `max_size`.

use super::{RequestIndex, StoredVector};
use crate::error::{CacheError, CacheResult};
use crate::metric::IndexMetric;
use crate::record::index_id_from_key;
use crate::simd;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

const NORM_EPSILON: f32 = 1e-9;

struct Item {
    id: i64,
    /// Index-space vector: L2-normalized for `Cosine`, identical to the
    /// original vector for `L2`/`InnerProduct`.
    stored: Vec<f32>,
    /// `Some(norm)` for `Cosine`; `None` for the other two metrics, which
    /// never need reconstruction.
    original_norm: Option<f32>,
}

/// Brute-force vector index, generic over [`IndexMetric`].
pub struct FlatRequestIndex {
    metric: IndexMetric,
    dim: Option<usize>,
    items: HashMap<String, Item>,
}

#[derive(PartialEq)]
struct FloatOrd(f32);
impl Eq for FloatOrd {}
impl PartialOrd for FloatOrd {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for FloatOrd {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(std::cmp::Ordering::Equal)
    }
}

impl FlatRequestIndex {
    pub fn new(metric: IndexMetric) -> Self {
        Self {
            metric,
            dim: None,
            items: HashMap::new(),
        }
    }

    fn score(&self, query: &[f32], stored: &[f32]) -> f32 {
        match self.metric {
            IndexMetric::L2 => {
                // Squared Euclidean: smaller is closer, so we negate to keep
                // "higher score = closer" uniform across metrics internally.
                -query
                    .iter()
                    .zip(stored.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f32>()
            }
            IndexMetric::InnerProduct => simd::dot(query, stored),
            IndexMetric::Cosine => simd::dot(query, stored),
        }
    }

    fn normalize_query(&self, query: &[f32]) -> Vec<f32> {
        if self.metric != IndexMetric::Cosine {
            return query.to_vec();
        }
        let n = simd::norm(query);
        if n > NORM_EPSILON {
            query.iter().map(|x| x / n).collect()
        } else {
            query.to_vec()
        }
    }

    fn reconstruct(&self, item: &Item) -> Vec<f32> {
        match item.original_norm {
            Some(norm) if norm > NORM_EPSILON => {
                item.stored.iter().map(|x| x * norm).collect()
            }
            _ => item.stored.clone(),
        }
    }

    /// Load from a sidecar snapshot, used when reopening a persisted index.
    pub fn from_items(metric: IndexMetric, dim: Option<usize>, items: Vec<(String, i64, Vec<f32>, Option<f32>)>) -> Self {
        let mut map = HashMap::with_capacity(items.len());
        for (key, id, stored, original_norm) in items {
            map.insert(
                key,
                Item {
                    id,
                    stored,
                    original_norm,
                },
            );
        }
        Self {
            metric,
            dim,
            items: map,
        }
    }

    /// Export the index-space state for persistence: `(key, id, stored
    /// vector, original_norm)` per item.
    pub fn snapshot(&self) -> Vec<(String, i64, Vec<f32>, Option<f32>)> {
        self.items
            .iter()
            .map(|(key, item)| (key.clone(), item.id, item.stored.clone(), item.original_norm))
            .collect()
    }
}

impl RequestIndex for FlatRequestIndex {
    fn metric(&self) -> IndexMetric {
        self.metric
    }

    fn dim(&self) -> Option<usize> {
        self.dim
    }

    fn fetch_nearest_k(&self, query: &[f32], k: usize) -> CacheResult<Vec<StoredVector>> {
        if k == 0 {
            return Err(CacheError::InvalidConfig(
                "fetch_nearest_k requires k >= 1".to_string(),
            ));
        }
        if self.items.is_empty() {
            return Ok(Vec::new());
        }

        let normalized_query = self.normalize_query(query);

        if k < self.items.len() / 2 {
            let mut heap: BinaryHeap<Reverse<(FloatOrd, i64)>> = BinaryHeap::with_capacity(k + 1);
            let mut by_id: HashMap<i64, &String> = HashMap::with_capacity(self.items.len());

            for (key, item) in &self.items {
                by_id.insert(item.id, key);
                let score = self.score(&normalized_query, &item.stored);
                if heap.len() < k {
                    heap.push(Reverse((FloatOrd(score), item.id)));
                } else if let Some(&Reverse((FloatOrd(min_score), _))) = heap.peek() {
                    if score > min_score {
                        heap.pop();
                        heap.push(Reverse((FloatOrd(score), item.id)));
                    }
                }
            }

            let mut scored: Vec<(f32, i64)> = heap
                .into_iter()
                .map(|Reverse((FloatOrd(score), id))| (score, id))
                .collect();
            scored.sort_unstable_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

            Ok(scored
                .into_iter()
                .map(|(_, id)| {
                    let key = by_id[&id];
                    let item = &self.items[key];
                    StoredVector {
                        key: key.clone(),
                        vector: self.reconstruct(item),
                    }
                })
                .collect())
        } else {
            let mut scored: Vec<(&String, f32)> = self
                .items
                .iter()
                .map(|(key, item)| (key, self.score(&normalized_query, &item.stored)))
                .collect();
            scored.sort_unstable_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

            Ok(scored
                .into_iter()
                .take(k)
                .map(|(key, _)| {
                    let item = &self.items[key];
                    StoredVector {
                        key: key.clone(),
                        vector: self.reconstruct(item),
                    }
                })
                .collect())
        }
    }

    fn save(&mut self, vector: Vec<f32>, key: &str) -> CacheResult<String> {
        if self.items.contains_key(key) {
            return Ok(key.to_string());
        }

        match self.dim {
            None => self.dim = Some(vector.len()),
            Some(expected) if expected != vector.len() => {
                return Err(CacheError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                })
            }
            Some(_) => {}
        }

        let id = index_id_from_key(key);
        let (stored, original_norm) = if self.metric == IndexMetric::Cosine {
            let n = simd::norm(&vector);
            if n > NORM_EPSILON {
                (vector.iter().map(|x| x / n).collect(), Some(n))
            } else {
                (vector.clone(), Some(n))
            }
        } else {
            (vector, None)
        };

        self.items.insert(
            key.to_string(),
            Item {
                id,
                stored,
                original_norm,
            },
        );
        Ok(key.to_string())
    }

    fn remove(&mut self, key: &str) -> CacheResult<bool> {
        Ok(self.items.remove(key).is_some())
    }

    fn size(&self) -> usize {
        self.items.len()
    }

    fn persist(&self, dir: &dyn super::persistence::Directory, path: &str) -> CacheResult<()> {
        super::persistence::save_sidecar(dir, path, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_is_idempotent() {
        let mut idx = FlatRequestIndex::new(IndexMetric::L2);
        idx.save(vec![1.0, 0.0], "k").unwrap();
        idx.save(vec![1.0, 0.0], "k").unwrap();
        assert_eq!(idx.size(), 1);
    }

    #[test]
    fn dimension_mismatch_rejected() {
        let mut idx = FlatRequestIndex::new(IndexMetric::L2);
        idx.save(vec![1.0, 0.0], "a").unwrap();
        let err = idx.save(vec![1.0, 0.0, 0.0], "b").unwrap_err();
        assert!(matches!(err, CacheError::DimensionMismatch { .. }));
    }

    #[test]
    fn empty_index_returns_empty() {
        let idx = FlatRequestIndex::new(IndexMetric::Cosine);
        let results = idx.fetch_nearest_k(&[1.0, 0.0], 5).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn k_zero_is_error() {
        let mut idx = FlatRequestIndex::new(IndexMetric::L2);
        idx.save(vec![1.0, 0.0], "a").unwrap();
        assert!(idx.fetch_nearest_k(&[1.0, 0.0], 0).is_err());
    }

    #[test]
    fn cosine_reconstructs_original_norm() {
        let mut idx = FlatRequestIndex::new(IndexMetric::Cosine);
        let original = vec![3.0, 4.0]; // norm 5
        idx.save(original.clone(), "a").unwrap();
        let results = idx.fetch_nearest_k(&[1.0, 0.0], 1).unwrap();
        let reconstructed_norm = simd::norm(&results[0].vector);
        assert!((reconstructed_norm - 5.0).abs() < 1e-4);
    }

    #[test]
    fn cosine_zero_vector_stored_as_is() {
        let mut idx = FlatRequestIndex::new(IndexMetric::Cosine);
        idx.save(vec![0.0, 0.0], "a").unwrap();
        let results = idx.fetch_nearest_k(&[0.0, 0.0], 1).unwrap();
        assert_eq!(results[0].vector, vec![0.0, 0.0]);
    }

    #[test]
    fn l2_orders_by_distance() {
        let mut idx = FlatRequestIndex::new(IndexMetric::L2);
        idx.save(vec![10.0, 0.0], "far").unwrap();
        idx.save(vec![1.0, 0.0], "near").unwrap();
        let results = idx.fetch_nearest_k(&[0.0, 0.0], 2).unwrap();
        assert_eq!(results[0].key, "near");
    }

    #[test]
    fn remove_true_then_false() {
        let mut idx = FlatRequestIndex::new(IndexMetric::L2);
        idx.save(vec![1.0], "a").unwrap();
        assert!(idx.remove("a").unwrap());
        assert!(!idx.remove("a").unwrap());
        assert_eq!(idx.size(), 0);
    }

    #[test]
    fn candidates_number_one_uses_pure_metric() {
        let mut idx = FlatRequestIndex::new(IndexMetric::InnerProduct);
        idx.save(vec![1.0, 0.0], "a").unwrap();
        idx.save(vec![0.0, 1.0], "b").unwrap();
        let results = idx.fetch_nearest_k(&[1.0, 0.0], 1).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].key, "a");
    }
}
