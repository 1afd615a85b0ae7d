//! Least-recently-used eviction, ordered by recency of insertion or access.

use super::{EvictionPolicy, MissEvent};
use crate::error::CacheResult;
use std::collections::HashSet;
use std::collections::VecDeque;

/// LRU ordering: `touch` moves a key to the most-recently-used end; on
/// overflow the least-recently-used key (the front of the queue) is evicted.
pub struct Lru {
    max_size: usize,
    order: VecDeque<String>,
    present: HashSet<String>,
    evicted: Option<String>,
}

impl Lru {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            order: VecDeque::new(),
            present: HashSet::new(),
            evicted: None,
        }
    }

    fn bump(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key.to_string());
    }
}

impl EvictionPolicy for Lru {
    fn touch(&mut self, key: &str) {
        if self.present.contains(key) {
            self.bump(key);
        }
    }

    fn insert(&mut self, event: &MissEvent) -> CacheResult<()> {
        if !self.present.contains(&event.key) {
            self.present.insert(event.key.clone());
        }
        self.bump(&event.key);

        if self.order.len() > self.max_size {
            let victim = self.order.pop_front().expect("order non-empty after overflow");
            self.present.remove(&victim);
            self.evicted = Some(victim);
        }
        Ok(())
    }

    fn overflow(&mut self) -> Option<String> {
        self.evicted.take()
    }

    fn contains(&self, key: &str) -> bool {
        self.present.contains(key)
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}
