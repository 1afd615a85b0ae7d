//! Least-frequently-used eviction, ties broken by recency.

use super::{EvictionPolicy, MissEvent};
use crate::error::CacheResult;
use std::collections::HashMap;

struct Entry {
    frequency: u64,
    last_used: u64,
}

/// LFU ordering: victim is the key with the smallest access frequency; among
/// equally infrequent keys, the one least recently touched.
pub struct Lfu {
    max_size: usize,
    entries: HashMap<String, Entry>,
    clock: u64,
    evicted: Option<String>,
}

impl Lfu {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            entries: HashMap::new(),
            clock: 0,
            evicted: None,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn victim(&self) -> Option<String> {
        self.entries
            .iter()
            .min_by_key(|(_, e)| (e.frequency, e.last_used))
            .map(|(k, _)| k.clone())
    }
}

impl EvictionPolicy for Lfu {
    fn touch(&mut self, key: &str) {
        let now = self.tick();
        if let Some(entry) = self.entries.get_mut(key) {
            entry.frequency += 1;
            entry.last_used = now;
        }
    }

    fn insert(&mut self, event: &MissEvent) -> CacheResult<()> {
        let now = self.tick();
        self.entries
            .entry(event.key.clone())
            .and_modify(|e| {
                e.frequency += 1;
                e.last_used = now;
            })
            .or_insert(Entry {
                frequency: 1,
                last_used: now,
            });

        if self.entries.len() > self.max_size {
            if let Some(victim) = self.victim() {
                self.entries.remove(&victim);
                self.evicted = Some(victim);
            }
        }
        Ok(())
    }

    fn overflow(&mut self) -> Option<String> {
        self.evicted.take()
    }

    fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::bare_event;

    #[test]
    fn evicts_least_frequent() {
        let mut lfu = Lfu::new(2);
        lfu.insert(&bare_event("a", 1)).unwrap();
        lfu.insert(&bare_event("b", 1)).unwrap();
        lfu.touch("a");
        lfu.touch("a");
        lfu.insert(&bare_event("c", 1)).unwrap();
        assert_eq!(lfu.overflow(), Some("b".to_string()));
        assert!(lfu.contains("a"));
        assert!(lfu.contains("c"));
    }

    #[test]
    fn ties_broken_by_recency() {
        let mut lfu = Lfu::new(2);
        lfu.insert(&bare_event("a", 1)).unwrap();
        lfu.insert(&bare_event("b", 1)).unwrap();
        // Both at frequency 1; "a" was touched first, so it's less recent.
        lfu.touch("b");
        lfu.insert(&bare_event("c", 1)).unwrap();
        assert_eq!(lfu.overflow(), Some("a".to_string()));
    }

    #[test]
    fn len_never_exceeds_max_size() {
        let mut lfu = Lfu::new(2);
        for k in ["a", "b", "c", "d"] {
            lfu.insert(&bare_event(k, 1)).unwrap();
            assert!(lfu.len() <= 2);
        }
    }
}
