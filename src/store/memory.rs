//! In-memory response store, used for tests and ephemeral cache instances
//! that do not persist across restarts.

use super::ResponseStore;
use crate::error::CacheResult;
use crate::record::ResponseRecord;
use std::collections::HashMap;

/// In-memory [`ResponseStore`] backed by a `HashMap` plus an insertion-order
/// list, so `fetch_by_request` can honor "first matching record" without a
/// real database.
#[derive(Default)]
pub struct MemoryResponseStore {
    records: HashMap<String, ResponseRecord>,
    insertion_order: Vec<String>,
}

impl MemoryResponseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResponseStore for MemoryResponseStore {
    fn fetch(&self, key: &str) -> CacheResult<Option<ResponseRecord>> {
        Ok(self.records.get(key).cloned())
    }

    fn fetch_by_request(&self, request_key: &str) -> CacheResult<Option<ResponseRecord>> {
        Ok(self
            .insertion_order
            .iter()
            .filter_map(|key| self.records.get(key))
            .find(|r| r.request_key == request_key)
            .cloned())
    }

    fn save(&mut self, record: ResponseRecord) -> CacheResult<String> {
        let key = record.key.clone();
        if !self.records.contains_key(&key) {
            self.insertion_order.push(key.clone());
        }
        self.records.insert(key.clone(), record);
        Ok(key)
    }

    fn remove(&mut self, key: &str) -> CacheResult<bool> {
        let removed = self.records.remove(key).is_some();
        if removed {
            self.insertion_order.retain(|k| k != key);
        }
        Ok(removed)
    }

    fn remove_by_request(&mut self, request_key: &str) -> CacheResult<bool> {
        let key = self
            .insertion_order
            .iter()
            .filter_map(|key| self.records.get(key))
            .find(|r| r.request_key == request_key)
            .map(|r| r.key.clone());
        match key {
            Some(key) => self.remove(&key),
            None => Ok(false),
        }
    }

    fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.records.contains_key(key))
    }

    fn size(&self) -> CacheResult<usize> {
        Ok(self.records.len())
    }
}
