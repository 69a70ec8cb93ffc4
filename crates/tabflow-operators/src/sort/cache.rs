//! Sorted-result cache keyed by fingerprint.
//!
//! Entries are shared (`Arc`) so any number of iterations can read the same
//! spilled runs at once; each iteration opens its own cursors. Spill files
//! are removed once the last entry or iterator referencing them is dropped.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tabflow_core::hash::Hash256;
use tracing::debug;

use super::external::SortedData;

pub struct SortCache {
    capacity: usize,
    entries: Mutex<VecDeque<(Hash256, Arc<SortedData>)>>,
}

impl SortCache {
    /// A cache holding at most `capacity` sorted results (least recently
    /// used evicted first).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Private single-slot cache, as owned by one sort view.
    pub fn single() -> Arc<Self> {
        Arc::new(Self::new(1))
    }

    /// Cache meant to be shared between several views.
    pub fn shared(capacity: usize) -> Arc<Self> {
        Arc::new(Self::new(capacity))
    }

    pub fn get(&self, tag: &Hash256) -> Option<Arc<SortedData>> {
        let mut entries = self.lock();
        let pos = entries.iter().position(|(t, _)| t == tag)?;
        let entry = entries.remove(pos)?;
        let data = Arc::clone(&entry.1);
        entries.push_back(entry);
        Some(data)
    }

    pub fn put(&self, tag: Hash256, data: Arc<SortedData>) {
        let mut entries = self.lock();
        entries.retain(|(t, _)| *t != tag);
        entries.push_back((tag, data));
        while entries.len() > self.capacity {
            if let Some((old, _)) = entries.pop_front() {
                debug!(tag = %old, "evicted sorted result");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<(Hash256, Arc<SortedData>)>> {
        // A panic while holding the lock cannot leave the deque half-updated.
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl std::fmt::Debug for SortCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabflow_core::hash::hash_str;

    fn data() -> Arc<SortedData> {
        Arc::new(SortedData::in_memory(vec!["a".into()], Vec::new()))
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = SortCache::new(2);
        cache.put(hash_str("a"), data());
        cache.put(hash_str("b"), data());
        assert!(cache.get(&hash_str("a")).is_some());
        cache.put(hash_str("c"), data());
        assert!(cache.get(&hash_str("b")).is_none());
        assert!(cache.get(&hash_str("a")).is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn single_slot_replaces() {
        let cache = SortCache::single();
        cache.put(hash_str("a"), data());
        cache.put(hash_str("b"), data());
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&hash_str("b")).is_some());
    }
}
