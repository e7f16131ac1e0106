use crate::stats::{ShardOps, ShardStats};
use hashbrown::HashMap;
use parking_lot::{RwLock, RwLockReadGuard};
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One slice of the data container. Values are shared so that iterators and
/// readers can hold them after the shard lock is released.
pub(crate) struct Shard<K, V> {
    entries: RwLock<HashMap<K, Arc<V>>>,
    stats: ShardStats,
}

impl<K, V> Shard<K, V>
where
    K: Hash + Eq,
{
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            entries: RwLock::new(HashMap::with_capacity(capacity.unwrap_or(0))),
            stats: ShardStats::new(),
        }
    }

    /// Store `value` under `key`; the displaced value is returned.
    /// `size` counts a new key before the write lock is released.
    pub fn insert(&self, key: K, value: Arc<V>, size: &AtomicUsize) -> Option<Arc<V>> {
        let mut entries = self.entries.write();
        let previous = entries.insert(key, value);
        if previous.is_none() {
            size.fetch_add(1, Ordering::Relaxed);
        }
        self.stats.record_write();
        previous
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let found = self.entries.read().get(key).map(Arc::clone);
        if found.is_some() {
            self.stats.record_read();
        }
        found
    }

    pub fn remove(&self, key: &K, size: &AtomicUsize) -> Option<Arc<V>> {
        let mut entries = self.entries.write();
        let removed = entries.remove(key);
        if removed.is_some() {
            size.fetch_sub(1, Ordering::Relaxed);
            self.stats.record_remove();
        }
        removed
    }

    /// Remove `key` only while it maps to a value equal to `expected`.
    /// Compare and remove happen under one write lock.
    pub fn remove_if(&self, key: &K, expected: &V, size: &AtomicUsize) -> Option<Arc<V>>
    where
        V: PartialEq,
    {
        let mut entries = self.entries.write();
        if !entries.get(key).is_some_and(|current| **current == *expected) {
            return None;
        }
        let removed = entries.remove(key);
        size.fetch_sub(1, Ordering::Relaxed);
        self.stats.record_remove();
        removed
    }

    /// Swap in `value` if `key` is present.
    pub fn replace(&self, key: &K, value: Arc<V>) -> Option<Arc<V>> {
        let mut entries = self.entries.write();
        let slot = entries.get_mut(key)?;
        self.stats.record_write();
        Some(std::mem::replace(slot, value))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn stats(&self) -> ShardOps {
        self.stats.snapshot()
    }

    /// Shared access for traversal. Callers copy out and drop the guard.
    pub fn read_lock(&self) -> RwLockReadGuard<'_, HashMap<K, Arc<V>>> {
        self.entries.read()
    }
}
