use std::any::Any;
use std::sync::Arc;

/// A point-in-time pairing of a key with the value read for it.
///
/// Entries do not follow later updates to the cache.
#[derive(Debug)]
pub struct CacheEntry<K, V> {
    key: K,
    value: Arc<V>,
}

impl<K, V> CacheEntry<K, V> {
    /// Create an entry from a key and a shared value.
    pub fn new(key: K, value: Arc<V>) -> Self {
        Self { key, value }
    }

    /// The entry's key.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// The value observed when the entry was read.
    pub fn value(&self) -> &Arc<V> {
        &self.value
    }

    /// Split into key and value.
    pub fn into_parts(self) -> (K, Arc<V>) {
        (self.key, self.value)
    }
}

impl<K: Clone, V> Clone for CacheEntry<K, V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            value: Arc::clone(&self.value),
        }
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for CacheEntry<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && *self.value == *other.value
    }
}

impl<K: Eq, V: Eq> Eq for CacheEntry<K, V> {}

/// Something that can be looked at as a key/value pair.
pub trait AsEntry<K, V> {
    /// Borrow the key and value, or `None` if this is not entry-shaped.
    fn as_entry(&self) -> Option<(&K, &V)>;
}

impl<K, V> AsEntry<K, V> for CacheEntry<K, V> {
    fn as_entry(&self) -> Option<(&K, &V)> {
        Some((&self.key, self.value.as_ref()))
    }
}

impl<K, V> AsEntry<K, V> for (K, V) {
    fn as_entry(&self) -> Option<(&K, &V)> {
        Some((&self.0, &self.1))
    }
}

impl<K, V, E: AsEntry<K, V>> AsEntry<K, V> for Option<E> {
    fn as_entry(&self) -> Option<(&K, &V)> {
        self.as_ref().and_then(AsEntry::as_entry)
    }
}

/// Downcast an arbitrary candidate to a key/value pair.
pub(crate) fn downcast_entry<K: 'static, V: 'static>(candidate: &dyn Any) -> Option<(&K, &V)> {
    if let Some(entry) = candidate.downcast_ref::<CacheEntry<K, V>>() {
        return entry.as_entry();
    }
    candidate.downcast_ref::<(K, V)>().and_then(AsEntry::as_entry)
}
