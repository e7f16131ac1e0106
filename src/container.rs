use crate::config::CacheConfig;
use crate::entry::CacheEntry;
use crate::error::{Error, Result};
use crate::hash::KeyHasher;
use crate::iter::{ContainerIter, ContainerSplitIter};
use crate::shard::Shard;
use crate::stats::{ShardOps, Stats};
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Sharded, internally synchronised backing store for cache entries.
///
/// Splits entries across shards, each with its own read-write lock, so
/// operations on different shards don't block each other. Values are held as
/// `Arc<V>` and handed out without copying.
///
/// The container knows nothing about listeners or lock stripes; the
/// [`Cache`](crate::Cache) layers those on top.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use stripe_cache::DataContainer;
///
/// let container = Arc::new(DataContainer::new());
/// container.put("key1", "value1");
///
/// assert_eq!(*container.get(&"key1").unwrap(), "value1");
/// assert_eq!(container.iter().count(), 1);
/// ```
pub struct DataContainer<K, V> {
    shards: Vec<Shard<K, V>>,
    shard_mask: usize,
    hasher: KeyHasher,
    size: AtomicUsize,
}

impl<K, V> DataContainer<K, V>
where
    K: Hash + Eq,
{
    /// Create a new container with defaults (16 shards, ahash).
    pub fn new() -> Self {
        Self::with_shards(16, KeyHasher::default(), None).expect("default shard count is valid")
    }

    pub(crate) fn from_config(config: &CacheConfig) -> Result<Self> {
        Self::with_shards(
            config.shard_count,
            config.hasher(),
            config.capacity_per_shard,
        )
    }

    /// Create a container with `shard_count` shards (a power of two).
    pub fn with_shards(
        shard_count: usize,
        hasher: KeyHasher,
        capacity_per_shard: Option<usize>,
    ) -> Result<Self> {
        if shard_count == 0 || !shard_count.is_power_of_two() {
            return Err(Error::InvalidShardCount);
        }

        let shards = (0..shard_count)
            .map(|_| Shard::with_capacity(capacity_per_shard))
            .collect();

        Ok(Self {
            shards,
            shard_mask: shard_count - 1,
            hasher,
            size: AtomicUsize::new(0),
        })
    }

    /// Figure out which shard this key belongs to.
    #[inline]
    fn shard_index(&self, key: &K) -> usize {
        (self.hasher.hash_key(key) as usize) & self.shard_mask
    }

    pub(crate) fn shards(&self) -> &[Shard<K, V>] {
        &self.shards
    }

    /// Get the value mapped to `key`.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.shards[self.shard_index(key)].get(key)
    }

    /// Get the entry for `key` as a snapshot.
    pub fn get_entry(&self, key: &K) -> Option<CacheEntry<K, V>>
    where
        K: Clone,
    {
        self.get(key).map(|value| CacheEntry::new(key.clone(), value))
    }

    /// Check if a key is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.shards[self.shard_index(key)].contains_key(key)
    }

    /// Insert a key-value pair. Returns the old value if the key existed.
    pub fn put(&self, key: K, value: V) -> Option<Arc<V>> {
        self.put_arc(key, Arc::new(value))
    }

    /// Insert a value that is already shared.
    pub fn put_arc(&self, key: K, value: Arc<V>) -> Option<Arc<V>> {
        let shard_idx = self.shard_index(&key);
        self.shards[shard_idx].insert(key, value, &self.size)
    }

    /// Replace the value of an existing key. Absent keys are left absent.
    pub fn replace(&self, key: &K, value: Arc<V>) -> Option<Arc<V>> {
        self.shards[self.shard_index(key)].replace(key, value)
    }

    /// Remove a key, returning its value if it existed.
    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        self.shards[self.shard_index(key)].remove(key, &self.size)
    }

    /// Remove `key` only if its current value equals `expected`.
    pub fn remove_if(&self, key: &K, expected: &V) -> Option<Arc<V>>
    where
        V: PartialEq,
    {
        self.shards[self.shard_index(key)].remove_if(key, expected, &self.size)
    }

    /// Number of entries, read from a counter rather than by walking shards.
    ///
    /// The counter moves under the owning shard's write lock, so for any one
    /// key an increment is always ordered before its decrement.
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// Check if the container is empty.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Get detailed statistics about the container and its shards.
    pub fn stats(&self) -> Stats {
        let shard_sizes: Vec<usize> = self.shards.iter().map(|s| s.len()).collect();
        let operations: Vec<ShardOps> = self.shards.iter().map(|s| s.stats()).collect();
        let size: usize = shard_sizes.iter().sum();

        Stats {
            size,
            shard_sizes,
            operations,
        }
    }

    /// Weakly consistent iterator over all entries.
    ///
    /// Each call starts a fresh traversal over the current state.
    pub fn iter(self: &Arc<Self>) -> ContainerIter<K, V>
    where
        K: Clone,
    {
        ContainerIter::new(Arc::clone(self))
    }

    /// Divisible traversal over all entries for parallel consumption.
    pub fn split_iter(self: &Arc<Self>) -> ContainerSplitIter<K, V>
    where
        K: Clone,
    {
        ContainerSplitIter::new(Arc::clone(self))
    }
}

impl<K, V> Default for DataContainer<K, V>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> std::fmt::Debug for DataContainer<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataContainer")
            .field("shards", &self.shards.len())
            .field("size", &self.size.load(Ordering::Relaxed))
            .finish()
    }
}
