use std::sync::Arc;
use std::time::Duration;

use crate::cache::{Cache, Key, Value};
use crate::error::Error;
use crate::hash::KeyHasher;
use crate::lock::stripes_for;
use crate::segment::{HashSegmentMapper, SegmentMapper};

/// Which hash function to use for stripe, shard and segment assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashFunction {
    /// Use ahash (default, fast and well-distributed).
    #[default]
    AHash,
    /// Use fxhash (faster but potentially less distributed).
    #[cfg(feature = "fxhash")]
    FxHash,
}

/// Whether, and how, keys are assigned to distribution segments.
#[derive(Default)]
pub enum Distribution {
    /// Local-only cache; streams are unpartitioned.
    #[default]
    Local,
    /// `n` segments assigned by `hash % n`.
    Segments(u32),
    /// User-provided segment mapping.
    Custom(Arc<dyn SegmentMapper>),
}

impl std::fmt::Debug for Distribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Distribution::Local => write!(f, "Distribution::Local"),
            Distribution::Segments(n) => write!(f, "Distribution::Segments({})", n),
            Distribution::Custom(_) => write!(f, "Distribution::Custom(...)"),
        }
    }
}

/// Configuration for a cache instance.
#[derive(Debug)]
pub struct CacheConfig {
    pub(crate) name: String,
    pub(crate) shard_count: usize,
    pub(crate) concurrency_level: usize,
    pub(crate) hash_function: HashFunction,
    pub(crate) capacity_per_shard: Option<usize>,
    pub(crate) lock_acquisition_timeout: Duration,
    pub(crate) distribution: Distribution,
}

impl CacheConfig {
    /// Create a new config with defaults (16 shards, 32 lock stripes, ahash,
    /// 10 second lock acquisition timeout, local-only).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache name, used in logs and command descriptions.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the number of container shards. Must be a power of two and greater than 0.
    pub fn shard_count(mut self, count: usize) -> Result<Self, Error> {
        if count == 0 || !count.is_power_of_two() {
            return Err(Error::InvalidShardCount);
        }
        self.shard_count = count;
        Ok(self)
    }

    /// Set the expected number of concurrently locking threads. The lock
    /// container rounds it up to a power of two.
    pub fn concurrency_level(mut self, level: usize) -> Result<Self, Error> {
        stripes_for(level)?;
        self.concurrency_level = level;
        Ok(self)
    }

    /// Set the hash function to use.
    pub fn hash_function(mut self, hash_fn: HashFunction) -> Self {
        self.hash_function = hash_fn;
        self
    }

    /// Set initial capacity per shard. Total capacity will be approximately
    /// `capacity_per_shard * shard_count`. Omitted by default (HashMap default).
    pub fn capacity_per_shard(mut self, capacity: usize) -> Self {
        self.capacity_per_shard = Some(capacity);
        self
    }

    /// How long a mutation waits for its key's lock stripe.
    pub fn lock_acquisition_timeout(mut self, timeout: Duration) -> Self {
        self.lock_acquisition_timeout = timeout;
        self
    }

    /// Set the distribution mode.
    pub fn distribution(mut self, distribution: Distribution) -> Result<Self, Error> {
        if let Distribution::Segments(0) = distribution {
            return Err(Error::InvalidSegmentCount);
        }
        self.distribution = distribution;
        Ok(self)
    }

    pub(crate) fn hasher(&self) -> KeyHasher {
        create_hasher(self.hash_function)
    }

    pub(crate) fn segment_mapper(&self) -> Option<Arc<dyn SegmentMapper>> {
        match &self.distribution {
            Distribution::Local => None,
            Distribution::Segments(n) => Some(Arc::new(HashSegmentMapper::new(*n))),
            Distribution::Custom(mapper) => Some(Arc::clone(mapper)),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            shard_count: 16,
            concurrency_level: 32,
            hash_function: HashFunction::AHash,
            capacity_per_shard: None,
            lock_acquisition_timeout: Duration::from_secs(10),
            distribution: Distribution::Local,
        }
    }
}

/// Builder for creating a cache with custom configuration.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use stripe_cache::{CacheBuilder, Distribution};
///
/// let cache = CacheBuilder::new()
///     .name("users")
///     .concurrency_level(64)?
///     .lock_acquisition_timeout(Duration::from_millis(500))
///     .distribution(Distribution::Segments(256))?
///     .build::<String, u64>()?;
///
/// cache.put("alice".to_string(), 1)?;
/// assert_eq!(cache.lock_container().stripe_count(), 64);
/// # Ok::<(), stripe_cache::Error>(())
/// ```
pub struct CacheBuilder {
    config: CacheConfig,
}

impl CacheBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: CacheConfig::default(),
        }
    }

    /// Set the cache name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config = self.config.name(name);
        self
    }

    /// Set the number of container shards. Must be a power of two and greater than 0.
    pub fn shard_count(mut self, count: usize) -> Result<Self, Error> {
        self.config = self.config.shard_count(count)?;
        Ok(self)
    }

    /// Set the lock concurrency level.
    pub fn concurrency_level(mut self, level: usize) -> Result<Self, Error> {
        self.config = self.config.concurrency_level(level)?;
        Ok(self)
    }

    /// Set the hash function to use.
    pub fn hash_function(mut self, hash_fn: HashFunction) -> Self {
        self.config = self.config.hash_function(hash_fn);
        self
    }

    /// Set initial capacity per shard. Total capacity ≈ `capacity_per_shard * shard_count`.
    pub fn capacity_per_shard(mut self, capacity: usize) -> Self {
        self.config = self.config.capacity_per_shard(capacity);
        self
    }

    /// Set the lock acquisition timeout for mutations.
    pub fn lock_acquisition_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.lock_acquisition_timeout(timeout);
        self
    }

    /// Set the distribution mode.
    pub fn distribution(mut self, distribution: Distribution) -> Result<Self, Error> {
        self.config = self.config.distribution(distribution)?;
        Ok(self)
    }

    /// Build a cache with the configured settings.
    pub fn build<K: Key, V: Value>(self) -> Result<Cache<K, V>, Error> {
        Cache::with_config(self.config)
    }
}

impl Default for CacheBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a hash function instance based on the configuration.
pub(crate) fn create_hasher(hash_fn: HashFunction) -> KeyHasher {
    match hash_fn {
        HashFunction::AHash => KeyHasher::AHash,
        #[cfg(feature = "fxhash")]
        HashFunction::FxHash => KeyHasher::FxHash,
    }
}
