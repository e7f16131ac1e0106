use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::command::{EntrySetCommand, InvocationContext};
use crate::config::CacheConfig;
use crate::container::DataContainer;
use crate::error::{Error, Result};
use crate::flags::Flags;
use crate::lock::StripedLockContainer;
use crate::segment::KeySegmenter;
use crate::view::EntryView;

/// Bounds required of cache keys.
pub trait Key: Hash + Eq + Clone + Send + Sync + 'static {}
impl<T: Hash + Eq + Clone + Send + Sync + 'static> Key for T {}

/// Bounds required of cache values. Equality drives value-checked removal.
pub trait Value: PartialEq + Send + Sync + 'static {}
impl<T: PartialEq + Send + Sync + 'static> Value for T {}

/// Identity that mutations are attributed to for lock bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockOwner(u64);

impl LockOwner {
    /// Create an owner identity.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Numeric identity.
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl Display for LockOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "owner-{}", self.0)
    }
}

/// What a mutation did to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A new key was inserted.
    Created,
    /// An existing key got a new value.
    Modified,
    /// A key was removed.
    Removed,
}

/// Notification delivered to [`CacheListener`]s after a mutation.
#[derive(Debug)]
pub struct CacheEvent<K, V> {
    /// What happened.
    pub kind: EventKind,
    /// Affected key.
    pub key: K,
    /// New value for created/modified entries, old value for removed ones.
    pub value: Arc<V>,
    /// Owner the mutation was attributed to, if any.
    pub owner: Option<LockOwner>,
}

/// Receives cache mutation events.
pub trait CacheListener: Send + Sync + 'static {
    /// Associated key type.
    type Key;
    /// Associated value type.
    type Value;

    /// Called after a mutation, once its lock stripe has been released.
    fn on_event(&self, event: &CacheEvent<Self::Key, Self::Value>);
}

type Listeners<K, V> = RwLock<Vec<Arc<dyn CacheListener<Key = K, Value = V>>>>;

struct CacheInner<K, V> {
    name: String,
    container: Arc<DataContainer<K, V>>,
    locks: StripedLockContainer,
    segmenter: Option<KeySegmenter>,
    listeners: Listeners<K, V>,
    lock_timeout: Duration,
}

/// The store: a data container plus key locking, listeners and optional
/// distribution awareness.
///
/// `Cache` is a cheap handle. Clones share state; [`with_flags`](Self::with_flags)
/// and [`lock_as`](Self::lock_as) return handles that behave differently over
/// the same entries.
///
/// # Example
///
/// ```rust
/// use stripe_cache::Cache;
///
/// let cache = Cache::new();
/// cache.put("k", 1)?;
///
/// // Value-checked removal: a stale value does not remove the entry.
/// assert!(!cache.remove_if(&"k", &2)?);
/// assert!(cache.remove_if(&"k", &1)?);
/// assert!(cache.get(&"k").is_none());
/// # Ok::<(), stripe_cache::Error>(())
/// ```
pub struct Cache<K, V> {
    inner: Arc<CacheInner<K, V>>,
    flags: Flags,
    owner: Option<LockOwner>,
}

impl<K: Key, V: Value> Cache<K, V> {
    /// Create a local cache with default configuration.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default()).expect("default config is valid")
    }

    /// Create a cache from a configuration.
    pub fn with_config(config: CacheConfig) -> Result<Self> {
        let hasher = config.hasher();
        let container = DataContainer::from_config(&config)?;
        let locks = StripedLockContainer::with_hasher(config.concurrency_level, hasher)?;
        let segmenter = config
            .segment_mapper()
            .map(|mapper| KeySegmenter::new(hasher, mapper));

        tracing::debug!(
            "[cache]: created cache {} ({} shards, {} stripes, distributed: {})",
            config.name,
            container.shard_count(),
            locks.stripe_count(),
            segmenter.is_some()
        );

        Ok(Self {
            inner: Arc::new(CacheInner {
                name: config.name,
                container: Arc::new(container),
                locks,
                segmenter,
                listeners: RwLock::new(Vec::new()),
                lock_timeout: config.lock_acquisition_timeout,
            }),
            flags: Flags::empty(),
            owner: None,
        })
    }

    /// Cache name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Get the value mapped to `key`.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.inner.container.get(key)
    }

    /// Check if `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.container.contains_key(key)
    }

    /// Live number of entries.
    pub fn size(&self) -> usize {
        self.inner.container.size()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.container.is_empty()
    }

    /// Map `key` to `value`, returning the previous value.
    pub fn put(&self, key: K, value: V) -> Result<Option<Arc<V>>> {
        self.put_shared(key, Arc::new(value))
    }

    pub(crate) fn put_shared(&self, key: K, value: Arc<V>) -> Result<Option<Arc<V>>> {
        let event_key = self.notifying().then(|| key.clone());
        let previous = self.with_stripe(&key, || {
            self.inner.container.put_arc(key.clone(), Arc::clone(&value))
        })?;

        if let Some(key) = event_key {
            let kind = match previous {
                Some(_) => EventKind::Modified,
                None => EventKind::Created,
            };
            self.notify(kind, key, value);
        }
        Ok(previous)
    }

    /// Replace the value of an existing key. Returns the previous value, or
    /// `None` (and changes nothing) if the key was absent.
    pub fn replace(&self, key: &K, value: V) -> Result<Option<Arc<V>>> {
        let value = Arc::new(value);
        let previous =
            self.with_stripe(key, || self.inner.container.replace(key, Arc::clone(&value)))?;

        if previous.is_some() && self.notifying() {
            self.notify(EventKind::Modified, key.clone(), value);
        }
        Ok(previous)
    }

    /// Remove `key`, returning its value if it was present.
    pub fn remove(&self, key: &K) -> Result<Option<Arc<V>>> {
        let removed = self.with_stripe(key, || self.inner.container.remove(key))?;

        if let Some(value) = &removed {
            if self.notifying() {
                self.notify(EventKind::Removed, key.clone(), Arc::clone(value));
            }
        }
        Ok(removed)
    }

    /// Remove `key` only if it currently maps to a value equal to `expected`.
    pub fn remove_if(&self, key: &K, expected: &V) -> Result<bool> {
        let removed = self.with_stripe(key, || self.inner.container.remove_if(key, expected))?;

        match removed {
            Some(value) => {
                if self.notifying() {
                    self.notify(EventKind::Removed, key.clone(), value);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// A handle over the same entries with `flags` added.
    pub fn with_flags(&self, flags: Flags) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            flags: self.flags | flags,
            owner: self.owner,
        }
    }

    /// Flags carried by this handle.
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// A handle whose mutations are attributed to `owner`.
    ///
    /// Fails with [`Error::OwnerConflict`] if this handle is already bound to
    /// a different owner.
    pub fn lock_as(&self, owner: LockOwner) -> Result<Self> {
        if let Some(bound) = self.owner {
            if bound != owner {
                return Err(Error::OwnerConflict {
                    bound,
                    requested: owner,
                });
            }
        }
        tracing::debug!("[cache]: {} bound to {}", self.inner.name, owner);
        Ok(Self {
            inner: Arc::clone(&self.inner),
            flags: self.flags,
            owner: Some(owner),
        })
    }

    /// Owner this handle is bound to.
    pub fn lock_owner(&self) -> Option<LockOwner> {
        self.owner
    }

    /// The raw backing container. Mutating it directly bypasses locking and
    /// listeners.
    pub fn data_container(&self) -> &Arc<DataContainer<K, V>> {
        &self.inner.container
    }

    /// The lock stripes guarding mutations.
    pub fn lock_container(&self) -> &StripedLockContainer {
        &self.inner.locks
    }

    /// Key-to-segment mapping, or `None` for a local-only cache.
    pub fn segment_mapper(&self) -> Option<KeySegmenter> {
        self.inner.segmenter.clone()
    }

    /// Register a listener for mutation events.
    pub fn add_listener(&self, listener: Arc<dyn CacheListener<Key = K, Value = V>>) {
        self.inner.listeners.write().push(listener);
    }

    /// Unregister a listener previously passed to
    /// [`add_listener`](Self::add_listener). Returns `false` if it was not
    /// registered.
    pub fn remove_listener(&self, listener: &Arc<dyn CacheListener<Key = K, Value = V>>) -> bool {
        let mut listeners = self.inner.listeners.write();
        match listeners.iter().position(|l| Arc::ptr_eq(l, listener)) {
            Some(index) => {
                listeners.remove(index);
                true
            }
            None => false,
        }
    }

    /// Live view over all entries.
    pub fn entry_set(&self) -> Result<EntryView<K, V>> {
        EntrySetCommand::new(self.clone(), Flags::empty()).perform(&InvocationContext::new())
    }

    fn with_stripe<R>(&self, key: &K, f: impl FnOnce() -> R) -> Result<R> {
        if self.flags.contains(Flags::SKIP_LOCKING) {
            return Ok(f());
        }

        let locks = &self.inner.locks;
        let timeout = self.inner.lock_timeout;
        let Some(guard) = locks.lock(key, timeout) else {
            let stripe = locks.index_for(key);
            tracing::debug!(
                "[cache]: {} timed out on stripe {} (owner: {:?})",
                self.inner.name,
                stripe,
                self.owner
            );
            return Err(Error::LockTimeout { stripe, timeout });
        };

        let result = f();
        drop(guard);
        Ok(result)
    }

    fn notifying(&self) -> bool {
        !self.flags.contains(Flags::SKIP_LISTENER_NOTIFICATION)
            && !self.inner.listeners.read().is_empty()
    }

    // Runs outside the stripe so listeners may write back to the cache.
    fn notify(&self, kind: EventKind, key: K, value: Arc<V>) {
        let event = CacheEvent {
            kind,
            key,
            value,
            owner: self.owner,
        };
        let listeners = self.inner.listeners.read().clone();
        for listener in listeners {
            listener.on_event(&event);
        }
    }
}

impl<K, V> Clone for Cache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            flags: self.flags,
            owner: self.owner,
        }
    }
}

impl<K: Key, V: Value> Default for Cache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> std::fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.inner.name)
            .field("flags", &self.flags)
            .field("owner", &self.owner)
            .finish()
    }
}
