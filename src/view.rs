//! Live entry-set view over a cache.

use std::any::Any;
use std::sync::Arc;

use crate::cache::{Cache, Key, Value};
use crate::entry::{downcast_entry, AsEntry, CacheEntry};
use crate::error::{Error, Result};
use crate::iter::{ContainerIter, ContainerSplitIter};
use crate::stream::EntryStream;

/// A live collection view of a cache's entries.
///
/// The view owns no data. Every call reads the cache as it is at that moment,
/// and every removal goes through the cache's value-checked remove so locking
/// and listeners apply as usual.
///
/// In remote-iteration mode, iterators hand out the container's entries
/// without the removal bookkeeping.
///
/// # Example
///
/// ```rust
/// use stripe_cache::Cache;
///
/// let cache = Cache::new();
/// cache.put("a", 1)?;
/// cache.put("b", 2)?;
///
/// let entries = cache.entry_set()?;
/// assert_eq!(entries.size(), 2);
/// assert!(entries.contains(&("a", 1)));
/// assert!(!entries.contains(&("a", 5)));
///
/// let mut iter = entries.iter();
/// while let Some(entry) = iter.next() {
///     if *entry.key() == "a" {
///         assert!(iter.remove()?);
///     }
/// }
/// assert_eq!(entries.size(), 1);
/// # Ok::<(), stripe_cache::Error>(())
/// ```
pub struct EntryView<K, V> {
    cache: Cache<K, V>,
    remote_iteration: bool,
}

impl<K: Key, V: Value> EntryView<K, V> {
    /// Create a view over `cache`.
    pub fn new(cache: Cache<K, V>, remote_iteration: bool) -> Self {
        Self {
            cache,
            remote_iteration,
        }
    }

    /// The cache handle this view reads and removes through.
    pub fn cache(&self) -> &Cache<K, V> {
        &self.cache
    }

    /// Whether this view was built for remote/bulk iteration.
    pub fn is_remote_iteration(&self) -> bool {
        self.remote_iteration
    }

    /// Start a fresh traversal over the current entries.
    pub fn iter(&self) -> EntryIter<K, V> {
        let inner = self.cache.data_container().iter();
        let cache = (!self.remote_iteration).then(|| self.cache.clone());
        EntryIter {
            inner,
            cache,
            current: None,
        }
    }

    /// Live number of entries.
    pub fn size(&self) -> usize {
        self.cache.data_container().size()
    }

    /// Alias for [`size`](Self::size).
    pub fn len(&self) -> usize {
        self.size()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Whether the cache currently maps the candidate's key to an equal value.
    pub fn contains<E: AsEntry<K, V> + ?Sized>(&self, candidate: &E) -> bool {
        match candidate.as_entry() {
            Some((key, value)) => self.contains_pair(key, value),
            None => false,
        }
    }

    /// [`contains`](Self::contains) for arbitrary values; anything that is not
    /// a [`CacheEntry<K, V>`] or a `(K, V)` tuple is never contained.
    pub fn contains_any(&self, candidate: &dyn Any) -> bool {
        match downcast_entry::<K, V>(candidate) {
            Some((key, value)) => self.contains_pair(key, value),
            None => false,
        }
    }

    /// Remove the candidate's key if it still maps to the candidate's value.
    ///
    /// Returns whether an entry was removed. Fails only if the cache could not
    /// lock the key in time.
    pub fn remove<E: AsEntry<K, V> + ?Sized>(&self, candidate: &E) -> Result<bool> {
        match candidate.as_entry() {
            Some((key, value)) => self.cache.remove_if(key, value),
            None => Ok(false),
        }
    }

    /// [`remove`](Self::remove) for arbitrary values; anything that is not
    /// entry-shaped removes nothing.
    pub fn remove_any(&self, candidate: &dyn Any) -> Result<bool> {
        match downcast_entry::<K, V>(candidate) {
            Some((key, value)) => self.cache.remove_if(key, value),
            None => Ok(false),
        }
    }

    /// Divisible traversal for parallel consumers. Never supports removal.
    pub fn split_iter(&self) -> ContainerSplitIter<K, V> {
        self.cache.data_container().split_iter()
    }

    /// Sequential pipeline over this view's entries.
    pub fn stream(&self) -> EntryStream<K, V> {
        self.pipeline(false)
    }

    /// Parallel pipeline over this view's entries.
    pub fn parallel_stream(&self) -> EntryStream<K, V> {
        self.pipeline(true)
    }

    fn pipeline(&self, parallel: bool) -> EntryStream<K, V> {
        EntryStream::new(
            Arc::clone(self.cache.data_container()),
            self.cache.segment_mapper(),
            parallel,
        )
    }

    fn contains_pair(&self, key: &K, value: &V) -> bool {
        self.cache
            .data_container()
            .get(key)
            .is_some_and(|current| *current == *value)
    }
}

impl<K: Key, V: Value> IntoIterator for &EntryView<K, V> {
    type Item = CacheEntry<K, V>;
    type IntoIter = EntryIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V> std::fmt::Debug for EntryView<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryView")
            .field("cache", &self.cache)
            .field("remote_iteration", &self.remote_iteration)
            .finish()
    }
}

/// Iterator returned by [`EntryView::iter`].
///
/// Outside remote-iteration mode, [`remove`](Self::remove) and
/// [`set_value`](Self::set_value) act on the entry most recently returned by
/// `next`, through the cache.
pub struct EntryIter<K, V> {
    inner: ContainerIter<K, V>,
    // None in remote-iteration mode.
    cache: Option<Cache<K, V>>,
    current: Option<CacheEntry<K, V>>,
}

impl<K: Key, V: Value> EntryIter<K, V> {
    /// Whether `remove`/`set_value` are available.
    pub fn supports_removal(&self) -> bool {
        self.cache.is_some()
    }

    /// Remove the entry last returned by `next`, exactly as it was returned:
    /// if its value has since changed, nothing is removed and `false` is
    /// returned.
    pub fn remove(&mut self) -> Result<bool> {
        let cache = self
            .cache
            .as_ref()
            .ok_or(Error::Unsupported("remove during remote iteration"))?;
        let entry = self
            .current
            .take()
            .ok_or(Error::IllegalState("remove called without a current entry"))?;
        cache.remove_if(entry.key(), entry.value())
    }

    /// Write a new value for the key last returned by `next`, through the
    /// cache. Returns the value it replaced.
    pub fn set_value(&mut self, value: V) -> Result<Option<Arc<V>>> {
        let cache = self
            .cache
            .as_ref()
            .ok_or(Error::Unsupported("set_value during remote iteration"))?;
        let entry = self
            .current
            .as_mut()
            .ok_or(Error::IllegalState("set_value called without a current entry"))?;

        let value = Arc::new(value);
        let key = entry.key().clone();
        let previous = cache.put_shared(key.clone(), Arc::clone(&value))?;
        *entry = CacheEntry::new(key, value);
        Ok(previous)
    }
}

impl<K: Key, V: Value> Iterator for EntryIter<K, V> {
    type Item = CacheEntry<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.inner.next();
        if self.cache.is_some() {
            self.current = entry.clone();
        }
        entry
    }
}
