use crate::container::DataContainer;
use crate::entry::CacheEntry;
use std::hash::Hash;
use std::ops::Range;
use std::sync::Arc;

/// Walks a range of shards, buffering one shard at a time.
///
/// A shard's read lock is held only while its entries are copied out, so
/// writers are never blocked for the length of a traversal.
struct ShardCursor<K, V> {
    container: Arc<DataContainer<K, V>>,
    shards: Range<usize>,
    buffer: std::vec::IntoIter<CacheEntry<K, V>>,
}

impl<K, V> ShardCursor<K, V>
where
    K: Hash + Eq + Clone,
{
    fn new(container: Arc<DataContainer<K, V>>, shards: Range<usize>) -> Self {
        Self {
            container,
            shards,
            buffer: Vec::new().into_iter(),
        }
    }

    /// Fill the buffer from the next non-empty shard.
    fn fill_buffer(&mut self) -> bool {
        while let Some(index) = self.shards.next() {
            let guard = self.container.shards()[index].read_lock();
            if guard.is_empty() {
                continue;
            }
            let entries: Vec<_> = guard
                .iter()
                .map(|(key, value)| CacheEntry::new(key.clone(), Arc::clone(value)))
                .collect();
            drop(guard);

            self.buffer = entries.into_iter();
            return true;
        }
        false
    }

    fn next(&mut self) -> Option<CacheEntry<K, V>> {
        loop {
            if let Some(entry) = self.buffer.next() {
                return Some(entry);
            }
            if !self.fill_buffer() {
                return None;
            }
        }
    }
}

/// Weakly consistent iterator over a data container.
///
/// Reflects some state between the start and the end of the traversal: it
/// may or may not observe concurrent inserts and removes, and it never fails
/// because of them.
pub struct ContainerIter<K, V> {
    cursor: ShardCursor<K, V>,
}

impl<K, V> ContainerIter<K, V>
where
    K: Hash + Eq + Clone,
{
    pub(crate) fn new(container: Arc<DataContainer<K, V>>) -> Self {
        let shards = 0..container.shards().len();
        Self {
            cursor: ShardCursor::new(container, shards),
        }
    }
}

impl<K, V> Iterator for ContainerIter<K, V>
where
    K: Hash + Eq + Clone,
{
    type Item = CacheEntry<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next()
    }
}

/// Divisible traversal over a data container, for parallel consumers.
///
/// [`try_split`](Self::try_split) hands half of the not-yet-visited shards to
/// a new traversal. Removal is not supported.
pub struct ContainerSplitIter<K, V> {
    cursor: ShardCursor<K, V>,
}

impl<K, V> ContainerSplitIter<K, V>
where
    K: Hash + Eq + Clone,
{
    pub(crate) fn new(container: Arc<DataContainer<K, V>>) -> Self {
        let shards = 0..container.shards().len();
        Self {
            cursor: ShardCursor::new(container, shards),
        }
    }

    /// Split off the upper half of the remaining shards.
    ///
    /// Returns `None` when fewer than two shards remain.
    pub fn try_split(&mut self) -> Option<Self> {
        let (start, end) = (self.cursor.shards.start, self.cursor.shards.end);
        if end - start < 2 {
            return None;
        }
        let mid = start + (end - start) / 2;
        self.cursor.shards = start..mid;
        Some(Self {
            cursor: ShardCursor::new(Arc::clone(&self.cursor.container), mid..end),
        })
    }

    /// Estimated number of entries left, from the current shard sizes.
    pub fn estimate_size(&self) -> usize {
        let shards = self.cursor.container.shards();
        let pending: usize = self.cursor.shards.clone().map(|i| shards[i].len()).sum();
        pending + self.cursor.buffer.len()
    }
}

impl<K, V> Iterator for ContainerSplitIter<K, V>
where
    K: Hash + Eq + Clone,
{
    type Item = CacheEntry<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.cursor.buffer.len(), None)
    }
}
