//! Segment-aware processing pipelines over cache entries.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;

use crate::cache::{Key, Value};
use crate::container::DataContainer;
use crate::entry::CacheEntry;
use crate::iter::ContainerSplitIter;
use crate::segment::KeySegmenter;

type Predicate<K, V> = Arc<dyn Fn(&CacheEntry<K, V>) -> bool + Send + Sync>;

/// A lazily evaluated pipeline over a cache's entries.
///
/// Intermediate operations only record what to do; a terminal operation
/// walks the container once. A parallel stream splits the container's
/// traversal and processes the parts on scoped threads.
///
/// When the cache is distribution-aware the stream carries its
/// [`KeySegmenter`], so work can be partitioned by segment. Local caches have
/// no segmenter and segment filters are ignored.
///
/// # Example
///
/// ```rust
/// use stripe_cache::Cache;
///
/// let cache = Cache::new();
/// for i in 0..100 {
///     cache.put(i, i * 2)?;
/// }
///
/// let even = cache
///     .entry_set()?
///     .parallel_stream()
///     .filter(|e| *e.key() % 2 == 0)
///     .count();
/// assert_eq!(even, 50);
/// # Ok::<(), stripe_cache::Error>(())
/// ```
pub struct EntryStream<K, V> {
    container: Arc<DataContainer<K, V>>,
    segmenter: Option<KeySegmenter>,
    parallel: bool,
    predicates: Vec<Predicate<K, V>>,
}

impl<K: Key, V: Value> EntryStream<K, V> {
    pub(crate) fn new(
        container: Arc<DataContainer<K, V>>,
        segmenter: Option<KeySegmenter>,
        parallel: bool,
    ) -> Self {
        Self {
            container,
            segmenter,
            parallel,
            predicates: Vec::new(),
        }
    }

    /// Segment mapping for this stream, absent for local caches.
    pub fn segment_mapper(&self) -> Option<&KeySegmenter> {
        self.segmenter.as_ref()
    }

    /// Whether terminal operations run in parallel.
    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Run terminal operations in parallel.
    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    /// Run terminal operations on the calling thread.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Keep only entries matching `predicate`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CacheEntry<K, V>) -> bool + Send + Sync + 'static,
    {
        self.predicates.push(Arc::new(predicate));
        self
    }

    /// Keep only entries whose key is in `keys`.
    pub fn filter_keys(self, keys: HashSet<K>) -> Self {
        self.filter(move |e| keys.contains(e.key()))
    }

    /// Keep only entries whose key maps to one of `segments`.
    ///
    /// Ignored when the cache is not distribution-aware.
    pub fn filter_key_segments(self, segments: HashSet<u32>) -> Self {
        match self.segmenter.clone() {
            Some(segmenter) => {
                self.filter(move |e| segments.contains(&segmenter.segment_for(e.key())))
            }
            None => {
                tracing::trace!("[stream]: segment filter ignored on a local cache");
                self
            }
        }
    }

    /// Call `f` for every entry.
    pub fn for_each<F>(self, f: F)
    where
        F: Fn(CacheEntry<K, V>) + Send + Sync,
    {
        self.run(|entries| entries.for_each(&f));
    }

    /// Number of entries that pass all filters.
    pub fn count(self) -> usize {
        self.run(|entries| entries.count()).into_iter().sum()
    }

    /// Collect the entries that pass all filters, in no particular order.
    pub fn collect_vec(self) -> Vec<CacheEntry<K, V>> {
        self.run(|entries| entries.collect::<Vec<_>>())
            .into_iter()
            .flatten()
            .collect()
    }

    /// Whether any entry matches `predicate`.
    pub fn any_match<F>(self, predicate: F) -> bool
    where
        F: Fn(&CacheEntry<K, V>) -> bool + Send + Sync,
    {
        self.run(|mut entries| entries.any(|e| predicate(&e)))
            .into_iter()
            .any(|found| found)
    }

    /// Number of matching entries per segment, or `None` for a local cache.
    pub fn segment_counts(self) -> Option<HashMap<u32, usize>> {
        let segmenter = self.segmenter.clone()?;
        let partials = self.run(|entries| {
            let mut counts = HashMap::new();
            for entry in entries {
                *counts.entry(segmenter.segment_for(entry.key())).or_insert(0) += 1;
            }
            counts
        });

        let mut counts = HashMap::new();
        for partial in partials {
            for (segment, n) in partial {
                *counts.entry(segment).or_insert(0) += n;
            }
        }
        Some(counts)
    }

    fn accepts(&self, entry: &CacheEntry<K, V>) -> bool {
        self.predicates.iter().all(|p| p(entry))
    }

    /// Split the traversal into roughly one part per available core.
    fn parts(&self) -> Vec<ContainerSplitIter<K, V>> {
        let mut parts = vec![self.container.split_iter()];
        if !self.parallel {
            return parts;
        }

        let target = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        while parts.len() < target {
            let current = parts.len();
            let mut split = Vec::new();
            for part in parts.iter_mut() {
                if current + split.len() >= target {
                    break;
                }
                if let Some(other) = part.try_split() {
                    split.push(other);
                }
            }
            if split.is_empty() {
                break;
            }
            parts.extend(split);
        }
        parts
    }

    fn run<R, F>(&self, per_part: F) -> Vec<R>
    where
        R: Send,
        F: Fn(Filtered<'_, K, V>) -> R + Sync,
    {
        let mut parts = self.parts();
        if parts.len() == 1 {
            let part = parts.remove(0);
            return vec![per_part(Filtered { part, stream: self })];
        }

        thread::scope(|scope| {
            let handles: Vec<_> = parts
                .into_iter()
                .map(|part| {
                    let per_part = &per_part;
                    scope.spawn(move || per_part(Filtered { part, stream: self }))
                })
                .collect();

            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect()
        })
    }
}

/// One part of a stream's traversal with the stream's filters applied.
struct Filtered<'a, K, V> {
    part: ContainerSplitIter<K, V>,
    stream: &'a EntryStream<K, V>,
}

impl<K: Key, V: Value> Iterator for Filtered<'_, K, V> {
    type Item = CacheEntry<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        let stream = self.stream;
        self.part.find(|e| stream.accepts(e))
    }
}

impl<K, V> std::fmt::Debug for EntryStream<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryStream")
            .field("segmenter", &self.segmenter)
            .field("parallel", &self.parallel)
            .field("filters", &self.predicates.len())
            .finish()
    }
}
