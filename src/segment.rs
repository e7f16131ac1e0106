use std::hash::Hash;
use std::sync::Arc;

use crate::hash::KeyHasher;

/// Maps a key hash to the distribution segment that owns it.
///
/// Implementations must be deterministic: the same hash always yields the
/// same segment in `[0, num_segments)`.
pub trait SegmentMapper: Send + Sync {
    /// Segment for the given key hash.
    fn segment(&self, key_hash: u64) -> u32;

    /// Total number of segments.
    fn num_segments(&self) -> u32;
}

/// Default mapping: `hash % num_segments`.
#[derive(Debug, Clone, Copy)]
pub struct HashSegmentMapper {
    num_segments: u32,
}

impl HashSegmentMapper {
    /// Create a mapper over `num_segments` segments. `num_segments` must be > 0.
    pub fn new(num_segments: u32) -> Self {
        debug_assert!(num_segments > 0);
        Self { num_segments }
    }
}

impl SegmentMapper for HashSegmentMapper {
    #[inline]
    fn segment(&self, key_hash: u64) -> u32 {
        (key_hash % self.num_segments as u64) as u32
    }

    fn num_segments(&self) -> u32 {
        self.num_segments
    }
}

/// A [`SegmentMapper`] bound to the cache's key hasher, so callers can map
/// keys rather than hashes.
#[derive(Clone)]
pub struct KeySegmenter {
    hasher: KeyHasher,
    mapper: Arc<dyn SegmentMapper>,
}

impl KeySegmenter {
    pub(crate) fn new(hasher: KeyHasher, mapper: Arc<dyn SegmentMapper>) -> Self {
        Self { hasher, mapper }
    }

    /// Segment that owns `key`.
    #[inline]
    pub fn segment_for<K: Hash + ?Sized>(&self, key: &K) -> u32 {
        self.mapper.segment(self.hasher.hash_key(key))
    }

    /// Total number of segments.
    pub fn num_segments(&self) -> u32 {
        self.mapper.num_segments()
    }
}

impl std::fmt::Debug for KeySegmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySegmenter")
            .field("hasher", &self.hasher)
            .field("num_segments", &self.mapper.num_segments())
            .finish()
    }
}
