//! # stripe-cache
//!
//! Concurrency core of an in-memory, segment-partitioned key/value cache.
//!
//! Two pieces do the work:
//!
//! - [`StripedLockContainer`] gives mutual exclusion per key without a lock
//!   per key: a fixed, power-of-two array of mutexes indexed by a mixed hash
//!   of the key. Acquisition is bounded by a timeout and can be interrupted.
//! - [`EntryView`] is a live view over the cache's entries. It never
//!   snapshots, removes through the cache's value-checked remove, and turns
//!   into sequential or parallel [`EntryStream`]s that know the cache's
//!   segment mapping.
//!
//! Views are produced by [`EntrySetCommand`], a visitable command that binds
//! the view to the invocation's lock owner and picks ordinary or
//! remote-iteration mode from its flags when it is performed.
//!
//! ## Example
//!
//! ```rust
//! use stripe_cache::{Cache, EntrySetCommand, Flags, InvocationContext, LockOwner};
//!
//! let cache = Cache::new();
//! cache.put("a", 1)?;
//! cache.put("b", 2)?;
//!
//! // Ordinary iteration: removal goes back through the cache.
//! let view = cache.entry_set()?;
//! let mut iter = view.iter();
//! while let Some(entry) = iter.next() {
//!     if **entry.value() == 1 {
//!         iter.remove()?;
//!     }
//! }
//! assert_eq!(view.size(), 1);
//!
//! // Remote iteration bound to a lock owner.
//! let command = EntrySetCommand::new(cache.clone(), Flags::REMOTE_ITERATION);
//! let ctx = InvocationContext::new().with_lock_owner(LockOwner::new(7));
//! let view = command.perform(&ctx)?;
//! assert!(view.is_remote_iteration());
//! assert_eq!(view.cache().lock_owner(), Some(LockOwner::new(7)));
//! # Ok::<(), stripe_cache::Error>(())
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use stripe_cache::{CacheBuilder, Distribution, HashFunction};
//!
//! let cache = CacheBuilder::new()
//!     .shard_count(32)?  // Must be power of two
//!     .concurrency_level(100)? // Rounded up to 128 stripes
//!     .hash_function(HashFunction::AHash)
//!     .distribution(Distribution::Segments(64))?
//!     .build::<String, i32>()?;
//! assert_eq!(cache.lock_container().stripe_count(), 128);
//! # Ok::<(), stripe_cache::Error>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

/// Store handle, listeners and lock owners.
pub mod cache;
/// Visitable read commands.
pub mod command;
/// Configuration and builder types.
pub mod config;
/// Sharded backing container.
pub mod container;
/// Entry snapshots.
pub mod entry;
/// Error types.
pub mod error;
/// Behavioural flags.
pub mod flags;
/// Hash function implementations.
pub mod hash;
/// Container iterators.
pub mod iter;
/// Striped lock container.
pub mod lock;
/// Distribution segment mapping.
pub mod segment;
/// Internal shard implementation.
mod shard;
/// Statistics and metrics collection.
pub mod stats;
/// Entry processing pipelines.
pub mod stream;
/// Live entry-set view.
pub mod view;

// Re-export main types
pub use cache::{Cache, CacheEvent, CacheListener, EventKind, Key, LockOwner, Value};
pub use command::{
    Command, CommandResult, EntrySetCommand, InvocationContext, LoadType, Performer, SizeCommand,
    Visitor,
};
pub use config::{CacheBuilder, CacheConfig, Distribution, HashFunction};
pub use container::DataContainer;
pub use entry::{AsEntry, CacheEntry};
pub use error::{Error, Result};
pub use flags::Flags;
pub use hash::KeyHasher;
pub use iter::{ContainerIter, ContainerSplitIter};
pub use lock::{Interrupt, StripeGuard, StripeHandle, StripedLockContainer};
pub use segment::{HashSegmentMapper, KeySegmenter, SegmentMapper};
pub use stats::{ShardOps, Stats, StripeOps};
pub use stream::EntryStream;
pub use view::{EntryIter, EntryView};

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_basic_operations() {
        let cache = Cache::new();

        // Put
        assert!(cache.put("key1", "value1").unwrap().is_none());
        assert_eq!(cache.put("key1", "value2").unwrap().unwrap().as_ref(), &"value1");

        // Get
        assert_eq!(cache.get(&"key1").unwrap().as_ref(), &"value2");
        assert!(cache.get(&"nonexistent").is_none());

        // Remove
        assert_eq!(cache.remove(&"key1").unwrap().unwrap().as_ref(), &"value2");
        assert!(cache.get(&"key1").is_none());
    }

    #[test]
    fn test_replace_only_existing() {
        let cache = Cache::new();
        assert!(cache.replace(&"k", 1).unwrap().is_none());
        assert!(cache.get(&"k").is_none());

        cache.put("k", 1).unwrap();
        assert_eq!(*cache.replace(&"k", 2).unwrap().unwrap(), 1);
        assert_eq!(*cache.get(&"k").unwrap(), 2);
    }

    #[test]
    fn test_builder() {
        let cache = CacheBuilder::new()
            .shard_count(8)
            .unwrap()
            .concurrency_level(5)
            .unwrap()
            .build::<String, i32>()
            .unwrap();

        cache.put("test".to_string(), 42).unwrap();
        assert_eq!(*cache.get(&"test".to_string()).unwrap(), 42);
        assert_eq!(cache.data_container().shard_count(), 8);
        assert_eq!(cache.lock_container().stripe_count(), 8);
    }

    #[test]
    fn test_builder_rejects_bad_values() {
        assert_eq!(
            CacheBuilder::new().shard_count(3).err(),
            Some(Error::InvalidShardCount)
        );
        assert_eq!(
            CacheBuilder::new().concurrency_level(0).err(),
            Some(Error::InvalidConcurrencyLevel(0))
        );
        assert_eq!(
            CacheBuilder::new()
                .distribution(Distribution::Segments(0))
                .err(),
            Some(Error::InvalidSegmentCount)
        );
    }

    #[test]
    fn test_mutation_times_out_on_held_stripe() {
        let cache = CacheBuilder::new()
            .lock_acquisition_timeout(Duration::from_millis(20))
            .build::<&str, i32>()
            .unwrap();

        let locks = cache.lock_container();
        locks.acquire(&"k", Duration::from_millis(10)).unwrap();

        let err = cache.put("k", 1).unwrap_err();
        assert!(matches!(err, Error::LockTimeout { .. }));
        assert!(cache.get(&"k").is_none());

        // SKIP_LOCKING goes straight to the container.
        cache.with_flags(Flags::SKIP_LOCKING).put("k", 1).unwrap();
        assert_eq!(*cache.get(&"k").unwrap(), 1);

        locks.release(&"k");
        cache.put("k", 2).unwrap();
    }

    #[test]
    fn test_lock_as_conflict() {
        let cache = Cache::<u32, u32>::new();
        let bound = cache.lock_as(LockOwner::new(1)).unwrap();
        assert!(bound.lock_as(LockOwner::new(1)).is_ok());
        assert_eq!(
            bound.lock_as(LockOwner::new(2)).unwrap_err(),
            Error::OwnerConflict {
                bound: LockOwner::new(1),
                requested: LockOwner::new(2),
            }
        );
    }
}
