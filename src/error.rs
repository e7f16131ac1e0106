use std::time::Duration;

use crate::cache::LockOwner;

/// Errors that can occur when configuring or operating on a cache.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The shard count is invalid (must be a power of two and greater than 0).
    #[error("shard count must be a power of two and greater than 0")]
    InvalidShardCount,
    /// The requested lock concurrency level is zero or too large.
    #[error("concurrency level {0} is out of range")]
    InvalidConcurrencyLevel(usize),
    /// Distribution was configured with zero segments.
    #[error("segment count must be greater than 0")]
    InvalidSegmentCount,
    /// A blocked stripe acquisition was interrupted before it succeeded.
    #[error("interrupted while waiting for a lock stripe")]
    Interrupted,
    /// A store mutation could not obtain its lock stripe in time.
    #[error("unable to acquire lock stripe {stripe} after {timeout:?}")]
    LockTimeout {
        /// Index of the contended stripe.
        stripe: usize,
        /// Timeout that elapsed.
        timeout: Duration,
    },
    /// The cache is already bound to a different lock owner.
    #[error("cache is bound to lock owner {bound}, cannot rebind to {requested}")]
    OwnerConflict {
        /// Owner the handle is bound to.
        bound: LockOwner,
        /// Owner that was requested.
        requested: LockOwner,
    },
    /// The operation is not available in the current mode.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    /// The operation was called at the wrong time.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),
}

/// Cache result.
pub type Result<T> = std::result::Result<T, Error>;
