//! Statistics and diagnostics types.

#[cfg(feature = "metrics")]
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-shard operation statistics for the data container.
#[derive(Debug, Clone, Default)]
pub struct ShardOps {
    /// Number of read hits on this shard.
    pub reads: u64,
    /// Number of inserts on this shard.
    pub writes: u64,
    /// Number of removes on this shard.
    pub removes: u64,
}

/// Per-stripe lock statistics for the lock container.
#[derive(Debug, Clone, Default)]
pub struct StripeOps {
    /// Successful acquisitions (0 when metrics feature disabled).
    pub acquisitions: u64,
    /// Acquisitions that gave up after their timeout (0 when metrics disabled).
    pub timeouts: u64,
    /// Cumulative wait time in nanoseconds (0 when lock-timing disabled).
    pub wait_nanos: u64,
}

/// Thread-safe statistics tracker for a single container shard.
#[cfg(feature = "metrics")]
pub(crate) struct ShardStats {
    reads: AtomicU64,
    writes: AtomicU64,
    removes: AtomicU64,
}

#[cfg(feature = "metrics")]
impl ShardStats {
    pub fn new() -> Self {
        Self {
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            removes: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_remove(&self) {
        self.removes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ShardOps {
        ShardOps {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
        }
    }
}

/// Thread-safe statistics tracker for a single lock stripe.
#[cfg(feature = "metrics")]
pub(crate) struct StripeStats {
    acquisitions: AtomicU64,
    timeouts: AtomicU64,
    #[cfg(feature = "lock-timing")]
    wait_nanos: AtomicU64,
}

#[cfg(feature = "metrics")]
impl StripeStats {
    pub fn new() -> Self {
        Self {
            acquisitions: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            #[cfg(feature = "lock-timing")]
            wait_nanos: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_acquisition(&self) {
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    #[allow(unused_variables)]
    pub fn record_wait(&self, nanos: u64) {
        #[cfg(feature = "lock-timing")]
        self.wait_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StripeOps {
        StripeOps {
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            #[cfg(feature = "lock-timing")]
            wait_nanos: self.wait_nanos.load(Ordering::Relaxed),
            #[cfg(not(feature = "lock-timing"))]
            wait_nanos: 0,
        }
    }
}

/// Zero-sized placeholder when metrics are disabled.
#[cfg(not(feature = "metrics"))]
pub(crate) struct ShardStats;

#[cfg(not(feature = "metrics"))]
impl ShardStats {
    pub fn new() -> Self {
        ShardStats
    }

    #[inline]
    pub fn record_read(&self) {}

    #[inline]
    pub fn record_write(&self) {}

    #[inline]
    pub fn record_remove(&self) {}

    pub fn snapshot(&self) -> ShardOps {
        ShardOps::default()
    }
}

/// Zero-sized placeholder when metrics are disabled.
#[cfg(not(feature = "metrics"))]
pub(crate) struct StripeStats;

#[cfg(not(feature = "metrics"))]
impl StripeStats {
    pub fn new() -> Self {
        StripeStats
    }

    #[inline]
    pub fn record_acquisition(&self) {}

    #[inline]
    pub fn record_timeout(&self) {}

    #[inline]
    pub fn record_wait(&self, _nanos: u64) {}

    pub fn snapshot(&self) -> StripeOps {
        StripeOps::default()
    }
}

/// Aggregate statistics for a data container.
#[derive(Debug, Clone)]
pub struct Stats {
    /// Total number of entries across all shards.
    pub size: usize,
    /// Number of entries in each shard.
    pub shard_sizes: Vec<usize>,
    /// Operation counts for each shard.
    pub operations: Vec<ShardOps>,
}
