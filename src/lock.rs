//! Striped lock container.
//!
//! A fixed array of lock stripes shared by the whole key space. Each key maps to
//! exactly one stripe through [`KeyHasher::hash32`], so unrelated keys may
//! contend on the same stripe but memory stays bounded by the concurrency
//! level rather than the number of keys.

use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};
use crate::hash::KeyHasher;
use crate::stats::{StripeOps, StripeStats};

/// Largest concurrency level accepted by [`StripedLockContainer::new`].
pub const MAX_CONCURRENCY_LEVEL: usize = 1 << 16;

/// Upper bound on a single uninterrupted wait in
/// [`StripedLockContainer::acquire_interruptibly`].
const INTERRUPT_POLL: Duration = Duration::from_millis(2);

/// Smallest power of two that is at least `concurrency_level`.
///
/// # Example
///
/// ```rust
/// use stripe_cache::lock::stripes_for;
///
/// assert_eq!(stripes_for(5).unwrap(), 8);
/// assert_eq!(stripes_for(8).unwrap(), 8);
/// assert_eq!(stripes_for(1).unwrap(), 1);
/// ```
pub fn stripes_for(concurrency_level: usize) -> Result<usize> {
    if concurrency_level == 0 || concurrency_level > MAX_CONCURRENCY_LEVEL {
        return Err(Error::InvalidConcurrencyLevel(concurrency_level));
    }
    Ok(concurrency_level.next_power_of_two())
}

/// A cloneable cancellation handle for blocked stripe acquisitions.
///
/// Interrupting is sticky until an acquisition observes it; the observing
/// call returns [`Error::Interrupted`] and clears the flag.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    /// Create a handle that is not interrupted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that any acquisition waiting on this handle gives up.
    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether an interrupt is pending.
    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    fn take(&self) -> bool {
        self.flag.swap(false, Ordering::AcqRel)
    }
}

/// Proof that a stripe was acquired through [`StripedLockContainer::acquire`].
///
/// The handle does not unlock on drop; release by key with
/// [`StripedLockContainer::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripeHandle {
    index: usize,
}

impl StripeHandle {
    /// Index of the acquired stripe.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// RAII guard for a stripe; the stripe is released when the guard drops.
///
/// Releasing the same stripe by key while the guard is alive makes the drop
/// panic.
pub struct StripeGuard<'a> {
    index: usize,
    stripe: &'a Stripe,
}

impl Drop for StripeGuard<'_> {
    fn drop(&mut self) {
        self.stripe.unlock();
    }
}

impl StripeGuard<'_> {
    /// Index of the held stripe.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl std::fmt::Debug for StripeGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeGuard").field("index", &self.index).finish()
    }
}

/// Whole nanoseconds in `duration`, saturating at `u64::MAX`.
fn saturating_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// A binary semaphore: `held` is the lock state and `freed` wakes waiters.
///
/// Ownership is not tied to a thread, so a stripe may be released by a
/// different thread than the one that acquired it.
// Padded to a cache line so neighbouring stripes do not false-share.
#[repr(align(64))]
struct Stripe {
    held: Mutex<bool>,
    freed: Condvar,
    stats: StripeStats,
}

impl Stripe {
    fn new() -> Self {
        Self {
            held: Mutex::new(false),
            freed: Condvar::new(),
            stats: StripeStats::new(),
        }
    }

    /// Take the stripe, waiting at most `timeout`. Returns `false` on timeout.
    fn try_lock_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut held = self.held.lock();
        while *held {
            match deadline {
                Some(deadline) => {
                    if self.freed.wait_until(&mut held, deadline).timed_out() && *held {
                        return false;
                    }
                }
                None => self.freed.wait(&mut held),
            }
        }
        *held = true;
        true
    }

    /// # Panics
    ///
    /// Panics if the stripe is not held.
    fn unlock(&self) {
        let mut held = self.held.lock();
        assert!(*held, "released a lock stripe which is not held");
        *held = false;
        drop(held);
        self.freed.notify_one();
    }

    fn is_locked(&self) -> bool {
        *self.held.lock()
    }

    fn record_acquired(&self, start: Instant) {
        self.stats.record_acquisition();
        self.stats.record_wait(saturating_nanos(start.elapsed()));
    }
}

/// Fixed-size array of lock stripes indexed by a mixed hash of the key.
///
/// Stripes are not reentrant: acquiring a stripe the current thread already
/// holds waits out the timeout like any other contender.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use stripe_cache::StripedLockContainer;
///
/// let locks = StripedLockContainer::new(5)?;
/// assert_eq!(locks.stripe_count(), 8);
///
/// let handle = locks.acquire(&"key", Duration::from_millis(10)).expect("uncontended");
/// assert!(locks.is_locked(&"key"));
/// locks.release(&"key");
/// assert!(!locks.is_locked(&"key"));
/// # let _ = handle;
/// # Ok::<(), stripe_cache::Error>(())
/// ```
pub struct StripedLockContainer {
    stripes: Box<[Stripe]>,
    shift: u32,
    mask: u32,
    hasher: KeyHasher,
}

impl StripedLockContainer {
    /// Create a container with at least `concurrency_level` stripes.
    pub fn new(concurrency_level: usize) -> Result<Self> {
        Self::with_hasher(concurrency_level, KeyHasher::default())
    }

    /// Create a container using a specific hash function.
    pub fn with_hasher(concurrency_level: usize, hasher: KeyHasher) -> Result<Self> {
        let count = stripes_for(concurrency_level)?;
        let bits = count.trailing_zeros();
        let stripes = (0..count).map(|_| Stripe::new()).collect();

        Ok(Self {
            stripes,
            shift: 32 - bits,
            mask: (count - 1) as u32,
            hasher,
        })
    }

    /// Number of stripes. Always a power of two.
    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    /// Stripe index for a key, in `[0, stripe_count)`.
    #[inline]
    pub fn index_for<K: Hash + ?Sized>(&self, key: &K) -> usize {
        // A single stripe means a shift of 32, which wraps to 0; the mask is 0 then.
        (self.hasher.hash32(key).wrapping_shr(self.shift) & self.mask) as usize
    }

    /// Try to lock the stripe for `key` within `timeout`.
    ///
    /// Returns `None` if the timeout elapsed. On success the stripe stays
    /// locked until [`release`](Self::release) is called with a key that maps
    /// to the same stripe.
    pub fn acquire<K: Hash + ?Sized>(&self, key: &K, timeout: Duration) -> Option<StripeHandle> {
        let index = self.index_for(key);
        let stripe = &self.stripes[index];
        let start = Instant::now();

        if stripe.try_lock_for(timeout) {
            stripe.record_acquired(start);
            tracing::trace!("[lock]: acquired stripe {}", index);
            Some(StripeHandle { index })
        } else {
            stripe.stats.record_timeout();
            tracing::trace!("[lock]: timed out on stripe {} after {:?}", index, timeout);
            None
        }
    }

    /// Like [`acquire`](Self::acquire), but gives up with
    /// [`Error::Interrupted`] once `interrupt` is signalled.
    ///
    /// An interrupted call never leaves the stripe locked.
    pub fn acquire_interruptibly<K: Hash + ?Sized>(
        &self,
        key: &K,
        timeout: Duration,
        interrupt: &Interrupt,
    ) -> Result<Option<StripeHandle>> {
        let index = self.index_for(key);
        let stripe = &self.stripes[index];
        let start = Instant::now();
        let deadline = start.checked_add(timeout);

        loop {
            if interrupt.take() {
                tracing::debug!("[lock]: interrupted while waiting for stripe {}", index);
                return Err(Error::Interrupted);
            }

            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => INTERRUPT_POLL,
            };

            if stripe.try_lock_for(remaining.min(INTERRUPT_POLL)) {
                stripe.record_acquired(start);
                tracing::trace!("[lock]: acquired stripe {}", index);
                return Ok(Some(StripeHandle { index }));
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                stripe.stats.record_timeout();
                tracing::trace!("[lock]: timed out on stripe {} after {:?}", index, timeout);
                return Ok(None);
            }
        }
    }

    /// Unlock the stripe for `key`.
    ///
    /// # Panics
    ///
    /// Panics if the stripe is not locked. Any thread may release a held
    /// stripe; releasing one locked by a different owner is a caller error
    /// that this container cannot detect.
    pub fn release<K: Hash + ?Sized>(&self, key: &K) {
        let index = self.index_for(key);
        self.stripes[index].unlock();
        tracing::trace!("[lock]: released stripe {}", index);
    }

    /// Scoped variant of [`acquire`](Self::acquire): the stripe is released
    /// when the returned guard drops.
    pub fn lock<K: Hash + ?Sized>(&self, key: &K, timeout: Duration) -> Option<StripeGuard<'_>> {
        let index = self.index_for(key);
        let stripe = &self.stripes[index];
        let start = Instant::now();

        if stripe.try_lock_for(timeout) {
            stripe.record_acquired(start);
            Some(StripeGuard { index, stripe })
        } else {
            stripe.stats.record_timeout();
            None
        }
    }

    /// Whether the stripe for `key` is currently held by anyone.
    pub fn is_locked<K: Hash + ?Sized>(&self, key: &K) -> bool {
        self.stripes[self.index_for(key)].is_locked()
    }

    /// Number of stripes currently held.
    pub fn num_locks_held(&self) -> usize {
        self.stripes.iter().filter(|s| s.is_locked()).count()
    }

    /// Per-stripe statistics (zeroed unless the `metrics` feature is on).
    pub fn stats(&self) -> Vec<StripeOps> {
        self.stripes.iter().map(|s| s.stats.snapshot()).collect()
    }
}

impl std::fmt::Debug for StripedLockContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripedLockContainer")
            .field("stripes", &self.stripes.len())
            .field("held", &self.num_locks_held())
            .finish()
    }
}
