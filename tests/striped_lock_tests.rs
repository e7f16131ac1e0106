use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};
use stripe_cache::lock::stripes_for;
use stripe_cache::{Error, StripedLockContainer};

#[test]
fn test_stripe_count_examples() {
    assert_eq!(StripedLockContainer::new(1).unwrap().stripe_count(), 1);
    assert_eq!(StripedLockContainer::new(5).unwrap().stripe_count(), 8);
    assert_eq!(StripedLockContainer::new(8).unwrap().stripe_count(), 8);
    assert_eq!(StripedLockContainer::new(9).unwrap().stripe_count(), 16);
    assert!(matches!(
        StripedLockContainer::new(0),
        Err(Error::InvalidConcurrencyLevel(0))
    ));
}

#[test]
fn test_index_is_deterministic_and_in_range() {
    let locks = StripedLockContainer::new(16).unwrap();
    for i in 0..1000 {
        let key = format!("key_{}", i);
        let index = locks.index_for(&key);
        assert!(index < locks.stripe_count());
        assert_eq!(index, locks.index_for(&key));
    }
}

#[test]
fn test_keys_spread_across_stripes() {
    let locks = StripedLockContainer::new(16).unwrap();
    let mut counts = vec![0usize; locks.stripe_count()];
    for i in 0..1600u64 {
        counts[locks.index_for(&i)] += 1;
    }

    // ~100 per stripe; sequential integers must not cluster.
    let max = *counts.iter().max().unwrap();
    let min = *counts.iter().min().unwrap();
    assert!(max < 160, "stripe distribution too uneven (max: {})", max);
    assert!(min > 50, "stripe distribution too uneven (min: {})", min);
}

#[test]
fn test_release_lets_another_thread_acquire() {
    let locks = Arc::new(StripedLockContainer::new(8).unwrap());

    let handle = locks.acquire(&"key", Duration::from_millis(10)).unwrap();
    assert_eq!(handle.index(), locks.index_for(&"key"));
    locks.release(&"key");

    let other = {
        let locks = Arc::clone(&locks);
        thread::spawn(move || {
            let start = Instant::now();
            let acquired = locks.acquire(&"key", Duration::from_secs(1));
            let waited = start.elapsed();
            locks.release(&"key");
            (acquired.is_some(), waited)
        })
    };

    let (acquired, waited) = other.join().unwrap();
    assert!(acquired);
    assert!(waited < Duration::from_millis(500));
}

#[test]
fn test_release_from_another_thread_wakes_waiter() {
    let locks = Arc::new(StripedLockContainer::new(8).unwrap());
    locks.acquire(&"key", Duration::from_millis(10)).unwrap();

    let (tx, rx) = mpsc::channel();
    let waiter = {
        let locks = Arc::clone(&locks);
        thread::spawn(move || {
            tx.send(()).unwrap();
            let acquired = locks.acquire(&"key", Duration::from_secs(5)).is_some();
            if acquired {
                locks.release(&"key");
            }
            acquired
        })
    };

    rx.recv().unwrap();
    thread::sleep(Duration::from_millis(20));
    locks.release(&"key");

    assert!(waiter.join().unwrap());
}

#[test]
fn test_distinct_stripes_do_not_block() {
    let locks = Arc::new(StripedLockContainer::new(16).unwrap());

    // Find two keys that land on different stripes.
    let first = "key_0".to_string();
    let second = (1..)
        .map(|i| format!("key_{}", i))
        .find(|k| locks.index_for(k) != locks.index_for(&first))
        .unwrap();

    locks.acquire(&first, Duration::from_millis(10)).unwrap();

    let other = {
        let locks = Arc::clone(&locks);
        thread::spawn(move || {
            let start = Instant::now();
            let acquired = locks.acquire(&second, Duration::from_secs(1)).is_some();
            let waited = start.elapsed();
            locks.release(&second);
            (acquired, waited)
        })
    };

    let (acquired, waited) = other.join().unwrap();
    assert!(acquired);
    assert!(waited < Duration::from_millis(500));
    locks.release(&first);
}

#[test]
fn test_timed_acquire_on_held_stripe_gives_up() {
    let locks = Arc::new(StripedLockContainer::new(4).unwrap());
    locks.acquire(&"key", Duration::from_millis(10)).unwrap();

    let other = {
        let locks = Arc::clone(&locks);
        thread::spawn(move || {
            let start = Instant::now();
            let acquired = locks.acquire(&"key", Duration::from_millis(50));
            (acquired, start.elapsed())
        })
    };

    let (acquired, waited) = other.join().unwrap();
    assert!(acquired.is_none());
    assert!(waited >= Duration::from_millis(50));
    assert!(locks.is_locked(&"key"));
    locks.release(&"key");
}

#[test]
fn test_mutual_exclusion_under_contention() {
    let locks = Arc::new(StripedLockContainer::new(1).unwrap());
    let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let inside = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(8));
    let mut handles = vec![];

    for t in 0..8 {
        let locks = Arc::clone(&locks);
        let counter = Arc::clone(&counter);
        let inside = Arc::clone(&inside);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            for i in 0..200 {
                // A single stripe: every key contends.
                let key = (t, i);
                let _guard = locks.lock(&key, Duration::from_secs(10)).unwrap();
                assert_eq!(inside.fetch_add(1, std::sync::atomic::Ordering::SeqCst), 0);
                counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                inside.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(counter.load(std::sync::atomic::Ordering::Relaxed), 1600);
    assert_eq!(locks.num_locks_held(), 0);
}

#[test]
fn test_stripes_for_matches_container() {
    for level in [1, 2, 3, 7, 31, 32, 33, 1000] {
        let locks = StripedLockContainer::new(level).unwrap();
        assert_eq!(locks.stripe_count(), stripes_for(level).unwrap());
    }
}
