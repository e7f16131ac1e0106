use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use stripe_cache::{Cache, DataContainer, EntrySetCommand, Flags, InvocationContext};

#[test]
fn test_concurrent_puts() {
    let cache = Cache::new();
    let mut handles = vec![];

    // Spawn 10 threads, each inserting 100 items
    for thread_id in 0..10 {
        let cache = cache.clone();
        let handle = thread::spawn(move || {
            for i in 0..100 {
                let key = format!("thread_{}_key_{}", thread_id, i);
                cache.put(key, i).unwrap();
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }

    // Verify all items are present
    assert_eq!(cache.size(), 1000);
    assert_eq!(cache.entry_set().unwrap().iter().count(), 1000);
}

#[test]
fn test_concurrent_reads() {
    let cache = Cache::new();

    for i in 0..100 {
        cache.put(format!("key_{}", i), i).unwrap();
    }

    let mut handles = vec![];

    // Spawn 20 threads, each reading all items
    for _ in 0..20 {
        let cache = cache.clone();
        let handle = thread::spawn(move || {
            let view = cache.entry_set().unwrap();
            for i in 0..100 {
                let key = format!("key_{}", i);
                assert_eq!(*cache.get(&key).unwrap(), i);
                assert!(view.contains(&(key, i)));
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_each_entry_removed_exactly_once() {
    let cache = Cache::new();
    for i in 0..1000 {
        cache.put(i, i).unwrap();
    }

    let removed = Arc::new(AtomicUsize::new(0));
    let mut handles = vec![];

    // Every thread tries to remove every entry through its own iterator.
    for _ in 0..8 {
        let cache = cache.clone();
        let removed = Arc::clone(&removed);
        let handle = thread::spawn(move || {
            let view = cache.entry_set().unwrap();
            let mut iter = view.iter();
            while iter.next().is_some() {
                if iter.remove().unwrap() {
                    removed.fetch_add(1, Ordering::Relaxed);
                }
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(removed.load(Ordering::Relaxed), 1000);
    assert!(cache.is_empty());
}

#[test]
fn test_stale_removals_lose_to_writers() {
    let cache = Cache::new();
    for i in 0..500 {
        cache.put(i, 0).unwrap();
    }

    // Snapshot the pairs, then bump every value before removing.
    let view = cache.entry_set().unwrap();
    let stale: Vec<_> = view.iter().collect();

    let writer = {
        let cache = cache.clone();
        thread::spawn(move || {
            for i in 0..500 {
                cache.put(i, 1).unwrap();
            }
        })
    };
    writer.join().unwrap();

    let mut handles = vec![];
    for chunk in stale.chunks(100) {
        let chunk = chunk.to_vec();
        let view = cache.entry_set().unwrap();
        handles.push(thread::spawn(move || {
            chunk.iter().filter(|e| view.remove(*e).unwrap()).count()
        }));
    }

    let removed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(removed, 0);
    assert_eq!(cache.size(), 500);
}

#[test]
fn test_concurrent_mixed_operations() {
    let cache = Cache::new();
    let mut handles = vec![];

    // Spawn writers
    for thread_id in 0..5 {
        let cache = cache.clone();
        let handle = thread::spawn(move || {
            for i in 0..100 {
                let key = format!("key_{}_{}", thread_id, i);
                cache.put(key, i).unwrap();
            }
        });
        handles.push(handle);
    }

    // Spawn iterators running alongside the writers
    for _ in 0..5 {
        let cache = cache.clone();
        let handle = thread::spawn(move || {
            let view = cache.entry_set().unwrap();
            for _ in 0..50 {
                // Weakly consistent: never fails, never exceeds the final size.
                let seen = view.iter().count();
                assert!(seen <= 500);
                let _ = view.parallel_stream().count();
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.size(), 500);
}

#[test]
fn test_size_bounded_by_live_keys_without_stripe_locks() {
    let cache = Cache::<u32, u32>::new().with_flags(Flags::SKIP_LOCKING);
    let view = EntrySetCommand::new(cache.clone(), Flags::SKIP_LOCKING)
        .perform(&InvocationContext::new())
        .unwrap();
    let stop = Arc::new(AtomicBool::new(false));

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..5000 {
                    if (i + t) % 2 == 0 {
                        cache.put(7, i).unwrap();
                    } else {
                        cache.remove(&7).unwrap();
                    }
                }
            })
        })
        .collect();

    let sampler = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut max = 0;
            while !stop.load(Ordering::Relaxed) {
                max = max.max(view.size());
            }
            max
        })
    };

    for writer in writers {
        writer.join().unwrap();
    }
    stop.store(true, Ordering::Relaxed);

    assert!(sampler.join().unwrap() <= 1);
    assert_eq!(cache.size(), usize::from(cache.contains_key(&7)));
}

#[test]
fn test_container_size_bounded_under_racing_put_remove() {
    let container = Arc::new(DataContainer::<u32, u32>::new());
    let stop = Arc::new(AtomicBool::new(false));

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let container = Arc::clone(&container);
            thread::spawn(move || {
                for i in 0..5000 {
                    if (i + t) % 2 == 0 {
                        container.put(1, i);
                    } else {
                        container.remove(&1);
                    }
                }
            })
        })
        .collect();

    let sampler = {
        let container = Arc::clone(&container);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut max = 0;
            while !stop.load(Ordering::Relaxed) {
                max = max.max(container.size());
            }
            max
        })
    };

    for writer in writers {
        writer.join().unwrap();
    }
    stop.store(true, Ordering::Relaxed);

    assert!(sampler.join().unwrap() <= 1);
    assert_eq!(container.size(), container.iter().count());
}
