use std::sync::Arc;
use stripe_cache::DataContainer;

#[test]
fn test_basic_put_get() {
    let container = DataContainer::new();

    assert!(container.put("key1", "value1").is_none());
    assert_eq!(*container.get(&"key1").unwrap(), "value1");

    // Overwrite
    assert_eq!(*container.put("key1", "value2").unwrap(), "value1");
    assert_eq!(*container.get(&"key1").unwrap(), "value2");
    assert_eq!(container.size(), 1);
}

#[test]
fn test_remove() {
    let container = DataContainer::new();

    container.put("key1", "value1");
    assert_eq!(*container.remove(&"key1").unwrap(), "value1");
    assert!(container.get(&"key1").is_none());
    assert!(container.remove(&"key1").is_none());
    assert!(container.is_empty());
}

#[test]
fn test_remove_if() {
    let container = DataContainer::new();

    container.put("key", 1);
    assert!(container.remove_if(&"key", &2).is_none());
    assert_eq!(container.size(), 1);
    assert_eq!(*container.remove_if(&"key", &1).unwrap(), 1);
    assert_eq!(container.size(), 0);
}

#[test]
fn test_replace() {
    let container = DataContainer::new();

    assert!(container.replace(&"key", Arc::new(1)).is_none());
    assert!(!container.contains_key(&"key"));

    container.put("key", 1);
    assert_eq!(*container.replace(&"key", Arc::new(2)).unwrap(), 1);
    assert_eq!(container.size(), 1);
}

#[test]
fn test_get_entry_is_a_snapshot() {
    let container = DataContainer::new();
    container.put("key", 1);

    let entry = container.get_entry(&"key").unwrap();
    container.put("key", 2);
    assert_eq!(**entry.value(), 1);
    assert_eq!(*entry.key(), "key");
}

#[test]
fn test_iter_sees_all_entries() {
    let container = Arc::new(DataContainer::new());
    for i in 0..100 {
        container.put(i, i * 10);
    }

    let mut seen: Vec<_> = container.iter().map(|e| (*e.key(), **e.value())).collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..100).map(|i| (i, i * 10)).collect::<Vec<_>>());
}

#[test]
fn test_split_until_exhausted() {
    let container = Arc::new(DataContainer::new());
    for i in 0..64 {
        container.put(i, i);
    }

    let mut parts = vec![container.split_iter()];
    while let Some(part) = parts.last_mut().unwrap().try_split() {
        parts.push(part);
    }
    // 16 shards: halving always leaves one shard in the last part.
    assert!(parts.len() > 1);

    let total: usize = parts.into_iter().map(|p| p.count()).sum();
    assert_eq!(total, 64);
}
