use proptest::prelude::*;
use stripe_cache::lock::{stripes_for, MAX_CONCURRENCY_LEVEL};
use stripe_cache::StripedLockContainer;

proptest! {
    #[test]
    fn prop_stripe_count_is_smallest_power_of_two(level in 1usize..=MAX_CONCURRENCY_LEVEL) {
        let count = stripes_for(level).unwrap();
        prop_assert!(count.is_power_of_two());
        prop_assert!(count >= level);
        // Halving would drop below the requested level.
        prop_assert!(count == 1 || count / 2 < level);
    }

    #[test]
    fn prop_index_in_range_and_stable(level in 1usize..=1024, keys in proptest::collection::vec(any::<String>(), 1..50)) {
        let locks = StripedLockContainer::new(level).unwrap();
        for key in &keys {
            let index = locks.index_for(key);
            prop_assert!(index < locks.stripe_count());
            prop_assert_eq!(index, locks.index_for(key));
        }
    }
}
