use std::hash::{Hash, Hasher};

/// Hash function used for stripe, shard and segment assignment.
/// Uses an enum to avoid trait object limitations with generics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyHasher {
    /// AHash implementation (default, fast and well-distributed).
    #[default]
    AHash,
    /// FxHash implementation (faster but potentially less distributed).
    #[cfg(feature = "fxhash")]
    FxHash,
}

impl KeyHasher {
    /// Hash a key with the selected hash function.
    ///
    /// Keys are fixed per process, so the same key always produces the same
    /// hash for the lifetime of the cache.
    pub fn hash_key<K: Hash + ?Sized>(&self, key: &K) -> u64 {
        match self {
            KeyHasher::AHash => {
                let mut hasher = ahash::AHasher::default();
                key.hash(&mut hasher);
                hasher.finish()
            }
            #[cfg(feature = "fxhash")]
            KeyHasher::FxHash => {
                let mut hasher = fxhash::FxHasher::default();
                key.hash(&mut hasher);
                hasher.finish()
            }
        }
    }

    /// Hash a key down to 32 bits and run it through [`spread`].
    pub fn hash32<K: Hash + ?Sized>(&self, key: &K) -> u32 {
        let h = self.hash_key(key);
        spread((h ^ (h >> 32)) as u32)
    }
}

/// Avalanche step applied before extracting the top bits of a hash.
///
/// Native hashes of sequential integers and short strings tend to vary only in
/// the low bits; this pushes that entropy into the high bits.
#[inline]
pub fn spread(mut h: u32) -> u32 {
    h = h.wrapping_add(!(h << 9));
    h ^= h >> 14;
    h = h.wrapping_add(h << 4);
    h ^= h >> 10;
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        let hasher = KeyHasher::default();
        assert_eq!(hasher.hash_key("k1"), hasher.hash_key("k1"));
        assert_eq!(hasher.hash32(&42u64), hasher.hash32(&42u64));
    }

    #[test]
    fn test_spread_is_injective() {
        let outputs: std::collections::HashSet<u32> = (0u32..10_000).map(spread).collect();
        assert_eq!(outputs.len(), 10_000);
    }

    #[test]
    fn test_hash32_uses_high_bits() {
        let hasher = KeyHasher::default();
        let tops: std::collections::HashSet<u32> =
            (0u64..256).map(|i| hasher.hash32(&i) >> 28).collect();
        assert!(tops.len() > 8, "poor distribution: {:?}", tops);
    }
}
