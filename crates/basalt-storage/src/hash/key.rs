//! Key hashing and comparison seams for the hash table.
//!
//! The table is generic over how keys are hashed to 32 bits and how they
//! are compared, so tests can pin keys to chosen directory slots and
//! callers can plug in collation-aware comparators.

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Compares two keys.
pub trait KeyComparator<K>: Send + Sync + Clone {
    /// Three-way comparison of `a` and `b`.
    fn compare(&self, a: &K, b: &K) -> Ordering;

    /// Returns true if `a` and `b` compare equal.
    #[inline]
    fn eq(&self, a: &K, b: &K) -> bool {
        self.compare(a, b) == Ordering::Equal
    }
}

/// Comparator delegating to the key's `Ord` implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrdComparator;

impl<K: Ord> KeyComparator<K> for OrdComparator {
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

/// Hashes a key to 32 bits.
pub trait KeyHasher<K>: Send + Sync + Clone {
    /// Returns the 32-bit hash of `key`.
    fn hash_key(&self, key: &K) -> u32;
}

/// Hasher delegating to the key's `Hash` implementation, folded to 32
/// bits. No distribution assumptions are made; collisions are handled by
/// directory and bucket growth.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultKeyHasher;

impl<K: Hash> KeyHasher<K> for DefaultKeyHasher {
    fn hash_key(&self, key: &K) -> u32 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let h = hasher.finish();
        (h ^ (h >> 32)) as u32
    }
}

/// Hasher that uses the key's own low 32 bits as its hash.
///
/// Deterministic bucket placement: a key `k` lands in directory slot
/// `k & ((1 << global_depth) - 1)`, which lets tests drive specific split
/// and merge sequences.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityKeyHasher;

macro_rules! impl_identity_hasher {
    ($($ty:ty),*) => {
        $(
            impl KeyHasher<$ty> for IdentityKeyHasher {
                #[inline]
                fn hash_key(&self, key: &$ty) -> u32 {
                    *key as u32
                }
            }
        )*
    };
}

impl_identity_hasher!(u16, u32, u64, i16, i32, i64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ord_comparator() {
        let cmp = OrdComparator;
        assert_eq!(cmp.compare(&1, &2), Ordering::Less);
        assert_eq!(cmp.compare(&2, &2), Ordering::Equal);
        assert!(KeyComparator::eq(&cmp, &7u64, &7u64));
    }

    #[test]
    fn test_default_hasher_is_deterministic() {
        let hasher = DefaultKeyHasher;
        assert_eq!(hasher.hash_key(&42u64), hasher.hash_key(&42u64));
        // Not a guarantee in general, but a sanity check that distinct
        // keys do not trivially collapse.
        assert_ne!(hasher.hash_key(&1u64), hasher.hash_key(&2u64));
    }

    #[test]
    fn test_identity_hasher() {
        let hasher = IdentityKeyHasher;
        assert_eq!(hasher.hash_key(&0b10u32), 0b10);
        assert_eq!(hasher.hash_key(&0xFFFF_FFFF_0000_0001u64), 1);
        assert_eq!(hasher.hash_key(&-1i32), u32::MAX);
    }
}
