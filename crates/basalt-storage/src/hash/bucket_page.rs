//! Hash table bucket page layout.
//!
//! A bucket stores up to `max_size` fixed-width (key, value) pairs as a
//! dense array. Keys and values are encoded via [`FixedCodec`]; a pair
//! occupies `K::ENCODED_LEN + V::ENCODED_LEN` bytes.
//!
//! # Layout
//!
//! ```text
//! Offset  Size              Field
//! ------  ----              -----
//!   0       4               size (live pairs)
//!   4       4               max_size
//!   8       pair * max_size pairs, dense
//! ```

use std::marker::PhantomData;

use basalt_common::constants::{HASH_BUCKET_HEADER_SIZE, PAGE_SIZE};
use basalt_common::types::FixedCodec;

use super::key::KeyComparator;

const SIZE_OFFSET: usize = 0;
const MAX_SIZE_OFFSET: usize = 4;

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Largest `max_size` a bucket for the given pair width can be
/// initialized with.
pub fn bucket_capacity<K: FixedCodec, V: FixedCodec>() -> u32 {
    ((PAGE_SIZE - HASH_BUCKET_HEADER_SIZE) / (K::ENCODED_LEN + V::ENCODED_LEN)) as u32
}

macro_rules! bucket_read_accessors {
    () => {
        /// Returns the number of live pairs.
        #[inline]
        pub fn size(&self) -> u32 {
            read_u32(self.data, SIZE_OFFSET)
        }

        /// Returns the bucket's capacity.
        #[inline]
        pub fn max_size(&self) -> u32 {
            read_u32(self.data, MAX_SIZE_OFFSET)
        }

        /// Returns true if no further pair fits.
        #[inline]
        pub fn is_full(&self) -> bool {
            self.size() >= self.max_size()
        }

        /// Returns true if the bucket holds no pairs.
        #[inline]
        pub fn is_empty(&self) -> bool {
            self.size() == 0
        }

        /// Decodes the key at an index.
        #[inline]
        pub fn key_at(&self, index: u32) -> K {
            K::decode_from(&self.data[Self::key_offset(index)..])
        }

        /// Decodes the value at an index.
        #[inline]
        pub fn value_at(&self, index: u32) -> V {
            V::decode_from(&self.data[Self::value_offset(index)..])
        }

        /// Decodes the pair at an index.
        #[inline]
        pub fn entry_at(&self, index: u32) -> (K, V) {
            (self.key_at(index), self.value_at(index))
        }

        /// Looks a key up, returning its value if present.
        pub fn lookup<C: KeyComparator<K>>(&self, key: &K, cmp: &C) -> Option<V> {
            (0..self.size())
                .find(|&i| cmp.eq(&self.key_at(i), key))
                .map(|i| self.value_at(i))
        }

        #[inline]
        fn pair_size() -> usize {
            K::ENCODED_LEN + V::ENCODED_LEN
        }

        #[inline]
        fn key_offset(index: u32) -> usize {
            HASH_BUCKET_HEADER_SIZE + index as usize * Self::pair_size()
        }

        #[inline]
        fn value_offset(index: u32) -> usize {
            Self::key_offset(index) + K::ENCODED_LEN
        }
    };
}

/// Read-only view of a bucket page.
#[derive(Debug)]
pub struct BucketPageRef<'a, K, V> {
    data: &'a [u8],
    _marker: PhantomData<(K, V)>,
}

impl<'a, K: FixedCodec, V: FixedCodec> BucketPageRef<'a, K, V> {
    /// Creates a read-only view over the page bytes.
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            _marker: PhantomData,
        }
    }

    bucket_read_accessors!();
}

/// Mutable view of a bucket page.
#[derive(Debug)]
pub struct BucketPage<'a, K, V> {
    data: &'a mut [u8],
    _marker: PhantomData<(K, V)>,
}

impl<'a, K: FixedCodec, V: FixedCodec> BucketPage<'a, K, V> {
    /// Creates a mutable view over the page bytes.
    #[inline]
    pub fn new(data: &'a mut [u8]) -> Self {
        Self {
            data,
            _marker: PhantomData,
        }
    }

    bucket_read_accessors!();

    /// Initializes an empty bucket with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `max_size` pairs would not fit the page.
    pub fn init(&mut self, max_size: u32) {
        assert!(
            max_size <= bucket_capacity::<K, V>(),
            "bucket capacity {max_size} does not fit a page (limit {})",
            bucket_capacity::<K, V>()
        );
        write_u32(self.data, SIZE_OFFSET, 0);
        write_u32(self.data, MAX_SIZE_OFFSET, max_size);
    }

    /// Inserts a pair. Fails on a full bucket or a duplicate key.
    pub fn insert<C: KeyComparator<K>>(&mut self, key: &K, value: &V, cmp: &C) -> bool {
        if self.is_full() || self.lookup(key, cmp).is_some() {
            return false;
        }

        let index = self.size();
        key.encode_into(&mut self.data[Self::key_offset(index)..]);
        value.encode_into(&mut self.data[Self::value_offset(index)..]);
        write_u32(self.data, SIZE_OFFSET, index + 1);
        true
    }

    /// Removes a key's pair if present.
    pub fn remove<C: KeyComparator<K>>(&mut self, key: &K, cmp: &C) -> bool {
        match (0..self.size()).find(|&i| cmp.eq(&self.key_at(i), key)) {
            Some(index) => {
                self.remove_at(index);
                true
            }
            None => false,
        }
    }

    /// Removes the pair at an index, shifting later pairs left.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn remove_at(&mut self, index: u32) {
        let size = self.size();
        assert!(index < size, "bucket index {index} out of bounds ({size})");

        let pair = Self::pair_size();
        let start = Self::key_offset(index);
        let end = Self::key_offset(size);
        self.data.copy_within(start + pair..end, start);
        write_u32(self.data, SIZE_OFFSET, size - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::key::OrdComparator;

    fn new_bucket(buf: &mut [u8], max_size: u32) -> BucketPage<'_, u64, u64> {
        let mut bucket = BucketPage::new(buf);
        bucket.init(max_size);
        bucket
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut buf = vec![0u8; PAGE_SIZE];
        let mut bucket = new_bucket(&mut buf, 4);
        let cmp = OrdComparator;

        assert!(bucket.insert(&1, &10, &cmp));
        assert!(bucket.insert(&2, &20, &cmp));
        assert_eq!(bucket.size(), 2);
        assert_eq!(bucket.lookup(&1, &cmp), Some(10));
        assert_eq!(bucket.lookup(&2, &cmp), Some(20));
        assert_eq!(bucket.lookup(&3, &cmp), None);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut buf = vec![0u8; PAGE_SIZE];
        let mut bucket = new_bucket(&mut buf, 4);
        let cmp = OrdComparator;

        assert!(bucket.insert(&1, &10, &cmp));
        assert!(!bucket.insert(&1, &99, &cmp));
        // The stored value is untouched.
        assert_eq!(bucket.lookup(&1, &cmp), Some(10));
    }

    #[test]
    fn test_full_bucket_rejects() {
        let mut buf = vec![0u8; PAGE_SIZE];
        let mut bucket = new_bucket(&mut buf, 2);
        let cmp = OrdComparator;

        assert!(bucket.insert(&1, &10, &cmp));
        assert!(bucket.insert(&2, &20, &cmp));
        assert!(bucket.is_full());
        assert!(!bucket.insert(&3, &30, &cmp));
    }

    #[test]
    fn test_remove_shifts_left() {
        let mut buf = vec![0u8; PAGE_SIZE];
        let mut bucket = new_bucket(&mut buf, 4);
        let cmp = OrdComparator;

        for k in 1..=4u64 {
            assert!(bucket.insert(&k, &(k * 10), &cmp));
        }
        assert!(bucket.remove(&2, &cmp));
        assert!(!bucket.remove(&2, &cmp));

        assert_eq!(bucket.size(), 3);
        assert_eq!(bucket.entry_at(0), (1, 10));
        assert_eq!(bucket.entry_at(1), (3, 30));
        assert_eq!(bucket.entry_at(2), (4, 40));
    }

    #[test]
    fn test_remove_all_empties() {
        let mut buf = vec![0u8; PAGE_SIZE];
        let mut bucket = new_bucket(&mut buf, 3);
        let cmp = OrdComparator;

        for k in [5u64, 6, 7] {
            bucket.insert(&k, &0, &cmp);
        }
        for k in [6u64, 5, 7] {
            assert!(bucket.remove(&k, &cmp));
        }
        assert!(bucket.is_empty());
    }

    #[test]
    fn test_capacity_bound() {
        // u64/u64 pairs are 16 bytes; (4096 - 8) / 16 = 255.
        assert_eq!(bucket_capacity::<u64, u64>(), 255);
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn test_oversized_capacity_panics() {
        let mut buf = vec![0u8; PAGE_SIZE];
        let _ = new_bucket(&mut buf, 1000);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_remove_at_out_of_bounds_panics() {
        let mut buf = vec![0u8; PAGE_SIZE];
        let mut bucket = new_bucket(&mut buf, 2);
        bucket.remove_at(0);
    }
}
