//! Hash table directory page layout.
//!
//! A directory page maps the low `global_depth` bits of a key's hash to a
//! bucket page. Each slot also records the bucket's `local_depth` — how
//! many low bits that bucket actually commits to. Multiple slots may share
//! one bucket whenever `local_depth < global_depth`.
//!
//! # Layout
//!
//! ```text
//! Offset  Size      Field
//! ------  ----      -----
//!   0       4       max_depth
//!   4       4       global_depth
//!   8       C       local_depths (C = 2^HASH_DIRECTORY_MAX_DEPTH, one byte each)
//!   8+C     8 * C   bucket_page_ids
//! ```
//!
//! The arrays are sized for the compile-time capacity so field offsets do
//! not depend on the runtime `max_depth`. Unassigned slots hold
//! `PageId::INVALID`.

use basalt_common::constants::HASH_DIRECTORY_MAX_DEPTH;
use basalt_common::types::PageId;

/// Slot capacity of a directory page.
pub const DIRECTORY_CAPACITY: usize = 1 << HASH_DIRECTORY_MAX_DEPTH;

const MAX_DEPTH_OFFSET: usize = 0;
const GLOBAL_DEPTH_OFFSET: usize = 4;
const LOCAL_DEPTHS_OFFSET: usize = 8;
const IDS_OFFSET: usize = LOCAL_DEPTHS_OFFSET + DIRECTORY_CAPACITY;
const ID_SIZE: usize = 8;

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

fn read_id(data: &[u8], index: usize) -> PageId {
    let off = IDS_OFFSET + index * ID_SIZE;
    PageId::from_le_bytes(data[off..off + ID_SIZE].try_into().unwrap())
}

macro_rules! directory_read_accessors {
    () => {
        /// Returns the maximum depth this directory may grow to.
        #[inline]
        pub fn max_depth(&self) -> u32 {
            read_u32(self.data, MAX_DEPTH_OFFSET)
        }

        /// Returns the current global depth.
        #[inline]
        pub fn global_depth(&self) -> u32 {
            read_u32(self.data, GLOBAL_DEPTH_OFFSET)
        }

        /// Returns the number of live directory slots, `2^global_depth`.
        #[inline]
        pub fn size(&self) -> usize {
            1 << self.global_depth()
        }

        /// Returns the slot capacity, `2^max_depth`.
        #[inline]
        pub fn max_size(&self) -> usize {
            1 << self.max_depth()
        }

        /// Returns the slot a hash routes to: its low `global_depth` bits.
        #[inline]
        pub fn hash_to_bucket_index(&self, hash: u32) -> usize {
            (hash as usize) & (self.size() - 1)
        }

        /// Returns the bucket page id in a slot.
        #[inline]
        pub fn bucket_page_id(&self, index: usize) -> PageId {
            read_id(self.data, index)
        }

        /// Returns the local depth recorded for a slot.
        #[inline]
        pub fn local_depth(&self, index: usize) -> u32 {
            self.data[LOCAL_DEPTHS_OFFSET + index] as u32
        }

        /// Returns the mask selecting the bits the directory indexes by.
        #[inline]
        pub fn global_depth_mask(&self) -> u32 {
            (1u32 << self.global_depth()) - 1
        }

        /// Returns the mask selecting the bits a slot's bucket commits to.
        #[inline]
        pub fn local_depth_mask(&self, index: usize) -> u32 {
            (1u32 << self.local_depth(index)) - 1
        }

        /// Returns the split image of a slot: the slot differing only in
        /// the highest bit the bucket commits to.
        ///
        /// # Panics
        ///
        /// Panics if the slot's local depth is zero (a depth-0 bucket has
        /// no split image).
        #[inline]
        pub fn split_image_index(&self, index: usize) -> usize {
            let local_depth = self.local_depth(index);
            assert!(local_depth > 0, "depth-0 bucket has no split image");
            let mask = self.local_depth_mask(index) as usize;
            (index & mask) ^ (1 << (local_depth - 1))
        }

        /// Returns true if the directory can halve: global depth positive
        /// and no bucket using all `global_depth` bits.
        pub fn can_shrink(&self) -> bool {
            if self.global_depth() == 0 {
                return false;
            }
            (0..self.size()).all(|i| self.local_depth(i) < self.global_depth())
        }

        /// Checks the structural invariants, panicking on violation:
        /// every slot's local depth is bounded by the global depth, each
        /// bucket appears exactly `2^(global - local)` times, and all
        /// slots sharing a bucket agree on its local depth.
        pub fn verify_integrity(&self) {
            use std::collections::HashMap;

            let mut id_counts: HashMap<PageId, usize> = HashMap::new();
            let mut id_depths: HashMap<PageId, u32> = HashMap::new();

            for i in 0..self.size() {
                let local_depth = self.local_depth(i);
                assert!(
                    local_depth <= self.global_depth(),
                    "slot {i}: local depth {local_depth} exceeds global depth {}",
                    self.global_depth()
                );

                let page_id = self.bucket_page_id(i);
                if !page_id.is_valid() {
                    continue;
                }
                *id_counts.entry(page_id).or_insert(0) += 1;
                let prev = id_depths.insert(page_id, local_depth);
                if let Some(prev) = prev {
                    assert_eq!(
                        prev, local_depth,
                        "bucket {page_id} has inconsistent local depths"
                    );
                }
            }

            for (page_id, count) in id_counts {
                let expected = 1usize << (self.global_depth() - id_depths[&page_id]);
                assert_eq!(
                    count, expected,
                    "bucket {page_id} appears {count} times, expected {expected}"
                );
            }
        }
    };
}

/// Read-only view of a directory page.
#[derive(Debug)]
pub struct DirectoryPageRef<'a> {
    data: &'a [u8],
}

impl<'a> DirectoryPageRef<'a> {
    /// Creates a read-only view over the page bytes.
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    directory_read_accessors!();
}

/// Mutable view of a directory page.
#[derive(Debug)]
pub struct DirectoryPage<'a> {
    data: &'a mut [u8],
}

impl<'a> DirectoryPage<'a> {
    /// Creates a mutable view over the page bytes.
    #[inline]
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data }
    }

    directory_read_accessors!();

    /// Initializes the directory at global depth 0 with every slot empty.
    ///
    /// # Panics
    ///
    /// Panics if `max_depth` exceeds [`HASH_DIRECTORY_MAX_DEPTH`].
    pub fn init(&mut self, max_depth: u32) {
        assert!(
            max_depth <= HASH_DIRECTORY_MAX_DEPTH,
            "directory depth {max_depth} exceeds limit {HASH_DIRECTORY_MAX_DEPTH}"
        );
        self.data[MAX_DEPTH_OFFSET..MAX_DEPTH_OFFSET + 4]
            .copy_from_slice(&max_depth.to_le_bytes());
        self.set_global_depth(0);
        for i in 0..(1usize << max_depth) {
            self.set_bucket_page_id(i, PageId::INVALID);
            self.set_local_depth(i, 0);
        }
    }

    /// Installs a bucket page id in a slot.
    #[inline]
    pub fn set_bucket_page_id(&mut self, index: usize, page_id: PageId) {
        let off = IDS_OFFSET + index * ID_SIZE;
        self.data[off..off + ID_SIZE].copy_from_slice(&page_id.to_le_bytes());
    }

    /// Records a slot's local depth.
    #[inline]
    pub fn set_local_depth(&mut self, index: usize, local_depth: u8) {
        self.data[LOCAL_DEPTHS_OFFSET + index] = local_depth;
    }

    /// Increments a slot's local depth.
    #[inline]
    pub fn incr_local_depth(&mut self, index: usize) {
        self.data[LOCAL_DEPTHS_OFFSET + index] += 1;
    }

    /// Decrements a slot's local depth.
    #[inline]
    pub fn decr_local_depth(&mut self, index: usize) {
        self.data[LOCAL_DEPTHS_OFFSET + index] -= 1;
    }

    /// Doubles the directory: the upper half becomes a copy of the lower
    /// half (same bucket ids, same local depths).
    ///
    /// # Panics
    ///
    /// Panics if the directory is already at its maximum depth.
    pub fn incr_global_depth(&mut self) {
        let global_depth = self.global_depth();
        assert!(
            global_depth < self.max_depth(),
            "directory already at maximum depth {global_depth}"
        );

        let half = 1usize << global_depth;
        for i in half..(half * 2) {
            let page_id = self.bucket_page_id(i - half);
            let local_depth = self.local_depth(i - half) as u8;
            self.set_bucket_page_id(i, page_id);
            self.set_local_depth(i, local_depth);
        }
        self.set_global_depth(global_depth + 1);
    }

    /// Halves the directory; the upper half becomes invisible.
    ///
    /// # Panics
    ///
    /// Panics if the global depth is already zero.
    pub fn decr_global_depth(&mut self) {
        let global_depth = self.global_depth();
        assert!(global_depth > 0, "directory already at depth 0");
        self.set_global_depth(global_depth - 1);
    }

    #[inline]
    fn set_global_depth(&mut self, global_depth: u32) {
        self.data[GLOBAL_DEPTH_OFFSET..GLOBAL_DEPTH_OFFSET + 4]
            .copy_from_slice(&global_depth.to_le_bytes());
    }
}
