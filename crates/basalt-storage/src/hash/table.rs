//! Disk-resident extendible hash table.
//!
//! The table is built entirely out of buffer-pool pages in three tiers:
//! a header page fans the top bits of a key's hash out to directory
//! pages; a directory maps the low `global_depth` bits to bucket pages;
//! buckets hold the actual pairs. Buckets split (raising local and, when
//! needed, global depth) as they fill, and merge with their split images
//! (shrinking the directory) as they empty.
//!
//! Latch ordering is strictly top-down. An insert write-latches header,
//! then directory, then drops the header before latching the bucket,
//! keeping the root hot path short; a remove holds the header read-only.
//! The consistent order across operations prevents latch cycles.

use std::marker::PhantomData;
use std::sync::Arc;

use basalt_common::constants::{HASH_DIRECTORY_MAX_DEPTH, HASH_HEADER_MAX_DEPTH};
use basalt_common::types::{FixedCodec, PageId};
use tracing::debug;

use super::bucket_page::{bucket_capacity, BucketPage, BucketPageRef};
use super::directory_page::{DirectoryPage, DirectoryPageRef};
use super::header_page::{HeaderPage, HeaderPageRef};
use super::key::{KeyComparator, KeyHasher};
use crate::buffer::{BufferError, BufferPool, BufferResult, WritePageGuard};

/// Shape parameters for an extendible hash table.
#[derive(Debug, Clone)]
pub struct HashTableOptions {
    /// Bits of hash the header routes on.
    pub header_max_depth: u32,
    /// Maximum global depth a directory may reach.
    pub directory_max_depth: u32,
    /// Pairs per bucket page.
    pub bucket_max_size: u32,
}

impl HashTableOptions {
    /// Validates the options against the page-layout limits for the
    /// given key/value encoding.
    pub fn validate<K: FixedCodec, V: FixedCodec>(&self) -> Result<(), String> {
        if self.header_max_depth > HASH_HEADER_MAX_DEPTH {
            return Err(format!(
                "header_max_depth {} exceeds limit {HASH_HEADER_MAX_DEPTH}",
                self.header_max_depth
            ));
        }
        if self.directory_max_depth > HASH_DIRECTORY_MAX_DEPTH {
            return Err(format!(
                "directory_max_depth {} exceeds limit {HASH_DIRECTORY_MAX_DEPTH}",
                self.directory_max_depth
            ));
        }
        if self.bucket_max_size == 0 || self.bucket_max_size > bucket_capacity::<K, V>() {
            return Err(format!(
                "bucket_max_size {} outside 1..={}",
                self.bucket_max_size,
                bucket_capacity::<K, V>()
            ));
        }
        Ok(())
    }
}

impl Default for HashTableOptions {
    fn default() -> Self {
        Self {
            header_max_depth: HASH_HEADER_MAX_DEPTH,
            directory_max_depth: HASH_DIRECTORY_MAX_DEPTH,
            bucket_max_size: 64,
        }
    }
}

/// Disk-resident extendible hash table over the buffer pool.
///
/// Generic over the key and value encodings, the key comparator, and the
/// 32-bit key hasher. Keys are unique: inserting a present key fails and
/// leaves the stored value untouched.
pub struct ExtendibleHashTable<K, V, C, H> {
    name: String,
    pool: Arc<BufferPool>,
    cmp: C,
    hasher: H,
    header_page_id: PageId,
    directory_max_depth: u32,
    bucket_max_size: u32,
    _marker: PhantomData<(K, V)>,
}

impl<K, V, C, H> ExtendibleHashTable<K, V, C, H>
where
    K: FixedCodec,
    V: FixedCodec,
    C: KeyComparator<K>,
    H: KeyHasher<K>,
{
    /// Creates a table, allocating and initializing its header page.
    pub fn new(
        name: impl Into<String>,
        pool: Arc<BufferPool>,
        cmp: C,
        hasher: H,
        options: HashTableOptions,
    ) -> BufferResult<Self> {
        options
            .validate::<K, V>()
            .map_err(BufferError::config)?;

        let mut header_guard = pool.new_page()?.upgrade_write();
        let header_page_id = header_guard.page_id();
        HeaderPage::new(header_guard.data_mut()).init(options.header_max_depth);
        drop(header_guard);

        let name = name.into();
        debug!(table = %name, header = %header_page_id, "created hash table");
        Ok(Self {
            name,
            pool,
            cmp,
            hasher,
            header_page_id,
            directory_max_depth: options.directory_max_depth,
            bucket_max_size: options.bucket_max_size,
            _marker: PhantomData,
        })
    }

    /// Returns the table's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the header page id.
    pub fn header_page_id(&self) -> PageId {
        self.header_page_id
    }

    /// Looks a key up.
    pub fn get(&self, key: &K) -> BufferResult<Option<V>> {
        let hash = self.hasher.hash_key(key);

        let header_guard = self.pool.fetch_page_read(self.header_page_id)?;
        let header = HeaderPageRef::new(header_guard.data());
        let directory_page_id = header.directory_page_id(header.hash_to_directory_index(hash));
        if !directory_page_id.is_valid() {
            return Ok(None);
        }

        let directory_guard = self.pool.fetch_page_read(directory_page_id)?;
        let directory = DirectoryPageRef::new(directory_guard.data());
        let bucket_page_id = directory.bucket_page_id(directory.hash_to_bucket_index(hash));
        if !bucket_page_id.is_valid() {
            return Ok(None);
        }

        let bucket_guard = self.pool.fetch_page_read(bucket_page_id)?;
        let bucket = BucketPageRef::<K, V>::new(bucket_guard.data());
        Ok(bucket.lookup(key, &self.cmp))
    }

    /// Inserts a pair. Fails on a duplicate key, or when the needed split
    /// would push the directory past its maximum depth.
    pub fn insert(&self, key: &K, value: &V) -> BufferResult<bool> {
        let hash = self.hasher.hash_key(key);

        let mut header_guard = self.pool.fetch_page_write(self.header_page_id)?;
        let directory_index =
            HeaderPageRef::new(header_guard.data()).hash_to_directory_index(hash);
        let directory_page_id =
            HeaderPageRef::new(header_guard.data()).directory_page_id(directory_index);

        if !directory_page_id.is_valid() {
            return self.insert_to_new_directory(&mut header_guard, directory_index, hash, key, value);
        }

        let mut directory_guard = self.pool.fetch_page_write(directory_page_id)?;
        let mut bucket_index =
            DirectoryPageRef::new(directory_guard.data()).hash_to_bucket_index(hash);
        let bucket_page_id =
            DirectoryPageRef::new(directory_guard.data()).bucket_page_id(bucket_index);

        if !bucket_page_id.is_valid() {
            return self.insert_to_new_bucket(&mut directory_guard, bucket_index, key, value);
        }

        // The directory slot is settled; the header is no longer needed.
        drop(header_guard);

        let mut bucket_guard = self.pool.fetch_page_write(bucket_page_id)?;
        {
            let bucket = BucketPageRef::<K, V>::new(bucket_guard.data());
            if bucket.lookup(key, &self.cmp).is_some() {
                return Ok(false);
            }
        }

        // Split until the target bucket has room.
        while BucketPageRef::<K, V>::new(bucket_guard.data()).is_full() {
            let (global_depth, local_depth) = {
                let directory = DirectoryPageRef::new(directory_guard.data());
                (directory.global_depth(), directory.local_depth(bucket_index))
            };
            if local_depth == global_depth {
                if global_depth == self.directory_max_depth {
                    // Directory is saturated; fail before allocating
                    // anything for this round.
                    debug!(table = %self.name, "insert failed: directory at maximum depth");
                    return Ok(false);
                }
                DirectoryPage::new(directory_guard.data_mut()).incr_global_depth();
            }

            let mut new_bucket_guard = self.pool.new_page()?.upgrade_write();
            let new_bucket_page_id = new_bucket_guard.page_id();
            BucketPage::<K, V>::new(new_bucket_guard.data_mut()).init(self.bucket_max_size);

            let (new_local_depth, local_depth_mask) = {
                let mut directory = DirectoryPage::new(directory_guard.data_mut());
                directory.incr_local_depth(bucket_index);
                (
                    directory.local_depth(bucket_index),
                    directory.local_depth_mask(bucket_index),
                )
            };
            debug!(
                table = %self.name,
                bucket = %bucket_guard.page_id(),
                new_bucket = %new_bucket_page_id,
                depth = new_local_depth,
                "splitting bucket"
            );

            Self::update_directory_mapping(
                &mut directory_guard,
                bucket_index,
                new_bucket_page_id,
                new_local_depth,
                local_depth_mask,
            );
            let new_bucket_index = bucket_index & (local_depth_mask as usize >> 1);
            self.migrate_entries(
                &mut bucket_guard,
                &mut new_bucket_guard,
                new_bucket_index,
                local_depth_mask,
            );

            // Re-aim at the key's bucket; it may be the new page now.
            let (target_index, target_page_id) = {
                let directory = DirectoryPageRef::new(directory_guard.data());
                let index = directory.hash_to_bucket_index(hash);
                (index, directory.bucket_page_id(index))
            };
            bucket_index = target_index;
            if target_page_id == new_bucket_page_id {
                bucket_guard = new_bucket_guard;
            }
        }

        Ok(BucketPage::<K, V>::new(bucket_guard.data_mut()).insert(key, value, &self.cmp))
    }

    /// Removes a key's pair. Empty buckets merge with their split images
    /// and the directory shrinks while it can.
    pub fn remove(&self, key: &K) -> BufferResult<bool> {
        let hash = self.hasher.hash_key(key);

        let header_guard = self.pool.fetch_page_read(self.header_page_id)?;
        let header = HeaderPageRef::new(header_guard.data());
        let directory_page_id = header.directory_page_id(header.hash_to_directory_index(hash));
        if !directory_page_id.is_valid() {
            return Ok(false);
        }

        let mut directory_guard = self.pool.fetch_page_write(directory_page_id)?;
        let mut bucket_index =
            DirectoryPageRef::new(directory_guard.data()).hash_to_bucket_index(hash);
        let mut bucket_page_id =
            DirectoryPageRef::new(directory_guard.data()).bucket_page_id(bucket_index);
        if !bucket_page_id.is_valid() {
            return Ok(false);
        }

        let mut bucket_guard = Some(self.pool.fetch_page_write(bucket_page_id)?);
        let removed = BucketPage::<K, V>::new(bucket_guard.as_mut().unwrap().data_mut())
            .remove(key, &self.cmp);

        // Merge cascade: while the current bucket is empty, fold it into
        // its split image, then follow the merged bucket's own image.
        loop {
            {
                let guard = bucket_guard.as_ref().unwrap();
                if !BucketPageRef::<K, V>::new(guard.data()).is_empty() {
                    break;
                }
            }
            // Unpin before the directory rewires or deletes the page.
            bucket_guard = None;

            let local_depth =
                DirectoryPageRef::new(directory_guard.data()).local_depth(bucket_index);
            if local_depth == 0 {
                break;
            }

            let (merge_index, merge_local_depth, merge_page_id) = {
                let directory = DirectoryPageRef::new(directory_guard.data());
                let merge_index = directory.split_image_index(bucket_index);
                (
                    merge_index,
                    directory.local_depth(merge_index),
                    directory.bucket_page_id(merge_index),
                )
            };
            if merge_local_depth != local_depth {
                break;
            }

            let new_local_depth = local_depth - 1;
            debug!(
                table = %self.name,
                bucket = %bucket_page_id,
                into = %merge_page_id,
                depth = new_local_depth,
                "merging empty bucket"
            );
            {
                let mut directory = DirectoryPage::new(directory_guard.data_mut());
                let start = bucket_index & ((directory.local_depth_mask(bucket_index) as usize) >> 1);
                let step = 1usize << new_local_depth;
                let mut i = start;
                while i < directory.size() {
                    directory.set_bucket_page_id(i, merge_page_id);
                    directory.set_local_depth(i, new_local_depth as u8);
                    i += step;
                }
            }
            self.pool.delete_page(bucket_page_id);

            if new_local_depth == 0 {
                break;
            }
            let (next_index, next_page_id) = {
                let directory = DirectoryPageRef::new(directory_guard.data());
                let next_index = directory.split_image_index(merge_index);
                (next_index, directory.bucket_page_id(next_index))
            };
            if !next_page_id.is_valid() {
                break;
            }
            bucket_guard = Some(self.pool.fetch_page_write(next_page_id)?);
            bucket_index = next_index;
            bucket_page_id = next_page_id;
        }
        drop(bucket_guard);

        {
            let mut directory = DirectoryPage::new(directory_guard.data_mut());
            while directory.can_shrink() {
                directory.decr_global_depth();
            }
        }

        Ok(removed)
    }

    /// Checks the depth and sharing invariants of every reachable
    /// directory, panicking on violation. Test support.
    pub fn verify_integrity(&self) -> BufferResult<()> {
        let header_guard = self.pool.fetch_page_read(self.header_page_id)?;
        let header = HeaderPageRef::new(header_guard.data());

        for i in 0..header.max_size() {
            let directory_page_id = header.directory_page_id(i);
            if !directory_page_id.is_valid() {
                continue;
            }
            let directory_guard = self.pool.fetch_page_read(directory_page_id)?;
            let directory = DirectoryPageRef::new(directory_guard.data());
            assert!(directory.global_depth() <= directory.max_depth());
            directory.verify_integrity();
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Private helpers
    // -------------------------------------------------------------------------

    /// First insert routed to an empty header slot: builds the directory
    /// and its first bucket, then inserts.
    fn insert_to_new_directory(
        &self,
        header_guard: &mut WritePageGuard<'_>,
        directory_index: usize,
        hash: u32,
        key: &K,
        value: &V,
    ) -> BufferResult<bool> {
        let mut directory_guard = self.pool.new_page()?.upgrade_write();
        let directory_page_id = directory_guard.page_id();
        DirectoryPage::new(directory_guard.data_mut()).init(self.directory_max_depth);
        HeaderPage::new(header_guard.data_mut())
            .set_directory_page_id(directory_index, directory_page_id);

        debug!(table = %self.name, directory = %directory_page_id, "created directory");
        let bucket_index =
            DirectoryPageRef::new(directory_guard.data()).hash_to_bucket_index(hash);
        self.insert_to_new_bucket(&mut directory_guard, bucket_index, key, value)
    }

    /// Insert routed to an empty directory slot: builds a depth-0 bucket
    /// and inserts into it.
    fn insert_to_new_bucket(
        &self,
        directory_guard: &mut WritePageGuard<'_>,
        bucket_index: usize,
        key: &K,
        value: &V,
    ) -> BufferResult<bool> {
        let mut bucket_guard = self.pool.new_page()?.upgrade_write();
        let bucket_page_id = bucket_guard.page_id();
        let mut bucket = BucketPage::<K, V>::new(bucket_guard.data_mut());
        bucket.init(self.bucket_max_size);

        let mut directory = DirectoryPage::new(directory_guard.data_mut());
        directory.set_bucket_page_id(bucket_index, bucket_page_id);
        directory.set_local_depth(bucket_index, 0);

        Ok(bucket.insert(key, value, &self.cmp))
    }

    /// Rewires the directory after a split: every slot in the new
    /// bucket's equivalence class points at the new page, and both halves
    /// of the old class adopt the raised local depth.
    fn update_directory_mapping(
        directory_guard: &mut WritePageGuard<'_>,
        old_bucket_index: usize,
        new_bucket_page_id: PageId,
        new_local_depth: u32,
        local_depth_mask: u32,
    ) {
        let mut directory = DirectoryPage::new(directory_guard.data_mut());

        let new_class = old_bucket_index & (local_depth_mask as usize >> 1);
        let mut sibling = new_class | (1 << (new_local_depth - 1));
        let step = 1usize << new_local_depth;

        let mut i = new_class;
        while i < directory.size() {
            directory.set_bucket_page_id(i, new_bucket_page_id);
            directory.set_local_depth(i, new_local_depth as u8);
            directory.set_local_depth(sibling, new_local_depth as u8);
            i += step;
            sibling += step;
        }
    }

    /// Moves every pair whose hash falls in the new bucket's class from
    /// the old bucket to the new one.
    fn migrate_entries(
        &self,
        old_bucket_guard: &mut WritePageGuard<'_>,
        new_bucket_guard: &mut WritePageGuard<'_>,
        new_bucket_index: usize,
        local_depth_mask: u32,
    ) {
        let mut old_bucket = BucketPage::<K, V>::new(old_bucket_guard.data_mut());
        let mut new_bucket = BucketPage::<K, V>::new(new_bucket_guard.data_mut());

        let mut i = 0;
        while i < old_bucket.size() {
            let (key, value) = old_bucket.entry_at(i);
            if (self.hasher.hash_key(&key) & local_depth_mask) as usize == new_bucket_index {
                new_bucket.insert(&key, &value, &self.cmp);
                old_bucket.remove_at(i);
            } else {
                i += 1;
            }
        }
    }
}

impl<K, V, C, H> std::fmt::Debug for ExtendibleHashTable<K, V, C, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtendibleHashTable")
            .field("name", &self.name)
            .field("header_page_id", &self.header_page_id)
            .field("directory_max_depth", &self.directory_max_depth)
            .field("bucket_max_size", &self.bucket_max_size)
            .finish()
    }
}
