//! Disk-resident extendible hashing for BasaltDB.
//!
//! Three page tiers implement the index, all living in the buffer pool:
//!
//! ```text
//! HeaderPage ──(top bits of hash)──▶ DirectoryPage ──(low bits)──▶ BucketPage
//!                                    global/local depths            (K, V) pairs
//! ```
//!
//! [`ExtendibleHashTable`] drives the tiers through page guards,
//! splitting buckets as they fill and merging them as they empty.
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use basalt_storage::buffer::{BufferPool, BufferPoolConfig};
//! use basalt_storage::disk::MemoryDiskManager;
//! use basalt_storage::hash::{
//!     DefaultKeyHasher, ExtendibleHashTable, HashTableOptions, OrdComparator,
//! };
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = Arc::new(BufferPool::new(
//!     BufferPoolConfig::new(64),
//!     MemoryDiskManager::new(),
//! )?);
//! let table: ExtendibleHashTable<u64, u64, _, _> = ExtendibleHashTable::new(
//!     "orders",
//!     pool,
//!     OrdComparator,
//!     DefaultKeyHasher,
//!     HashTableOptions::default(),
//! )?;
//!
//! table.insert(&1, &100)?;
//! assert_eq!(table.get(&1)?, Some(100));
//! table.remove(&1)?;
//! assert_eq!(table.get(&1)?, None);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

mod bucket_page;
mod directory_page;
mod header_page;
mod key;
mod table;

pub use bucket_page::{bucket_capacity, BucketPage, BucketPageRef};
pub use directory_page::{DirectoryPage, DirectoryPageRef, DIRECTORY_CAPACITY};
pub use header_page::{HeaderPage, HeaderPageRef};
pub use key::{DefaultKeyHasher, IdentityKeyHasher, KeyComparator, KeyHasher, OrdComparator};
pub use table::{ExtendibleHashTable, HashTableOptions};
