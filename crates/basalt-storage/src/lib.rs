//! # basalt-storage
//!
//! Storage-engine core for BasaltDB.
//!
//! This crate implements the page-caching subsystem and the disk-resident
//! index that sits on top of it:
//!
//! - **Disk layer**: block-granular page I/O behind a worker-thread
//!   scheduler with one-shot completion channels
//! - **Buffer pool**: a fixed set of in-memory frames, LRU-K replacement,
//!   and scoped page guards that unpin (and unlatch) on drop
//! - **Extendible hashing**: header / directory / bucket page layouts and a
//!   `get`/`insert`/`remove` hash table built entirely out of buffer-pool
//!   pages

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Buffer pool, replacement policy, and page guards
pub mod buffer;

/// Disk manager and request scheduler
pub mod disk;

/// Extendible hash table and its page layouts
pub mod hash;
