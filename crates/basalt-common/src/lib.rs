//! # basalt-common
//!
//! Common types and utilities for the BasaltDB storage core.
//!
//! This crate provides the foundational pieces shared across the storage
//! engine:
//!
//! - **Types**: core identifiers (`PageId`, `RecordId`) and the fixed-width
//!   `FixedCodec` used by on-page key/value storage
//! - **Constants**: page geometry and hash-layout capacity bounds
//!
//! ## Example
//!
//! ```rust
//! use basalt_common::types::{PageId, RecordId};
//!
//! let page_id = PageId::new(42);
//! let rid = RecordId::new(page_id, 7);
//! assert_eq!(rid.page_id(), page_id);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod constants;
pub mod types;

// Re-export commonly used items at the crate root
pub use constants::*;
pub use types::{FixedCodec, PageId, RecordId};
