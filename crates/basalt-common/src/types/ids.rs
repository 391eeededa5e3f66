//! Identifier types for the storage core.
//!
//! Newtypes keep the different id spaces from mixing: a page id is not a
//! slot number, and neither is a bare integer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one page of the database file.
///
/// `PageId` itself is just the name; allocation is owned by the buffer
/// pool, which hands ids out densely from a monotonic counter starting
/// at 0 and never reuses one. Because ids are dense, a page id doubles
/// as the page's block position on disk. The all-ones value is reserved
/// as [`PageId::INVALID`] and marks empty frames and unassigned slots in
/// index pages.
///
/// # Example
///
/// ```rust
/// use basalt_common::types::PageId;
///
/// let page = PageId::new(42);
/// assert_eq!(page.as_u64(), 42);
/// assert!(page.is_valid());
/// assert!(!PageId::INVALID.is_valid());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PageId(u64);

impl PageId {
    /// Reserved sentinel; never names a real page.
    pub const INVALID: Self = Self(u64::MAX);

    /// Wraps a raw id.
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Unwraps to the raw id.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// True unless this is the [`PageId::INVALID`] sentinel.
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }

    /// Decodes an id from its on-page little-endian form.
    #[inline]
    pub fn from_le_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_le_bytes(bytes))
    }

    /// Encodes the id in its on-page little-endian form.
    #[inline]
    pub fn to_le_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }
}

impl fmt::Debug for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "PageId({})", self.0)
        } else {
            f.write_str("PageId(INVALID)")
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            fmt::Display::fmt(&self.0, f)
        } else {
            f.write_str("invalid")
        }
    }
}

/// Record identifier - names a tuple slot within a page.
///
/// This is the natural value type for an index: a lookup resolves a key to
/// the page and slot where the record lives.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId {
    page_id: PageId,
    slot: u32,
}

impl RecordId {
    /// Invalid record ID constant.
    pub const INVALID: Self = Self {
        page_id: PageId::INVALID,
        slot: u32::MAX,
    };

    /// Creates a new `RecordId`.
    #[inline]
    pub const fn new(page_id: PageId, slot: u32) -> Self {
        Self { page_id, slot }
    }

    /// Returns the page the record lives on.
    #[inline]
    pub const fn page_id(self) -> PageId {
        self.page_id
    }

    /// Returns the slot number within the page.
    #[inline]
    pub const fn slot(self) -> u32 {
        self.slot
    }

    /// Checks if this is a valid record ID.
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.page_id.is_valid()
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "RecordId(INVALID)")
        } else {
            write!(f, "RecordId({}:{})", self.page_id, self.slot)
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.page_id, self.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id() {
        let page = PageId::new(42);
        assert_eq!(page.as_u64(), 42);
        assert!(page.is_valid());
        assert!(!PageId::INVALID.is_valid());

        // On-page byte form round-trips, sentinel included.
        assert_eq!(PageId::from_le_bytes(page.to_le_bytes()), page);
        assert_eq!(
            PageId::from_le_bytes(PageId::INVALID.to_le_bytes()),
            PageId::INVALID
        );
    }

    #[test]
    fn test_page_id_ordering() {
        assert!(PageId::new(1) < PageId::new(2));
        // The sentinel sorts above every real id.
        assert!(PageId::new(u64::MAX - 1) < PageId::INVALID);
    }

    #[test]
    fn test_record_id() {
        let rid = RecordId::new(PageId::new(3), 12);
        assert_eq!(rid.page_id(), PageId::new(3));
        assert_eq!(rid.slot(), 12);
        assert!(rid.is_valid());
        assert!(!RecordId::INVALID.is_valid());
    }

    #[test]
    fn test_formatting() {
        assert_eq!(format!("{:?}", PageId::new(7)), "PageId(7)");
        assert_eq!(format!("{:?}", PageId::INVALID), "PageId(INVALID)");
        assert_eq!(format!("{}", PageId::new(7)), "7");
        assert_eq!(format!("{}", PageId::INVALID), "invalid");
        assert_eq!(format!("{}", RecordId::new(PageId::new(1), 2)), "1:2");
    }
}
