//! System-wide constants for the BasaltDB storage core.

// =============================================================================
// Page Geometry
// =============================================================================

/// Page size in bytes (4 KB).
///
/// Every frame in the buffer pool and every block on disk is exactly one
/// page. The hash-table page layouts below are sized against this value.
pub const PAGE_SIZE: usize = 4 * 1024;

// =============================================================================
// Hash Table Layout Bounds
// =============================================================================

/// Maximum depth of a hash-table header page.
///
/// A header page stores `1 << depth` directory page ids (8 bytes each)
/// after a 4-byte depth field; depth 8 (256 ids, 2052 bytes) is the largest
/// power of two that fits a 4 KB page.
pub const HASH_HEADER_MAX_DEPTH: u32 = 8;

/// Maximum depth of a hash-table directory page.
///
/// A directory page stores two 4-byte depth fields, `1 << depth` local
/// depth bytes, and `1 << depth` bucket page ids (8 bytes each); depth 8
/// (256 entries, 2312 bytes) is the largest power of two that fits.
pub const HASH_DIRECTORY_MAX_DEPTH: u32 = 8;

/// Byte offset of the entry array inside a bucket page (after the
/// `size` and `max_size` fields).
pub const HASH_BUCKET_HEADER_SIZE: usize = 8;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size() {
        assert!(PAGE_SIZE.is_power_of_two());
    }

    #[test]
    fn test_header_fits_page() {
        let bytes = 4 + (1usize << HASH_HEADER_MAX_DEPTH) * 8;
        assert!(bytes <= PAGE_SIZE);
    }

    #[test]
    fn test_directory_fits_page() {
        let entries = 1usize << HASH_DIRECTORY_MAX_DEPTH;
        let bytes = 4 + 4 + entries + entries * 8;
        assert!(bytes <= PAGE_SIZE);
    }
}
