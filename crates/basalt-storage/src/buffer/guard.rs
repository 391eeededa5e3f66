//! Scoped page guards.
//!
//! A guard ties a page pin (and, for the read/write variants, a frame
//! latch) to a lexical scope. Dropping a guard unpins the page with the
//! dirty flag it accumulated; the latched variants release their latch
//! first, then unpin. Guards are move-only: ownership of the pin transfers
//! with the value and each pin is released exactly once.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use basalt_common::types::PageId;

use super::frame::{BufferFrame, FrameReadLatch, FrameWriteLatch};
use super::pool::BufferPool;

/// Basic page guard: holds a pin, no latch.
///
/// Useful for keeping a page resident across other work, or as the staging
/// state before [`upgrade_read`](Self::upgrade_read) /
/// [`upgrade_write`](Self::upgrade_write). Page data is only reachable
/// through the upgraded guards, which hold the frame latch.
pub struct PageGuard<'a> {
    pool: &'a BufferPool,
    frame: Arc<BufferFrame>,
    page_id: PageId,
    is_dirty: bool,
}

impl<'a> PageGuard<'a> {
    pub(crate) fn new(pool: &'a BufferPool, frame: Arc<BufferFrame>, page_id: PageId) -> Self {
        Self {
            pool,
            frame,
            page_id,
            is_dirty: false,
        }
    }

    /// Returns the guarded page's ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Flags the page as modified; the flag is passed to the pool on drop.
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    /// Acquires the frame's read latch, consuming this guard.
    ///
    /// Blocks while a write latch is held. The pin moves into the returned
    /// guard.
    pub fn upgrade_read(self) -> ReadPageGuard<'a> {
        let latch = self.frame.read_latch();
        ReadPageGuard { latch, guard: self }
    }

    /// Acquires the frame's write latch, consuming this guard.
    ///
    /// Blocks while any other latch is held. The pin moves into the
    /// returned guard.
    pub fn upgrade_write(self) -> WritePageGuard<'a> {
        let latch = self.frame.write_latch();
        WritePageGuard { latch, guard: self }
    }
}

impl Drop for PageGuard<'_> {
    fn drop(&mut self) {
        self.pool.unpin_page(self.page_id, self.is_dirty);
    }
}

impl std::fmt::Debug for PageGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageGuard")
            .field("page_id", &self.page_id)
            .field("is_dirty", &self.is_dirty)
            .finish()
    }
}

/// Read guard: a pinned page plus a held read latch.
///
/// Derefs to the page bytes. Any number of read guards on the same page
/// may coexist; a write guard excludes them all.
///
/// Field order matters: the latch is declared first so it is released
/// before the pin on drop.
pub struct ReadPageGuard<'a> {
    latch: FrameReadLatch,
    guard: PageGuard<'a>,
}

impl ReadPageGuard<'_> {
    /// Returns the guarded page's ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.guard.page_id
    }

    /// Returns the page bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.latch
    }
}

impl Deref for ReadPageGuard<'_> {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        &self.latch
    }
}

impl std::fmt::Debug for ReadPageGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadPageGuard")
            .field("page_id", &self.guard.page_id)
            .finish()
    }
}

/// Write guard: a pinned page plus a held write latch.
///
/// Derefs to the page bytes; any mutable access marks the page dirty, so
/// the pool writes it back before the frame is reused.
///
/// Field order matters: the latch is declared first so it is released
/// before the pin on drop.
pub struct WritePageGuard<'a> {
    latch: FrameWriteLatch,
    guard: PageGuard<'a>,
}

impl WritePageGuard<'_> {
    /// Returns the guarded page's ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.guard.page_id
    }

    /// Returns the page bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.latch
    }

    /// Returns the page bytes mutably, marking the page dirty.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.guard.is_dirty = true;
        &mut self.latch
    }

    /// Flags the page as modified without touching the bytes.
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.guard.is_dirty = true;
    }
}

impl Deref for WritePageGuard<'_> {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        &self.latch
    }
}

impl DerefMut for WritePageGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [u8] {
        self.guard.is_dirty = true;
        &mut self.latch
    }
}

impl std::fmt::Debug for WritePageGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WritePageGuard")
            .field("page_id", &self.guard.page_id)
            .field("is_dirty", &self.guard.is_dirty)
            .finish()
    }
}
