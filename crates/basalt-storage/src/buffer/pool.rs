//! Buffer pool implementation.
//!
//! The buffer pool arbitrates all movement between in-memory frames and
//! the backing disk under a fixed frame budget: read-through on fetch,
//! write-back on eviction and flush, LRU-K victim selection.
//!
//! A single pool latch serializes every metadata mutation — page table,
//! free list, replacer calls, frame counters — and is held for the full
//! duration of each operation, including waits on the disk scheduler.
//! Frame data latches are only ever taken by page guards after the pool
//! latch is released, so no code path holds both.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use basalt_common::constants::PAGE_SIZE;
use basalt_common::types::PageId;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::config::BufferPoolConfig;
use super::error::{BufferError, BufferResult};
use super::frame::{BufferFrame, FrameId};
use super::guard::{PageGuard, ReadPageGuard, WritePageGuard};
use super::lru_k::LruKReplacer;
use super::BufferPoolStats;
use crate::disk::{DiskError, DiskManager, DiskScheduler};

/// State guarded by the pool latch.
struct PoolState {
    /// Page table: maps resident page ids to frames.
    page_table: HashMap<PageId, FrameId>,
    /// Frames not holding any page.
    free_list: VecDeque<FrameId>,
    /// Victim selection over occupied frames.
    replacer: LruKReplacer,
    /// Next page id to hand out; ids are never reused.
    next_page_id: u64,
}

/// The buffer pool manages page caching for the storage engine.
///
/// It provides:
/// - Read-through / write-back page caching over a disk scheduler
/// - LRU-K eviction among unpinned frames
/// - Scoped pin/latch management via page guards
pub struct BufferPool {
    /// Configuration.
    config: BufferPoolConfig,
    /// Array of buffer frames.
    frames: Vec<Arc<BufferFrame>>,
    /// Pool latch; held across disk waits.
    state: Mutex<PoolState>,
    /// Disk request scheduler.
    disk: DiskScheduler,
    /// Fetch counter for statistics.
    fetch_count: AtomicU64,
    /// Hit counter for statistics.
    hit_count: AtomicU64,
    /// Miss counter for statistics.
    miss_count: AtomicU64,
    /// Eviction counter for statistics.
    eviction_count: AtomicU64,
    /// Flush counter for statistics.
    flush_count: AtomicU64,
}

impl BufferPool {
    /// Creates a new buffer pool over the given disk manager.
    pub fn new<D: DiskManager + 'static>(
        config: BufferPoolConfig,
        disk_manager: D,
    ) -> BufferResult<Self> {
        config
            .validate()
            .map_err(|e| BufferError::config(e.to_string()))?;

        let num_frames = config.num_frames;
        let frames: Vec<Arc<BufferFrame>> = (0..num_frames)
            .map(|i| Arc::new(BufferFrame::new(FrameId::new(i), PAGE_SIZE)))
            .collect();

        Ok(Self {
            state: Mutex::new(PoolState {
                page_table: HashMap::with_capacity(num_frames),
                free_list: (0..num_frames).map(FrameId::new).collect(),
                replacer: LruKReplacer::new(num_frames, config.replacer_k),
                next_page_id: 0,
            }),
            config,
            frames,
            disk: DiskScheduler::new(disk_manager),
            fetch_count: AtomicU64::new(0),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            eviction_count: AtomicU64::new(0),
            flush_count: AtomicU64::new(0),
        })
    }

    /// Allocates a fresh page and returns a guard pinning it.
    ///
    /// The new page is zeroed and clean. Fails with
    /// [`BufferError::NoFreeFrames`] when every frame is pinned.
    pub fn new_page(&self) -> BufferResult<PageGuard<'_>> {
        let mut state = self.state.lock();

        let frame_id = self.acquire_frame(&mut state)?;
        let page_id = PageId::new(state.next_page_id);
        state.next_page_id += 1;

        let frame = &self.frames[frame_id.index()];
        frame.set_page_id(page_id);
        frame.pin();
        state.page_table.insert(page_id, frame_id);
        state.replacer.record_access(frame_id);
        state.replacer.set_evictable(frame_id, false);

        trace!(page = %page_id, frame = frame_id.index(), "allocated page");
        Ok(PageGuard::new(self, Arc::clone(frame), page_id))
    }

    /// Fetches a page and returns a guard pinning it.
    ///
    /// Resident pages are served from memory; otherwise a frame is taken
    /// from the free list or stolen from a victim (flushing it if dirty)
    /// and the page is read through the disk scheduler. Fails with
    /// [`BufferError::NoFreeFrames`] when every frame is pinned.
    pub fn fetch_page(&self, page_id: PageId) -> BufferResult<PageGuard<'_>> {
        let mut state = self.state.lock();
        self.fetch_count.fetch_add(1, Ordering::Relaxed);

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            let frame = &self.frames[frame_id.index()];
            frame.pin();
            state.replacer.record_access(frame_id);
            state.replacer.set_evictable(frame_id, false);
            return Ok(PageGuard::new(self, Arc::clone(frame), page_id));
        }

        self.miss_count.fetch_add(1, Ordering::Relaxed);
        let frame_id = self.acquire_frame(&mut state)?;
        let frame = &self.frames[frame_id.index()];
        frame.set_page_id(page_id);
        frame.pin();
        state.page_table.insert(page_id, frame_id);
        state.replacer.record_access(frame_id);
        state.replacer.set_evictable(frame_id, false);

        // Read through the scheduler; the pool latch stays held across the
        // wait, so concurrent loads of the same page are serialized.
        let pending = self.disk.schedule_read(page_id)?;
        let data = pending
            .recv()
            .map_err(|_| DiskError::SchedulerShutDown)
            .map_err(BufferError::from)??;
        frame.write_data().copy_from_slice(&data);

        trace!(page = %page_id, frame = frame_id.index(), "fetched page from disk");
        Ok(PageGuard::new(self, Arc::clone(frame), page_id))
    }

    /// Fetches a page and acquires its read latch.
    pub fn fetch_page_read(&self, page_id: PageId) -> BufferResult<ReadPageGuard<'_>> {
        Ok(self.fetch_page(page_id)?.upgrade_read())
    }

    /// Fetches a page and acquires its write latch.
    pub fn fetch_page_write(&self, page_id: PageId) -> BufferResult<WritePageGuard<'_>> {
        Ok(self.fetch_page(page_id)?.upgrade_write())
    }

    /// Releases one pin on a resident page, OR-ing in the dirty flag.
    ///
    /// Returns false if the page is not resident or its pin count is
    /// already zero. When the last pin is released the frame becomes
    /// eligible for eviction.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let mut state = self.state.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.index()];
        if frame.pin_count() == 0 {
            return false;
        }

        if is_dirty {
            frame.set_dirty(true);
        }
        if frame.unpin() == 0 {
            state.replacer.set_evictable(frame_id, true);
        }
        true
    }

    /// Writes a resident page out and clears its dirty bit, regardless of
    /// whether it was dirty. Returns `Ok(false)` for a non-resident page.
    ///
    /// Must not be called while holding a write guard on the same page:
    /// the flush copies the page under its read latch.
    pub fn flush_page(&self, page_id: PageId) -> BufferResult<bool> {
        let state = self.state.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(false);
        };
        self.flush_frame(&self.frames[frame_id.index()])?;
        Ok(true)
    }

    /// Writes every resident page out, clearing all dirty bits. Returns
    /// the number of pages written.
    pub fn flush_all_pages(&self) -> BufferResult<usize> {
        let state = self.state.lock();

        let mut flushed = 0;
        for &frame_id in state.page_table.values() {
            self.flush_frame(&self.frames[frame_id.index()])?;
            flushed += 1;
        }
        Ok(flushed)
    }

    /// Drops a page from the pool, freeing its frame.
    ///
    /// Returns true if the page was absent or successfully freed, false if
    /// it is still pinned. The page id is never reused.
    pub fn delete_page(&self, page_id: PageId) -> bool {
        let mut state = self.state.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return true;
        };
        let frame = &self.frames[frame_id.index()];
        if frame.pin_count() > 0 {
            return false;
        }

        state.replacer.remove(frame_id);
        state.page_table.remove(&page_id);
        frame.reset();
        state.free_list.push_back(frame_id);

        debug!(page = %page_id, frame = frame_id.index(), "deleted page");
        true
    }

    /// Returns the number of frames in the buffer pool.
    pub fn num_frames(&self) -> usize {
        self.config.num_frames
    }

    /// Returns true if a page is resident.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.state.lock().page_table.contains_key(&page_id)
    }

    /// Returns the pin count of a resident page.
    pub fn page_pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.state.lock();
        state
            .page_table
            .get(&page_id)
            .map(|frame_id| self.frames[frame_id.index()].pin_count())
    }

    /// Returns a statistics snapshot.
    pub fn stats(&self) -> BufferPoolStats {
        let mut pinned = 0;
        let mut dirty = 0;
        for frame in &self.frames {
            if frame.is_pinned() {
                pinned += 1;
            }
            if frame.is_dirty() {
                dirty += 1;
            }
        }

        BufferPoolStats {
            fetches: self.fetch_count.load(Ordering::Relaxed),
            hits: self.hit_count.load(Ordering::Relaxed),
            misses: self.miss_count.load(Ordering::Relaxed),
            evictions: self.eviction_count.load(Ordering::Relaxed),
            flushes: self.flush_count.load(Ordering::Relaxed),
            pinned_frames: pinned,
            dirty_frames: dirty,
        }
    }

    // -------------------------------------------------------------------------
    // Private helpers
    // -------------------------------------------------------------------------

    /// Picks a frame for a new occupant: free list first, then eviction.
    ///
    /// An evicted frame has its page flushed (if dirty) and its page-table
    /// entry removed. The returned frame is reset and zeroed.
    fn acquire_frame(&self, state: &mut PoolState) -> BufferResult<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = state.replacer.evict().ok_or(BufferError::NoFreeFrames)?;
        let frame = &self.frames[frame_id.index()];
        let old_page_id = frame.page_id();

        if frame.is_dirty() {
            self.flush_frame(frame)?;
        }
        state.page_table.remove(&old_page_id);
        frame.reset();

        self.eviction_count.fetch_add(1, Ordering::Relaxed);
        debug!(page = %old_page_id, frame = frame_id.index(), "evicted page");
        Ok(frame_id)
    }

    /// Writes a frame's page through the scheduler and clears its dirty
    /// bit. Called with the pool latch held.
    fn flush_frame(&self, frame: &BufferFrame) -> BufferResult<()> {
        let page_id = frame.page_id();
        let data: Box<[u8]> = frame.read_data().clone().into_boxed_slice();

        let pending = self.disk.schedule_write(page_id, data)?;
        pending
            .recv()
            .map_err(|_| DiskError::SchedulerShutDown)
            .map_err(BufferError::from)??;

        frame.set_dirty(false);
        self.flush_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("num_frames", &self.config.num_frames)
            .field("replacer_k", &self.config.replacer_k)
            .field("pages_resident", &self.state.lock().page_table.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::MemoryDiskManager;

    fn create_pool(num_frames: usize) -> BufferPool {
        BufferPool::new(BufferPoolConfig::new(num_frames), MemoryDiskManager::new()).unwrap()
    }

    #[test]
    fn test_pool_creation() {
        let pool = create_pool(10);
        assert_eq!(pool.num_frames(), 10);
        assert!(!pool.contains(PageId::new(0)));
    }

    #[test]
    fn test_new_page_ids_are_dense() {
        let pool = create_pool(10);
        for expected in 0..10u64 {
            let guard = pool.new_page().unwrap();
            assert_eq!(guard.page_id(), PageId::new(expected));
        }
    }

    #[test]
    fn test_exhaustion_and_reuse() {
        let pool = create_pool(3);

        let guards: Vec<_> = (0..3).map(|_| pool.new_page().unwrap()).collect();
        assert!(matches!(
            pool.new_page(),
            Err(BufferError::NoFreeFrames)
        ));

        drop(guards);
        // All frames are evictable again.
        let guard = pool.new_page().unwrap();
        assert_eq!(guard.page_id(), PageId::new(3));
    }

    #[test]
    fn test_fetch_hit_increments_pin() {
        let pool = create_pool(4);

        let guard = pool.new_page().unwrap();
        let page_id = guard.page_id();

        let second = pool.fetch_page(page_id).unwrap();
        assert_eq!(pool.page_pin_count(page_id), Some(2));
        drop(second);
        assert_eq!(pool.page_pin_count(page_id), Some(1));

        let stats = pool.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_eviction_writes_back_and_refetch_reads() {
        let pool = create_pool(1);

        let page_id = {
            let guard = pool.new_page().unwrap();
            let mut write = guard.upgrade_write();
            write.data_mut()[..6].copy_from_slice(b"Hello\0");
            write.page_id()
        };

        // The only frame gets stolen; page 0 must be flushed out.
        let other = pool.new_page().unwrap();
        assert!(!pool.contains(page_id));
        drop(other);

        let read = pool.fetch_page_read(page_id).unwrap();
        assert_eq!(&read[..6], b"Hello\0");
    }

    #[test]
    fn test_unpin_contracts() {
        let pool = create_pool(4);

        // Unknown page.
        assert!(!pool.unpin_page(PageId::new(77), false));

        let guard = pool.new_page().unwrap();
        let page_id = guard.page_id();
        drop(guard);

        // Pin already zero.
        assert!(!pool.unpin_page(page_id, false));
    }

    #[test]
    fn test_unpin_dirty_is_sticky() {
        let pool = create_pool(4);

        let guard = pool.new_page().unwrap();
        let page_id = guard.page_id();
        drop(guard);

        let g1 = pool.fetch_page(page_id).unwrap();
        let g2 = pool.fetch_page(page_id).unwrap();
        drop({
            let mut g = g1;
            g.mark_dirty();
            g
        });
        // A later clean unpin must not clear the dirty bit.
        drop(g2);
        assert_eq!(pool.stats().dirty_frames, 1);
    }

    #[test]
    fn test_flush_page() {
        let pool = create_pool(4);

        let page_id = {
            let guard = pool.new_page().unwrap();
            let mut write = guard.upgrade_write();
            write.data_mut()[0] = 0x55;
            write.page_id()
        };

        assert_eq!(pool.stats().dirty_frames, 1);
        assert!(pool.flush_page(page_id).unwrap());
        assert_eq!(pool.stats().dirty_frames, 0);

        // Flushing a non-resident page reports absence.
        assert!(!pool.flush_page(PageId::new(99)).unwrap());
    }

    #[test]
    fn test_flush_all_pages() {
        let pool = create_pool(8);

        for _ in 0..5 {
            let guard = pool.new_page().unwrap();
            let mut write = guard.upgrade_write();
            write.data_mut()[0] = 1;
        }

        assert_eq!(pool.stats().dirty_frames, 5);
        assert_eq!(pool.flush_all_pages().unwrap(), 5);
        assert_eq!(pool.stats().dirty_frames, 0);
    }

    #[test]
    fn test_delete_page() {
        let pool = create_pool(2);

        let guard = pool.new_page().unwrap();
        let page_id = guard.page_id();

        // Pinned pages cannot be deleted.
        assert!(!pool.delete_page(page_id));
        drop(guard);

        assert!(pool.delete_page(page_id));
        assert!(!pool.contains(page_id));

        // Deleting an absent page succeeds trivially.
        assert!(pool.delete_page(page_id));

        // The freed frame is usable again, and the id is not recycled.
        let a = pool.new_page().unwrap();
        let b = pool.new_page().unwrap();
        assert_eq!(a.page_id(), PageId::new(1));
        assert_eq!(b.page_id(), PageId::new(2));
    }

    #[test]
    fn test_fetch_miss_reads_through() {
        let pool = create_pool(2);

        let page_id = {
            let guard = pool.new_page().unwrap();
            let mut write = guard.upgrade_write();
            write.data_mut()[..3].copy_from_slice(&[9, 8, 7]);
            write.page_id()
        };
        pool.flush_page(page_id).unwrap();
        assert!(pool.delete_page(page_id));

        // Gone from memory; must come back from disk.
        let read = pool.fetch_page_read(page_id).unwrap();
        assert_eq!(&read[..3], &[9, 8, 7]);
        assert_eq!(pool.stats().misses, 1);
    }

    #[test]
    fn test_concurrent_new_and_unpin() {
        use std::sync::Arc;

        let pool = Arc::new(create_pool(8));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let pool = Arc::clone(&pool);
            handles.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    let guard = pool.new_page().unwrap();
                    let mut write = guard.upgrade_write();
                    write.data_mut()[0] = 1;
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // 200 pages allocated through 8 frames without losing a frame.
        assert_eq!(pool.stats().pinned_frames, 0);
        let guard = pool.new_page().unwrap();
        assert_eq!(guard.page_id(), PageId::new(200));
    }
}
