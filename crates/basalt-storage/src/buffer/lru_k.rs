//! LRU-K replacement policy for the buffer pool.
//!
//! LRU-K tracks per-frame access history and evicts by backward K-distance:
//! frames with fewer than K recorded accesses ("cold") are preferred victims
//! over frames with a full history ("hot"). Within the cold set the frame
//! with the earliest first access goes first; within the hot set the frame
//! whose K-th most recent access is oldest goes first.
//!
//! Both sets are kept as ordered queues with new entries at the front and
//! eviction scanning from the back: cold frames are never repositioned, so
//! back-of-queue means earliest first access; hot frames move to the front
//! on every access, so back-of-queue means oldest K-th most recent access.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use tracing::trace;

use super::frame::FrameId;

/// Per-frame bookkeeping.
struct LruKNode {
    /// Number of recorded accesses.
    accesses: usize,
    /// Whether the frame may be chosen as a victim.
    evictable: bool,
}

struct ReplacerState {
    nodes: HashMap<FrameId, LruKNode>,
    /// Frames with fewer than K accesses; front = most recently created.
    cold: VecDeque<FrameId>,
    /// Frames with at least K accesses; front = most recently accessed.
    hot: VecDeque<FrameId>,
    /// Number of evictable frames.
    evictable: usize,
}

impl ReplacerState {
    fn remove_from_queue(queue: &mut VecDeque<FrameId>, frame_id: FrameId) {
        if let Some(pos) = queue.iter().position(|&f| f == frame_id) {
            queue.remove(pos);
        }
    }
}

/// LRU-K victim selection over a fixed set of frame ids.
///
/// All methods take `&self`; the replacer carries its own latch. Frame ids
/// must be in `[0, capacity)` — violations are programmer errors and panic.
pub struct LruKReplacer {
    capacity: usize,
    k: usize,
    state: Mutex<ReplacerState>,
}

impl LruKReplacer {
    /// Creates a replacer for `capacity` frames with parameter `k`.
    ///
    /// # Panics
    ///
    /// Panics if `k` is zero.
    pub fn new(capacity: usize, k: usize) -> Self {
        assert!(k >= 1, "LRU-K requires k >= 1");
        Self {
            capacity,
            k,
            state: Mutex::new(ReplacerState {
                nodes: HashMap::with_capacity(capacity),
                cold: VecDeque::new(),
                hot: VecDeque::new(),
                evictable: 0,
            }),
        }
    }

    fn check_frame_id(&self, frame_id: FrameId) {
        assert!(
            frame_id.index() < self.capacity,
            "frame id {} out of range (capacity {})",
            frame_id.index(),
            self.capacity
        );
    }

    /// Records an access to the frame, creating its history on first sight.
    ///
    /// A frame reaching K accesses moves from the cold queue to the front
    /// of the hot queue; a frame already hot moves back to the front.
    pub fn record_access(&self, frame_id: FrameId) {
        self.check_frame_id(frame_id);
        let mut state = self.state.lock();

        let node = state.nodes.entry(frame_id).or_insert(LruKNode {
            accesses: 0,
            evictable: false,
        });
        node.accesses += 1;
        let accesses = node.accesses;

        if accesses == 1 {
            state.cold.push_front(frame_id);
        } else if accesses == self.k {
            ReplacerState::remove_from_queue(&mut state.cold, frame_id);
            state.hot.push_front(frame_id);
        } else if accesses > self.k {
            ReplacerState::remove_from_queue(&mut state.hot, frame_id);
            state.hot.push_front(frame_id);
        }
    }

    /// Sets whether the frame may be evicted.
    ///
    /// No-op for unknown frames or when the flag is unchanged.
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        self.check_frame_id(frame_id);
        let mut state = self.state.lock();

        let Some(node) = state.nodes.get_mut(&frame_id) else {
            return;
        };
        if node.evictable == evictable {
            return;
        }
        node.evictable = evictable;
        if evictable {
            state.evictable += 1;
        } else {
            state.evictable -= 1;
        }
    }

    /// Drops the frame's access history unconditionally.
    ///
    /// No-op for unknown frames.
    ///
    /// # Panics
    ///
    /// Panics if the frame is tracked but not evictable.
    pub fn remove(&self, frame_id: FrameId) {
        self.check_frame_id(frame_id);
        let mut state = self.state.lock();

        let (accesses, evictable) = match state.nodes.get(&frame_id) {
            Some(node) => (node.accesses, node.evictable),
            None => return,
        };
        assert!(
            evictable,
            "removing non-evictable frame {} from replacer",
            frame_id.index()
        );

        if accesses < self.k {
            ReplacerState::remove_from_queue(&mut state.cold, frame_id);
        } else {
            ReplacerState::remove_from_queue(&mut state.hot, frame_id);
        }
        state.nodes.remove(&frame_id);
        state.evictable -= 1;
    }

    /// Chooses and removes a victim frame, or returns `None` when no frame
    /// is evictable.
    pub fn evict(&self) -> Option<FrameId> {
        let mut state = self.state.lock();

        let victim = Self::scan_back(&state.cold, &state.nodes)
            .or_else(|| Self::scan_back(&state.hot, &state.nodes))?;

        let accesses = state.nodes[&victim].accesses;
        if accesses < self.k {
            ReplacerState::remove_from_queue(&mut state.cold, victim);
        } else {
            ReplacerState::remove_from_queue(&mut state.hot, victim);
        }
        state.nodes.remove(&victim);
        state.evictable -= 1;

        trace!(frame = victim.index(), "evicted frame");
        Some(victim)
    }

    /// Returns the number of evictable frames.
    pub fn size(&self) -> usize {
        self.state.lock().evictable
    }

    /// Returns the K parameter.
    pub fn k(&self) -> usize {
        self.k
    }

    fn scan_back(
        queue: &VecDeque<FrameId>,
        nodes: &HashMap<FrameId, LruKNode>,
    ) -> Option<FrameId> {
        queue.iter().rev().copied().find(|id| nodes[id].evictable)
    }
}

impl std::fmt::Debug for LruKReplacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LruKReplacer")
            .field("capacity", &self.capacity)
            .field("k", &self.k)
            .field("tracked", &state.nodes.len())
            .field("evictable", &state.evictable)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fid(id: usize) -> FrameId {
        FrameId::new(id)
    }

    #[test]
    fn test_evict_order_mixed_history() {
        let replacer = LruKReplacer::new(7, 2);

        // Frames 1-5 get one access each; frame 1 then gets a second.
        for id in [1, 2, 3, 4, 5, 1] {
            replacer.record_access(fid(id));
        }
        for id in 1..=5 {
            replacer.set_evictable(fid(id), true);
        }
        assert_eq!(replacer.size(), 5);

        // Cold frames go first, in first-access order; frame 1 is hot.
        assert_eq!(replacer.evict(), Some(fid(2)));
        assert_eq!(replacer.evict(), Some(fid(3)));
        assert_eq!(replacer.evict(), Some(fid(4)));
        assert_eq!(replacer.evict(), Some(fid(5)));
        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), None);
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_hot_frames_evict_by_kth_access() {
        let replacer = LruKReplacer::new(4, 2);

        // Both frames reach K accesses; frame 1's second access is older.
        replacer.record_access(fid(1));
        replacer.record_access(fid(1));
        replacer.record_access(fid(2));
        replacer.record_access(fid(2));
        replacer.set_evictable(fid(1), true);
        replacer.set_evictable(fid(2), true);

        assert_eq!(replacer.evict(), Some(fid(1)));

        // A fresh access to frame 2 keeps it hot and recent.
        replacer.record_access(fid(2));
        replacer.record_access(fid(3));
        replacer.record_access(fid(3));
        replacer.set_evictable(fid(3), true);
        assert_eq!(replacer.evict(), Some(fid(3)));
        assert_eq!(replacer.evict(), Some(fid(2)));
    }

    #[test]
    fn test_k1_degenerates_to_lru() {
        let replacer = LruKReplacer::new(4, 1);

        // With K = 1 every access moves the frame to the front of the hot
        // queue, which is exactly classical LRU.
        for id in [0, 1, 2, 3] {
            replacer.record_access(fid(id));
            replacer.set_evictable(fid(id), true);
        }
        replacer.record_access(fid(0));

        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), Some(fid(2)));
        assert_eq!(replacer.evict(), Some(fid(3)));
        assert_eq!(replacer.evict(), Some(fid(0)));
    }

    #[test]
    fn test_non_evictable_skipped() {
        let replacer = LruKReplacer::new(3, 2);

        replacer.record_access(fid(0));
        replacer.record_access(fid(1));
        replacer.set_evictable(fid(1), true);

        // Frame 0 is older but pinned (non-evictable).
        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), None);

        replacer.set_evictable(fid(0), true);
        assert_eq!(replacer.evict(), Some(fid(0)));
    }

    #[test]
    fn test_size_counts_evictable_only() {
        let replacer = LruKReplacer::new(4, 2);
        assert_eq!(replacer.size(), 0);

        replacer.record_access(fid(0));
        replacer.record_access(fid(1));
        assert_eq!(replacer.size(), 0);

        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);
        assert_eq!(replacer.size(), 2);

        // Redundant flips do not double-count.
        replacer.set_evictable(fid(0), true);
        assert_eq!(replacer.size(), 2);

        replacer.set_evictable(fid(1), false);
        assert_eq!(replacer.size(), 1);
    }

    #[test]
    fn test_remove() {
        let replacer = LruKReplacer::new(4, 2);
        replacer.record_access(fid(0));
        replacer.record_access(fid(1));
        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);

        replacer.remove(fid(0));
        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(fid(1)));

        // Removing an unknown frame is a no-op.
        replacer.remove(fid(3));
    }

    #[test]
    #[should_panic(expected = "non-evictable")]
    fn test_remove_pinned_panics() {
        let replacer = LruKReplacer::new(4, 2);
        replacer.record_access(fid(0));
        replacer.remove(fid(0));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_out_of_range_panics() {
        let replacer = LruKReplacer::new(4, 2);
        replacer.record_access(fid(10));
    }

    #[test]
    fn test_reaccess_after_eviction_starts_cold() {
        let replacer = LruKReplacer::new(2, 3);

        replacer.record_access(fid(0));
        replacer.record_access(fid(0));
        replacer.set_evictable(fid(0), true);
        assert_eq!(replacer.evict(), Some(fid(0)));

        // History was dropped with the node; the frame is cold again.
        replacer.record_access(fid(0));
        replacer.record_access(fid(1));
        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);
        assert_eq!(replacer.evict(), Some(fid(0)));
    }
}
