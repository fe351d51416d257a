//! Page replacement policies for the buffer pool.

use crate::frame::FrameId;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

/// Trait for page replacement algorithms.
pub trait Replacer: Send + Sync {
    /// Records that the given frame was accessed.
    fn record_access(&self, frame_id: FrameId);

    /// Starts tracking a frame that now holds a page.
    fn insert(&self, frame_id: FrameId);

    /// Stops tracking a frame.
    fn remove(&self, frame_id: FrameId);

    /// Selects a victim among tracked frames for which `can_evict` holds.
    ///
    /// Returns None if no tracked frame passes the predicate.
    fn evict(&self, can_evict: &dyn Fn(FrameId) -> bool) -> Option<FrameId>;

    /// Returns the number of tracked frames.
    fn size(&self) -> usize;
}

/// Clock replacement algorithm implementation.
///
/// Reference bits are atomic so access recording stays lock-free; the
/// tracked set and clock hand live behind a mutex.
pub struct ClockReplacer {
    /// Number of frames.
    num_frames: usize,
    /// Reference bits for each frame.
    reference_bits: Vec<AtomicBool>,
    /// Tracked set and clock hand.
    inner: Mutex<ClockReplacerInner>,
}

struct ClockReplacerInner {
    /// Frames currently holding pages.
    tracked: HashSet<FrameId>,
    /// Current clock hand position.
    clock_hand: usize,
}

impl ClockReplacer {
    /// Creates a new clock replacer with the given number of frames.
    pub fn new(num_frames: usize) -> Self {
        let reference_bits: Vec<AtomicBool> =
            (0..num_frames).map(|_| AtomicBool::new(false)).collect();

        Self {
            num_frames,
            reference_bits,
            inner: Mutex::new(ClockReplacerInner {
                tracked: HashSet::new(),
                clock_hand: 0,
            }),
        }
    }

    /// Returns the total capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.num_frames
    }
}

impl Replacer for ClockReplacer {
    #[inline]
    fn record_access(&self, frame_id: FrameId) {
        let idx = frame_id.0 as usize;
        if idx < self.num_frames {
            self.reference_bits[idx].store(true, Ordering::Relaxed);
        }
    }

    fn insert(&self, frame_id: FrameId) {
        if (frame_id.0 as usize) < self.num_frames {
            self.inner.lock().tracked.insert(frame_id);
        }
    }

    fn remove(&self, frame_id: FrameId) {
        let idx = frame_id.0 as usize;
        if idx < self.num_frames {
            self.inner.lock().tracked.remove(&frame_id);
            self.reference_bits[idx].store(false, Ordering::Relaxed);
        }
    }

    fn evict(&self, can_evict: &dyn Fn(FrameId) -> bool) -> Option<FrameId> {
        let mut inner = self.inner.lock();

        if inner.tracked.is_empty() {
            return None;
        }

        let num_frames = self.num_frames;

        // Make at most 2 full rotations to find an unreferenced victim
        for _ in 0..(2 * num_frames) {
            let hand = inner.clock_hand;
            let frame_id = FrameId(hand as u32);

            if inner.tracked.contains(&frame_id) && can_evict(frame_id) {
                if !self.reference_bits[hand].load(Ordering::Relaxed) {
                    inner.tracked.remove(&frame_id);
                    inner.clock_hand = (hand + 1) % num_frames;
                    return Some(frame_id);
                }
                // Clear reference bit and continue
                self.reference_bits[hand].store(false, Ordering::Relaxed);
            }

            inner.clock_hand = (hand + 1) % num_frames;
        }

        // Everything kept its reference bit; take any eligible frame
        let victim = inner
            .tracked
            .iter()
            .copied()
            .find(|&frame_id| can_evict(frame_id));
        if let Some(frame_id) = victim {
            inner.tracked.remove(&frame_id);
            return Some(frame_id);
        }

        None
    }

    fn size(&self) -> usize {
        self.inner.lock().tracked.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn always(_: FrameId) -> bool {
        true
    }

    #[test]
    fn test_clock_replacer_new() {
        let replacer = ClockReplacer::new(10);
        assert_eq!(replacer.capacity(), 10);
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_clock_replacer_insert_remove() {
        let replacer = ClockReplacer::new(10);

        replacer.insert(FrameId(0));
        replacer.insert(FrameId(1));
        replacer.insert(FrameId(2));
        assert_eq!(replacer.size(), 3);

        replacer.remove(FrameId(1));
        assert_eq!(replacer.size(), 2);
    }

    #[test]
    fn test_clock_replacer_evict_empty() {
        let replacer = ClockReplacer::new(10);
        assert!(replacer.evict(&always).is_none());
    }

    #[test]
    fn test_clock_replacer_evict_single() {
        let replacer = ClockReplacer::new(10);

        replacer.insert(FrameId(5));
        let victim = replacer.evict(&always);
        assert_eq!(victim, Some(FrameId(5)));
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_clock_replacer_evict_with_reference_bits() {
        let replacer = ClockReplacer::new(10);

        replacer.insert(FrameId(0));
        replacer.insert(FrameId(1));
        replacer.insert(FrameId(2));

        // Give frames 0 and 1 a second chance
        replacer.record_access(FrameId(0));
        replacer.record_access(FrameId(1));

        // Frame 2 is evicted first (no reference bit)
        let victim = replacer.evict(&always);
        assert_eq!(victim, Some(FrameId(2)));
    }

    #[test]
    fn test_clock_replacer_evict_all_referenced() {
        let replacer = ClockReplacer::new(3);

        for i in 0..3 {
            replacer.insert(FrameId(i));
            replacer.record_access(FrameId(i));
        }

        // Still evicts after clearing reference bits
        let victim = replacer.evict(&always);
        assert!(victim.is_some());
        assert_eq!(replacer.size(), 2);
    }

    #[test]
    fn test_clock_replacer_respects_predicate() {
        let replacer = ClockReplacer::new(4);

        replacer.insert(FrameId(0));
        replacer.insert(FrameId(1));

        // Only frame 1 is eligible
        let victim = replacer.evict(&|f| f == FrameId(1));
        assert_eq!(victim, Some(FrameId(1)));

        // Nothing eligible
        let victim = replacer.evict(&|f| f == FrameId(3));
        assert!(victim.is_none());
        assert_eq!(replacer.size(), 1);
    }

    #[test]
    fn test_clock_replacer_out_of_bounds() {
        let replacer = ClockReplacer::new(5);

        // These should not panic
        replacer.insert(FrameId(100));
        replacer.record_access(FrameId(100));
        replacer.remove(FrameId(100));

        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_clock_replacer_second_chance_order() {
        let replacer = ClockReplacer::new(5);

        replacer.insert(FrameId(0));
        replacer.insert(FrameId(1));

        // Access frame 0 so frame 1 is preferred
        replacer.record_access(FrameId(0));

        let victim = replacer.evict(&always);
        assert_eq!(victim, Some(FrameId(1)));
    }
}
