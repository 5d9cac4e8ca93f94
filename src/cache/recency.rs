//! Display order with move-to-front-on-write.

use crate::frame::FrameKey;
use std::collections::VecDeque;

/// Ordered keys, most recently updated last, bounded to `capacity`.
///
/// Backed by a ring buffer; a key appears at most once.
#[derive(Debug)]
pub struct RecencyTracker {
    order: VecDeque<FrameKey>,
    capacity: usize,
}

impl RecencyTracker {
    /// A zero capacity is clamped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Moves `key` to the most recent position.
    ///
    /// Returns the key evicted from the oldest end when the tracker was full.
    pub fn touch(&mut self, key: FrameKey) -> Option<FrameKey> {
        if let Some(pos) = self.order.iter().position(|k| *k == key) {
            self.order.remove(pos);
            self.order.push_back(key);
            return None;
        }

        let evicted = if self.order.len() >= self.capacity {
            self.order.pop_front()
        } else {
            None
        };
        self.order.push_back(key);
        evicted
    }

    /// Forgets `key`. Returns whether it was tracked.
    pub fn remove(&mut self, key: &FrameKey) -> bool {
        match self.order.iter().position(|k| k == key) {
            Some(pos) => {
                self.order.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Keeps only the keys for which `keep` returns true, preserving order.
    pub fn retain(&mut self, keep: impl FnMut(&FrameKey) -> bool) {
        self.order.retain(keep);
    }

    /// Whether `key` is tracked.
    pub fn contains(&self, key: &FrameKey) -> bool {
        self.order.contains(key)
    }

    /// Most recent first.
    pub fn iter_recent(&self) -> impl Iterator<Item = &FrameKey> {
        self.order.iter().rev()
    }

    /// Number of keys tracked.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Maximum number of keys held before the oldest is evicted.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Forgets every key.
    pub fn clear(&mut self) {
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(address: u32) -> FrameKey {
        FrameKey::new(0, address)
    }

    #[test]
    fn test_touch_moves_existing_key_without_duplicating() {
        let mut tracker = RecencyTracker::new(8);
        tracker.touch(key(1));
        tracker.touch(key(2));
        tracker.touch(key(3));
        assert_eq!(tracker.touch(key(1)), None);

        let order: Vec<_> = tracker.iter_recent().copied().collect();
        assert_eq!(order, vec![key(1), key(3), key(2)]);
        assert_eq!(tracker.len(), 3);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut tracker = RecencyTracker::new(2);
        assert_eq!(tracker.touch(key(1)), None);
        assert_eq!(tracker.touch(key(2)), None);
        assert_eq!(tracker.touch(key(3)), Some(key(1)));
        assert_eq!(tracker.len(), 2);
        assert!(!tracker.contains(&key(1)));
    }

    #[test]
    fn test_refreshing_full_tracker_evicts_nothing() {
        let mut tracker = RecencyTracker::new(2);
        tracker.touch(key(1));
        tracker.touch(key(2));
        assert_eq!(tracker.touch(key(1)), None);
        let order: Vec<_> = tracker.iter_recent().copied().collect();
        assert_eq!(order, vec![key(1), key(2)]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut tracker = RecencyTracker::new(0);
        assert_eq!(tracker.capacity(), 1);
        tracker.touch(key(1));
        assert_eq!(tracker.touch(key(2)), Some(key(1)));
    }

    #[test]
    fn test_remove_missing_key_is_noop() {
        let mut tracker = RecencyTracker::new(4);
        tracker.touch(key(1));
        assert!(!tracker.remove(&key(9)));
        assert!(tracker.remove(&key(1)));
        assert!(tracker.is_empty());
    }
}
