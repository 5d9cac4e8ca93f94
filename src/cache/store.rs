//! Latest frame per key.

use crate::frame::{Frame, FrameKey};
use std::collections::HashMap;

/// Keyed cache holding at most one frame per [`FrameKey`].
#[derive(Debug, Default)]
pub struct FrameStore {
    frames: HashMap<FrameKey, Frame>,
}

impl FrameStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store sized for `capacity` keys.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            frames: HashMap::with_capacity(capacity),
        }
    }

    /// Replaces any previous frame for the same key, returning it.
    pub fn upsert(&mut self, frame: Frame) -> Option<Frame> {
        self.frames.insert(frame.key, frame)
    }

    /// Latest frame for `key`.
    pub fn get(&self, key: &FrameKey) -> Option<&Frame> {
        self.frames.get(key)
    }

    /// Whether a frame is held for `key`.
    pub fn contains(&self, key: &FrameKey) -> bool {
        self.frames.contains_key(key)
    }

    /// Drops the frame for `key`, returning it.
    pub fn remove(&mut self, key: &FrameKey) -> Option<Frame> {
        self.frames.remove(key)
    }

    /// Removes every frame matching `predicate` and returns the removed keys.
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&Frame) -> bool) -> Vec<FrameKey> {
        let doomed: Vec<FrameKey> = self
            .frames
            .values()
            .filter(|frame| predicate(frame))
            .map(|frame| frame.key)
            .collect();
        for key in &doomed {
            self.frames.remove(key);
        }
        doomed
    }

    /// Number of frames held.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True when no frames are held.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Drops every frame.
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Keys held, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &FrameKey> {
        self.frames.keys()
    }
}
