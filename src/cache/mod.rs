//! Frame cache: the [`FrameStore`] and [`RecencyTracker`] kept in step.
//!
//! The store answers "what is the latest frame for this key", the tracker answers
//! "which keys were updated most recently". They are two separate structures with a
//! single owner, and the cache is the only place that mutates both:
//!
//! - `apply` upserts the frame and moves its key to the front of the tracker. A key
//!   evicted from a full tracker is dropped from the store too, so memory stays
//!   bounded by `2 × display_limit` no matter how many distinct ids are on the bus.
//! - `sweep` reaps frames older than the stale timeout from both structures.
//! - `clear` empties both when the feature gate turns the overlay off.
//!
//! Readers must treat absence from the store as authoritative: the tracker is allowed
//! to name keys the store no longer has, and those are skipped rather than reported.

pub mod recency;
pub mod store;

pub use recency::RecencyTracker;
pub use store::FrameStore;

use crate::frame::{Frame, FrameKey};
use std::time::{Duration, Instant};
use tracing::trace;

/// Default number of rows the overlay shows.
pub const DEFAULT_DISPLAY_LIMIT: usize = 20;

/// Default age after which a frame is stale.
pub const DEFAULT_STALE_TIMEOUT: Duration = Duration::from_secs(2);

/// Owner of the frame store and recency tracker.
#[derive(Debug)]
pub struct FrameCache {
    store: FrameStore,
    recency: RecencyTracker,
    display_limit: usize,
    stale_timeout: Duration,
}

impl Default for FrameCache {
    fn default() -> Self {
        Self::new(DEFAULT_DISPLAY_LIMIT, DEFAULT_STALE_TIMEOUT)
    }
}

impl FrameCache {
    /// Creates a cache whose tracker holds `2 × display_limit` keys.
    pub fn new(display_limit: usize, stale_timeout: Duration) -> Self {
        let display_limit = display_limit.max(1);
        let capacity = display_limit.saturating_mul(2);
        Self {
            store: FrameStore::with_capacity(capacity),
            recency: RecencyTracker::new(capacity),
            display_limit,
            stale_timeout,
        }
    }

    /// Stores `frame` as the latest for its key and marks the key most recent.
    pub fn apply(&mut self, frame: Frame) {
        let key = frame.key;
        self.store.upsert(frame);
        if let Some(evicted) = self.recency.touch(key) {
            trace!(key = %evicted, "Recency tracker full, evicting oldest key");
            self.store.remove(&evicted);
        }
    }

    /// Removes every frame older than the stale timeout.
    ///
    /// Returns how many frames were removed from the store.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let timeout = self.stale_timeout;
        let reaped = self.store.remove_where(|frame| frame.is_stale(now, timeout));
        let store = &self.store;
        self.recency.retain(|key| store.contains(key));
        if !reaped.is_empty() {
            trace!(count = reaped.len(), "Reaped stale frames");
        }
        reaped.len()
    }

    /// Drops everything.
    pub fn clear(&mut self) {
        self.store.clear();
        self.recency.clear();
    }

    /// Latest frame for `key`, if held.
    pub fn get(&self, key: &FrameKey) -> Option<&Frame> {
        self.store.get(key)
    }

    /// Read access to the frame store.
    pub fn store(&self) -> &FrameStore {
        &self.store
    }

    /// Read access to the recency tracker.
    pub fn recency(&self) -> &RecencyTracker {
        &self.recency
    }

    /// Number of frames currently held.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// True when neither structure holds anything.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty() && self.recency.is_empty()
    }

    /// Rows a snapshot shows.
    pub fn display_limit(&self) -> usize {
        self.display_limit
    }

    /// Age past which frames are reaped.
    pub fn stale_timeout(&self) -> Duration {
        self.stale_timeout
    }
}
