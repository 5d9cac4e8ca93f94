//! Keyed, timestamped CAN frames as held by the overlay.

use bytes::Bytes;
use std::fmt;
use std::time::{Duration, Instant};

/// Identifies a logical signal source: one arbitration id on one bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameKey {
    /// Source bus index.
    pub bus: u8,
    /// CAN arbitration id.
    pub address: u32,
}

impl FrameKey {
    /// Key for `address` on `bus`.
    pub fn new(bus: u8, address: u32) -> Self {
        Self { bus, address }
    }
}

impl fmt::Display for FrameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:0x{:03X}", self.bus, self.address)
    }
}

/// Latest payload seen for a key.
///
/// The payload is shared and immutable; an update replaces the whole `Frame`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Bus and address this frame was received on.
    pub key: FrameKey,
    /// Data bytes, up to 64.
    pub payload: Bytes,
    /// Monotonic ingestion time.
    pub timestamp: Instant,
    /// Supplied by the publisher, never computed here.
    pub valid: bool,
}

impl Frame {
    /// A valid frame ingested at `timestamp`.
    pub fn new(key: FrameKey, payload: impl Into<Bytes>, timestamp: Instant) -> Self {
        Self {
            key,
            payload: payload.into(),
            timestamp,
            valid: true,
        }
    }

    /// Overrides the validity flag.
    pub fn with_validity(mut self, valid: bool) -> Self {
        self.valid = valid;
        self
    }

    /// Time since ingestion. Zero if `now` is earlier than the timestamp.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.timestamp)
    }

    /// A frame exactly `timeout` old is still fresh.
    pub fn is_stale(&self, now: Instant, timeout: Duration) -> bool {
        self.age(now) > timeout
    }

    /// Payload as space separated upper-case hex, e.g. `11 22 33`.
    pub fn format_data(&self) -> String {
        format_hex(&self.payload)
    }
}

/// Formats bytes the way the diagnostic lines and overlay rows show them.
pub fn format_hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{byte:02X}"));
    }
    out
}

/// How a row should be drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStyle {
    /// Within the timeout and valid.
    Fresh,
    /// Older than the stale timeout, whatever its validity.
    Stale,
    /// Within the timeout but flagged invalid by the publisher.
    Invalid,
}

impl FrameStyle {
    /// Staleness wins over validity.
    pub fn classify(frame: &Frame, now: Instant, stale_timeout: Duration) -> Self {
        if frame.is_stale(now, stale_timeout) {
            FrameStyle::Stale
        } else if !frame.valid {
            FrameStyle::Invalid
        } else {
            FrameStyle::Fresh
        }
    }
}
