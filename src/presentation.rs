//! Presentation adapter: a read-only, styled view of the cache.
//!
//! A [`Snapshot`] is what any surface draws: a header, a total count and up to
//! `limit` rows, most recent first. Building one never mutates the cache, so two
//! snapshots taken without an intervening drain or sweep are identical.
//!
//! [`render_text`] draws a snapshot onto a line-oriented surface. The egui surface
//! lives in [`crate::gui`].

use crate::cache::FrameCache;
use crate::frame::{Frame, FrameStyle};
use std::fmt::Write as _;
use std::time::Instant;

/// Title line of the overlay.
pub const HEADER: &str = "CAN Debug";

/// Column header above the rows.
pub const COLUMN_HEADER: &str = "Bus  Addr     Data";

/// One styled row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRow {
    /// Frame shown on this row.
    pub frame: Frame,
    /// How to draw it.
    pub style: FrameStyle,
}

impl SnapshotRow {
    /// Row text, e.g. ` 0   0x123  11 22`.
    pub fn line(&self) -> String {
        format!(
            "{:2}   0x{:03X}  {}",
            self.frame.key.bus,
            self.frame.key.address,
            self.frame.format_data()
        )
    }
}

/// Styled rows plus the number of frames held.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Rows to draw, most recent first.
    pub rows: Vec<SnapshotRow>,
    /// Frames in the store, shown as `Messages: N`.
    pub total: usize,
}

impl Snapshot {
    /// True when there are no rows to draw.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header count, e.g. `Messages: 12`.
    pub fn count_label(&self) -> String {
        format!("Messages: {}", self.total)
    }
}

/// Builds up to `limit` rows from the most recently updated keys.
///
/// Keys the tracker still names but the store no longer holds are skipped.
pub fn snapshot(cache: &FrameCache, now: Instant, limit: usize) -> Snapshot {
    let timeout = cache.stale_timeout();
    let rows = cache
        .recency()
        .iter_recent()
        .filter_map(|key| cache.get(key))
        .take(limit)
        .map(|frame| SnapshotRow {
            frame: frame.clone(),
            style: FrameStyle::classify(frame, now, timeout),
        })
        .collect();

    Snapshot {
        rows,
        total: cache.len(),
    }
}

const ANSI_RESET: &str = "\x1b[0m";
const ANSI_HEADER: &str = "\x1b[96m";
const ANSI_STALE: &str = "\x1b[90m";
const ANSI_INVALID: &str = "\x1b[91m";

/// Text surface options.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextStyle {
    /// Colour rows with ANSI escapes instead of suffix markers.
    pub ansi: bool,
}

/// Renders the header, count, column header and rows as lines of text.
pub fn render_text(snapshot: &Snapshot, style: TextStyle) -> String {
    let mut out = String::new();
    let (header_on, reset) = if style.ansi {
        (ANSI_HEADER, ANSI_RESET)
    } else {
        ("", "")
    };

    let _ = writeln!(out, "{header_on}{HEADER}{reset}  {}", snapshot.count_label());
    let _ = writeln!(out, "{header_on}{COLUMN_HEADER}{reset}");

    for row in &snapshot.rows {
        let line = row.line();
        match (style.ansi, row.style) {
            (_, FrameStyle::Fresh) => {
                let _ = writeln!(out, "{line}");
            }
            (true, FrameStyle::Stale) => {
                let _ = writeln!(out, "{ANSI_STALE}{line}{ANSI_RESET}");
            }
            (true, FrameStyle::Invalid) => {
                let _ = writeln!(out, "{ANSI_INVALID}{line}{ANSI_RESET}");
            }
            (false, FrameStyle::Stale) => {
                let _ = writeln!(out, "{line}  (stale)");
            }
            (false, FrameStyle::Invalid) => {
                let _ = writeln!(out, "{line}  (invalid)");
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameKey;
    use std::time::Duration;

    fn new_cache() -> FrameCache {
        FrameCache::new(20, Duration::from_secs(2))
    }

    fn put(cache: &mut FrameCache, bus: u8, address: u32, data: &[u8], at: Instant) {
        cache.apply(Frame::new(FrameKey::new(bus, address), data.to_vec(), at));
    }

    #[test]
    fn test_rows_are_most_recent_first_and_capped() {
        let t0 = Instant::now();
        let mut cache = new_cache();
        for address in 1..=3 {
            put(&mut cache, 0, address, &[], t0);
        }

        let snap = snapshot(&cache, t0, 2);
        let addresses: Vec<u32> = snap.rows.iter().map(|r| r.frame.key.address).collect();
        assert_eq!(addresses, vec![3, 2]);
        assert_eq!(snap.total, 3);
    }

    #[test]
    fn test_snapshot_is_pure() {
        let t0 = Instant::now();
        let mut cache = new_cache();
        put(&mut cache, 0, 0x10, &[1], t0);
        put(&mut cache, 1, 0x20, &[2], t0);
        let later = t0 + Duration::from_secs(3);

        let first = snapshot(&cache, later, 20);
        let second = snapshot(&cache, later, 20);
        assert_eq!(first, second);
        assert_eq!(cache.len(), 2);
        assert!(first.rows.iter().all(|r| r.style == FrameStyle::Stale));
    }

    #[test]
    fn test_row_line_format() {
        let row = SnapshotRow {
            frame: Frame::new(FrameKey::new(0, 0x123), vec![0x11, 0x22], Instant::now()),
            style: FrameStyle::Fresh,
        };
        assert_eq!(row.line(), " 0   0x123  11 22");
    }

    #[test]
    fn test_render_text_plain() {
        let t0 = Instant::now();
        let mut cache = new_cache();
        put(&mut cache, 0, 0x123, &[0x11], t0);
        cache.apply(
            Frame::new(FrameKey::new(1, 0x200), vec![0xEE], t0).with_validity(false),
        );

        let text = render_text(&snapshot(&cache, t0, 20), TextStyle::default());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "CAN Debug  Messages: 2");
        assert_eq!(lines[1], COLUMN_HEADER);
        assert_eq!(lines[2], " 1   0x200  EE  (invalid)");
        assert_eq!(lines[3], " 0   0x123  11");
    }

    #[test]
    fn test_render_text_ansi_colours_stale_rows() {
        let t0 = Instant::now();
        let mut cache = new_cache();
        put(&mut cache, 0, 0x123, &[0x11], t0);
        let text = render_text(
            &snapshot(&cache, t0 + Duration::from_secs(5), 20),
            TextStyle { ansi: true },
        );
        assert!(text.contains("\x1b[90m 0   0x123  11\x1b[0m"));
    }

    #[test]
    fn test_empty_snapshot_renders_headers_only() {
        let text = render_text(&Snapshot::default(), TextStyle::default());
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("Messages: 0"));
    }
}
