//! Recorded capture parsing for the headless `watch --replay` mode.
//!
//! Accepts candump log lines and the bare `ADDR#DATA` form:
//!
//! ```text
//! (1436509052.249713) can0 123#1122334455667788
//! (1436509052.250011) vcan1 7E8#
//! 123#11223344
//! ```
//!
//! The bus index is taken from the trailing digits of the interface name.
//! [`play`] publishes parsed records onto a [`LocalBus`] at their recorded offsets.

use crate::transport::{BusEvent, CanFrame, LocalBus, MAX_ADDRESS, MAX_PAYLOAD_LEN};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Pacing for capture lines that carry no timestamp.
pub const UNTIMED_REPLAY_PERIOD: Duration = Duration::from_millis(100);

/// A capture line that could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    /// No `#` between address and data.
    #[error("line {line}: expected ADDR#DATA, got '{text}'")]
    MissingSeparator {
        /// 1-based line number.
        line: usize,
        /// Offending input.
        text: String,
    },

    /// Address is not hex or exceeds 29 bits.
    #[error("line {line}: bad address '{text}'")]
    BadAddress {
        /// 1-based line number.
        line: usize,
        /// Offending input.
        text: String,
    },

    /// Odd digit count, non-hex, or longer than 64 bytes.
    #[error("line {line}: bad payload '{text}'")]
    BadPayload {
        /// 1-based line number.
        line: usize,
        /// Offending input.
        text: String,
    },

    /// Not a non-negative number of seconds representable as a `Duration`.
    #[error("line {line}: bad timestamp '{text}'")]
    BadTimestamp {
        /// 1-based line number.
        line: usize,
        /// Offending input.
        text: String,
    },

    /// Trailing digits of the interface name overflow the bus index.
    #[error("line {line}: bus index of interface '{text}' does not fit a u8")]
    BadInterface {
        /// 1-based line number.
        line: usize,
        /// Offending input.
        text: String,
    },
}

/// One frame from a capture, with its offset from the capture start if known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayRecord {
    /// Offset from the first timestamped record, once `parse_capture` has run.
    pub at: Option<Duration>,
    /// The frame to publish.
    pub frame: CanFrame,
}

/// Bus index from the interface's trailing digits. No digits means bus 0.
fn bus_from_interface(line: usize, name: &str) -> Result<u8, ReplayError> {
    let digits = name.len() - name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return Ok(0);
    }
    name[name.len() - digits..]
        .parse()
        .map_err(|_| ReplayError::BadInterface {
            line,
            text: name.to_string(),
        })
}

fn parse_hex_payload(line: usize, text: &str) -> Result<Vec<u8>, ReplayError> {
    let cleaned: String = text.chars().filter(|c| *c != '.' && *c != ' ').collect();
    if !cleaned.is_ascii() || cleaned.len() % 2 != 0 || cleaned.len() / 2 > MAX_PAYLOAD_LEN {
        return Err(ReplayError::BadPayload {
            line,
            text: text.to_string(),
        });
    }
    (0..cleaned.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&cleaned[i..i + 2], 16).map_err(|_| ReplayError::BadPayload {
                line,
                text: text.to_string(),
            })
        })
        .collect()
}

fn parse_timestamp(line: usize, text: &str) -> Result<Duration, ReplayError> {
    let inner = text.trim_start_matches('(').trim_end_matches(')');
    inner
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| ReplayError::BadTimestamp {
            line,
            text: text.to_string(),
        })
}

/// Parses one line. Blank lines and `;` or `//` comments yield `Ok(None)`.
///
/// `line` is the 1-based line number used in errors.
pub fn parse_line(line: usize, text: &str) -> Result<Option<ReplayRecord>, ReplayError> {
    let text = text.trim();
    if text.is_empty() || text.starts_with(';') || text.starts_with("//") {
        return Ok(None);
    }

    let mut fields: Vec<&str> = text.split_whitespace().collect();
    let body = fields.pop().unwrap_or_default();

    let mut at = None;
    let mut bus = 0;
    for field in fields {
        if field.starts_with('(') {
            at = Some(parse_timestamp(line, field)?);
        } else {
            bus = bus_from_interface(line, field)?;
        }
    }

    let Some((addr, data)) = body.split_once('#') else {
        return Err(ReplayError::MissingSeparator {
            line,
            text: text.to_string(),
        });
    };

    let address = u32::from_str_radix(addr, 16)
        .ok()
        .filter(|a| *a <= MAX_ADDRESS)
        .ok_or_else(|| ReplayError::BadAddress {
            line,
            text: addr.to_string(),
        })?;

    // CAN FD lines carry a flags nibble after a second '#'.
    let data = match data.strip_prefix('#') {
        Some(fd) => fd.get(1..).unwrap_or_default(),
        None => data,
    };
    let payload = parse_hex_payload(line, data)?;

    Ok(Some(ReplayRecord {
        at,
        frame: CanFrame::new(bus, address, payload),
    }))
}

/// Parses a whole capture, stopping at the first malformed line.
pub fn parse_capture(text: &str) -> Result<Vec<ReplayRecord>, ReplayError> {
    let mut records = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if let Some(record) = parse_line(idx + 1, line)? {
            records.push(record);
        }
    }

    // Make timestamps relative to the first record.
    if let Some(start) = records.iter().find_map(|r| r.at) {
        for record in &mut records {
            record.at = record.at.map(|at| at.saturating_sub(start));
        }
    }
    Ok(records)
}

/// Publishes `records` on `channel`, each at its offset from the start of the pass.
///
/// Untimed records follow each other every [`UNTIMED_REPLAY_PERIOD`]. With `repeat`
/// the capture restarts when it ends. An offset too large to schedule stops the replay.
pub async fn play(bus: LocalBus, channel: String, records: Vec<ReplayRecord>, repeat: bool) {
    if records.is_empty() {
        warn!("Capture holds no frames");
        return;
    }

    loop {
        let start = tokio::time::Instant::now();
        let mut untimed = Duration::ZERO;
        for record in &records {
            let due = match record.at {
                Some(at) => at,
                None => {
                    untimed += UNTIMED_REPLAY_PERIOD;
                    untimed
                }
            };
            let Some(deadline) = start.checked_add(due) else {
                warn!(offset = ?due, "Capture offset out of range, stopping replay");
                return;
            };
            tokio::time::sleep_until(deadline).await;
            bus.publish(&channel, BusEvent::can(vec![record.frame.clone()]));
        }
        if !repeat {
            info!("Capture finished");
            return;
        }
    }
}
