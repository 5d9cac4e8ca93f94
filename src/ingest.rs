//! Ingestion pump: drain a subscription and fold its frames into the cache.

use crate::cache::FrameCache;
use crate::error::TransportError;
use crate::frame::{format_hex, Frame, FrameKey};
use crate::transport::Subscription;
use std::time::Instant;
use tracing::debug;

/// Drains every buffered event from `subscription` and applies its CAN frames.
///
/// All frames are stamped with `now`. Events that do not carry CAN frames are
/// skipped. The drain is checked before anything is applied, so a malformed record
/// leaves the cache untouched for this tick.
///
/// Returns the number of frames applied. Errors are meant to be absorbed by the
/// caller; they never indicate a broken cache.
pub fn drain_and_apply<S>(
    subscription: &mut S,
    cache: &mut FrameCache,
    now: Instant,
) -> Result<usize, TransportError>
where
    S: Subscription + ?Sized,
{
    let events = subscription.drain()?;

    for frames in events.iter().filter_map(|event| event.can_frames()) {
        frames.iter().try_for_each(|frame| frame.check())?;
    }

    let mut applied = 0;
    for event in &events {
        let Some(frames) = event.can_frames() else {
            continue;
        };
        for can in frames {
            debug!(
                "[CAN] Bus:{} Addr:0x{:03X} Data:[{}]",
                can.src,
                can.address,
                format_hex(&can.dat)
            );
            let key = FrameKey::new(can.src, can.address);
            cache.apply(Frame::new(key, can.dat.clone(), now).with_validity(event.valid));
            applied += 1;
        }
    }

    Ok(applied)
}
