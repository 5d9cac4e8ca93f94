//! The overlay instance and its per-tick driver.
//!
//! One [`CanOverlay`] owns the feature gate (and through it the subscription) and
//! the frame cache. Nothing else mutates them. Each call to [`CanOverlay::tick`]
//! runs the same strict sequence, and every step sees the effects of the previous
//! one:
//!
//! 1. poll the gate (clearing the cache on `Active → Idle`),
//! 2. if active, drain the subscription and apply its frames,
//! 3. sweep stale frames,
//! 4. build the snapshot to draw.
//!
//! No step waits. A failed drain is reported in the [`TickReport`] and otherwise
//! treated as "no records this tick".
//!
//! The overlay holds no locks. To share one across threads, wrap the whole overlay
//! in a single mutex and take it for the duration of a tick.

use crate::cache::FrameCache;
use crate::config::OverlayConfig;
use crate::error::TransportError;
use crate::gate::{FeatureGate, GateSettings, GateState, GateTransition};
use crate::ingest::drain_and_apply;
use crate::params::FlagSource;
use crate::presentation::{self, Snapshot};
use crate::transport::Transport;
use std::time::{Duration, Instant};
use tracing::debug;

/// Sizing and timing of an overlay.
#[derive(Debug, Clone)]
pub struct OverlaySettings {
    /// Rows per snapshot. The recency tracker holds twice as many keys.
    pub display_limit: usize,
    /// Age past which frames are reaped.
    pub stale_timeout: Duration,
    /// Flag and channel settings.
    pub gate: GateSettings,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            display_limit: crate::cache::DEFAULT_DISPLAY_LIMIT,
            stale_timeout: crate::cache::DEFAULT_STALE_TIMEOUT,
            gate: GateSettings::default(),
        }
    }
}

impl From<&OverlayConfig> for OverlaySettings {
    fn from(config: &OverlayConfig) -> Self {
        let overlay = &config.overlay;
        Self {
            display_limit: overlay.display_limit,
            stale_timeout: overlay.stale_timeout,
            gate: GateSettings {
                flag_key: overlay.flag_key.clone(),
                channel: overlay.channel.clone(),
                conflate: overlay.conflate,
                poll_interval: overlay.flag_poll_interval,
            },
        }
    }
}

/// What happened during one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Gate transition from this tick's poll.
    pub transition: GateTransition,
    /// Frames applied by this tick's drain.
    pub applied: usize,
    /// Frames removed by this tick's sweep.
    pub reaped: usize,
    /// Set when the drain failed; the tick then applied nothing.
    pub drain_error: Option<TransportError>,
    /// What to draw. Empty while idle.
    pub snapshot: Snapshot,
}

/// A gated CAN overlay: the feature gate plus the frame cache it feeds.
pub struct CanOverlay<F, T: Transport> {
    gate: FeatureGate<F, T>,
    cache: FrameCache,
}

impl<F, T: Transport> std::fmt::Debug for CanOverlay<F, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanOverlay")
            .field("gate", &self.gate)
            .field("cache", &self.cache)
            .finish()
    }
}

impl<F: FlagSource, T: Transport> CanOverlay<F, T> {
    /// Creates an idle overlay with an empty cache.
    pub fn new(source: F, transport: T, settings: OverlaySettings) -> Self {
        Self {
            gate: FeatureGate::new(source, transport, settings.gate),
            cache: FrameCache::new(settings.display_limit, settings.stale_timeout),
        }
    }

    /// Creates an overlay sized and timed from `config`.
    pub fn from_config(source: F, transport: T, config: &OverlayConfig) -> Self {
        Self::new(source, transport, OverlaySettings::from(config))
    }

    /// Runs one poll → drain → sweep → snapshot cycle.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        let transition = self.gate.poll(now);
        if transition == GateTransition::Deactivated {
            self.cache.clear();
        }

        let Some(subscription) = self.gate.subscription_mut() else {
            return TickReport {
                transition,
                applied: 0,
                reaped: 0,
                drain_error: None,
                snapshot: Snapshot::default(),
            };
        };

        let (applied, drain_error) = match drain_and_apply(subscription, &mut self.cache, now) {
            Ok(applied) => (applied, None),
            Err(err) => {
                debug!(error = %err, "CAN drain failed, treating tick as empty");
                (0, Some(err))
            }
        };

        let reaped = self.cache.sweep(now);
        let snapshot = self.snapshot(now);
        if snapshot.total > 0 {
            debug!("[CAN Overlay] Rendering {} messages", snapshot.total);
        }

        TickReport {
            transition,
            applied,
            reaped,
            drain_error,
            snapshot,
        }
    }

    /// Read-only view of the current state; does not poll, drain or sweep.
    pub fn snapshot(&self, now: Instant) -> Snapshot {
        presentation::snapshot(&self.cache, now, self.cache.display_limit())
    }

    /// Gate state.
    pub fn state(&self) -> GateState {
        self.gate.state()
    }

    /// True while subscribed.
    pub fn is_active(&self) -> bool {
        self.gate.is_active()
    }

    /// Read access to the cache.
    pub fn cache(&self) -> &FrameCache {
        &self.cache
    }

    /// Read access to the gate.
    pub fn gate(&self) -> &FeatureGate<F, T> {
        &self.gate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::DEFAULT_FLAG_KEY;
    use crate::params::MemoryFlags;
    use crate::transport::{BusEvent, CanFrame, LocalBus};
    use tracing_test::traced_test;

    fn overlay(flags: &MemoryFlags, bus: &LocalBus) -> CanOverlay<MemoryFlags, LocalBus> {
        CanOverlay::new(flags.clone(), bus.clone(), OverlaySettings::default())
    }

    #[test]
    fn test_idle_tick_never_drains() {
        let flags = MemoryFlags::new();
        let bus = LocalBus::new();
        let mut overlay = overlay(&flags, &bus);
        let t0 = Instant::now();

        for i in 0..10u64 {
            bus.publish("can", BusEvent::can(vec![CanFrame::new(0, 0x100, vec![1])]));
            let report = overlay.tick(t0 + Duration::from_millis(100 * i));
            assert_eq!(report.applied, 0);
            assert!(report.snapshot.is_empty());
        }
        assert!(overlay.cache().is_empty());
    }

    #[test]
    fn test_drain_error_is_absorbed() {
        let flags = MemoryFlags::new();
        flags.set_flag(DEFAULT_FLAG_KEY, true);
        let bus = LocalBus::new();
        let mut overlay = overlay(&flags, &bus);
        let t0 = Instant::now();
        overlay.tick(t0);

        bus.close("can");
        let report = overlay.tick(t0 + Duration::from_millis(50));
        assert_eq!(report.drain_error, Some(TransportError::Closed("can".to_string())));
        assert_eq!(report.applied, 0);
        assert!(overlay.is_active());
    }

    #[test]
    fn test_deactivation_clears_cache() {
        let flags = MemoryFlags::new();
        flags.set_flag(DEFAULT_FLAG_KEY, true);
        let bus = LocalBus::new();
        let mut overlay = overlay(&flags, &bus);
        let t0 = Instant::now();
        overlay.tick(t0);

        bus.publish("can", BusEvent::can(vec![CanFrame::new(0, 0x100, vec![1])]));
        assert_eq!(overlay.tick(t0 + Duration::from_millis(10)).applied, 1);

        flags.set_flag(DEFAULT_FLAG_KEY, false);
        let report = overlay.tick(t0 + Duration::from_millis(600));
        assert_eq!(report.transition, GateTransition::Deactivated);
        assert!(overlay.cache().is_empty());
        assert_eq!(overlay.state(), GateState::Idle);
    }

    #[traced_test]
    #[test]
    fn test_render_pass_logs_count_when_non_empty() {
        let flags = MemoryFlags::new();
        flags.set_flag(DEFAULT_FLAG_KEY, true);
        let bus = LocalBus::new();
        let mut overlay = overlay(&flags, &bus);
        let t0 = Instant::now();
        overlay.tick(t0);
        assert!(!logs_contain("Rendering"));

        bus.publish(
            "can",
            BusEvent::can(vec![
                CanFrame::new(0, 0x100, vec![1]),
                CanFrame::new(0, 0x101, vec![2]),
            ]),
        );
        overlay.tick(t0 + Duration::from_millis(10));
        assert!(logs_contain("[CAN Overlay] Rendering 2 messages"));
    }
}
