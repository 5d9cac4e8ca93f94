//! Feature gate: a polled on/off flag that owns the overlay's subscription.
//!
//! The gate has two states. In `Idle` it holds no subscription; in `Active` it holds
//! exactly one. It reads the flag no more often than once per poll interval and
//! returns the cached value in between, so a hot render loop never hammers the
//! flag source.
//!
//! ```text
//!            flag observed true
//!   Idle ──────────────────────────▶ Active
//!    ▲      (subscribe, zero-wait)     │
//!    └─────────────────────────────────┘
//!            flag observed false
//!     (drop subscription, caller clears caches)
//! ```
//!
//! After every completed check `subscription.is_some() == enabled`. A failed flag
//! read keeps the last-known value; a failed subscribe leaves the gate `Idle` and is
//! retried on the next check.

use crate::params::FlagSource;
use crate::transport::Transport;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default flag consulted by the overlay.
pub const DEFAULT_FLAG_KEY: &str = "ShowDebugInfo";

/// Default channel the overlay subscribes to.
pub const DEFAULT_CHANNEL: &str = "can";

/// Default minimum time between two flag reads.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Whether the overlay currently holds a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Flag off; no subscription.
    Idle,
    /// Flag on; subscribed to the CAN channel.
    Active,
}

/// Outcome of one [`FeatureGate::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateTransition {
    /// No state change (including "not due for a check yet").
    Unchanged,
    /// Idle → Active: a subscription was acquired.
    Activated,
    /// Active → Idle: the subscription was released. Caches must be cleared.
    Deactivated,
}

/// What the gate reads and what it subscribes to.
#[derive(Debug, Clone)]
pub struct GateSettings {
    /// Flag that switches the overlay on.
    pub flag_key: String,
    /// Channel to subscribe to while active.
    pub channel: String,
    /// Keep only the latest unread event.
    pub conflate: bool,
    /// Minimum time between flag reads.
    pub poll_interval: Duration,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            flag_key: DEFAULT_FLAG_KEY.to_string(),
            channel: DEFAULT_CHANNEL.to_string(),
            conflate: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Flag-driven owner of the CAN subscription.
///
/// The subscription exists exactly while the last-read flag value is true.
pub struct FeatureGate<F, T: Transport> {
    source: F,
    transport: T,
    settings: GateSettings,
    enabled: bool,
    last_checked: Option<Instant>,
    subscription: Option<T::Subscription>,
}

impl<F, T: Transport> std::fmt::Debug for FeatureGate<F, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureGate")
            .field("settings", &self.settings)
            .field("enabled", &self.enabled)
            .field("last_checked", &self.last_checked)
            .field("subscribed", &self.subscription.is_some())
            .finish()
    }
}

impl<F: FlagSource, T: Transport> FeatureGate<F, T> {
    /// Starts `Idle`. The first poll always reads the flag.
    pub fn new(source: F, transport: T, settings: GateSettings) -> Self {
        Self {
            source,
            transport,
            settings,
            enabled: false,
            last_checked: None,
            subscription: None,
        }
    }

    fn check_due(&self, now: Instant) -> bool {
        match self.last_checked {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.settings.poll_interval,
        }
    }

    /// Re-reads the flag if a check is due and moves between `Idle` and `Active`.
    pub fn poll(&mut self, now: Instant) -> GateTransition {
        if !self.check_due(now) {
            return GateTransition::Unchanged;
        }
        self.last_checked = Some(now);

        match self.source.read_flag(&self.settings.flag_key) {
            Ok(value) => self.enabled = value.unwrap_or(false),
            Err(err) => {
                warn!(
                    flag = %self.settings.flag_key,
                    enabled = self.enabled,
                    error = %err,
                    "Flag read failed, keeping last-known value"
                );
            }
        }

        if self.enabled && self.subscription.is_none() {
            match self
                .transport
                .subscribe(&self.settings.channel, self.settings.conflate)
            {
                Ok(subscription) => {
                    self.subscription = Some(subscription);
                    info!(
                        flag = %self.settings.flag_key,
                        channel = %self.settings.channel,
                        "CAN overlay activated"
                    );
                    GateTransition::Activated
                }
                Err(err) => {
                    self.enabled = false;
                    warn!(
                        channel = %self.settings.channel,
                        error = %err,
                        "Subscribe failed, staying idle until next check"
                    );
                    GateTransition::Unchanged
                }
            }
        } else if !self.enabled && self.subscription.take().is_some() {
            info!(flag = %self.settings.flag_key, "CAN overlay deactivated");
            GateTransition::Deactivated
        } else {
            debug!(enabled = self.enabled, "Flag unchanged");
            GateTransition::Unchanged
        }
    }

    /// Current state, derived from whether a subscription is held.
    pub fn state(&self) -> GateState {
        if self.subscription.is_some() {
            GateState::Active
        } else {
            GateState::Idle
        }
    }

    /// True while subscribed.
    pub fn is_active(&self) -> bool {
        self.subscription.is_some()
    }

    /// Last-observed flag value.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// When the flag was last read. `None` before the first poll.
    pub fn last_checked(&self) -> Option<Instant> {
        self.last_checked
    }

    /// The live subscription, while active.
    pub fn subscription_mut(&mut self) -> Option<&mut T::Subscription> {
        self.subscription.as_mut()
    }

    /// Settings the gate was built with.
    pub fn settings(&self) -> &GateSettings {
        &self.settings
    }

    /// The flag source.
    pub fn source(&self) -> &F {
        &self.source
    }

    /// The transport subscriptions come from.
    pub fn transport(&self) -> &T {
        &self.transport
    }
}
