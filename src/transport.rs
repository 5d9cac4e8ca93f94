//! Inbound transport: bus events and non-blocking subscriptions.
//!
//! The overlay never talks to CAN hardware. It subscribes to a named channel on
//! which an upstream collaborator publishes [`BusEvent`]s, and drains whatever is
//! buffered once per tick. Two traits form the seam:
//!
//! - [`Transport`] hands out subscriptions for a channel name.
//! - [`Subscription`] drains everything currently buffered without waiting.
//!
//! [`LocalBus`] is the in-process realization. Each channel has two fan-out paths:
//! a conflating one built on `tokio::sync::watch` (only the latest unread event is
//! kept) and a queued one built on `tokio::sync::broadcast` (every event is kept up
//! to the queue capacity; a slow reader sees a lag error).

use crate::error::TransportError;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::{broadcast, watch};

/// Largest payload a CAN FD frame can carry.
pub const MAX_PAYLOAD_LEN: usize = 64;

/// Largest 29-bit extended arbitration id.
pub const MAX_ADDRESS: u32 = 0x1FFF_FFFF;

/// Queue depth of a non-conflating subscription.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// One frame inside a [`BusEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanFrame {
    /// Source bus index.
    pub src: u8,
    /// Arbitration id, 11 or 29 bits.
    pub address: u32,
    /// Payload, up to 64 bytes.
    pub dat: Bytes,
}

impl CanFrame {
    /// Frame on bus `src`.
    pub fn new(src: u8, address: u32, dat: impl Into<Bytes>) -> Self {
        Self {
            src,
            address,
            dat: dat.into(),
        }
    }

    /// Rejects frames no CAN controller could have produced.
    pub fn check(&self) -> Result<(), TransportError> {
        if self.address > MAX_ADDRESS {
            return Err(TransportError::Malformed(format!(
                "address 0x{:X} exceeds 29 bits",
                self.address
            )));
        }
        if self.dat.len() > MAX_PAYLOAD_LEN {
            return Err(TransportError::Malformed(format!(
                "payload of {} bytes on 0x{:03X} exceeds {MAX_PAYLOAD_LEN}",
                self.dat.len(),
                self.address
            )));
        }
        Ok(())
    }
}

/// Discriminated payload of a [`BusEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    /// Frames received from the bus. The only variant the overlay consumes.
    Can(Vec<CanFrame>),
    /// Frames queued for sending. Ignored by the overlay.
    Sendcan(Vec<CanFrame>),
    /// Any other service, by name.
    Other(String),
}

/// A record published on a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusEvent {
    /// Publisher's monotonic time in nanoseconds. Informational only.
    pub log_mono_time: u64,
    /// Publisher-supplied validity, copied onto every frame.
    pub valid: bool,
    /// Event body.
    pub payload: EventPayload,
}

impl BusEvent {
    /// A valid `can` event carrying `frames`.
    pub fn can(frames: Vec<CanFrame>) -> Self {
        Self {
            log_mono_time: 0,
            valid: true,
            payload: EventPayload::Can(frames),
        }
    }

    /// Overrides the publisher's validity flag.
    pub fn with_validity(mut self, valid: bool) -> Self {
        self.valid = valid;
        self
    }

    /// Sets the publisher's monotonic log time.
    pub fn with_mono_time(mut self, log_mono_time: u64) -> Self {
        self.log_mono_time = log_mono_time;
        self
    }

    /// Frames carried by a `Can` payload, if any.
    pub fn can_frames(&self) -> Option<&[CanFrame]> {
        match &self.payload {
            EventPayload::Can(frames) => Some(frames),
            _ => None,
        }
    }
}

/// A live, non-blocking view onto a channel.
pub trait Subscription {
    /// Returns every event buffered since the last drain. Never waits.
    fn drain(&mut self) -> Result<Vec<Arc<BusEvent>>, TransportError>;
}

/// Hands out subscriptions for named channels.
pub trait Transport {
    /// Subscription handed out by this transport.
    type Subscription: Subscription;

    /// Must not block.
    fn subscribe(&self, channel: &str, conflate: bool)
        -> Result<Self::Subscription, TransportError>;
}

struct Channel {
    queued: broadcast::Sender<Arc<BusEvent>>,
    latest: watch::Sender<Option<Arc<BusEvent>>>,
}

impl Channel {
    fn new(queue_capacity: usize) -> Self {
        let (queued, _) = broadcast::channel(queue_capacity);
        let (latest, _) = watch::channel(None);
        Self { queued, latest }
    }
}

/// In-process publish/subscribe bus keyed by channel name.
///
/// Cloning yields another handle onto the same channels.
#[derive(Clone)]
pub struct LocalBus {
    channels: Arc<Mutex<HashMap<String, Channel>>>,
    queue_capacity: usize,
}

impl std::fmt::Debug for LocalBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBus")
            .field("queue_capacity", &self.queue_capacity)
            .finish()
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalBus {
    /// Bus with the default queue capacity.
    pub fn new() -> Self {
        Self::with_queue_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Bus whose queued subscribers buffer up to `queue_capacity` events.
    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            queue_capacity: queue_capacity.max(1),
        }
    }

    fn with_channel<R>(&self, name: &str, f: impl FnOnce(&Channel) -> R) -> R {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let channel = channels
            .entry(name.to_string())
            .or_insert_with(|| Channel::new(self.queue_capacity));
        f(channel)
    }

    /// Publishes `event` on `channel`, returning how many queued subscribers got it.
    pub fn publish(&self, channel: &str, event: BusEvent) -> usize {
        let event = Arc::new(event);
        self.with_channel(channel, |ch| {
            ch.latest.send_replace(Some(Arc::clone(&event)));
            ch.queued.send(event).unwrap_or(0)
        })
    }

    /// Drops a channel. Existing subscribers see it as closed.
    pub fn close(&self, channel: &str) -> bool {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels.remove(channel).is_some()
    }
}

impl Transport for LocalBus {
    type Subscription = LocalSubscription;

    fn subscribe(&self, channel: &str, conflate: bool) -> Result<LocalSubscription, TransportError> {
        let kind = self.with_channel(channel, |ch| {
            if conflate {
                SubscriptionKind::Conflated(ch.latest.subscribe())
            } else {
                SubscriptionKind::Queued(ch.queued.subscribe())
            }
        });
        Ok(LocalSubscription {
            channel: channel.to_string(),
            kind,
        })
    }
}

enum SubscriptionKind {
    Conflated(watch::Receiver<Option<Arc<BusEvent>>>),
    Queued(broadcast::Receiver<Arc<BusEvent>>),
}

/// Subscription handed out by [`LocalBus`].
pub struct LocalSubscription {
    channel: String,
    kind: SubscriptionKind,
}

impl std::fmt::Debug for LocalSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let conflate = matches!(self.kind, SubscriptionKind::Conflated(_));
        f.debug_struct("LocalSubscription")
            .field("channel", &self.channel)
            .field("conflate", &conflate)
            .finish()
    }
}

impl LocalSubscription {
    /// Channel this subscription reads.
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl Subscription for LocalSubscription {
    fn drain(&mut self) -> Result<Vec<Arc<BusEvent>>, TransportError> {
        match &mut self.kind {
            SubscriptionKind::Conflated(rx) => match rx.has_changed() {
                Ok(true) => Ok(rx.borrow_and_update().iter().cloned().collect()),
                Ok(false) => Ok(Vec::new()),
                Err(_) => Err(TransportError::Closed(self.channel.clone())),
            },
            SubscriptionKind::Queued(rx) => {
                let mut events = Vec::new();
                loop {
                    match rx.try_recv() {
                        Ok(event) => events.push(event),
                        Err(TryRecvError::Empty) => return Ok(events),
                        Err(TryRecvError::Closed) => {
                            return Err(TransportError::Closed(self.channel.clone()))
                        }
                        Err(TryRecvError::Lagged(skipped)) => {
                            return Err(TransportError::Lagged {
                                channel: self.channel.clone(),
                                skipped,
                            })
                        }
                    }
                }
            }
        }
    }
}
