//! # CAN Debug Overlay Core Library
//!
//! This crate is the state engine behind a live CAN bus debug overlay. It ingests a
//! continuous stream of bus frames, keeps the latest frame per (bus, address) pair,
//! ages them out, and hands a small, freshness-ranked view to whatever surface draws
//! it. A runtime feature flag switches the whole thing on and off, and with it the
//! subscription to the inbound channel.
//!
//! ## Crate Structure
//!
//! - **`frame`**: `FrameKey`, `Frame` and the fresh/stale/invalid `FrameStyle`.
//! - **`cache`**: the `FrameStore` (latest frame per key) and `RecencyTracker`
//!   (bounded move-to-front order), kept in step by `FrameCache`, which also reaps
//!   stale frames.
//! - **`gate`**: the `FeatureGate` state machine that polls the flag and owns the
//!   subscription.
//! - **`ingest`**: the pump that drains a subscription and applies its frames.
//! - **`presentation`**: read-only `Snapshot`s and a text renderer.
//! - **`gui`**: the egui widget and a minimal `eframe` host.
//! - **`overlay`**: `CanOverlay`, which runs poll → drain → sweep → snapshot per tick.
//! - **`transport`**: bus events, the `Transport`/`Subscription` seam and the
//!   in-process `LocalBus`.
//! - **`params`**: flag sources (`ParamsDir`, `FlagFile`, `MemoryFlags`).
//! - **`config`**: Figment-based `OverlayConfig`.
//! - **`logging`**: `tracing-subscriber` setup.
//! - **`replay`**: candump capture parsing for the headless viewer.
//! - **`error`**: `OverlayError`, `TransportError`, `ParamsError`.

pub mod cache;
pub mod config;
pub mod error;
pub mod frame;
pub mod gate;
pub mod gui;
pub mod ingest;
pub mod logging;
pub mod overlay;
pub mod params;
pub mod presentation;
pub mod replay;
pub mod transport;

pub use cache::FrameCache;
pub use error::{AppResult, OverlayError, ParamsError, TransportError};
pub use frame::{Frame, FrameKey, FrameStyle};
pub use gate::{FeatureGate, GateState, GateTransition};
pub use overlay::{CanOverlay, OverlaySettings, TickReport};
pub use presentation::{Snapshot, SnapshotRow};
