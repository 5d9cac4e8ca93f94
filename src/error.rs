//! Custom error types for the overlay.
//!
//! This module defines the error types used across the crate. Using the `thiserror`
//! crate, it provides a centralized and consistent way to describe what can go wrong,
//! from configuration and I/O problems to transport and flag-source hiccups.
//!
//! ## Error Hierarchy
//!
//! - **`OverlayError`**: application-level errors raised while loading configuration,
//!   wiring up sources, or starting the binary. These are the only errors that ever
//!   reach a caller.
//! - **`TransportError`**: raised by a [`Subscription`](crate::transport::Subscription)
//!   when a drain fails or a record is malformed. The tick loop absorbs these and
//!   treats the tick as empty.
//! - **`ParamsError`**: raised by a [`FlagSource`](crate::params::FlagSource) when the
//!   flag cannot be read. The feature gate absorbs these and keeps the last-known value.
//!
//! By using `#[from]`, `OverlayError` can be created from the narrower error types,
//! simplifying error handling with the `?` operator.

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, OverlayError>;

/// Application-level error.
#[derive(Error, Debug)]
pub enum OverlayError {
    /// The configuration file or environment could not be extracted.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// The configuration loaded but holds values the overlay cannot use.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Filesystem access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A flag source could not be read.
    #[error("Flag source error: {0}")]
    Params(#[from] ParamsError),

    /// A subscription failed outside the tick loop.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A capture file is malformed.
    #[error("Replay error: {0}")]
    Replay(#[from] crate::replay::ReplayError),

    /// The global tracing subscriber could not be installed.
    #[error("Logging initialization failed: {0}")]
    Logging(String),
}

impl From<figment::Error> for OverlayError {
    fn from(err: figment::Error) -> Self {
        OverlayError::Config(Box::new(err))
    }
}

/// Errors raised while draining an inbound subscription.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The named channel no longer exists.
    #[error("channel '{0}' is closed")]
    Closed(String),

    /// A queued subscriber fell behind and records were dropped.
    #[error("subscriber on '{channel}' lagged behind by {skipped} records")]
    Lagged {
        /// Channel the subscriber reads.
        channel: String,
        /// Records lost before the next one delivered.
        skipped: u64,
    },

    /// A record failed validation; the drain it came from is discarded.
    #[error("malformed record: {0}")]
    Malformed(String),
}

/// Errors raised while reading the feature flag.
#[derive(Error, Debug)]
pub enum ParamsError {
    /// Reading the flag's backing file failed for a reason other than absence.
    #[error("failed to read flag '{key}': {source}")]
    Io {
        /// Flag being read.
        key: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The flag exists but is not a recognizable boolean.
    #[error("flag '{key}' holds an unrecognized value '{value}'")]
    InvalidValue {
        /// Flag being read.
        key: String,
        /// Raw contents, trimmed.
        value: String,
    },

    /// A flag file is not valid TOML for the expected layout.
    #[error("failed to parse flag file {path}: {message}")]
    Parse {
        /// Flag file path.
        path: String,
        /// Parser message.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_converts_into_overlay_error() {
        let err: OverlayError = TransportError::Closed("can".to_string()).into();
        assert!(matches!(err, OverlayError::Transport(_)));
        assert_eq!(
            err.to_string(),
            "Transport error: channel 'can' is closed"
        );
    }

    #[test]
    fn test_params_error_message_names_key() {
        let err = ParamsError::InvalidValue {
            key: "ShowDebugInfo".to_string(),
            value: "maybe".to_string(),
        };
        assert!(err.to_string().contains("ShowDebugInfo"));
        assert!(err.to_string().contains("maybe"));
    }
}
