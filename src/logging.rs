//! Tracing setup
//!
//! The overlay logs through `tracing`; this module installs the subscriber. Per-frame
//! diagnostic lines are emitted at `debug`, so run with `level = "debug"` (or
//! `RUST_LOG=can_overlay=debug`) to capture them.
//!
//! # Example
//! ```no_run
//! use can_overlay::{config::OverlayConfig, logging};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = OverlayConfig::load()?;
//! logging::init_from_config(&config)?;
//! tracing::info!("Overlay starting");
//! # Ok(())
//! # }
//! ```

use crate::config::{LogFormat, OverlayConfig};
use crate::error::{AppResult, OverlayError};
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Tracing configuration options
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Default level when `RUST_LOG` is unset
    pub level: Level,
    /// Output format
    pub format: LogFormat,
    /// Whether to include file and line numbers
    pub with_file_and_line: bool,
    /// Whether to enable ANSI colors (ignored for JSON)
    pub with_ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            with_file_and_line: false,
            with_ansi: true,
        }
    }
}

impl TracingConfig {
    /// Builds tracing options from the `[logging]` section.
    pub fn from_overlay_config(config: &OverlayConfig) -> AppResult<Self> {
        Ok(Self {
            level: parse_log_level(&config.logging.level)?,
            format: config.logging.format,
            with_ansi: config.logging.ansi,
            ..Default::default()
        })
    }

    /// Compact output at `level`.
    pub fn new(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Sets the output format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Enables or disables ANSI colours.
    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.with_ansi = enabled;
        self
    }
}

/// Installs the global subscriber described by `config.logging`.
pub fn init_from_config(config: &OverlayConfig) -> AppResult<()> {
    init(TracingConfig::from_overlay_config(config)?)
}

/// Installs the global subscriber.
///
/// Idempotent: if a subscriber is already installed this returns `Ok(())`.
pub fn init(config: TracingConfig) -> AppResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_lowercase()));

    let fmt_layer = match config.format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_file(config.with_file_and_line)
            .with_line_number(config.with_file_and_line)
            .with_ansi(config.with_ansi)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_file(config.with_file_and_line)
            .with_line_number(config.with_file_and_line)
            .with_ansi(config.with_ansi)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_file(config.with_file_and_line)
            .with_line_number(config.with_file_and_line)
            .boxed(),
    };

    match tracing_subscriber::registry()
        .with(fmt_layer.with_filter(env_filter))
        .try_init()
    {
        Ok(()) => Ok(()),
        // Expected in tests and when several components try to init tracing.
        Err(e) if e.to_string().contains("already been set") => Ok(()),
        Err(e) => Err(OverlayError::Logging(e.to_string())),
    }
}

/// Parse log level string into tracing Level
fn parse_log_level(level: &str) -> AppResult<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(OverlayError::Configuration(format!(
            "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
            level
        ))),
    }
}
