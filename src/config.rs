//! Overlay configuration using Figment
//!
//! Configuration is loaded from:
//! 1. `config/can_overlay.toml` (or an explicit path), all keys optional
//! 2. Environment variables prefixed with `CAN_OVERLAY_`, nested keys split on `__`
//!
//! Example: `CAN_OVERLAY_OVERLAY__DISPLAY_LIMIT=10` or
//! `CAN_OVERLAY_LOGGING__LEVEL=debug`.
//!
//! ```toml
//! [overlay]
//! flag_key = "ShowDebugInfo"
//! channel = "can"
//! display_limit = 20
//! stale_timeout = "2s"
//! flag_poll_interval = "500ms"
//!
//! [params]
//! source = "dir"
//! path = "/data/params/d"
//!
//! [logging]
//! level = "info"
//! format = "compact"
//! ```

use crate::error::{AppResult, OverlayError};
use crate::params::{FlagFile, FlagSource, ParamsDir};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/can_overlay.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "CAN_OVERLAY_";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Gate, cache and tick settings
    pub overlay: OverlaySection,
    /// Where the feature flag is read from
    pub params: ParamsConfig,
    /// Log output
    pub logging: LoggingConfig,
}

/// Gate, cache and tick settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySection {
    /// Flag that switches the overlay on
    pub flag_key: String,
    /// Channel carrying CAN events
    pub channel: String,
    /// Keep only the latest unread event instead of queueing
    pub conflate: bool,
    /// Rows shown per snapshot
    pub display_limit: usize,
    /// Age after which a frame is stale and reaped
    #[serde(with = "humantime_serde")]
    pub stale_timeout: Duration,
    /// Minimum time between flag reads
    #[serde(with = "humantime_serde")]
    pub flag_poll_interval: Duration,
    /// Period of the headless and GUI tick loops
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,
}

impl Default for OverlaySection {
    fn default() -> Self {
        Self {
            flag_key: crate::gate::DEFAULT_FLAG_KEY.to_string(),
            channel: crate::gate::DEFAULT_CHANNEL.to_string(),
            conflate: true,
            display_limit: crate::cache::DEFAULT_DISPLAY_LIMIT,
            stale_timeout: crate::cache::DEFAULT_STALE_TIMEOUT,
            flag_poll_interval: crate::gate::DEFAULT_POLL_INTERVAL,
            tick_interval: Duration::from_millis(50),
        }
    }
}

/// Kind of flag source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamsSourceKind {
    /// One file per key
    Dir,
    /// TOML flag file
    File,
}

/// Flag source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamsConfig {
    /// Directory or flag file
    pub source: ParamsSourceKind,
    /// Directory root or flag file path
    pub path: PathBuf,
}

impl Default for ParamsConfig {
    fn default() -> Self {
        Self {
            source: ParamsSourceKind::Dir,
            path: PathBuf::from("/data/params/d"),
        }
    }
}

impl ParamsConfig {
    /// Builds the configured flag source. Opening never touches the filesystem.
    pub fn open(&self) -> Box<dyn FlagSource + Send + Sync> {
        match self.source {
            ParamsSourceKind::Dir => Box::new(ParamsDir::new(&self.path)),
            ParamsSourceKind::File => Box::new(FlagFile::new(&self.path)),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, human-oriented
    Pretty,
    /// One line per event
    Compact,
    /// Newline-delimited JSON
    Json,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format
    pub format: LogFormat,
    /// ANSI colours for pretty output
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            ansi: true,
        }
    }
}

impl OverlayConfig {
    /// Load configuration from `config/can_overlay.toml` and environment variables
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path. A missing file yields defaults.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(OverlayError::Configuration(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        let overlay = &self.overlay;
        if overlay.display_limit == 0 {
            return Err(OverlayError::Configuration(
                "display_limit must be at least 1".to_string(),
            ));
        }
        if overlay.flag_key.trim().is_empty() {
            return Err(OverlayError::Configuration(
                "flag_key must not be empty".to_string(),
            ));
        }
        if overlay.channel.trim().is_empty() {
            return Err(OverlayError::Configuration(
                "channel must not be empty".to_string(),
            ));
        }

        for (name, value) in [
            ("stale_timeout", overlay.stale_timeout),
            ("flag_poll_interval", overlay.flag_poll_interval),
            ("tick_interval", overlay.tick_interval),
        ] {
            if value.is_zero() {
                return Err(OverlayError::Configuration(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = OverlayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.overlay.display_limit, 20);
        assert_eq!(config.overlay.stale_timeout, Duration::from_secs(2));
        assert_eq!(config.overlay.flag_poll_interval, Duration::from_millis(500));
        assert_eq!(config.overlay.flag_key, "ShowDebugInfo");
    }

    #[test]
    fn test_load_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlay.toml");
        std::fs::write(
            &path,
            r#"
[overlay]
display_limit = 8
stale_timeout = "1500ms"
conflate = false

[params]
source = "file"
path = "flags.toml"

[logging]
level = "debug"
format = "json"
"#,
        )
        .unwrap();

        let config = OverlayConfig::load_from(&path).unwrap();
        assert_eq!(config.overlay.display_limit, 8);
        assert_eq!(config.overlay.stale_timeout, Duration::from_millis(1500));
        assert!(!config.overlay.conflate);
        assert_eq!(config.overlay.channel, "can");
        assert_eq!(config.params.source, ParamsSourceKind::File);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = OverlayConfig::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.overlay.display_limit, 20);
    }

    #[test]
    fn test_bad_duration_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlay.toml");
        std::fs::write(&path, "[overlay]\nstale_timeout = \"soon\"\n").unwrap();
        assert!(matches!(
            OverlayConfig::load_from(&path),
            Err(OverlayError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = OverlayConfig::default();
        config.overlay.display_limit = 0;
        assert!(config.validate().is_err());

        let mut config = OverlayConfig::default();
        config.overlay.stale_timeout = Duration::ZERO;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("stale_timeout"));

        let mut config = OverlayConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = OverlayConfig::default();
        config.overlay.flag_key = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_params_open_reads_configured_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ShowDebugInfo"), "1").unwrap();
        let params = ParamsConfig {
            source: ParamsSourceKind::Dir,
            path: dir.path().to_path_buf(),
        };
        assert_eq!(params.open().read_flag("ShowDebugInfo").unwrap(), Some(true));
    }
}
