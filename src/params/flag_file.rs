//! TOML flag file, re-read on every poll.
//!
//! ```toml
//! default_enabled = false
//!
//! [flags]
//! ShowDebugInfo = true
//! ExperimentalLongitudinal = { environments = ["bench"] }
//! ```
//!
//! A missing file reads as "no flags set". The environment used by
//! environment-scoped flags comes from `CAN_OVERLAY_ENVIRONMENT`.

use super::FlagSource;
use crate::error::ParamsError;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Contents of a flag file.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct FlagFileConfig {
    /// Map of flag names to their enabled state.
    #[serde(default)]
    pub flags: HashMap<String, FlagValue>,

    /// Value reported for flags not listed in `flags`.
    #[serde(default)]
    pub default_enabled: bool,
}

/// A flag value - a plain bool or a set of environments it is enabled in.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    /// On or off everywhere.
    Bool(bool),
    /// On only in the listed environments.
    Environment {
        /// Environment names, matched exactly.
        environments: Vec<String>,
    },
}

impl FlagValue {
    /// Resolves the value for `environment`. Scoped flags are off without one.
    pub fn is_enabled(&self, environment: Option<&str>) -> bool {
        match self {
            FlagValue::Bool(enabled) => *enabled,
            FlagValue::Environment { environments } => environment
                .map(|env| environments.iter().any(|e| e == env))
                .unwrap_or(false),
        }
    }
}

/// Flag source backed by a TOML flag file.
#[derive(Debug, Clone)]
pub struct FlagFile {
    path: PathBuf,
    environment: Option<String>,
}

impl FlagFile {
    /// Reads flags from `path`, scoped to `CAN_OVERLAY_ENVIRONMENT` if set.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            environment: std::env::var("CAN_OVERLAY_ENVIRONMENT").ok(),
        }
    }

    /// Overrides the environment used for scoped flags.
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Flag file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self, key: &str) -> Result<Option<FlagFileConfig>, ParamsError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ParamsError::Io {
                    key: key.to_string(),
                    source,
                })
            }
        };

        toml::from_str(&content)
            .map(Some)
            .map_err(|err| ParamsError::Parse {
                path: self.path.display().to_string(),
                message: err.to_string(),
            })
    }
}

impl FlagSource for FlagFile {
    fn read_flag(&self, key: &str) -> Result<Option<bool>, ParamsError> {
        let Some(config) = self.load(key)? else {
            return Ok(None);
        };

        Ok(match config.flags.get(key) {
            Some(value) => Some(value.is_enabled(self.environment.as_deref())),
            None => config.default_enabled.then_some(true),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_file_reads_absent() {
        let dir = tempfile::tempdir().unwrap();
        let flags = FlagFile::new(dir.path().join("flags.toml"));
        assert_eq!(flags.read_flag("ShowDebugInfo").unwrap(), None);
    }

    #[test]
    fn test_load_flags() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[flags]
ShowDebugInfo = true
RecordFront = false
"#
        )
        .unwrap();

        let flags = FlagFile::new(file.path());
        assert_eq!(flags.read_flag("ShowDebugInfo").unwrap(), Some(true));
        assert_eq!(flags.read_flag("RecordFront").unwrap(), Some(false));
        assert_eq!(flags.read_flag("Unlisted").unwrap(), None);
    }

    #[test]
    fn test_file_is_reread_on_each_poll() {
        let file = NamedTempFile::new().unwrap();
        let flags = FlagFile::new(file.path());

        std::fs::write(file.path(), "[flags]\nShowDebugInfo = false\n").unwrap();
        assert_eq!(flags.read_flag("ShowDebugInfo").unwrap(), Some(false));

        std::fs::write(file.path(), "[flags]\nShowDebugInfo = true\n").unwrap();
        assert_eq!(flags.read_flag("ShowDebugInfo").unwrap(), Some(true));
    }

    #[test]
    fn test_default_enabled_applies_to_unlisted() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "default_enabled = true\n").unwrap();
        let flags = FlagFile::new(file.path());
        assert_eq!(flags.read_flag("ShowDebugInfo").unwrap(), Some(true));
    }

    #[test]
    fn test_environment_flag() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            "[flags]\nShowDebugInfo = { environments = [\"bench\", \"garage\"] }\n",
        )
        .unwrap();

        let bench = FlagFile::new(file.path()).with_environment("bench");
        let road = FlagFile::new(file.path()).with_environment("road");
        assert_eq!(bench.read_flag("ShowDebugInfo").unwrap(), Some(true));
        assert_eq!(road.read_flag("ShowDebugInfo").unwrap(), Some(false));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "[flags\nShowDebugInfo = ").unwrap();
        let flags = FlagFile::new(file.path());
        assert!(matches!(
            flags.read_flag("ShowDebugInfo"),
            Err(ParamsError::Parse { .. })
        ));
    }
}
