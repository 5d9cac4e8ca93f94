//! Boolean flag sources polled by the feature gate.
//!
//! A flag source is a key/value store queried by a fixed string key. It is polled,
//! never pushed, and has no schema beyond "boolean or absent". The gate treats an
//! absent key as `false` and keeps its last-known value when a read fails.
//!
//! Realizations:
//! - [`ParamsDir`]: one file per key inside a directory, contents `1`/`0`.
//! - [`FlagFile`]: a TOML file with a `[flags]` table, re-read on every poll.
//! - [`MemoryFlags`]: an in-process map for embedding and tests.

pub mod flag_file;
pub mod params_dir;

pub use flag_file::FlagFile;
pub use params_dir::ParamsDir;

use crate::error::ParamsError;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Something the feature gate can ask "is this flag on?".
pub trait FlagSource {
    /// `Ok(None)` when the key is not set.
    fn read_flag(&self, key: &str) -> Result<Option<bool>, ParamsError>;
}

impl<T: FlagSource + ?Sized> FlagSource for Box<T> {
    fn read_flag(&self, key: &str) -> Result<Option<bool>, ParamsError> {
        (**self).read_flag(key)
    }
}

impl<T: FlagSource + ?Sized> FlagSource for Arc<T> {
    fn read_flag(&self, key: &str) -> Result<Option<bool>, ParamsError> {
        (**self).read_flag(key)
    }
}

/// Parses the textual forms a flag may be stored as.
pub(crate) fn parse_flag(key: &str, raw: &str) -> Result<bool, ParamsError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" | "" => Ok(false),
        other => Err(ParamsError::InvalidValue {
            key: key.to_string(),
            value: other.to_string(),
        }),
    }
}

/// Shared in-memory flags. Clones see each other's writes.
#[derive(Debug, Clone, Default)]
pub struct MemoryFlags {
    flags: Arc<RwLock<HashMap<String, bool>>>,
}

impl MemoryFlags {
    /// Creates an empty flag set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, visible to every clone.
    pub fn set_flag(&self, key: &str, enabled: bool) {
        let mut flags = self.flags.write().unwrap_or_else(PoisonError::into_inner);
        flags.insert(key.to_string(), enabled);
    }

    /// Removes `key`, so it reads as absent.
    pub fn unset_flag(&self, key: &str) {
        let mut flags = self.flags.write().unwrap_or_else(PoisonError::into_inner);
        flags.remove(key);
    }
}

impl FlagSource for MemoryFlags {
    fn read_flag(&self, key: &str) -> Result<Option<bool>, ParamsError> {
        let flags = self.flags.read().unwrap_or_else(PoisonError::into_inner);
        Ok(flags.get(key).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag_forms() {
        assert!(parse_flag("k", "1").unwrap());
        assert!(parse_flag("k", " TRUE\n").unwrap());
        assert!(!parse_flag("k", "0").unwrap());
        assert!(!parse_flag("k", "").unwrap());
        assert!(parse_flag("k", "maybe").is_err());
    }

    #[test]
    fn test_memory_flags_shared_between_clones() {
        let flags = MemoryFlags::new();
        let view = flags.clone();
        assert_eq!(view.read_flag("ShowDebugInfo").unwrap(), None);

        flags.set_flag("ShowDebugInfo", true);
        assert_eq!(view.read_flag("ShowDebugInfo").unwrap(), Some(true));

        flags.unset_flag("ShowDebugInfo");
        assert_eq!(view.read_flag("ShowDebugInfo").unwrap(), None);
    }
}
