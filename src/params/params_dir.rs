//! Directory-backed params: the flag `ShowDebugInfo` lives in `<dir>/ShowDebugInfo`.

use super::{parse_flag, FlagSource};
use crate::error::ParamsError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Flag source with one file per key under a root directory.
#[derive(Debug, Clone)]
pub struct ParamsDir {
    root: PathBuf,
}

impl ParamsDir {
    /// Reads flags from files under `root`. The directory need not exist yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the flag files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes a flag. Used by tooling and tests; the overlay itself only reads.
    pub fn put_bool(&self, key: &str, value: bool) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::write(self.root.join(key), if value { "1" } else { "0" })
    }
}

impl FlagSource for ParamsDir {
    fn read_flag(&self, key: &str) -> Result<Option<bool>, ParamsError> {
        match std::fs::read_to_string(self.root.join(key)) {
            Ok(raw) => parse_flag(key, &raw).map(Some),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ParamsError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let params = ParamsDir::new(dir.path());
        assert_eq!(params.read_flag("ShowDebugInfo").unwrap(), None);
    }

    #[test]
    fn test_put_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let params = ParamsDir::new(dir.path().join("params"));

        params.put_bool("ShowDebugInfo", true).unwrap();
        assert_eq!(params.read_flag("ShowDebugInfo").unwrap(), Some(true));

        params.put_bool("ShowDebugInfo", false).unwrap();
        assert_eq!(params.read_flag("ShowDebugInfo").unwrap(), Some(false));
    }

    #[test]
    fn test_garbage_value_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ShowDebugInfo"), "sometimes").unwrap();
        let params = ParamsDir::new(dir.path());
        assert!(matches!(
            params.read_flag("ShowDebugInfo"),
            Err(ParamsError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_key_that_is_a_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("ShowDebugInfo")).unwrap();
        let params = ParamsDir::new(dir.path());
        assert!(matches!(
            params.read_flag("ShowDebugInfo"),
            Err(ParamsError::Io { .. })
        ));
    }
}
