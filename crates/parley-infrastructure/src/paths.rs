//! Unified path management for parley files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/parley/            # Config directory
//! └── config.toml              # Application configuration
//!
//! ~/.local/share/parley/       # Data directory (overridable via [storage].data_dir)
//! ├── history/                 # One TOML transcript per correspondent
//! ├── processing_state.toml    # Resume cursor
//! └── parley.log               # Default log file
//! ```

use parley_core::error::{ParleyError, Result};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "parley";

/// Resolves every file location parley reads or writes.
#[derive(Debug, Clone)]
pub struct ParleyPaths {
    data_dir: PathBuf,
}

impl ParleyPaths {
    /// Creates paths rooted at `data_dir`, or at the platform data directory
    /// when `None`.
    pub fn new(data_dir: Option<&Path>) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir.to_path_buf(),
            None => Self::default_data_dir()?,
        };
        Ok(Self { data_dir })
    }

    /// Returns the platform config directory for parley (e.g. `~/.config/parley/`).
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or_else(|| ParleyError::config("Cannot determine config directory"))
    }

    /// Returns the default location of `config.toml`.
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Returns the platform data directory for parley (e.g. `~/.local/share/parley/`).
    pub fn default_data_dir() -> Result<PathBuf> {
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or_else(|| ParleyError::config("Cannot determine data directory"))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn history_dir(&self) -> PathBuf {
        self.data_dir.join("history")
    }

    pub fn state_file(&self) -> PathBuf {
        self.data_dir.join("processing_state.toml")
    }

    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("parley.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_follow_data_dir_override() {
        let paths = ParleyPaths::new(Some(Path::new("/tmp/parley-test"))).unwrap();

        assert_eq!(paths.data_dir(), Path::new("/tmp/parley-test"));
        assert_eq!(paths.history_dir(), PathBuf::from("/tmp/parley-test/history"));
        assert!(paths.state_file().ends_with("processing_state.toml"));
        assert!(paths.log_file().starts_with(paths.data_dir()));
    }
}
