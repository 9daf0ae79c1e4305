//! Unified path management for PiFi files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/pifi/              # Config directory
//! ├── config.toml              # Application configuration
//! └── logs/                    # Application logs
//!     └── pifi.log.YYYY-MM-DD
//!
//! ~/.local/share/pifi/         # Data directory
//! └── storage/                 # Key-value slots (FileStorage)
//! ```

use std::path::PathBuf;

const APP_DIR: &str = "pifi";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Platform directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for pifi_core::PifiError {
    fn from(err: PathError) -> Self {
        pifi_core::PifiError::config(err.to_string())
    }
}

/// Platform directories for PiFi.
pub struct PifiPaths;

impl PifiPaths {
    /// Returns the PiFi configuration directory (e.g. `~/.config/pifi/`).
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the PiFi data directory (e.g. `~/.local/share/pifi/`).
    pub fn data_dir() -> Result<PathBuf, PathError> {
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the path to `config.toml`.
    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Returns the default directory for key-value slots.
    pub fn storage_dir() -> Result<PathBuf, PathError> {
        Ok(Self::data_dir()?.join("storage"))
    }

    /// Returns the path to the logs directory.
    pub fn logs_dir() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("logs"))
    }
}
