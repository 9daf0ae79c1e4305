//! Application configuration (`config.toml`).
//!
//! Every field is optional in the file; missing sections fall back to
//! defaults. `PIFI_BACKEND_URL` overrides `backend.base_url`.

use std::path::{Path, PathBuf};

use pifi_core::error::Result;
use serde::{Deserialize, Serialize};

use crate::paths::PifiPaths;

/// Environment variable overriding the backend base URL.
pub const BACKEND_URL_ENV: &str = "PIFI_BACKEND_URL";

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory for key-value slots. Defaults to the platform data dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Also write a daily-rotated log file.
    pub file: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: false,
        }
    }
}

/// Root of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PifiConfig {
    pub storage: StorageSettings,
    pub backend: BackendSettings,
    pub logging: LoggingSettings,
}

impl PifiConfig {
    /// Loads the config from the platform config file.
    pub fn load() -> Result<Self> {
        let path = PifiPaths::config_file()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides(std::env::var(BACKEND_URL_ENV).ok());
        Ok(config)
    }

    /// Loads the config from `path`. A missing or empty file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        Ok(toml::from_str(&content)?)
    }

    /// Applies environment overrides. Blank values are ignored.
    pub fn apply_env_overrides(&mut self, backend_url: Option<String>) {
        if let Some(url) = backend_url.filter(|url| !url.trim().is_empty()) {
            self.backend.base_url = url.trim().to_string();
        }
    }

    /// Resolves the storage directory.
    pub fn storage_dir(&self) -> Result<PathBuf> {
        match &self.storage.dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(PifiPaths::storage_dir()?),
        }
    }
}
