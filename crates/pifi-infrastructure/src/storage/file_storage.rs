//! File-backed key-value storage.
//!
//! Each key is one JSON file in a directory:
//!
//! ```text
//! <storage_dir>/
//! ├── pifi-chat-storage.json
//! └── pifi-user-storage.json
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pifi_core::error::{PifiError, Result};
use pifi_core::storage::KeyValueStorage;

use super::atomic_file::AtomicFile;

/// Durable [`KeyValueStorage`] writing one atomic file per key.
///
/// Blocking file I/O runs on tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Creates a storage rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        tracing::debug!(dir = %dir.display(), "Opened file storage");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, key: &str) -> Result<AtomicFile> {
        validate_key(key)?;
        Ok(AtomicFile::new(self.dir.join(format!("{}.json", key))))
    }
}

/// Keys become file names, so only a conservative character set is allowed.
fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(PifiError::storage(format!("Invalid storage key: '{}'", key)))
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PifiError::internal(format!("Failed to join task: {}", e)))?
}

#[async_trait]
impl KeyValueStorage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let file = self.file_for(key)?;
        run_blocking(move || file.read()).await
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let file = self.file_for(key)?;
        let value = value.to_vec();
        run_blocking(move || file.write(&value)).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let file = self.file_for(key)?;
        run_blocking(move || file.remove()).await
    }
}
