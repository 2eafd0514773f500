//! File-based session storage.
//!
//! All entries live in one JSON file:
//! ```json
//! {
//!   "entries": {
//!     "session": {
//!       "expires_at": 1719792000,
//!       "value": "{\"access_token\":\"...\",\"refresh_token\":\"...\"}"
//!     }
//!   }
//! }
//! ```
//! Entries past their expiry read as absent and are dropped on the next write.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use costsmap_application::ports::{Clock, SessionStorage, StorageError};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::Entry;
use crate::serialization::{decode, encode_pretty};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StorageFile {
    #[serde(default)]
    entries: BTreeMap<String, Entry>,
}

/// Session storage backed by a single JSON file.
pub struct FileSessionStorage {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileSessionStorage {
    /// Creates a storage writing to `path`. Parent directories are created
    /// on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<StorageFile, StorageError> {
        match fs::read(&self.path).await {
            Ok(bytes) => {
                decode(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StorageFile::default()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Loads the file for modification. A corrupt file is replaced rather
    /// than blocking every future write.
    async fn load_for_update(&self) -> Result<StorageFile, StorageError> {
        match self.load().await {
            Err(StorageError::Serialization(e)) => {
                warn!(path = %self.path.display(), error = %e, "Replacing unreadable session file");
                Ok(StorageFile::default())
            }
            other => other,
        }
    }

    async fn save(&self, file: &StorageFile) -> Result<(), StorageError> {
        if file.entries.is_empty() {
            return match fs::remove_file(&self.path).await {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(StorageError::Io(e)),
                _ => Ok(()),
            };
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let bytes =
            encode_pretty(file).map_err(|e| StorageError::Serialization(e.to_string()))?;

        // Write then rename so readers never see a partial file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes).await?;
        restrict_permissions(&tmp).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

impl std::fmt::Debug for FileSessionStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSessionStorage")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SessionStorage for FileSessionStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let file = self.load().await?;
        let now = self.clock.epoch_seconds();
        Ok(file
            .entries
            .get(key)
            .filter(|entry| entry.is_live_at(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let now = self.clock.epoch_seconds();

        let mut file = self.load_for_update().await?;
        file.entries.retain(|_, entry| entry.is_live_at(now));
        file.entries
            .insert(key.to_string(), Entry::new(value, ttl, now));
        self.save(&file).await?;

        debug!(path = %self.path.display(), key, "Stored entry");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;

        let mut file = self.load_for_update().await?;
        if file.entries.remove(key).is_some() {
            self.save(&file).await?;
            debug!(path = %self.path.display(), key, "Removed entry");
        }
        Ok(())
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<(), StorageError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<(), StorageError> {
    Ok(())
}
