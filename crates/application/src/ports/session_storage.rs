//! Session storage port
//!
//! A small key/value capability with per-entry time-to-live, so the
//! medium holding the session (a file, memory, a browser cookie jar) can
//! be swapped without touching the session manager.

use std::time::Duration;

use async_trait::async_trait;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The storage location could not be determined.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Key/value storage with optional expiry per entry.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Reads a value.
    ///
    /// Entries whose time-to-live has elapsed read as `None`.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Writes a value, replacing any previous one.
    ///
    /// # Arguments
    /// * `key` - Entry key
    /// * `value` - Entry value
    /// * `ttl` - How long the entry stays readable; `None` keeps it until removed
    ///
    /// # Errors
    /// Returns an error if the medium cannot be written.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>)
    -> Result<(), StorageError>;

    /// Removes a value. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}
