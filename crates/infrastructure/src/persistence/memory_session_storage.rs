//! In-memory session storage.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use costsmap_application::ports::{Clock, SessionStorage, StorageError};
use parking_lot::Mutex;

use super::Entry;
use crate::adapters::SystemClock;

/// Process-lifetime storage with the same expiry rules as
/// [`super::FileSessionStorage`]. Suited to tests and ephemeral runs.
pub struct MemorySessionStorage {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl MemorySessionStorage {
    /// Creates an empty storage using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    /// Creates an empty storage judging expiry with `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Number of entries held, including expired ones not yet dropped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for MemorySessionStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemorySessionStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySessionStorage")
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SessionStorage for MemorySessionStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let now = self.clock.epoch_seconds();
        let mut entries = self.entries.lock();
        let live = entries.get(key).map(|entry| entry.is_live_at(now));
        match live {
            Some(true) => Ok(entries.get(key).map(|entry| entry.value.clone())),
            Some(false) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        let entry = Entry::new(value, ttl, self.clock.epoch_seconds());
        self.entries.lock().insert(key.to_string(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}
