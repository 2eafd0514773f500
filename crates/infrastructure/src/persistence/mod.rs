//! Session storage implementations.

mod file_session_storage;
mod memory_session_storage;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use file_session_storage::FileSessionStorage;
pub use memory_session_storage::MemorySessionStorage;

/// A stored value with its optional expiry (epoch seconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Entry {
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<i64>,
}

impl Entry {
    fn new(value: &str, ttl: Option<Duration>, now: i64) -> Self {
        let expires_at = ttl.map(|ttl| {
            now.saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX))
        });
        Self {
            value: value.to_string(),
            expires_at,
        }
    }

    fn is_live_at(&self, now: i64) -> bool {
        self.expires_at.is_none_or(|expires_at| now < expires_at)
    }
}
