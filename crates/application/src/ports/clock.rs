//! Clock port for time-related operations

use chrono::{DateTime, Utc};

/// Port for getting the current time.
///
/// This abstraction allows testing expiry logic by providing a
/// controllable implementation.
pub trait Clock: Send + Sync {
    /// Returns the current UTC timestamp.
    fn now(&self) -> DateTime<Utc>;

    /// Returns the current time in whole seconds since the epoch.
    fn epoch_seconds(&self) -> i64 {
        self.now().timestamp()
    }
}
