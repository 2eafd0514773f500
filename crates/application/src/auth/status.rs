//! Session status summary for status bars and logs.

/// Coarse view of the session, derived from the manager's state and clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// No token pair is held.
    NotAuthenticated,
    /// The access token is usable.
    Valid {
        /// Seconds until the access token expires, or None if not tracked.
        seconds_remaining: Option<i64>,
    },
    /// A refresh is in flight.
    Refreshing,
    /// The access token has expired; the next protected call refreshes it.
    Expired,
}

impl SessionStatus {
    /// Returns true if protected calls can be made without refreshing first.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    /// Get a user-friendly display message.
    #[must_use]
    pub fn display_message(&self) -> String {
        match self {
            Self::NotAuthenticated => "Not authenticated".to_string(),
            Self::Valid {
                seconds_remaining: Some(secs),
            } => {
                if *secs > 3600 {
                    format!("Signed in, token valid for {} hours", secs / 3600)
                } else if *secs > 60 {
                    format!("Signed in, token valid for {} minutes", secs / 60)
                } else {
                    format!("Signed in, token valid for {secs} seconds")
                }
            }
            Self::Valid {
                seconds_remaining: None,
            } => "Signed in".to_string(),
            Self::Refreshing => "Refreshing session".to_string(),
            Self::Expired => "Session expired (will refresh)".to_string(),
        }
    }
}
