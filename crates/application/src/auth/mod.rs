//! Authentication for the CostsMap client.
//!
//! This module provides:
//! - The session manager (token lifecycle: login, persistence, coalesced refresh)
//! - A status summary for display

mod session_manager;
mod status;

pub use session_manager::{DEFAULT_SESSION_TTL, SESSION_KEY, SessionManager, SessionSettings};
pub use status::SessionStatus;
