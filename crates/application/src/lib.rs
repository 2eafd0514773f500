//! CostsMap Application - Use cases and port definitions
//!
//! This crate contains the application layer:
//! - Ports: interfaces for the REST API, session storage and clock
//! - Auth: the session manager owning the token lifecycle
//! - Use cases: finance data loaders built on the session manager

pub mod auth;
pub mod error;
pub mod ports;
pub mod use_cases;

pub use auth::{DEFAULT_SESSION_TTL, SESSION_KEY, SessionManager, SessionSettings, SessionStatus};
pub use error::{AuthError, AuthResult, Operation};
pub use ports::{ApiError, AuthApi, Clock, FinanceApi, SessionStorage, StorageError};
pub use use_cases::FinanceService;
