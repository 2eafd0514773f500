//! Application error types

use costsmap_domain::DomainError;
use thiserror::Error;

use crate::ports::{ApiError, StorageError};

/// Failures surfaced by the session manager and the services built on it.
///
/// Only [`AuthError::SessionExpired`] is ever accompanied by clearing the
/// persisted session; every other variant leaves session state untouched.
/// The type is `Clone` so that the outcome of a shared refresh can be
/// delivered to every waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Input was rejected, locally or by the server (422).
    #[error("invalid input: {0}")]
    Validation(String),

    /// Login was rejected (401).
    #[error("incorrect email or password")]
    InvalidCredentials,

    /// Registration conflicts with an existing account (409).
    #[error("user with this email already exists")]
    DuplicateAccount,

    /// The session can no longer be used; the user must log in again.
    #[error("session expired")]
    SessionExpired,

    /// The server failed or answered with an unclassified status.
    #[error("server error{}: {message}", .status.map(|s| format!(" {s}")).unwrap_or_default())]
    Server {
        /// HTTP status, when one was received.
        status: Option<u16>,
        /// Server-provided or synthesized description.
        message: String,
    },

    /// The request never produced an HTTP response.
    #[error("network error: {0}")]
    Transport(String),

    /// The session storage medium failed.
    #[error("session storage error: {0}")]
    Storage(String),

    /// A background refresh task failed unexpectedly.
    #[error("internal error: {0}")]
    Internal(String),
}

/// The call whose failure is being classified.
///
/// The same HTTP status means different things depending on the call: a
/// 401 is a credential problem on login but an expired session elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `POST /api/auth/login`.
    Login,
    /// `POST /api/auth/registration`.
    Register,
    /// `POST /api/auth/refresh`.
    Refresh,
    /// Any call authenticated with the access token.
    Protected,
}

impl AuthError {
    /// Classifies an API failure for the given operation.
    #[must_use]
    pub fn from_api(error: ApiError, operation: Operation) -> Self {
        match (error, operation) {
            (ApiError::Unauthorized { .. }, Operation::Login) => Self::InvalidCredentials,
            (ApiError::Unauthorized { .. }, Operation::Refresh | Operation::Protected) => {
                Self::SessionExpired
            }
            (ApiError::Conflict(_), Operation::Register) => Self::DuplicateAccount,
            (ApiError::Validation(message), _) => Self::Validation(message),
            (ApiError::Transport(message), _) => Self::Transport(message),
            (ApiError::Unauthorized { status, message }, Operation::Register) => Self::Server {
                status: Some(status),
                message,
            },
            (ApiError::Conflict(message), _) => Self::Server {
                status: Some(409),
                message,
            },
            (ApiError::NotFound(message), _) => Self::Server {
                status: Some(404),
                message,
            },
            (ApiError::Server { status, message }, _) => Self::Server {
                status: Some(status),
                message,
            },
            (ApiError::Decode(message), _) => Self::Server {
                status: None,
                message,
            },
        }
    }

    /// Returns true if the caller must send the user back to login.
    #[must_use]
    pub const fn requires_login(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Returns true if the failure is worth retrying as is.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Server { .. } | Self::Internal(_))
    }

    /// Short message suitable for inline display next to a form.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(_) => "Incorrect input".to_string(),
            Self::InvalidCredentials => "Incorrect username or password".to_string(),
            Self::DuplicateAccount => "User with this email already exists".to_string(),
            Self::SessionExpired => "Session expired, please log in again".to_string(),
            Self::Transport(_) => "Network error, please retry".to_string(),
            Self::Server { .. } | Self::Storage(_) | Self::Internal(_) => {
                "Server error".to_string()
            }
        }
    }
}

impl From<DomainError> for AuthError {
    fn from(error: DomainError) -> Self {
        Self::Validation(error.to_string())
    }
}

impl From<StorageError> for AuthError {
    fn from(error: StorageError) -> Self {
        Self::Storage(error.to_string())
    }
}

/// Result type alias for session and service operations.
pub type AuthResult<T> = Result<T, AuthError>;
