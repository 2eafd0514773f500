//! Domain error types

use thiserror::Error;

/// Domain-level errors that can occur during validation or processing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A required field is empty.
    #[error("{field} is required")]
    Required {
        /// Name of the offending field.
        field: &'static str,
    },

    /// The email address is malformed.
    #[error("invalid email: {0}")]
    InvalidEmail(String),

    /// The password does not meet the registration constraints.
    #[error("invalid password: {0}")]
    InvalidPassword(String),

    /// The two registration passwords differ.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// A text field exceeds its length bounds.
    #[error("{field} must be between {min} and {max} characters")]
    InvalidLength {
        /// Name of the offending field.
        field: &'static str,
        /// Minimum accepted length.
        min: usize,
        /// Maximum accepted length.
        max: usize,
    },

    /// A color is not a `#rrggbb` hex triplet.
    #[error("invalid color: {0}")]
    InvalidColor(String),

    /// A monetary amount is outside the accepted range.
    #[error("amount out of range: {0}")]
    AmountOutOfRange(String),

    /// The currency symbol is not supported.
    #[error("unsupported currency: {0}")]
    UnknownCurrency(String),

    /// A session record could not be decoded.
    #[error("invalid session record: {0}")]
    InvalidSession(String),
}

impl DomainError {
    /// Returns the name of the field this error refers to, if any.
    #[must_use]
    pub const fn field(&self) -> Option<&'static str> {
        match self {
            Self::Required { field } | Self::InvalidLength { field, .. } => Some(field),
            Self::InvalidEmail(_) => Some("email"),
            Self::InvalidPassword(_) | Self::PasswordMismatch => Some("password"),
            Self::InvalidColor(_) => Some("color"),
            Self::AmountOutOfRange(_) => Some("amount"),
            Self::UnknownCurrency(_) => Some("currency"),
            Self::InvalidSession(_) => None,
        }
    }
}

/// Result type alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
