//! Token and session types

use serde::{Deserialize, Serialize};

use super::claims::jwt_expiry;
use crate::error::DomainError;

/// Access/refresh token pair issued by the authentication endpoints.
///
/// A pair is replaced wholesale on refresh; its fields are never updated
/// one at a time.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived credential attached to protected calls.
    #[serde(alias = "accessToken")]
    pub access_token: String,
    /// Longer-lived credential used only to obtain a new pair.
    #[serde(alias = "refreshToken")]
    pub refresh_token: String,
}

impl TokenPair {
    /// Creates a new token pair.
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Returns true if both tokens are non-empty.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &token_preview(&self.access_token))
            .field("refresh_token", &token_preview(&self.refresh_token))
            .finish()
    }
}

/// Get a preview of a token (first 8 chars + ...), safe for logs.
#[must_use]
pub fn token_preview(token: &str) -> String {
    match token.char_indices().nth(8) {
        Some((idx, _)) if token.len() > 12 => format!("{}...", &token[..idx]),
        _ => token.to_string(),
    }
}

/// Persisted form of a token pair.
///
/// `expires_at` is the access token expiry in seconds since the epoch, when
/// known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    /// The access token.
    pub access_token: String,
    /// The refresh token.
    pub refresh_token: String,
    /// Access token expiry (epoch seconds), if tracked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl StoredSession {
    /// Builds a session record for a freshly issued pair.
    ///
    /// The expiry is read from the access token's `exp` claim when the token
    /// is a JWT; otherwise `fallback_lifetime_secs` is added to `now`, if
    /// given.
    #[must_use]
    pub fn issue(pair: &TokenPair, now: i64, fallback_lifetime_secs: Option<i64>) -> Self {
        let expires_at = jwt_expiry(&pair.access_token)
            .or_else(|| fallback_lifetime_secs.map(|secs| now.saturating_add(secs)));

        Self {
            access_token: pair.access_token.clone(),
            refresh_token: pair.refresh_token.clone(),
            expires_at,
        }
    }

    /// Returns the token pair held by this record.
    #[must_use]
    pub fn token_pair(&self) -> TokenPair {
        TokenPair::new(self.access_token.clone(), self.refresh_token.clone())
    }

    /// Returns true if the tracked expiry has been reached at `now`.
    ///
    /// Records without a tracked expiry never expire locally.
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    /// Returns true if both tokens are present and `now` is strictly before
    /// the tracked expiry.
    #[must_use]
    pub fn is_valid_at(&self, now: i64) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty() && !self.is_expired_at(now)
    }

    /// Encodes the record for a storage medium.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized.
    pub fn encode(&self) -> Result<String, DomainError> {
        serde_json::to_string(self).map_err(|e| DomainError::InvalidSession(e.to_string()))
    }

    /// Decodes a record previously written by [`StoredSession::encode`].
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid session record.
    pub fn decode(raw: &str) -> Result<Self, DomainError> {
        serde_json::from_str(raw).map_err(|e| DomainError::InvalidSession(e.to_string()))
    }
}

/// Authentication state of the client.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    /// No token pair is held.
    #[default]
    Unauthenticated,
    /// A token pair is held.
    Authenticated(TokenPair),
    /// A refresh is in flight for this pair.
    Refreshing(TokenPair),
}

impl AuthState {
    /// Returns the held token pair, if any.
    #[must_use]
    pub const fn token_pair(&self) -> Option<&TokenPair> {
        match self {
            Self::Unauthenticated => None,
            Self::Authenticated(pair) | Self::Refreshing(pair) => Some(pair),
        }
    }

    /// Returns true unless the state is `Unauthenticated`.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        !matches!(self, Self::Unauthenticated)
    }

    /// Returns true while a refresh is in flight.
    #[must_use]
    pub const fn is_refreshing(&self) -> bool {
        matches!(self, Self::Refreshing(_))
    }

    /// Short state name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticated(_) => "authenticated",
            Self::Refreshing(_) => "refreshing",
        }
    }
}

/// Login form data.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

impl Credentials {
    /// Creates login credentials.
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// Registration form data.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationData {
    /// Account email.
    pub email: String,
    /// Chosen password.
    pub password1: String,
    /// Password confirmation.
    pub password2: String,
    /// Main account currency symbol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl RegistrationData {
    /// Creates registration data without a currency.
    #[must_use]
    pub fn new(
        email: impl Into<String>,
        password1: impl Into<String>,
        password2: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password1: password1.into(),
            password2: password2.into(),
            currency: None,
        }
    }

    /// Sets the main account currency.
    #[must_use]
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }
}

impl std::fmt::Debug for RegistrationData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationData")
            .field("email", &self.email)
            .field("currency", &self.currency)
            .finish_non_exhaustive()
    }
}
