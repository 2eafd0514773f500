//! REST API ports

use async_trait::async_trait;
use costsmap_domain::{
    Card, Category, Cost, Credentials, CurrentUser, EntityId, Income, NewCard, NewCategory,
    NewCost, NewIncome, RegistrationData, TokenPair, TotalCosts, TotalIncomes,
};
use thiserror::Error;

/// Failure of a REST call, classified by kind.
///
/// Adapters must map every failure into one of these variants; callers
/// switch on the variant and never inspect raw responses.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The presented credential was missing, invalid or expired (401/403).
    #[error("unauthorized ({status}): {message}")]
    Unauthorized {
        /// HTTP status (401 or 403).
        status: u16,
        /// Server-provided detail.
        message: String,
    },

    /// The request body was rejected as malformed (400/422).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The request conflicts with existing state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The resource does not exist (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-success status.
    #[error("server error {status}: {message}")]
    Server {
        /// HTTP status.
        status: u16,
        /// Server-provided detail.
        message: String,
    },

    /// No HTTP response was received (connection, DNS, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// A success response could not be decoded.
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl ApiError {
    /// Classifies a non-success HTTP status.
    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Unauthorized { status, message },
            400 | 422 => Self::Validation(message),
            404 => Self::NotFound(message),
            409 => Self::Conflict(message),
            _ => Self::Server { status, message },
        }
    }

    /// Returns true for authorization-denied responses.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Returns the HTTP status this error was built from, when known.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { status, .. } | Self::Server { status, .. } => Some(*status),
            Self::Validation(_) => Some(422),
            Self::NotFound(_) => Some(404),
            Self::Conflict(_) => Some(409),
            Self::Transport(_) | Self::Decode(_) => None,
        }
    }
}

/// Authentication endpoints.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// `POST /api/auth/login`.
    async fn login(&self, credentials: &Credentials) -> Result<TokenPair, ApiError>;

    /// `POST /api/auth/registration`.
    async fn register(&self, data: &RegistrationData) -> Result<TokenPair, ApiError>;

    /// `POST /api/auth/refresh`, authenticated with the refresh token.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError>;

    /// `GET /api/auth/me`, authenticated with the access token.
    async fn current_user(&self, access_token: &str) -> Result<CurrentUser, ApiError>;
}

/// Finance endpoints, all authenticated with the access token.
#[async_trait]
pub trait FinanceApi: Send + Sync {
    /// `GET /api/categories`.
    async fn categories(&self, access_token: &str) -> Result<Vec<Category>, ApiError>;

    /// `GET /api/cards`.
    async fn cards(&self, access_token: &str) -> Result<Vec<Card>, ApiError>;

    /// `GET /api/costs`.
    async fn costs(&self, access_token: &str) -> Result<Vec<Cost>, ApiError>;

    /// `GET /api/incomes`.
    async fn incomes(&self, access_token: &str) -> Result<Vec<Income>, ApiError>;

    /// `GET /api/costs/total`.
    async fn total_costs(&self, access_token: &str) -> Result<TotalCosts, ApiError>;

    /// `GET /api/incomes/total`.
    async fn total_incomes(&self, access_token: &str) -> Result<TotalIncomes, ApiError>;

    /// `POST /api/categories`.
    async fn create_category(
        &self,
        access_token: &str,
        category: &NewCategory,
    ) -> Result<Category, ApiError>;

    /// `POST /api/cards`.
    async fn create_card(&self, access_token: &str, card: &NewCard) -> Result<Card, ApiError>;

    /// `POST /api/costs`.
    async fn create_cost(&self, access_token: &str, cost: &NewCost) -> Result<Cost, ApiError>;

    /// `POST /api/incomes`.
    async fn create_income(
        &self,
        access_token: &str,
        income: &NewIncome,
    ) -> Result<Income, ApiError>;

    /// `DELETE /api/costs/{id}`.
    async fn delete_cost(&self, access_token: &str, id: &EntityId) -> Result<(), ApiError>;

    /// `DELETE /api/incomes/{id}`.
    async fn delete_income(&self, access_token: &str, id: &EntityId) -> Result<(), ApiError>;
}
