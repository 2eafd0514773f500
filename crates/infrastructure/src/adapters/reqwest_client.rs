//! REST API client implementation using reqwest.
//!
//! This adapter implements the `AuthApi` and `FinanceApi` ports. Every
//! failure is mapped into an [`ApiError`] variant before it leaves this
//! module.

use std::time::Duration;

use async_trait::async_trait;
use costsmap_application::ports::{ApiError, AuthApi, FinanceApi};
use costsmap_domain::{
    Card, Category, Cost, Credentials, CurrentUser, EntityId, Income, NewCard, NewCategory,
    NewCost, NewIncome, RegistrationData, TokenPair, TotalCosts, TotalIncomes, token_preview,
};
use reqwest::{Client, ClientBuilder, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::settings::{ClientConfig, ConfigError};

/// Default `User-Agent` header value.
pub const DEFAULT_USER_AGENT: &str = concat!("costsmap/", env!("CARGO_PKG_VERSION"));

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const REQUEST_ID_HEADER: &str = "x-request-id";

/// CostsMap REST client.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct ReqwestApiClient {
    client: Client,
    base_url: Url,
}

impl ReqwestApiClient {
    /// Creates a client for `base_url` with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the client cannot be created.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ConfigError> {
        Self::builder().base_url(base_url).build()
    }

    /// Creates a client from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the client cannot be created.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        Self::builder()
            .base_url(config.base_url.clone())
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
    }

    /// Creates a new client builder.
    #[must_use]
    pub fn builder() -> ReqwestApiClientBuilder {
        ReqwestApiClientBuilder::default()
    }

    /// Returns the base URL, always ending with `/`.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        bearer: Option<&str>,
    ) -> Result<RequestBuilder, ApiError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ApiError::Transport(format!("invalid endpoint {path}: {e}")))?;

        let mut request = self
            .client
            .request(method, url)
            .header(REQUEST_ID_HEADER, Uuid::now_v7().to_string());
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        Ok(request)
    }

    /// Sends the request and keeps only a success response.
    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await.map_err(map_error)?;
        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "API response");

        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(
                status.as_u16(),
                error_message(&body, status),
            ))
        }
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let body = self.send(request).await?.bytes().await.map_err(map_error)?;
        serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, access_token: &str) -> Result<T, ApiError> {
        self.execute(self.request(Method::GET, path, Some(access_token))?)
            .await
    }

    async fn post<B, T>(&self, path: &str, access_token: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        debug!("POST {path}");
        let request = self
            .request(Method::POST, path, Some(access_token))?
            .json(body);
        self.execute(request).await
    }

    // Deletes answer 204 or echo the entity; the body is ignored either way.
    async fn delete(&self, path: &str, access_token: &str) -> Result<(), ApiError> {
        debug!("DELETE {path}");
        self.send(self.request(Method::DELETE, path, Some(access_token))?)
            .await
            .map(drop)
    }
}

#[async_trait]
impl AuthApi for ReqwestApiClient {
    async fn login(&self, credentials: &Credentials) -> Result<TokenPair, ApiError> {
        debug!(email = %credentials.email, "POST api/auth/login");
        let request = self
            .request(Method::POST, "api/auth/login", None)?
            .json(credentials);
        self.execute(request).await
    }

    async fn register(&self, data: &RegistrationData) -> Result<TokenPair, ApiError> {
        debug!(email = %data.email, "POST api/auth/registration");
        let request = self
            .request(Method::POST, "api/auth/registration", None)?
            .json(data);
        self.execute(request).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        debug!(token = %token_preview(refresh_token), "POST api/auth/refresh");
        let request = self.request(Method::POST, "api/auth/refresh", Some(refresh_token))?;
        self.execute(request).await
    }

    async fn current_user(&self, access_token: &str) -> Result<CurrentUser, ApiError> {
        self.get("api/auth/me", access_token).await
    }
}

#[async_trait]
impl FinanceApi for ReqwestApiClient {
    async fn categories(&self, access_token: &str) -> Result<Vec<Category>, ApiError> {
        self.get("api/categories", access_token).await
    }

    async fn cards(&self, access_token: &str) -> Result<Vec<Card>, ApiError> {
        self.get("api/cards", access_token).await
    }

    async fn costs(&self, access_token: &str) -> Result<Vec<Cost>, ApiError> {
        self.get("api/costs", access_token).await
    }

    async fn incomes(&self, access_token: &str) -> Result<Vec<Income>, ApiError> {
        self.get("api/incomes", access_token).await
    }

    async fn total_costs(&self, access_token: &str) -> Result<TotalCosts, ApiError> {
        self.get("api/costs/total", access_token).await
    }

    async fn total_incomes(&self, access_token: &str) -> Result<TotalIncomes, ApiError> {
        self.get("api/incomes/total", access_token).await
    }

    async fn create_category(
        &self,
        access_token: &str,
        category: &NewCategory,
    ) -> Result<Category, ApiError> {
        self.post("api/categories", access_token, category).await
    }

    async fn create_card(&self, access_token: &str, card: &NewCard) -> Result<Card, ApiError> {
        self.post("api/cards", access_token, card).await
    }

    async fn create_cost(&self, access_token: &str, cost: &NewCost) -> Result<Cost, ApiError> {
        self.post("api/costs", access_token, cost).await
    }

    async fn create_income(
        &self,
        access_token: &str,
        income: &NewIncome,
    ) -> Result<Income, ApiError> {
        self.post("api/incomes", access_token, income).await
    }

    async fn delete_cost(&self, access_token: &str, id: &EntityId) -> Result<(), ApiError> {
        self.delete(&format!("api/costs/{id}"), access_token).await
    }

    async fn delete_income(&self, access_token: &str, id: &EntityId) -> Result<(), ApiError> {
        self.delete(&format!("api/incomes/{id}"), access_token).await
    }
}

/// Builder for [`ReqwestApiClient`].
#[derive(Debug, Default)]
pub struct ReqwestApiClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl ReqwestApiClientBuilder {
    /// Set the base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is missing or not http(s), or if the
    /// underlying client cannot be created.
    pub fn build(self) -> Result<ReqwestApiClient, ConfigError> {
        let raw = self.base_url.ok_or(ConfigError::MissingBaseUrl)?;
        let base_url = parse_base_url(&raw)?;

        let client = ClientBuilder::new()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .user_agent(
                self.user_agent
                    .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            )
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        Ok(ReqwestApiClient { client, base_url })
    }
}

/// Parses an http(s) base URL and normalizes it to end with `/`, so that
/// relative endpoint paths join below it.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };

    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Maps reqwest errors to `ApiError`.
fn map_error(error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        return ApiError::Transport(format!("request timed out: {error}"));
    }
    if error.is_connect() {
        return ApiError::Transport(format!("connection failed: {error}"));
    }
    if error.is_decode() {
        return ApiError::Decode(error.to_string());
    }
    ApiError::Transport(error.to_string())
}

/// Extracts a readable message from an error body.
///
/// The server reports errors as `{"detail": "..."}`, or as a list of
/// `{"msg": "..."}` objects for rejected request bodies.
fn error_message(body: &str, status: StatusCode) -> String {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("detail").cloned());

    match detail {
        Some(Value::String(message)) => message,
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.get("msg").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("; "),
        Some(other) => other.to_string(),
        None if !body.trim().is_empty() => body.trim().to_string(),
        None => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    }
}
