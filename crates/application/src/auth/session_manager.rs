//! Token lifecycle manager.
//!
//! [`SessionManager`] is the single authority for whether the client is
//! authenticated. It acquires token pairs (login, registration), persists
//! them through a [`SessionStorage`], judges expiry with a [`Clock`], and
//! exchanges a rejected or expired access token for a new pair.
//!
//! At most one refresh request is in flight at a time. Concurrent triggers
//! await the same shared outcome, and a trigger whose rejected token has
//! already been replaced reuses the new pair. The refresh itself runs on a
//! spawned task, so it completes and persists its result even if every
//! caller goes away.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use costsmap_domain::validation::{validate_login, validate_registration};
use costsmap_domain::{
    AuthState, Credentials, CurrentUser, RegistrationData, StoredSession, TokenPair,
    token_preview,
};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::status::SessionStatus;
use crate::error::{AuthError, AuthResult, Operation};
use crate::ports::{ApiError, AuthApi, Clock, SessionStorage};

/// Storage key of the persisted session record.
pub const SESSION_KEY: &str = "session";

/// Lifetime of the persisted record, matching the refresh token lifetime.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Tunables of the session manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Key of the session record in storage.
    pub storage_key: String,
    /// Time-to-live of the persisted record.
    pub session_ttl: Duration,
    /// Access token lifetime assumed when the token carries no `exp` claim.
    pub access_token_lifetime: Option<Duration>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            storage_key: SESSION_KEY.to_string(),
            session_ttl: DEFAULT_SESSION_TTL,
            access_token_lifetime: None,
        }
    }
}

impl SessionSettings {
    fn fallback_lifetime_secs(&self) -> Option<i64> {
        self.access_token_lifetime
            .map(|lifetime| i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX))
    }
}

#[derive(Debug, Default)]
struct SessionState {
    session: Option<StoredSession>,
    refreshing: bool,
    /// Cached profile and the access token it was fetched with.
    user: Option<(String, CurrentUser)>,
    /// Refresh tokens already exchanged or ended by this process. A stored
    /// record carrying one of them is stale and never adopted.
    retired: HashSet<String>,
}

type RefreshOutcome = Shared<BoxFuture<'static, AuthResult<TokenPair>>>;

struct Flight {
    id: u64,
    outcome: RefreshOutcome,
}

struct Inner {
    api: Arc<dyn AuthApi>,
    storage: Arc<dyn SessionStorage>,
    clock: Arc<dyn Clock>,
    settings: SessionSettings,
    state: RwLock<SessionState>,
    // Lock order: `in_flight` before `state`.
    in_flight: Mutex<Option<Flight>>,
    next_flight: AtomicU64,
}

/// Explicit session context shared by everything that issues protected calls.
///
/// Clones share the same state.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.state().name())
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Creates an unauthenticated manager without reading storage.
    #[must_use]
    pub fn new(
        api: Arc<dyn AuthApi>,
        storage: Arc<dyn SessionStorage>,
        clock: Arc<dyn Clock>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                storage,
                clock,
                settings,
                state: RwLock::new(SessionState::default()),
                in_flight: Mutex::new(None),
                next_flight: AtomicU64::new(0),
            }),
        }
    }

    /// Creates a manager initialized from the persisted session.
    ///
    /// The manager starts `Authenticated` only if a record is found whose
    /// tracked expiry has not elapsed. Expired or unreadable records are left
    /// in storage and the manager starts `Unauthenticated`.
    pub async fn restore(
        api: Arc<dyn AuthApi>,
        storage: Arc<dyn SessionStorage>,
        clock: Arc<dyn Clock>,
        settings: SessionSettings,
    ) -> Self {
        let manager = Self::new(api, storage, clock, settings);
        if let Some(record) = manager.inner.read_persisted().await {
            if record.is_valid_at(manager.inner.now()) {
                info!(
                    token = %token_preview(&record.access_token),
                    "Restored persisted session"
                );
                manager.inner.state.write().session = Some(record);
            } else {
                info!("Persisted session has expired, starting unauthenticated");
            }
        }
        manager
    }

    /// Logs in with email and password.
    ///
    /// # Errors
    ///
    /// - `Validation` if the credentials are malformed (no request is made)
    ///   or the server rejects them as malformed
    /// - `InvalidCredentials` if the server denies authorization
    /// - `Transport` / `Server` for other failures; session state is untouched
    /// - `Storage` if the new pair could not be persisted; the session is
    ///   established in memory regardless
    pub async fn login(&self, credentials: &Credentials) -> AuthResult<TokenPair> {
        validate_login(credentials)?;
        debug!(email = %credentials.email, "Logging in");

        let pair = self.inner.api.login(credentials).await.map_err(|e| {
            let err = AuthError::from_api(e, Operation::Login);
            warn!(error = %err, "Login failed");
            err
        })?;

        let pair = self.inner.establish(pair).await?;
        info!(token = %token_preview(&pair.access_token), "Logged in");
        Ok(pair)
    }

    /// Registers a new account and starts a session for it.
    ///
    /// # Errors
    ///
    /// - `Validation` if the form is invalid locally (no request is made) or
    ///   rejected by the server
    /// - `DuplicateAccount` if the email is already registered
    /// - `Transport` / `Server` for other failures; session state is untouched
    /// - `Storage` if the new pair could not be persisted; the session is
    ///   established in memory regardless
    pub async fn register(&self, data: &RegistrationData) -> AuthResult<TokenPair> {
        validate_registration(data)?;
        debug!(email = %data.email, "Registering account");

        let pair = self.inner.api.register(data).await.map_err(|e| {
            let err = AuthError::from_api(e, Operation::Register);
            warn!(error = %err, "Registration failed");
            err
        })?;

        let pair = self.inner.establish(pair).await?;
        info!(token = %token_preview(&pair.access_token), "Registered and logged in");
        Ok(pair)
    }

    /// Exchanges the refresh token for a new pair.
    ///
    /// Returns `Ok(None)` without any request when unauthenticated. Joins a
    /// refresh already in flight instead of starting another.
    ///
    /// # Errors
    ///
    /// - `SessionExpired` if the refresh token is rejected; the session is
    ///   cleared from memory and storage
    /// - `Transport` / `Server` for other failures; the session is kept
    /// - `Storage` if the new pair could not be persisted; memory holds the
    ///   new pair and the stale stored record is never adopted again
    pub async fn refresh(&self) -> AuthResult<Option<TokenPair>> {
        let current = self.inner.current_access_token();
        let Some(access_token) = current else {
            debug!("No session to refresh");
            return Ok(None);
        };
        self.refresh_from(&access_token).await.map(Some)
    }

    /// Fetches the profile for the given access token.
    ///
    /// Returns `Ok(None)` without any request when no token is given. A
    /// rejection is reported as `SessionExpired` but does not clear the
    /// session; the caller resolves it with [`Self::refresh`] and retries
    /// at most once.
    ///
    /// # Errors
    ///
    /// Returns the classified API failure.
    pub async fn fetch_current_user(
        &self,
        access_token: Option<&str>,
    ) -> AuthResult<Option<CurrentUser>> {
        let Some(token) = access_token.filter(|token| !token.is_empty()) else {
            debug!("No access token, skipping profile request");
            return Ok(None);
        };
        self.inner
            .api
            .current_user(token)
            .await
            .map(Some)
            .map_err(|e| AuthError::from_api(e, Operation::Protected))
    }

    /// Returns the profile for the current access token.
    ///
    /// Served from cache while the token that fetched it is still current.
    /// No refresh is attempted.
    ///
    /// # Errors
    ///
    /// Same as [`Self::fetch_current_user`].
    pub async fn current_user(&self) -> AuthResult<Option<CurrentUser>> {
        if let Some(user) = self.inner.cached_user() {
            return Ok(Some(user));
        }
        let token = self.inner.current_access_token();
        let user = self.fetch_current_user(token.as_deref()).await?;
        if let (Some(token), Some(user)) = (token, &user) {
            self.inner.cache_user(&token, user.clone());
        }
        Ok(user)
    }

    /// Returns the profile, refreshing and retrying once if the access token
    /// is rejected.
    ///
    /// # Errors
    ///
    /// `SessionExpired` when unauthenticated or when the session cannot be
    /// renewed, otherwise the classified API failure.
    pub async fn load_current_user(&self) -> AuthResult<CurrentUser> {
        if let Some(user) = self.inner.cached_user() {
            return Ok(user);
        }
        let api = Arc::clone(&self.inner.api);
        let user = self
            .authorized(move |token| {
                let api = Arc::clone(&api);
                async move { api.current_user(&token).await }
            })
            .await?;
        if let Some(token) = self.inner.current_access_token() {
            self.inner.cache_user(&token, user.clone());
        }
        Ok(user)
    }

    /// Returns true iff both tokens are present and the tracked expiry, if
    /// any, lies strictly in the future. Local check only.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let now = self.inner.now();
        self.inner
            .state
            .read()
            .session
            .as_ref()
            .is_some_and(|session| session.is_valid_at(now))
    }

    /// Runs a protected call with the current access token.
    ///
    /// A locally expired token is refreshed before the call. If the server
    /// denies authorization, the session is refreshed (coalesced with any
    /// concurrent refresh) and the call is retried exactly once.
    ///
    /// # Errors
    ///
    /// - `SessionExpired` when unauthenticated, when the refresh token is
    ///   rejected, or when the refreshed token is rejected as well
    /// - otherwise the classified failure of the call or of the refresh
    pub async fn authorized<T, F, Fut>(&self, call: F) -> AuthResult<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let access_token = self.usable_access_token().await?;

        match call(access_token.clone()).await {
            Ok(value) => Ok(value),
            Err(e) if e.is_unauthorized() => {
                debug!(
                    token = %token_preview(&access_token),
                    "Access token rejected, refreshing"
                );
                let pair = self.refresh_from(&access_token).await?;
                match call(pair.access_token.clone()).await {
                    Ok(value) => Ok(value),
                    Err(e) if e.is_unauthorized() => {
                        warn!(error = %e, "Refreshed access token rejected, ending session");
                        self.inner.end_session(&pair.refresh_token).await;
                        Err(AuthError::SessionExpired)
                    }
                    Err(e) => Err(AuthError::from_api(e, Operation::Protected)),
                }
            }
            Err(e) => Err(AuthError::from_api(e, Operation::Protected)),
        }
    }

    /// Route guard: reports whether navigation to a protected page may
    /// proceed.
    ///
    /// Re-reads the persisted record first and adopts it when it is valid and
    /// differs from memory. An expired session is then refreshed. Failures
    /// are logged and answer `false` for this navigation only.
    pub async fn guard(&self) -> bool {
        self.sync_from_storage().await;

        let now = self.inner.now();
        let expired = self
            .inner
            .state
            .read()
            .session
            .as_ref()
            .filter(|session| session.is_expired_at(now))
            .map(|session| session.access_token.clone());

        if let Some(access_token) = expired
            && let Err(e) = self.refresh_from(&access_token).await
        {
            warn!(error = %e, "Could not renew session for navigation");
            return false;
        }
        self.is_valid()
    }

    /// Clears the session from memory and storage.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the persisted record could not be removed; the
    /// in-memory session is cleared regardless.
    pub async fn clear(&self) -> AuthResult<()> {
        self.inner.retire_current();
        self.inner.reset();
        self.inner
            .storage
            .remove(&self.inner.settings.storage_key)
            .await?;
        info!("Session cleared");
        Ok(())
    }

    /// Logs out. Equivalent to [`Self::clear`].
    ///
    /// # Errors
    ///
    /// See [`Self::clear`].
    pub async fn logout(&self) -> AuthResult<()> {
        debug!("Logging out");
        self.clear().await
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> AuthState {
        let state = self.inner.state.read();
        match &state.session {
            None => AuthState::Unauthenticated,
            Some(session) if state.refreshing => AuthState::Refreshing(session.token_pair()),
            Some(session) => AuthState::Authenticated(session.token_pair()),
        }
    }

    /// Returns the held token pair, if any.
    #[must_use]
    pub fn token_pair(&self) -> Option<TokenPair> {
        self.inner.current_pair()
    }

    /// Returns a summary of the session for display.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        let now = self.inner.now();
        let state = self.inner.state.read();
        match &state.session {
            None => SessionStatus::NotAuthenticated,
            Some(_) if state.refreshing => SessionStatus::Refreshing,
            Some(session) if session.is_valid_at(now) => SessionStatus::Valid {
                seconds_remaining: session.expires_at.map(|expires_at| expires_at - now),
            },
            Some(_) => SessionStatus::Expired,
        }
    }

    async fn usable_access_token(&self) -> AuthResult<String> {
        let current = self.inner.state.read().session.clone();
        let Some(session) = current else {
            return Err(AuthError::SessionExpired);
        };
        if session.is_expired_at(self.inner.now()) {
            debug!("Access token expired locally, refreshing before the call");
            let pair = self.refresh_from(&session.access_token).await?;
            return Ok(pair.access_token);
        }
        Ok(session.access_token)
    }

    /// Refreshes on behalf of a caller whose `rejected` access token failed.
    async fn refresh_from(&self, rejected: &str) -> AuthResult<TokenPair> {
        let outcome = {
            let mut slot = self.inner.in_flight.lock();
            let joined = slot.as_ref().map(|flight| flight.outcome.clone());
            if let Some(outcome) = joined {
                debug!("Joining in-flight refresh");
                outcome
            } else {
                let current = self.inner.state.read().session.clone();
                let Some(session) = current else {
                    return Err(AuthError::SessionExpired);
                };
                if session.access_token != rejected {
                    debug!("Access token already replaced, skipping refresh");
                    return Ok(session.token_pair());
                }

                self.inner.state.write().refreshing = true;
                let id = self.inner.next_flight.fetch_add(1, Ordering::Relaxed);
                let inner = Arc::clone(&self.inner);
                let task = tokio::spawn(async move {
                    let outcome = inner.run_refresh(session.refresh_token).await;
                    inner.finish_flight(id);
                    outcome
                });
                let outcome = task
                    .map(|joined| {
                        joined.unwrap_or_else(|e| Err(AuthError::Internal(e.to_string())))
                    })
                    .boxed()
                    .shared();
                *slot = Some(Flight {
                    id,
                    outcome: outcome.clone(),
                });
                outcome
            }
        };
        outcome.await
    }

    async fn sync_from_storage(&self) {
        if self.inner.state.read().refreshing {
            return;
        }
        let Some(record) = self.inner.read_persisted().await else {
            return;
        };
        if !record.is_valid_at(self.inner.now()) {
            return;
        }

        let mut state = self.inner.state.write();
        if state.refreshing || state.session.as_ref() == Some(&record) {
            return;
        }
        if state.retired.contains(&record.refresh_token) {
            debug!("Stored session was already renewed or ended, ignoring it");
            return;
        }
        info!(
            token = %token_preview(&record.access_token),
            "Adopting session found in storage"
        );
        state.session = Some(record);
        state.user = None;
    }
}

impl Inner {
    fn now(&self) -> i64 {
        self.clock.epoch_seconds()
    }

    fn current_pair(&self) -> Option<TokenPair> {
        self.state.read().session.as_ref().map(StoredSession::token_pair)
    }

    fn current_access_token(&self) -> Option<String> {
        self.state
            .read()
            .session
            .as_ref()
            .map(|session| session.access_token.clone())
    }

    fn cached_user(&self) -> Option<CurrentUser> {
        let state = self.state.read();
        let session = state.session.as_ref()?;
        state
            .user
            .as_ref()
            .filter(|(token, _)| *token == session.access_token)
            .map(|(_, user)| user.clone())
    }

    fn cache_user(&self, access_token: &str, user: CurrentUser) {
        let mut state = self.state.write();
        let current = state
            .session
            .as_ref()
            .is_some_and(|session| session.access_token == access_token);
        if current {
            state.user = Some((access_token.to_string(), user));
        }
    }

    fn reset(&self) {
        let mut state = self.state.write();
        let retired = std::mem::take(&mut state.retired);
        *state = SessionState {
            retired,
            ..SessionState::default()
        };
    }

    fn retire_current(&self) {
        let mut state = self.state.write();
        if let Some(refresh_token) = state
            .session
            .as_ref()
            .map(|session| session.refresh_token.clone())
        {
            state.retired.insert(refresh_token);
        }
    }

    async fn read_persisted(&self) -> Option<StoredSession> {
        match self.storage.get(&self.settings.storage_key).await {
            Ok(Some(raw)) => match StoredSession::decode(&raw) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "Ignoring unreadable session record");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read session storage");
                None
            }
        }
    }

    async fn persist(&self, record: &StoredSession) -> AuthResult<()> {
        let encoded = record
            .encode()
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        self.storage
            .set(
                &self.settings.storage_key,
                &encoded,
                Some(self.settings.session_ttl),
            )
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to persist session");
                AuthError::from(e)
            })?;
        debug!("Session persisted");
        Ok(())
    }

    /// Installs a freshly issued pair as the session.
    async fn establish(&self, pair: TokenPair) -> AuthResult<TokenPair> {
        if !pair.is_complete() {
            return Err(AuthError::Server {
                status: None,
                message: "incomplete token pair".to_string(),
            });
        }
        let record = StoredSession::issue(
            &pair,
            self.now(),
            self.settings.fallback_lifetime_secs(),
        );
        {
            let mut state = self.state.write();
            if let Some(previous) = state.session.take() {
                state.retired.insert(previous.refresh_token);
            }
            state.retired.remove(&record.refresh_token);
            state.session = Some(record.clone());
            state.refreshing = false;
            state.user = None;
        }
        self.persist(&record).await?;
        Ok(pair)
    }

    async fn run_refresh(&self, refresh_token: String) -> AuthResult<TokenPair> {
        debug!(token = %token_preview(&refresh_token), "Refreshing session");

        let outcome = match self.api.refresh(&refresh_token).await {
            Ok(pair) if !pair.is_complete() => {
                Err(ApiError::Decode("incomplete token pair".to_string()))
            }
            other => other,
        };

        match outcome {
            Ok(pair) => self.adopt_refreshed(&refresh_token, pair).await,
            Err(e) if e.is_unauthorized() => {
                warn!(error = %e, "Refresh token rejected, ending session");
                if self.end_session(&refresh_token).await {
                    Err(AuthError::SessionExpired)
                } else {
                    self.current_pair().ok_or(AuthError::SessionExpired)
                }
            }
            Err(e) => {
                self.state.write().refreshing = false;
                let err = AuthError::from_api(e, Operation::Refresh);
                warn!(error = %err, "Refresh failed, keeping session");
                Err(err)
            }
        }
    }

    async fn adopt_refreshed(&self, refresh_token: &str, pair: TokenPair) -> AuthResult<TokenPair> {
        let record = StoredSession::issue(
            &pair,
            self.now(),
            self.settings.fallback_lifetime_secs(),
        );
        {
            let mut state = self.state.write();
            state.refreshing = false;
            let current = state
                .session
                .as_ref()
                .map(|session| (session.refresh_token == refresh_token, session.token_pair()));
            match current {
                Some((true, _)) => {
                    state.retired.insert(refresh_token.to_string());
                    state.session = Some(record.clone());
                }
                Some((false, newer)) => {
                    debug!("Session replaced during refresh, keeping the newer pair");
                    return Ok(newer);
                }
                None => {
                    debug!("Session cleared during refresh, discarding the new pair");
                    return Err(AuthError::SessionExpired);
                }
            }
        }
        info!(token = %token_preview(&pair.access_token), "Session refreshed");
        self.persist(&record).await?;
        Ok(pair)
    }

    /// Clears the session if it still holds `refresh_token`. Returns whether
    /// it did.
    async fn end_session(&self, refresh_token: &str) -> bool {
        let ended = {
            let mut state = self.state.write();
            let matches = state
                .session
                .as_ref()
                .is_some_and(|session| session.refresh_token == refresh_token);
            if matches {
                let mut retired = std::mem::take(&mut state.retired);
                retired.insert(refresh_token.to_string());
                *state = SessionState {
                    retired,
                    ..SessionState::default()
                };
            }
            matches
        };
        if ended {
            if let Err(e) = self.storage.remove(&self.settings.storage_key).await {
                error!(error = %e, "Failed to remove persisted session");
            }
            info!("Session ended");
        }
        ended
    }

    fn finish_flight(&self, id: u64) {
        let mut slot = self.in_flight.lock();
        if slot.as_ref().is_some_and(|flight| flight.id == id) {
            *slot = None;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use costsmap_domain::{Currency, EntityId, Language};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ports::StorageError;

    const START: i64 = 1_700_000_000;
    const ACCESS_LIFETIME: i64 = 1800;

    struct TestClock(AtomicI64);

    impl TestClock {
        fn advance(&self, secs: i64) {
            self.0.fetch_add(secs, Ordering::SeqCst);
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> DateTime<Utc> {
            DateTime::from_timestamp(self.0.load(Ordering::SeqCst), 0).unwrap()
        }
    }

    #[derive(Default)]
    struct TestStorage {
        entries: Mutex<HashMap<String, String>>,
        fail_writes: AtomicBool,
        fail_removes: AtomicBool,
    }

    impl TestStorage {
        fn record(&self) -> Option<StoredSession> {
            self.entries
                .lock()
                .get(SESSION_KEY)
                .map(|raw| StoredSession::decode(raw).unwrap())
        }

        fn put(&self, record: &StoredSession) {
            self.entries
                .lock()
                .insert(SESSION_KEY.to_string(), record.encode().unwrap());
        }
    }

    #[async_trait]
    impl SessionStorage for TestStorage {
        async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            Ok(self.entries.lock().get(key).cloned())
        }

        async fn set(
            &self,
            key: &str,
            value: &str,
            _ttl: Option<Duration>,
        ) -> Result<(), StorageError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable("read-only".to_string()));
            }
            self.entries.lock().insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn remove(&self, key: &str) -> Result<(), StorageError> {
            if self.fail_removes.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable("read-only".to_string()));
            }
            self.entries.lock().remove(key);
            Ok(())
        }
    }

    struct TestApi {
        login: Result<TokenPair, ApiError>,
        register: Result<TokenPair, ApiError>,
        refresh: Mutex<Result<TokenPair, ApiError>>,
        refresh_delay: Duration,
        user: Result<CurrentUser, ApiError>,
        login_calls: AtomicUsize,
        refresh_calls: AtomicUsize,
        user_calls: AtomicUsize,
    }

    impl Default for TestApi {
        fn default() -> Self {
            Self {
                login: Ok(TokenPair::new("t1", "r1")),
                register: Ok(TokenPair::new("t1", "r1")),
                refresh: Mutex::new(Ok(TokenPair::new("t2", "r2"))),
                refresh_delay: Duration::ZERO,
                user: Ok(user()),
                login_calls: AtomicUsize::new(0),
                refresh_calls: AtomicUsize::new(0),
                user_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AuthApi for TestApi {
        async fn login(&self, _credentials: &Credentials) -> Result<TokenPair, ApiError> {
            self.login_calls.fetch_add(1, Ordering::SeqCst);
            self.login.clone()
        }

        async fn register(&self, _data: &RegistrationData) -> Result<TokenPair, ApiError> {
            self.register.clone()
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<TokenPair, ApiError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            if !self.refresh_delay.is_zero() {
                tokio::time::sleep(self.refresh_delay).await;
            }
            self.refresh.lock().clone()
        }

        async fn current_user(&self, access_token: &str) -> Result<CurrentUser, ApiError> {
            self.user_calls.fetch_add(1, Ordering::SeqCst);
            if access_token == "t1" || access_token == "t2" {
                self.user.clone()
            } else {
                Err(unauthorized())
            }
        }
    }

    fn user() -> CurrentUser {
        CurrentUser {
            id: EntityId::from(1),
            display_name: "a@b.com".to_string(),
            currency: Currency::default(),
            language: Language::default(),
        }
    }

    fn unauthorized() -> ApiError {
        ApiError::Unauthorized {
            status: 401,
            message: "Not authenticated".to_string(),
        }
    }

    fn settings() -> SessionSettings {
        SessionSettings {
            access_token_lifetime: Some(Duration::from_secs(1800)),
            ..SessionSettings::default()
        }
    }

    struct Fixture {
        api: Arc<TestApi>,
        storage: Arc<TestStorage>,
        clock: Arc<TestClock>,
    }

    impl Fixture {
        fn new(api: TestApi) -> Self {
            Self::with_storage(api, TestStorage::default())
        }

        fn with_storage(api: TestApi, storage: TestStorage) -> Self {
            Self {
                api: Arc::new(api),
                storage: Arc::new(storage),
                clock: Arc::new(TestClock(AtomicI64::new(START))),
            }
        }

        fn manager(&self) -> SessionManager {
            SessionManager::new(
                self.api.clone(),
                self.storage.clone(),
                self.clock.clone(),
                settings(),
            )
        }

        async fn restored(&self) -> SessionManager {
            SessionManager::restore(
                self.api.clone(),
                self.storage.clone(),
                self.clock.clone(),
                settings(),
            )
            .await
        }

        async fn logged_in(&self) -> SessionManager {
            let manager = self.manager();
            manager
                .login(&Credentials::new("a@b.com", "x"))
                .await
                .unwrap();
            manager
        }
    }

    #[tokio::test]
    async fn test_login_persists_and_survives_reload() {
        let fixture = Fixture::new(TestApi::default());
        let manager = fixture.manager();

        let pair = manager
            .login(&Credentials::new("a@b.com", "x"))
            .await
            .unwrap();

        assert_eq!(pair, TokenPair::new("t1", "r1"));
        assert!(manager.is_valid());
        assert_eq!(manager.state(), AuthState::Authenticated(pair.clone()));
        let record = fixture.storage.record().unwrap();
        assert_eq!(record.token_pair(), pair);
        assert_eq!(record.expires_at, Some(START + ACCESS_LIFETIME));

        let reloaded = fixture.restored().await;
        assert_eq!(reloaded.state(), AuthState::Authenticated(pair));
    }

    #[tokio::test]
    async fn test_login_rejected_leaves_state_untouched() {
        let fixture = Fixture::new(TestApi {
            login: Err(unauthorized()),
            ..TestApi::default()
        });
        let manager = fixture.manager();

        let result = manager.login(&Credentials::new("a@b.com", "wrong")).await;

        assert_eq!(result, Err(AuthError::InvalidCredentials));
        assert_eq!(manager.state(), AuthState::Unauthenticated);
        assert!(fixture.storage.record().is_none());
    }

    #[tokio::test]
    async fn test_login_validation_happens_before_request() {
        let fixture = Fixture::new(TestApi::default());
        let manager = fixture.manager();

        let result = manager.login(&Credentials::new("not-an-email", "x")).await;

        assert!(matches!(result, Err(AuthError::Validation(_))));
        assert_eq!(fixture.api.login_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_login_reports_storage_failure() {
        let fixture = Fixture::with_storage(
            TestApi::default(),
            TestStorage {
                fail_writes: AtomicBool::new(true),
                ..TestStorage::default()
            },
        );
        let manager = fixture.manager();

        let result = manager.login(&Credentials::new("a@b.com", "x")).await;

        assert!(matches!(result, Err(AuthError::Storage(_))));
        assert_eq!(manager.token_pair(), Some(TokenPair::new("t1", "r1")));
        assert!(fixture.storage.record().is_none());
    }

    #[tokio::test]
    async fn test_refresh_storage_failure_keeps_new_pair() {
        let fixture = Fixture::new(TestApi::default());
        let manager = fixture.logged_in().await;
        fixture.storage.fail_writes.store(true, Ordering::SeqCst);

        let result = manager.refresh().await;

        assert!(matches!(result, Err(AuthError::Storage(_))));
        assert_eq!(manager.token_pair(), Some(TokenPair::new("t2", "r2")));
        assert_eq!(
            fixture.storage.record().unwrap().token_pair(),
            TokenPair::new("t1", "r1")
        );

        // The stored record still holds the exchanged refresh token.
        assert!(manager.guard().await);
        assert_eq!(manager.token_pair(), Some(TokenPair::new("t2", "r2")));
    }

    #[tokio::test]
    async fn test_guard_does_not_revive_logged_out_session() {
        let fixture = Fixture::new(TestApi::default());
        let manager = fixture.logged_in().await;
        fixture.storage.fail_removes.store(true, Ordering::SeqCst);

        assert!(matches!(manager.logout().await, Err(AuthError::Storage(_))));
        assert!(fixture.storage.record().is_some());

        assert!(!manager.guard().await);
        assert_eq!(manager.state(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_login_after_logout_is_adoptable_again() {
        let fixture = Fixture::new(TestApi::default());
        let manager = fixture.logged_in().await;
        manager.logout().await.unwrap();

        manager
            .login(&Credentials::new("a@b.com", "x"))
            .await
            .unwrap();

        assert!(manager.guard().await);
        assert_eq!(manager.token_pair(), Some(TokenPair::new("t1", "r1")));
    }

    #[tokio::test]
    async fn test_register_conflict() {
        let fixture = Fixture::new(TestApi {
            register: Err(ApiError::Conflict("exists".to_string())),
            ..TestApi::default()
        });
        let manager = fixture.manager();

        let result = manager
            .register(&RegistrationData::new("a@b.com", "Secret1", "Secret1"))
            .await;

        assert_eq!(result, Err(AuthError::DuplicateAccount));
        assert_eq!(manager.state(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_register_establishes_session() {
        let fixture = Fixture::new(TestApi::default());
        let manager = fixture.manager();

        manager
            .register(&RegistrationData::new("a@b.com", "Secret1", "Secret1").with_currency("€"))
            .await
            .unwrap();

        assert!(manager.is_valid());
        assert!(fixture.storage.record().is_some());
    }

    #[tokio::test]
    async fn test_refresh_when_unauthenticated_is_noop() {
        let fixture = Fixture::new(TestApi::default());
        let manager = fixture.manager();

        assert_eq!(manager.refresh().await, Ok(None));
        assert_eq!(fixture.api.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_refresh_replaces_pair() {
        let fixture = Fixture::new(TestApi::default());
        let manager = fixture.logged_in().await;

        let pair = manager.refresh().await.unwrap();

        assert_eq!(pair, Some(TokenPair::new("t2", "r2")));
        assert_eq!(
            manager.state(),
            AuthState::Authenticated(TokenPair::new("t2", "r2"))
        );
        assert_eq!(
            fixture.storage.record().unwrap().token_pair(),
            TokenPair::new("t2", "r2")
        );
    }

    #[tokio::test]
    async fn test_refresh_rejected_clears_session() {
        let fixture = Fixture::new(TestApi {
            refresh: Mutex::new(Err(unauthorized())),
            ..TestApi::default()
        });
        let manager = fixture.logged_in().await;

        assert_eq!(manager.refresh().await, Err(AuthError::SessionExpired));
        assert_eq!(manager.state(), AuthState::Unauthenticated);
        assert!(fixture.storage.record().is_none());
    }

    #[tokio::test]
    async fn test_refresh_transport_failure_keeps_session() {
        let fixture = Fixture::new(TestApi {
            refresh: Mutex::new(Err(ApiError::Transport("connection refused".to_string()))),
            ..TestApi::default()
        });
        let manager = fixture.logged_in().await;

        let result = manager.refresh().await;

        assert_eq!(
            result,
            Err(AuthError::Transport("connection refused".to_string()))
        );
        assert_eq!(
            manager.state(),
            AuthState::Authenticated(TokenPair::new("t1", "r1"))
        );
        assert!(fixture.storage.record().is_some());
    }

    #[tokio::test]
    async fn test_concurrent_rejections_share_one_refresh() {
        let fixture = Fixture::new(TestApi {
            refresh_delay: Duration::from_millis(20),
            ..TestApi::default()
        });
        let manager = fixture.logged_in().await;

        let call = |token: String| async move {
            if token == "t2" {
                Ok(token)
            } else {
                Err(unauthorized())
            }
        };
        let (first, second) = tokio::join!(manager.authorized(call), manager.authorized(call));

        assert_eq!(first, Ok("t2".to_string()));
        assert_eq!(second, Ok("t2".to_string()));
        assert_eq!(fixture.api.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abandoned_refresh_still_completes() {
        let fixture = Fixture::new(TestApi {
            refresh_delay: Duration::from_millis(20),
            ..TestApi::default()
        });
        let manager = fixture.logged_in().await;

        let abandoned = tokio::time::timeout(Duration::from_millis(2), manager.refresh()).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(manager.token_pair(), Some(TokenPair::new("t2", "r2")));
        assert_eq!(
            fixture.storage.record().unwrap().token_pair(),
            TokenPair::new("t2", "r2")
        );
        assert_eq!(fixture.api.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_late_rejection_reuses_new_pair() {
        let fixture = Fixture::new(TestApi::default());
        let manager = fixture.logged_in().await;
        manager.refresh().await.unwrap();

        let pair = manager.refresh_from("t1").await.unwrap();

        assert_eq!(pair, TokenPair::new("t2", "r2"));
        assert_eq!(fixture.api.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_authorized_refreshes_expired_token_first() {
        let fixture = Fixture::new(TestApi::default());
        let manager = fixture.logged_in().await;
        fixture.clock.advance(ACCESS_LIFETIME);
        assert!(!manager.is_valid());

        let seen = manager
            .authorized(|token: String| async move { Ok::<_, ApiError>(token) })
            .await;

        assert_eq!(seen, Ok("t2".to_string()));
        assert!(manager.is_valid());
    }

    #[tokio::test]
    async fn test_authorized_second_rejection_ends_session() {
        let fixture = Fixture::new(TestApi::default());
        let manager = fixture.logged_in().await;

        let result = manager
            .authorized(|_token: String| async { Err::<(), _>(unauthorized()) })
            .await;

        assert_eq!(result, Err(AuthError::SessionExpired));
        assert_eq!(manager.state(), AuthState::Unauthenticated);
        assert!(fixture.storage.record().is_none());
    }

    #[tokio::test]
    async fn test_authorized_other_failures_keep_session() {
        let fixture = Fixture::new(TestApi::default());
        let manager = fixture.logged_in().await;

        let result = manager
            .authorized(|_token: String| async {
                Err::<(), _>(ApiError::Server {
                    status: 500,
                    message: "boom".to_string(),
                })
            })
            .await;

        assert!(matches!(
            result,
            Err(AuthError::Server {
                status: Some(500),
                ..
            })
        ));
        assert!(manager.is_valid());
        assert_eq!(fixture.api.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_authorized_when_unauthenticated() {
        let fixture = Fixture::new(TestApi::default());
        let manager = fixture.manager();

        let result = manager
            .authorized(|token: String| async move { Ok::<_, ApiError>(token) })
            .await;

        assert_eq!(result, Err(AuthError::SessionExpired));
    }

    #[tokio::test]
    async fn test_current_user_without_token() {
        let fixture = Fixture::new(TestApi::default());
        let manager = fixture.manager();

        assert_eq!(manager.fetch_current_user(None).await, Ok(None));
        assert_eq!(manager.current_user().await, Ok(None));
        assert_eq!(fixture.api.user_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_current_user_rejection_does_not_clear() {
        let fixture = Fixture::new(TestApi::default());
        let manager = fixture.logged_in().await;

        let result = manager.fetch_current_user(Some("stale")).await;

        assert_eq!(result, Err(AuthError::SessionExpired));
        assert!(manager.is_valid());
    }

    #[tokio::test]
    async fn test_current_user_is_cached_per_token() {
        let fixture = Fixture::new(TestApi::default());
        let manager = fixture.logged_in().await;

        assert_eq!(manager.current_user().await, Ok(Some(user())));
        assert_eq!(manager.current_user().await, Ok(Some(user())));
        assert_eq!(fixture.api.user_calls.load(Ordering::SeqCst), 1);

        manager.refresh().await.unwrap();
        assert_eq!(manager.load_current_user().await, Ok(user()));
        assert_eq!(fixture.api.user_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_is_valid_is_idempotent() {
        let fixture = Fixture::new(TestApi::default());
        let manager = fixture.logged_in().await;

        assert!(manager.is_valid());
        assert!(manager.is_valid());
        fixture.clock.advance(ACCESS_LIFETIME - 1);
        assert!(manager.is_valid());
        fixture.clock.advance(1);
        assert!(!manager.is_valid());
        assert!(!manager.is_valid());
    }

    #[tokio::test]
    async fn test_restore_ignores_expired_record() {
        let storage = TestStorage::default();
        let expired = StoredSession {
            access_token: "t1".to_string(),
            refresh_token: "r1".to_string(),
            expires_at: Some(START),
        };
        storage.put(&expired);
        let fixture = Fixture::with_storage(TestApi::default(), storage);

        let manager = fixture.restored().await;

        assert_eq!(manager.state(), AuthState::Unauthenticated);
        assert_eq!(fixture.storage.record(), Some(expired));
    }

    #[tokio::test]
    async fn test_restore_ignores_unreadable_record() {
        let storage = TestStorage::default();
        storage
            .entries
            .lock()
            .insert(SESSION_KEY.to_string(), "{not json".to_string());
        let fixture = Fixture::with_storage(TestApi::default(), storage);

        let manager = fixture.restored().await;

        assert_eq!(manager.state(), AuthState::Unauthenticated);
        assert!(fixture.storage.entries.lock().contains_key(SESSION_KEY));
    }

    #[tokio::test]
    async fn test_guard_adopts_stored_session() {
        let fixture = Fixture::new(TestApi::default());
        let manager = fixture.manager();
        assert!(!manager.guard().await);

        fixture.storage.put(&StoredSession {
            access_token: "t9".to_string(),
            refresh_token: "r9".to_string(),
            expires_at: Some(START + 60),
        });

        assert!(manager.guard().await);
        assert_eq!(manager.token_pair(), Some(TokenPair::new("t9", "r9")));
    }

    #[tokio::test]
    async fn test_guard_refreshes_expired_session() {
        let fixture = Fixture::new(TestApi::default());
        let manager = fixture.logged_in().await;
        fixture.clock.advance(ACCESS_LIFETIME + 1);

        assert!(manager.guard().await);
        assert_eq!(manager.token_pair(), Some(TokenPair::new("t2", "r2")));
    }

    #[tokio::test]
    async fn test_guard_reports_false_on_transport_failure() {
        let fixture = Fixture::new(TestApi {
            refresh: Mutex::new(Err(ApiError::Transport("offline".to_string()))),
            ..TestApi::default()
        });
        let manager = fixture.logged_in().await;
        fixture.clock.advance(ACCESS_LIFETIME + 1);

        assert!(!manager.guard().await);
        assert_eq!(manager.token_pair(), Some(TokenPair::new("t1", "r1")));
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let fixture = Fixture::new(TestApi::default());
        let manager = fixture.logged_in().await;

        manager.logout().await.unwrap();

        assert_eq!(manager.state(), AuthState::Unauthenticated);
        assert_eq!(manager.status(), SessionStatus::NotAuthenticated);
        assert!(fixture.storage.record().is_none());
    }

    #[tokio::test]
    async fn test_status() {
        let fixture = Fixture::new(TestApi::default());
        let manager = fixture.logged_in().await;

        assert_eq!(
            manager.status(),
            SessionStatus::Valid {
                seconds_remaining: Some(ACCESS_LIFETIME)
            }
        );
        fixture.clock.advance(ACCESS_LIFETIME);
        assert_eq!(manager.status(), SessionStatus::Expired);
    }
}
