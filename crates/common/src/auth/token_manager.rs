//! Token manager with single-flight refresh
//!
//! Manages the session lifecycle:
//! - Login (password or client-credentials grant)
//! - Lazy refresh once the session is within the safety margin of expiry
//! - Refresh de-duplication under concurrent callers
//! - Token introspection
//!
//! ```text
//! Unauthenticated --login--> Active --refresh ok--> Active
//!                               |
//!                               +--refresh fails--> Expired --login--> Active
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::client::IamTokenClient;
use super::error::AuthError;
use super::traits::{AccessTokenSource, TokenEndpoint};
use super::types::{IamConfig, IntrospectionResult, Session, DEFAULT_REFRESH_MARGIN_SECONDS};

/// How the current session was obtained; decides how it is renewed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grant {
    Password,
    ClientCredentials,
    Seeded,
}

#[derive(Debug, Clone)]
enum SessionState {
    Unauthenticated,
    Active { session: Arc<Session>, grant: Grant },
    Expired,
}

/// Observable lifecycle state of a [`TokenManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No login has happened yet, or the session was logged out
    Unauthenticated,
    /// A session is held and can sign requests
    Active,
    /// The last refresh failed; a new login is required
    Expired,
}

/// Owns the authenticated session and hands out access tokens
///
/// Sessions are swapped as a whole behind an `Arc`; readers never observe a
/// partially updated session. At most one refresh runs at a time per
/// manager: callers that find the session expired queue on the refresh gate
/// and reuse whatever session the first caller installed.
pub struct TokenManager<E: TokenEndpoint + 'static> {
    endpoint: Arc<E>,
    state: RwLock<SessionState>,
    refresh_gate: Mutex<()>,
    refresh_margin_seconds: i64,
}

impl<E: TokenEndpoint + 'static> TokenManager<E> {
    /// Create a token manager with the default 5 second refresh margin
    #[must_use]
    pub fn new(endpoint: E) -> Self {
        Self::with_shared_endpoint(Arc::new(endpoint))
    }

    /// Create a token manager over an endpoint shared with other owners
    #[must_use]
    pub fn with_shared_endpoint(endpoint: Arc<E>) -> Self {
        Self {
            endpoint,
            state: RwLock::new(SessionState::Unauthenticated),
            refresh_gate: Mutex::new(()),
            refresh_margin_seconds: DEFAULT_REFRESH_MARGIN_SECONDS,
        }
    }

    /// Refresh sessions this many seconds before they expire
    #[must_use]
    pub fn with_refresh_margin(mut self, seconds: i64) -> Self {
        self.refresh_margin_seconds = seconds.max(0);
        self
    }

    /// Get the refresh margin in seconds
    #[must_use]
    pub fn refresh_margin(&self) -> i64 {
        self.refresh_margin_seconds
    }

    /// Get a reference to the token endpoint
    #[must_use]
    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// Log in with the password grant and install the resulting session
    ///
    /// A failed login leaves the previous state untouched.
    ///
    /// # Errors
    /// `InvalidCredentials` if the endpoint rejected the credentials,
    /// `Transport` on network or decoding failure
    pub async fn login(&self, identifier: &str, secret: &str) -> Result<Arc<Session>, AuthError> {
        let session = self.endpoint.login(identifier, secret).await?;
        info!(expires_in = session.seconds_until_expiry(), "login succeeded");
        Ok(self.install(session, Grant::Password).await)
    }

    /// Log in as the OAuth2 client itself and install the resulting session
    ///
    /// Sessions obtained this way carry no refresh token and are renewed by
    /// repeating the client-credentials grant.
    ///
    /// # Errors
    /// Same as [`TokenManager::login`]
    pub async fn login_client_credentials(&self) -> Result<Arc<Session>, AuthError> {
        let session = self.endpoint.login_client_credentials().await?;
        info!(expires_in = session.seconds_until_expiry(), "client credentials login succeeded");
        Ok(self.install(session, Grant::ClientCredentials).await)
    }

    /// Seed the manager with a session obtained elsewhere
    pub async fn store_session(&self, session: Session) -> Arc<Session> {
        self.install(session, Grant::Seeded).await
    }

    /// Return a valid access token, refreshing first if needed
    ///
    /// # Errors
    /// - `NotAuthenticated` before the first login
    /// - `SessionExpired` after a failed refresh
    /// - the token endpoint error if the refresh run by this caller fails
    pub async fn current_token(&self) -> Result<String, AuthError> {
        let (observed, _) = self.active_session().await?;
        if !observed.is_expired(self.refresh_margin_seconds) {
            return Ok(observed.access_token.clone());
        }

        let _gate = self.refresh_gate.lock().await;

        let (current, grant) = self.active_session().await?;
        if !Arc::ptr_eq(&current, &observed) || !current.is_expired(self.refresh_margin_seconds) {
            debug!("reusing session refreshed by a concurrent caller");
            return Ok(current.access_token.clone());
        }

        let refreshed = self.refresh_locked(&current, grant).await?;
        Ok(refreshed.access_token.clone())
    }

    /// Force a refresh regardless of the session's remaining lifetime
    ///
    /// # Errors
    /// `NotAuthenticated` / `SessionExpired` if there is no active session,
    /// otherwise the token endpoint error. Any refresh failure drops the
    /// session.
    pub async fn token_refresh(&self) -> Result<(), AuthError> {
        let _gate = self.refresh_gate.lock().await;
        let (current, grant) = self.active_session().await?;
        self.refresh_locked(&current, grant).await.map(|_| ())
    }

    /// Introspect an arbitrary token
    ///
    /// # Errors
    /// Propagates the token endpoint error
    pub async fn introspect(&self, token: &str) -> Result<IntrospectionResult, AuthError> {
        self.endpoint.introspect(token).await
    }

    /// Snapshot of the current session, if one is active
    pub async fn session(&self) -> Option<Arc<Session>> {
        match &*self.state.read().await {
            SessionState::Active { session, .. } => Some(Arc::clone(session)),
            SessionState::Unauthenticated | SessionState::Expired => None,
        }
    }

    /// Current lifecycle state
    pub async fn status(&self) -> SessionStatus {
        match &*self.state.read().await {
            SessionState::Unauthenticated => SessionStatus::Unauthenticated,
            SessionState::Active { .. } => SessionStatus::Active,
            SessionState::Expired => SessionStatus::Expired,
        }
    }

    /// Check if a session is held
    pub async fn is_authenticated(&self) -> bool {
        self.status().await == SessionStatus::Active
    }

    /// Drop the session
    pub async fn logout(&self) {
        let _gate = self.refresh_gate.lock().await;
        *self.state.write().await = SessionState::Unauthenticated;
        info!("session cleared");
    }

    async fn install(&self, session: Session, grant: Grant) -> Arc<Session> {
        let session = Arc::new(session);
        let _gate = self.refresh_gate.lock().await;
        *self.state.write().await =
            SessionState::Active { session: Arc::clone(&session), grant };
        session
    }

    async fn active_session(&self) -> Result<(Arc<Session>, Grant), AuthError> {
        match &*self.state.read().await {
            SessionState::Active { session, grant } => Ok((Arc::clone(session), *grant)),
            SessionState::Unauthenticated => Err(AuthError::NotAuthenticated),
            SessionState::Expired => Err(AuthError::SessionExpired),
        }
    }

    /// Run one refresh. The caller must hold the refresh gate.
    async fn refresh_locked(
        &self,
        current: &Session,
        grant: Grant,
    ) -> Result<Arc<Session>, AuthError> {
        let result = match (current.refresh_token.as_deref(), grant) {
            (Some(refresh_token), _) => self.endpoint.refresh(refresh_token).await,
            (None, Grant::ClientCredentials) => self.endpoint.login_client_credentials().await,
            (None, Grant::Password | Grant::Seeded) => Err(AuthError::SessionExpired),
        };

        match result {
            Ok(session) => {
                let session = Arc::new(session);
                *self.state.write().await =
                    SessionState::Active { session: Arc::clone(&session), grant };
                info!(expires_in = session.seconds_until_expiry(), "session refreshed");
                Ok(session)
            }
            Err(err) => {
                *self.state.write().await = SessionState::Expired;
                warn!(error = %err, "session refresh failed; login required");
                Err(err)
            }
        }
    }
}

impl TokenManager<IamTokenClient> {
    /// Build a manager backed by the IAM token endpoint
    ///
    /// # Errors
    /// Returns `AuthError::Config` if the configuration is invalid
    pub fn from_config(config: IamConfig) -> Result<Self, AuthError> {
        let margin = config.refresh_margin_seconds;
        Ok(Self::new(IamTokenClient::new(config)?).with_refresh_margin(margin))
    }
}

#[async_trait]
impl<E: TokenEndpoint + 'static> AccessTokenSource for TokenManager<E> {
    async fn access_token(&self) -> Result<String, AuthError> {
        self.current_token().await
    }

    async fn force_refresh(&self) -> Result<(), AuthError> {
        self.token_refresh().await
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::token_manager.
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::testing::MockTokenEndpoint;

    fn expired(session: &Session) -> Session {
        session.with_expires_at(Utc::now() - chrono::Duration::seconds(1))
    }

    #[tokio::test]
    async fn test_current_token_before_login() {
        let manager = TokenManager::new(MockTokenEndpoint::new());

        assert_eq!(manager.current_token().await, Err(AuthError::NotAuthenticated));
        assert_eq!(manager.status().await, SessionStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn test_login_then_current_token_returns_literal_token() {
        let manager = TokenManager::new(MockTokenEndpoint::new());

        manager.login("user", "pass").await.unwrap();

        assert_eq!(manager.current_token().await.unwrap(), MockTokenEndpoint::LOGIN_TOKEN);
        assert_eq!(manager.endpoint().refresh_calls(), 0);
        assert!(manager.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_failed_login_keeps_state() {
        let endpoint = MockTokenEndpoint::new();
        endpoint.set_fail_login(true);
        let manager = TokenManager::new(endpoint);

        let err = manager.login("user", "wrong").await.unwrap_err();

        assert!(matches!(err, AuthError::InvalidCredentials { status: 401, .. }));
        assert_eq!(manager.status().await, SessionStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn test_expired_session_refreshes_once() {
        let manager = TokenManager::new(MockTokenEndpoint::new());
        let session = manager.login("user", "pass").await.unwrap();
        manager.store_session(expired(&session)).await;

        let first = manager.current_token().await.unwrap();
        let second = manager.current_token().await.unwrap();

        assert_eq!(first, "refreshed-token-1");
        assert_eq!(second, first);
        assert_eq!(manager.endpoint().refresh_calls(), 1);
    }

    #[tokio::test]
    async fn test_session_within_margin_is_refreshed() {
        let manager = TokenManager::new(MockTokenEndpoint::new()).with_refresh_margin(60);
        manager
            .store_session(Session::new(
                "short-lived".to_string(),
                Some("refresh".to_string()),
                None,
                30,
            ))
            .await;

        assert_eq!(manager.current_token().await.unwrap(), "refreshed-token-1");
    }

    #[tokio::test]
    async fn test_refresh_failure_expires_session() {
        let manager = TokenManager::new(MockTokenEndpoint::new());
        let session = manager.login("user", "pass").await.unwrap();
        manager.store_session(expired(&session)).await;
        manager.endpoint().set_fail_refresh(true);

        let first = manager.current_token().await.unwrap_err();
        assert!(matches!(first, AuthError::InvalidCredentials { .. }));
        assert_eq!(manager.status().await, SessionStatus::Expired);
        assert_eq!(manager.current_token().await, Err(AuthError::SessionExpired));

        manager.endpoint().set_fail_refresh(false);
        manager.login("user", "pass").await.unwrap();
        assert_eq!(manager.current_token().await.unwrap(), MockTokenEndpoint::LOGIN_TOKEN);
    }

    #[tokio::test]
    async fn test_forced_refresh_replaces_session() {
        let manager = TokenManager::new(MockTokenEndpoint::new());
        let before = manager.login("user", "pass").await.unwrap();

        manager.token_refresh().await.unwrap();

        let after = manager.session().await.unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.access_token, "refreshed-token-1");
        // the old snapshot is untouched
        assert_eq!(before.access_token, MockTokenEndpoint::LOGIN_TOKEN);
    }

    #[tokio::test]
    async fn test_forced_refresh_without_session() {
        let manager = TokenManager::new(MockTokenEndpoint::new());

        assert_eq!(manager.token_refresh().await, Err(AuthError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_seeded_session_without_refresh_token_expires() {
        let manager = TokenManager::new(MockTokenEndpoint::new());
        let seeded = Session::new("seeded".to_string(), None, None, 3600);
        manager.store_session(expired(&seeded)).await;

        assert_eq!(manager.current_token().await, Err(AuthError::SessionExpired));
        assert_eq!(manager.endpoint().refresh_calls(), 0);
        assert_eq!(manager.status().await, SessionStatus::Expired);
    }

    #[tokio::test]
    async fn test_client_credentials_session_renews_by_grant() {
        let manager = TokenManager::new(MockTokenEndpoint::new());
        let session = manager.login_client_credentials().await.unwrap();
        assert!(session.refresh_token.is_none());

        manager.token_refresh().await.unwrap();

        assert_eq!(manager.endpoint().client_credentials_calls(), 2);
        assert_eq!(manager.endpoint().refresh_calls(), 0);
        assert!(manager.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let endpoint = MockTokenEndpoint::new();
        endpoint.set_delay(Duration::from_millis(50));
        let manager = Arc::new(TokenManager::new(endpoint));
        let session = manager.login("user", "pass").await.unwrap();
        manager.store_session(expired(&session)).await;

        let callers = (0..16).map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.current_token().await })
        });
        let results = futures::future::join_all(callers).await;

        for result in results {
            assert_eq!(result.unwrap().unwrap(), "refreshed-token-1");
        }
        assert_eq!(manager.endpoint().refresh_calls(), 1);
    }

    #[tokio::test]
    async fn test_short_lived_tokens_still_share_one_refresh() {
        let endpoint = MockTokenEndpoint::new();
        endpoint.set_delay(Duration::from_millis(50));
        let manager = Arc::new(TokenManager::new(endpoint).with_refresh_margin(60));
        let session = manager.login("user", "pass").await.unwrap();
        manager.store_session(expired(&session)).await;
        // refreshed sessions land inside the margin straight away
        manager.endpoint().set_expires_in(30);

        let callers = (0..8).map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.current_token().await })
        });
        let results = futures::future::join_all(callers).await;

        for result in results {
            assert_eq!(result.unwrap().unwrap(), "refreshed-token-1");
        }
        assert_eq!(manager.endpoint().refresh_calls(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_refresh_releases_gate() {
        let endpoint = MockTokenEndpoint::new();
        endpoint.set_delay(Duration::from_secs(10));
        let manager = TokenManager::new(endpoint);
        let session = manager.login("user", "pass").await.unwrap();
        manager.store_session(expired(&session)).await;

        let timed_out =
            tokio::time::timeout(Duration::from_millis(50), manager.current_token()).await;
        assert!(timed_out.is_err());

        manager.endpoint().set_delay(Duration::ZERO);
        let token = tokio::time::timeout(Duration::from_secs(1), manager.current_token())
            .await
            .expect("refresh gate should have been released");

        assert_eq!(token.unwrap(), "refreshed-token-2");
    }

    #[tokio::test]
    async fn test_logout() {
        let manager = TokenManager::new(MockTokenEndpoint::new());
        manager.login("user", "pass").await.unwrap();

        manager.logout().await;

        assert!(manager.session().await.is_none());
        assert_eq!(manager.current_token().await, Err(AuthError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_access_token_source_delegates() {
        let manager = TokenManager::new(MockTokenEndpoint::new());
        manager.login("user", "pass").await.unwrap();
        let source: &dyn AccessTokenSource = &manager;

        assert_eq!(source.access_token().await.unwrap(), MockTokenEndpoint::LOGIN_TOKEN);
        source.force_refresh().await.unwrap();
        assert_eq!(source.access_token().await.unwrap(), "refreshed-token-1");
    }

    #[test]
    fn test_negative_margin_is_clamped() {
        let manager = TokenManager::new(MockTokenEndpoint::new()).with_refresh_margin(-10);

        assert_eq!(manager.refresh_margin(), 0);
    }
}
