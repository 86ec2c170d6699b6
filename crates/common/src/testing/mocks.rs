//! Mock implementations of the auth traits

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::auth::{AccessTokenSource, AuthError, IntrospectionResult, Session, TokenEndpoint};

/// Scripted token endpoint that counts calls
///
/// - `login` returns [`MockTokenEndpoint::LOGIN_TOKEN`]
/// - `login_client_credentials` returns `client-token-N`
/// - `refresh` returns `refreshed-token-N`
///
/// where `N` is the 1-based call count for that grant. A configurable delay
/// is applied before every response so tests can overlap callers.
#[derive(Debug)]
pub struct MockTokenEndpoint {
    login_calls: AtomicUsize,
    client_credentials_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    introspect_calls: AtomicUsize,
    delay_millis: AtomicU64,
    expires_in: AtomicI64,
    fail_login: AtomicBool,
    fail_refresh: AtomicBool,
}

impl MockTokenEndpoint {
    /// Access token issued by `login`
    pub const LOGIN_TOKEN: &'static str = "login-token";

    /// Create a mock that answers immediately with hour-long sessions
    #[must_use]
    pub fn new() -> Self {
        Self {
            login_calls: AtomicUsize::new(0),
            client_credentials_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            introspect_calls: AtomicUsize::new(0),
            delay_millis: AtomicU64::new(0),
            expires_in: AtomicI64::new(3600),
            fail_login: AtomicBool::new(false),
            fail_refresh: AtomicBool::new(false),
        }
    }

    /// Delay every response by `delay`
    pub fn set_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.delay_millis.store(millis, Ordering::SeqCst);
    }

    /// Lifetime in seconds of issued sessions
    pub fn set_expires_in(&self, seconds: i64) {
        self.expires_in.store(seconds, Ordering::SeqCst);
    }

    /// Make `login` and `login_client_credentials` fail with 401
    pub fn set_fail_login(&self, fail: bool) {
        self.fail_login.store(fail, Ordering::SeqCst);
    }

    /// Make `refresh` fail with 400 `invalid_grant`
    pub fn set_fail_refresh(&self, fail: bool) {
        self.fail_refresh.store(fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn client_credentials_calls(&self) -> usize {
        self.client_credentials_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn introspect_calls(&self) -> usize {
        self.introspect_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        let millis = self.delay_millis.load(Ordering::SeqCst);
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }

    fn session(&self, access_token: String, refresh_token: Option<String>) -> Session {
        Session::new(
            access_token,
            refresh_token,
            Some("mock.scope".to_string()),
            self.expires_in.load(Ordering::SeqCst),
        )
    }

    fn rejected(&self) -> AuthError {
        AuthError::InvalidCredentials {
            status: 401,
            message: "invalid_client: mock rejected credentials".to_string(),
        }
    }
}

impl Default for MockTokenEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenEndpoint for MockTokenEndpoint {
    async fn login(&self, _identifier: &str, _secret: &str) -> Result<Session, AuthError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        if self.fail_login.load(Ordering::SeqCst) {
            return Err(self.rejected());
        }
        Ok(self.session(Self::LOGIN_TOKEN.to_string(), Some("refresh-token".to_string())))
    }

    async fn login_client_credentials(&self) -> Result<Session, AuthError> {
        let call = self.client_credentials_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.pause().await;

        if self.fail_login.load(Ordering::SeqCst) {
            return Err(self.rejected());
        }
        Ok(self.session(format!("client-token-{call}"), None))
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<Session, AuthError> {
        let call = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.pause().await;

        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(AuthError::InvalidCredentials {
                status: 400,
                message: "invalid_grant: refresh token revoked".to_string(),
            });
        }
        Ok(self.session(format!("refreshed-token-{call}"), Some(format!("refresh-token-{call}"))))
    }

    async fn introspect(&self, token: &str) -> Result<IntrospectionResult, AuthError> {
        self.introspect_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        Ok(IntrospectionResult {
            active: !token.is_empty(),
            username: Some("mock-user".to_string()),
            ..IntrospectionResult::default()
        })
    }
}

/// Access token source with a fixed token
///
/// Records how many times a forced refresh was requested. Set the token to
/// `None` to simulate a source that has no session.
#[derive(Debug, Clone)]
pub struct StaticTokenSource {
    token: Arc<Mutex<Option<String>>>,
    forced_refreshes: Arc<AtomicUsize>,
}

impl StaticTokenSource {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(Mutex::new(Some(token.into()))),
            forced_refreshes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replace (or clear) the token handed out
    pub fn set_token(&self, token: Option<String>) {
        *self.token.lock() = token;
    }

    #[must_use]
    pub fn forced_refreshes(&self) -> usize {
        self.forced_refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccessTokenSource for StaticTokenSource {
    async fn access_token(&self) -> Result<String, AuthError> {
        self.token.lock().clone().ok_or(AuthError::NotAuthenticated)
    }

    async fn force_refresh(&self) -> Result<(), AuthError> {
        self.forced_refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_endpoint_counts_calls() {
        let endpoint = MockTokenEndpoint::new();

        let session = endpoint.login("user", "pass").await.unwrap();
        endpoint.refresh("refresh-token").await.unwrap();
        let second = endpoint.refresh("refresh-token-1").await.unwrap();

        assert_eq!(session.access_token, MockTokenEndpoint::LOGIN_TOKEN);
        assert_eq!(second.access_token, "refreshed-token-2");
        assert_eq!(endpoint.login_calls(), 1);
        assert_eq!(endpoint.refresh_calls(), 2);
    }

    #[tokio::test]
    async fn test_mock_endpoint_failures() {
        let endpoint = MockTokenEndpoint::new();
        endpoint.set_fail_refresh(true);

        let err = endpoint.refresh("refresh-token").await.unwrap_err();

        assert!(matches!(err, AuthError::InvalidCredentials { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_static_token_source() {
        let source = StaticTokenSource::new("abc");
        assert_eq!(source.access_token().await.unwrap(), "abc");

        source.set_token(None);
        assert_eq!(source.access_token().await, Err(AuthError::NotAuthenticated));

        source.force_refresh().await.unwrap();
        assert_eq!(source.forced_refreshes(), 1);
    }
}
