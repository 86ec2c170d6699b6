//! Traits for token endpoint and token source operations
//!
//! These traits enable dependency injection and testing by abstracting the
//! IAM token endpoint and whatever hands bearer tokens to the request builder.

use async_trait::async_trait;

use super::error::AuthError;
use super::types::{IntrospectionResult, Session};

/// Trait for token endpoint operations
///
/// Implemented by [`IamTokenClient`](super::IamTokenClient) over HTTP and by
/// scripted mocks in tests.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchange a username and password for a session (password grant)
    ///
    /// # Errors
    /// `InvalidCredentials` on a non-2xx response, `Transport` on network or
    /// decoding failure
    async fn login(&self, identifier: &str, secret: &str) -> Result<Session, AuthError>;

    /// Obtain a session for the OAuth2 client itself (client-credentials
    /// grant)
    ///
    /// # Errors
    /// Same as [`TokenEndpoint::login`]
    async fn login_client_credentials(&self) -> Result<Session, AuthError>;

    /// Exchange a refresh token for a brand-new session
    ///
    /// # Errors
    /// `InvalidCredentials` if the refresh token was rejected
    async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError>;

    /// Validate an arbitrary token out-of-band
    ///
    /// # Errors
    /// `InvalidCredentials` on a non-2xx response, `Transport` otherwise
    async fn introspect(&self, token: &str) -> Result<IntrospectionResult, AuthError>;
}

/// Trait for providing access tokens to the request builder
///
/// This method should handle token refresh if needed.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    /// Get a valid access token
    async fn access_token(&self) -> Result<String, AuthError>;

    /// Force the underlying session to be refreshed
    async fn force_refresh(&self) -> Result<(), AuthError>;
}
