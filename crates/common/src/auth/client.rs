//! IAM token endpoint client
//!
//! Handles the HTTP side of the session lifecycle:
//! - Password grant login
//! - Client-credentials grant login
//! - Token refresh
//! - Token introspection
//!
//! Every call authenticates the OAuth2 client with HTTP basic auth.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::error::AuthError;
use super::traits::TokenEndpoint;
use super::types::{IamConfig, IntrospectionResult, Session, TokenEndpointError, TokenResponse};

/// `Api-Version` expected by the token endpoint
pub const TOKEN_API_VERSION: &str = "2";

/// `Api-Version` expected by the introspection endpoint
pub const INTROSPECT_API_VERSION: &str = "4";

/// HTTP client for the IAM OAuth2 endpoints
#[derive(Debug, Clone)]
pub struct IamTokenClient {
    config: IamConfig,
    client: Client,
}

impl IamTokenClient {
    /// Create a new token endpoint client
    ///
    /// # Errors
    /// Returns `AuthError::Config` if the IAM URL is empty or malformed, or
    /// the HTTP client cannot be built
    pub fn new(config: IamConfig) -> Result<Self, AuthError> {
        let mut builder = Client::builder().timeout(config.timeout);
        if config.skip_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|e| AuthError::Config(format!("failed to build HTTP client: {e}")))?;

        Self::with_http_client(config, client)
    }

    /// Create a client that shares an existing `reqwest::Client`
    ///
    /// # Errors
    /// Returns `AuthError::Config` if the IAM URL is empty or malformed
    pub fn with_http_client(config: IamConfig, client: Client) -> Result<Self, AuthError> {
        if config.iam_url.is_empty() {
            return Err(AuthError::Config("IAM URL cannot be empty".to_string()));
        }
        url::Url::parse(&config.iam_url)
            .map_err(|e| AuthError::Config(format!("invalid IAM URL {}: {e}", config.iam_url)))?;
        if config.client_id.is_empty() {
            return Err(AuthError::Config("OAuth2 client id cannot be empty".to_string()));
        }

        Ok(Self { config, client })
    }

    /// Get a reference to the IAM configuration
    #[must_use]
    pub fn config(&self) -> &IamConfig {
        &self.config
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<Session, AuthError> {
        let url = self.config.token_url();
        debug!(%url, grant_type = params.first().map_or("", |(_, v)| *v), "requesting token");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.client_id, Some(self.config.client_secret()))
            .header("Api-Version", TOKEN_API_VERSION)
            .header(ACCEPT, "application/json")
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(rejected(status, &body));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Transport(format!("failed to decode token response: {e}")))?;

        Ok(token_response.into())
    }
}

/// Map a non-2xx token endpoint response into `InvalidCredentials`
fn rejected(status: StatusCode, body: &str) -> AuthError {
    let message = match serde_json::from_str::<TokenEndpointError>(body) {
        Ok(error) => error.to_string(),
        Err(_) if body.trim().is_empty() => {
            status.canonical_reason().unwrap_or("request rejected").to_string()
        }
        Err(_) => body.trim().to_string(),
    };

    AuthError::InvalidCredentials { status: status.as_u16(), message }
}

#[async_trait]
impl TokenEndpoint for IamTokenClient {
    async fn login(&self, identifier: &str, secret: &str) -> Result<Session, AuthError> {
        self.token_request(&[
            ("grant_type", "password"),
            ("username", identifier),
            ("password", secret),
        ])
        .await
    }

    async fn login_client_credentials(&self) -> Result<Session, AuthError> {
        self.token_request(&[("grant_type", "client_credentials")]).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError> {
        if refresh_token.is_empty() {
            return Err(AuthError::SessionExpired);
        }

        self.token_request(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)])
            .await
    }

    async fn introspect(&self, token: &str) -> Result<IntrospectionResult, AuthError> {
        let url = self.config.introspect_url();
        debug!(%url, "introspecting token");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.client_id, Some(self.config.client_secret()))
            .header("Api-Version", INTROSPECT_API_VERSION)
            .header(ACCEPT, "application/json")
            .form(&[("token", token)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(rejected(status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Transport(format!("failed to decode introspection: {e}")))
    }
}
