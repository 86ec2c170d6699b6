//! Session and token-endpoint types
//!
//! Defines the authenticated session held by the token manager, the wire
//! shapes returned by the IAM token and introspection endpoints, and the
//! configuration needed to reach them.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Default safety margin subtracted from `expires_at` before a session is
/// considered expired.
pub const DEFAULT_REFRESH_MARGIN_SECONDS: i64 = 5;

/// Authenticated session issued by the token endpoint
///
/// A session is immutable once created. Refresh produces a brand-new value
/// that replaces the old one as a whole.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token presented in the `Authorization` header
    pub access_token: String,

    /// Refresh token, absent for grants that do not issue one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Token type (always "Bearer" for the IAM endpoint)
    pub token_type: String,

    /// Granted scopes (space-separated)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Absolute expiration timestamp (UTC)
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Create a session that expires `expires_in` seconds from now
    ///
    /// Lifetimes beyond what `DateTime` can represent saturate.
    #[must_use]
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        scope: Option<String>,
        expires_in: i64,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            scope,
            expires_at: offset_from_now(expires_in).unwrap_or(if expires_in < 0 {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            }),
        }
    }

    /// Check if the access token is expired or will expire within
    /// `margin_seconds`
    #[must_use]
    pub fn is_expired(&self, margin_seconds: i64) -> bool {
        match offset_from_now(margin_seconds) {
            Some(deadline) => deadline >= self.expires_at,
            None => margin_seconds > 0,
        }
    }

    /// Seconds until `expires_at`; negative once expired
    #[must_use]
    pub fn seconds_until_expiry(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds()
    }

    /// Copy of this session with a different expiry
    #[must_use]
    pub fn with_expires_at(&self, expires_at: DateTime<Utc>) -> Self {
        Self { expires_at, ..self.clone() }
    }
}

fn offset_from_now(seconds: i64) -> Option<DateTime<Utc>> {
    TimeDelta::try_seconds(seconds).and_then(|delta| Utc::now().checked_add_signed(delta))
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[redacted]"))
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token endpoint response
///
/// Standard OAuth 2.0 token response (RFC 6749 §5.1) as returned by
/// `/authorize/oauth2/token`.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub scope: Option<String>,
    pub expires_in: i64,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl From<TokenResponse> for Session {
    fn from(response: TokenResponse) -> Self {
        let mut session = Self::new(
            response.access_token,
            response.refresh_token,
            response.scope,
            response.expires_in,
        );
        session.token_type = response.token_type;
        session
    }
}

/// OAuth error response from the token endpoint (RFC 6749 §5.2)
#[derive(Debug, Deserialize)]
pub struct TokenEndpointError {
    pub error: String,
    pub error_description: Option<String>,
}

impl fmt::Display for TokenEndpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(desc) => write!(f, "{}: {}", self.error, desc),
            None => write!(f, "{}", self.error),
        }
    }
}

/// Result of `/authorize/oauth2/introspect`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntrospectionResult {
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizations: Option<IntrospectOrganizations>,
}

impl IntrospectionResult {
    /// Permissions granted within `organization_id`, empty when unknown
    #[must_use]
    pub fn permissions_for(&self, organization_id: &str) -> &[String] {
        self.organizations
            .as_ref()
            .and_then(|orgs| {
                orgs.organization_list.iter().find(|org| org.organization_id == organization_id)
            })
            .map_or(&[], |org| org.permissions.as_slice())
    }
}

/// Organization section of an introspection result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectOrganizations {
    #[serde(default)]
    pub managing_organization: String,
    #[serde(default)]
    pub organization_list: Vec<IntrospectOrganization>,
}

/// A single organization the token has access to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectOrganization {
    pub organization_id: String,
    #[serde(default)]
    pub organization_name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Configuration for the IAM token endpoint
#[derive(Debug, Clone)]
pub struct IamConfig {
    /// Base URL of the IAM service (e.g. `https://iam-client-test.us-east.example.com`)
    pub iam_url: String,

    /// OAuth2 client id, sent as basic-auth user on token calls
    pub client_id: String,

    /// OAuth2 client secret, sent as basic-auth password on token calls
    pub client_secret: SecretString,

    /// Request timeout for token endpoint calls
    pub timeout: Duration,

    /// Accept invalid TLS certificates
    pub skip_verify: bool,

    /// Seconds before `expires_at` at which a session is refreshed
    pub refresh_margin_seconds: i64,
}

impl IamConfig {
    /// Create a configuration with default timeout and refresh margin
    #[must_use]
    pub fn new(iam_url: String, client_id: String, client_secret: SecretString) -> Self {
        Self {
            iam_url,
            client_id,
            client_secret,
            timeout: Duration::from_secs(30),
            skip_verify: false,
            refresh_margin_seconds: DEFAULT_REFRESH_MARGIN_SECONDS,
        }
    }

    /// `{iam_url}/authorize/oauth2/token`
    #[must_use]
    pub fn token_url(&self) -> String {
        format!("{}/authorize/oauth2/token", self.iam_url.trim_end_matches('/'))
    }

    /// `{iam_url}/authorize/oauth2/introspect`
    #[must_use]
    pub fn introspect_url(&self) -> String {
        format!("{}/authorize/oauth2/introspect", self.iam_url.trim_end_matches('/'))
    }

    pub(crate) fn client_secret(&self) -> &str {
        self.client_secret.expose_secret()
    }
}
