//! API-specific error types
//!
//! Provides error classification for API operations with retry metadata.

use dipapi_common::auth::AuthError;
use dipapi_common::error::{ErrorClassification, ErrorSeverity};
use reqwest::{Method, StatusCode};
use thiserror::Error;

use super::response::OperationOutcome;
use crate::http::{ResponseEnvelope, TransportError};

/// Categories of API errors for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// Authentication errors (401, 403, token failures)
    Authentication,
    /// Rate limiting errors (429) - retry with backoff
    RateLimit,
    /// Server errors (5xx) - retryable
    Server,
    /// Client errors (4xx except auth, undecodable bodies) - non-retryable
    Client,
    /// Network/connection errors - retryable
    Network,
    /// Configuration and request-construction errors - non-retryable
    Config,
    /// Search or list returned nothing
    Empty,
}

/// API operation errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid client configuration, raised at construction
    #[error("configuration error: {0}")]
    Config(String),

    /// Request could not be assembled; nothing was sent
    #[error("{method} {url}: failed to build request: {message}")]
    Build { method: Method, url: String, message: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A search or list endpoint answered 404
    #[error("{} {}: empty result", .envelope.method, .envelope.url)]
    EmptyResult { envelope: Box<ResponseEnvelope> },

    /// Status outside the success set
    #[error("{message}")]
    Status {
        status: StatusCode,
        message: String,
        outcome: Option<OperationOutcome>,
        envelope: Box<ResponseEnvelope>,
    },

    /// The response body did not match the requested decode mode
    #[error("{} {}: {}: failed to decode response: {message}", .envelope.method, .envelope.url, .envelope.status)]
    Decode { message: String, envelope: Box<ResponseEnvelope> },

    /// No bearer token could be obtained for the request; nothing was sent
    #[error("{method} {url}: failed to sign request: {source}")]
    Signing {
        method: Method,
        url: String,
        #[source]
        source: AuthError,
    },

    /// Token operations outside a request
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ApiError {
    pub(crate) fn build(method: &Method, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Build { method: method.clone(), url: url.into(), message: message.into() }
    }

    pub(crate) fn decode(envelope: &ResponseEnvelope, message: impl Into<String>) -> Self {
        Self::Decode { message: message.into(), envelope: Box::new(envelope.clone()) }
    }

    pub(crate) fn signing(method: &Method, url: impl Into<String>, source: AuthError) -> Self {
        Self::Signing { method: method.clone(), url: url.into(), source }
    }

    /// The token failure behind `Auth` or `Signing`
    pub fn auth_error(&self) -> Option<&AuthError> {
        match self {
            Self::Auth(err) | Self::Signing { source: err, .. } => Some(err),
            _ => None,
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Config(_) | Self::Build { .. } => ApiErrorCategory::Config,
            Self::Transport(_) => ApiErrorCategory::Network,
            Self::EmptyResult { .. } => ApiErrorCategory::Empty,
            Self::Status { status, .. } => {
                if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN {
                    ApiErrorCategory::Authentication
                } else if *status == StatusCode::TOO_MANY_REQUESTS {
                    ApiErrorCategory::RateLimit
                } else if status.is_server_error() {
                    ApiErrorCategory::Server
                } else {
                    ApiErrorCategory::Client
                }
            }
            Self::Decode { .. } => ApiErrorCategory::Client,
            Self::Auth(err) | Self::Signing { source: err, .. } => match err {
                AuthError::Transport(_) => ApiErrorCategory::Network,
                AuthError::Config(_) => ApiErrorCategory::Config,
                _ => ApiErrorCategory::Authentication,
            },
        }
    }

    /// Get suggested retry delay in seconds
    pub fn retry_delay_secs(&self) -> u64 {
        if !self.is_retryable() {
            return 0;
        }
        match self.category() {
            ApiErrorCategory::RateLimit => 60,
            ApiErrorCategory::Server => 10,
            _ => 5,
        }
    }

    /// HTTP status, when a response was received
    pub fn status(&self) -> Option<StatusCode> {
        self.envelope().map(|envelope| envelope.status)
    }

    /// The response as received, when there was one
    pub fn envelope(&self) -> Option<&ResponseEnvelope> {
        match self {
            Self::Transport(err) => err.envelope(),
            Self::EmptyResult { envelope }
            | Self::Status { envelope, .. }
            | Self::Decode { envelope, .. } => Some(envelope),
            Self::Config(_) | Self::Build { .. } | Self::Signing { .. } | Self::Auth(_) => None,
        }
    }
}

impl ErrorClassification for ApiError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_retryable(),
            Self::Auth(err) | Self::Signing { source: err, .. } => err.is_retryable(),
            Self::Status { .. } => matches!(
                self.category(),
                ApiErrorCategory::RateLimit | ApiErrorCategory::Server
            ),
            Self::Config(_) | Self::Build { .. } | Self::EmptyResult { .. } | Self::Decode { .. } => {
                false
            }
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Config(_) | Self::Build { .. } => ErrorSeverity::Critical,
            Self::EmptyResult { .. } => ErrorSeverity::Info,
            Self::Auth(err) | Self::Signing { source: err, .. } => err.severity(),
            Self::Status { .. } => match self.category() {
                ApiErrorCategory::Authentication | ApiErrorCategory::RateLimit => {
                    ErrorSeverity::Warning
                }
                _ => ErrorSeverity::Error,
            },
            Self::Transport(_) | Self::Decode { .. } => ErrorSeverity::Error,
        }
    }
}
