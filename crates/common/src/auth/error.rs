//! Authentication error type

use thiserror::Error;

use crate::error::{ErrorClassification, ErrorSeverity};

/// Errors raised on the bearer-token path
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No session has been established yet
    #[error("not authenticated: login required")]
    NotAuthenticated,

    /// The session could not be refreshed and was dropped
    #[error("session expired: login required")]
    SessionExpired,

    /// The token endpoint rejected the credentials or refresh token
    #[error("invalid credentials ({status}): {message}")]
    InvalidCredentials { status: u16, message: String },

    /// Network failure or undecodable token endpoint response
    #[error("token endpoint request failed: {0}")]
    Transport(String),

    /// Missing or malformed token endpoint configuration
    #[error("auth configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl ErrorClassification for AuthError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotAuthenticated | Self::SessionExpired => ErrorSeverity::Warning,
            Self::InvalidCredentials { .. } | Self::Transport(_) | Self::Config(_) => {
                ErrorSeverity::Error
            }
        }
    }
}
