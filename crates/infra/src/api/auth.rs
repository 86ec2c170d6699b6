//! Request signing strategies
//!
//! A client signs every request with exactly one strategy, fixed at
//! construction:
//!
//! - **Bearer**: `Authorization: Bearer <token>` from an
//!   [`AccessTokenSource`], refreshed on demand by the source
//! - **HMAC**: `Authorization: base64(HMAC-SHA256(secret, body))` on
//!   POST/PUT requests that carry a body, with no scheme keyword

use std::fmt;
use std::sync::Arc;

use dipapi_common::auth::AccessTokenSource;
use dipapi_common::crypto::RequestSigner;
use reqwest::header::HeaderValue;
use reqwest::Method;
use secrecy::SecretString;

use super::errors::ApiError;

/// Signing strategy chosen once per client.
#[derive(Clone)]
pub enum SigningContext {
    Bearer(Arc<dyn AccessTokenSource>),
    Hmac(RequestSigner),
}

impl SigningContext {
    /// Bearer signing backed by `source`
    pub fn bearer(source: Arc<dyn AccessTokenSource>) -> Self {
        Self::Bearer(source)
    }

    /// HMAC signing with a shared secret
    pub fn hmac(secret: SecretString) -> Self {
        Self::Hmac(RequestSigner::new(secret))
    }

    /// Compute the `Authorization` value for a request, if one applies.
    ///
    /// `body` must be the exact bytes that will be sent.
    ///
    /// # Errors
    /// `Signing` when no bearer token can be obtained, `Build` when the HMAC
    /// signature cannot be computed
    pub async fn authorization(
        &self,
        method: &Method,
        url: &str,
        body: Option<&[u8]>,
    ) -> Result<Option<HeaderValue>, ApiError> {
        let value = match self {
            Self::Bearer(source) => {
                let token = source
                    .access_token()
                    .await
                    .map_err(|e| ApiError::signing(method, url, e))?;
                format!("Bearer {token}")
            }
            Self::Hmac(signer) => {
                let Some(body) = body.filter(|_| is_mutating(method)) else {
                    return Ok(None);
                };
                signer.sign(body).map_err(|e| ApiError::build(method, url, e.to_string()))?
            }
        };

        let mut header = HeaderValue::from_str(&value)
            .map_err(|e| ApiError::build(method, url, format!("invalid Authorization value: {e}")))?;
        header.set_sensitive(true);
        Ok(Some(header))
    }
}

impl fmt::Debug for SigningContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("SigningContext::Bearer"),
            Self::Hmac(_) => f.write_str("SigningContext::Hmac"),
        }
    }
}

/// POST and PUT are the only methods that carry a JSON body.
pub(crate) fn is_mutating(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT
}
