//! Shared-secret request signatures
//!
//! Mutating requests to HMAC-authenticated services carry
//! `base64(HMAC-SHA256(secret, body))` as the raw `Authorization` value.
//!
//! ```rust
//! use dipapi_common::crypto::RequestSigner;
//! use secrecy::SecretString;
//!
//! let signer = RequestSigner::new(SecretString::from("shared-secret"));
//! let signature = signer.sign(br#"{"name":"dip"}"#)?;
//! assert!(signer.verify(br#"{"name":"dip"}"#, &signature));
//! # Ok::<(), dipapi_common::crypto::SignatureError>(())
//! ```

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Errors raised while computing a signature
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("invalid HMAC key: {0}")]
    InvalidKey(String),
}

/// Compute `base64(HMAC-SHA256(secret, body))`
///
/// # Errors
/// Returns `SignatureError::InvalidKey` if the key is rejected by the MAC
pub fn compute_signature(secret: &[u8], body: &[u8]) -> Result<String, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
    mac.update(body);
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// HMAC-SHA256 signer holding a shared secret
#[derive(Clone)]
pub struct RequestSigner {
    secret: SecretString,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner").field("secret", &"[REDACTED]").finish()
    }
}

impl RequestSigner {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Sign the exact bytes that will be sent
    ///
    /// # Errors
    /// Returns `SignatureError::InvalidKey` if the key is rejected by the MAC
    pub fn sign(&self, body: &[u8]) -> Result<String, SignatureError> {
        compute_signature(self.secret.expose_secret().as_bytes(), body)
    }

    /// Check a base64 signature in constant time
    #[must_use]
    pub fn verify(&self, body: &[u8], signature: &str) -> bool {
        let Ok(expected) = BASE64.decode(signature.trim()) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
        else {
            return false;
        };
        mac.update(body);
        mac.verify_slice(&expected).is_ok()
    }
}
