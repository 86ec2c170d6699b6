//! Authentication and signing primitives shared by the dip-api crates.
//!
//! - [`auth`]: session lifecycle, token endpoint client, token sources
//! - [`crypto`]: HMAC request signatures
//! - [`error`]: retry/severity classification shared by every error type
//! - `testing` (feature `test-utils`): scripted mocks for downstream tests

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod auth;
pub mod crypto;
pub mod error;

#[cfg(any(feature = "test-utils", test))]
pub mod testing;

pub use auth::{AccessTokenSource, AuthError, Session, TokenEndpoint, TokenManager};
pub use crypto::{compute_signature, RequestSigner, SignatureError};
pub use error::{ErrorClassification, ErrorSeverity};
