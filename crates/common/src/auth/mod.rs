//! Bearer-token authentication
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │   TokenManager   │  Session lifecycle + single-flight refresh
//! └────────┬─────────┘
//!          │
//!          └──► TokenEndpoint      (trait)
//!                    │
//!                    └──► IamTokenClient   (HTTP, basic-auth client credentials)
//! ```
//!
//! Request builders consume tokens through [`AccessTokenSource`], which
//! `TokenManager` implements.
//!
//! # Usage Example
//!
//! ```no_run
//! use dipapi_common::auth::{IamConfig, TokenManager};
//! use secrecy::SecretString;
//!
//! # async fn example() -> Result<(), dipapi_common::auth::AuthError> {
//! let config = IamConfig::new(
//!     "https://iam-client-test.us-east.example.com".to_string(),
//!     "client_id".to_string(),
//!     SecretString::from("client_secret"),
//! );
//! let manager = TokenManager::from_config(config)?;
//!
//! manager.login("user@example.com", "password").await?;
//! let token = manager.current_token().await?;
//! println!("Bearer {token}");
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - **[`types`]**: `Session`, token endpoint wire types, `IamConfig`
//! - **[`error`]**: `AuthError`
//! - **[`client`]**: HTTP client for the token and introspection endpoints
//! - **[`token_manager`]**: session lifecycle with lazy refresh
//! - **[`traits`]**: seams for mocking the endpoint and the token source

pub mod client;
pub mod error;
pub mod token_manager;
pub mod traits;
pub mod types;

pub use client::{IamTokenClient, INTROSPECT_API_VERSION, TOKEN_API_VERSION};
pub use error::AuthError;
pub use token_manager::{SessionStatus, TokenManager};
pub use traits::{AccessTokenSource, TokenEndpoint};
pub use types::{
    IamConfig, IntrospectOrganization, IntrospectOrganizations, IntrospectionResult, Session,
    TokenEndpointError, TokenResponse, DEFAULT_REFRESH_MARGIN_SECONDS,
};
