//! Testing utilities and helpers
//!
//! - **[`mocks`]**: scripted [`MockTokenEndpoint`] and a fixed-token
//!   [`StaticTokenSource`]
//! - [`init_test_tracing`]: route `tracing` output to the test harness
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dipapi_common::auth::TokenManager;
//! use dipapi_common::testing::MockTokenEndpoint;
//!
//! # async fn example() -> Result<(), dipapi_common::auth::AuthError> {
//! let manager = TokenManager::new(MockTokenEndpoint::new());
//! manager.login("user", "pass").await?;
//! assert_eq!(manager.current_token().await?, MockTokenEndpoint::LOGIN_TOKEN);
//! # Ok(())
//! # }
//! ```

pub mod mocks;

use std::sync::Once;

use tracing_subscriber::EnvFilter;

pub use mocks::{MockTokenEndpoint, StaticTokenSource};

/// Install a test-friendly `tracing` subscriber once per process
///
/// Honors `RUST_LOG`, defaulting to `debug` for the dip-api crates.
pub fn init_test_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("dipapi_common=debug,dipapi_infra=debug"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
    });
}
