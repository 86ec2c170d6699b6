//! # dip-api infrastructure
//!
//! HTTP request pipeline for dip-api service clients.
//!
//! This crate contains:
//! - [`api`]: request builder, signing, response decoding, [`ApiClient`]
//! - [`http`]: the transport seam and its header/logging decorators
//! - [`config`]: client configuration and its env/file loader
//!
//! ## Architecture
//! - Token lifecycle lives in `dipapi-common`; this crate only consumes an
//!   [`AccessTokenSource`](dipapi_common::AccessTokenSource)
//! - Contains all network I/O

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod api;
pub mod config;
pub mod http;

// Re-export commonly used items
pub use api::{ApiClient, ApiClientBuilder, ApiError, ApiErrorCategory, RequestSpec};
pub use config::{ClientConfig, ServiceResolver, StaticServiceResolver};
pub use http::{ResponseEnvelope, Transport, TransportError};
