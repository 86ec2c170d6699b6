//! Request pipeline shared by every service client
//!
//! A call flows through four stages:
//!
//! 1. [`RequestSpec`]: method, path, query options, body and hooks
//! 2. [`ApiClient::build`]: URL join, encoding, signing, standard headers
//! 3. [`ApiClient::execute`]: dispatch over the transport chain
//! 4. [`check_response`] and a [`Decode`] mode: success set, error bodies,
//!    Bundle unwrapping
//!
//! Service clients hold an `Arc<ApiClient>` and add their own endpoints on
//! top. The pipeline performs no retries; [`ApiClient::retry_count`] is
//! advisory.

pub mod auth;
pub mod client;
pub mod errors;
pub mod request;
pub mod response;

pub use auth::SigningContext;
pub use client::{ApiClient, ApiClientBuilder};
pub use errors::{ApiError, ApiErrorCategory};
pub use request::{encode_query, join_url, RequestHook, RequestSpec, DEFAULT_ACCEPT, LIBRARY_VERSION};
pub use response::{
    check_response, CopyRaw, Decode, DecodeBundleOf, DecodeInto, Discard, OperationOutcome,
    OutcomeDetails, OutcomeIssue, Resources, SUCCESS_STATUSES,
};
