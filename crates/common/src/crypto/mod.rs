//! Cryptographic primitives for request signing.

pub mod signature;

pub use signature::{compute_signature, RequestSigner, SignatureError};
