//! Transport decorators
//!
//! The composition order is fixed, innermost first:
//! `LoggingTransport(HeaderTransport(ReqwestTransport))`. The logger sits
//! outside header injection, so dumps show the request as the pipeline built
//! it, without the static header set.

mod header;
mod logging;

pub use header::HeaderTransport;
pub use logging::{debug_sink, redact_body, DebugSink, LoggingTransport};
