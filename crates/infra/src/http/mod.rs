//! HTTP transport and its decorators
//!
//! [`Transport`] is the seam between the request pipeline and the network.
//! The chain is assembled once by [`compose`] and is immutable afterwards.

pub mod transport;
pub mod wrappers;

use std::sync::Arc;

use reqwest::header::HeaderMap;

pub use transport::{
    ReqwestTransport, ReqwestTransportBuilder, ResponseEnvelope, Transport, TransportError,
};
pub use wrappers::{debug_sink, DebugSink, HeaderTransport, LoggingTransport};

/// Wrap `base` with static header injection and debug logging.
///
/// Empty header sets and a missing sink skip the corresponding layer.
pub fn compose(
    base: Arc<dyn Transport>,
    headers: HeaderMap,
    sink: Option<DebugSink>,
) -> Arc<dyn Transport> {
    let mut transport = base;
    if !headers.is_empty() {
        transport = Arc::new(HeaderTransport::new(transport, headers));
    }
    if let Some(sink) = sink {
        transport = Arc::new(LoggingTransport::new(transport, sink));
    }
    transport
}
