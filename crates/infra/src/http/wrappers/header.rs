use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Request;

use crate::http::transport::{ResponseEnvelope, Transport, TransportError};

/// Overwrites a fixed header set on every request before forwarding it.
///
/// Every name present in the set replaces all values the request already
/// carries under that name.
pub struct HeaderTransport {
    next: Arc<dyn Transport>,
    headers: HeaderMap,
}

impl HeaderTransport {
    pub fn new(next: Arc<dyn Transport>, headers: HeaderMap) -> Self {
        Self { next, headers }
    }
}

#[async_trait]
impl Transport for HeaderTransport {
    async fn round_trip(&self, mut request: Request) -> Result<ResponseEnvelope, TransportError> {
        let target = request.headers_mut();
        for name in self.headers.keys() {
            target.remove(name);
            for value in self.headers.get_all(name) {
                target.append(name.clone(), value.clone());
            }
        }
        self.next.round_trip(request).await
    }
}
