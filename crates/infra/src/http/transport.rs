use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, LOCATION, TRANSFER_ENCODING};
use reqwest::{Client as ReqwestClient, Method, Request, StatusCode};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Fully buffered response as seen by the decoding pipeline.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    pub method: Method,
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ResponseEnvelope {
    /// Numeric status code.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// `Location` header, typically set on `201 Created` with an empty body.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|value| value.to_str().ok())
    }

    /// Body as UTF-8 text, lossy.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// `true` if the body holds nothing but whitespace.
    #[must_use]
    pub fn is_body_empty(&self) -> bool {
        self.body.iter().all(u8::is_ascii_whitespace)
    }
}

/// Failures below the decoding pipeline.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No response was received.
    #[error("{method} {url}: request failed: {source}")]
    Dispatch {
        method: Method,
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    /// Headers arrived but the body could not be read.
    #[error("{} {}: {}: failed to read response body: {source}", .partial.method, .partial.url, .partial.status)]
    Body {
        #[source]
        source: reqwest::Error,
        partial: Box<ResponseEnvelope>,
    },
}

impl TransportError {
    /// Whatever part of the response arrived before the failure.
    #[must_use]
    pub fn envelope(&self) -> Option<&ResponseEnvelope> {
        match self {
            Self::Dispatch { .. } => None,
            Self::Body { partial, .. } => Some(partial),
        }
    }

    /// Connection, timeout and body failures can be retried as-is.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Dispatch { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            Self::Body { .. } => true,
        }
    }
}

/// One request in, one buffered response out.
///
/// Implemented by [`ReqwestTransport`] and by the wrappers in
/// [`crate::http::wrappers`], which decorate another `Transport`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(&self, request: Request) -> Result<ResponseEnvelope, TransportError>;
}

/// Transport backed by a `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: ReqwestClient,
}

impl ReqwestTransport {
    /// Start building a new transport.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    /// Wrap an existing client.
    #[must_use]
    pub fn from_client(client: ReqwestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn round_trip(&self, request: Request) -> Result<ResponseEnvelope, TransportError> {
        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, %url, "sending HTTP request");

        let response = self.client.execute(request).await.map_err(|source| {
            debug!(%method, %url, error = %source, "HTTP request failed");
            TransportError::Dispatch { method: method.clone(), url: url.clone(), source }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        debug!(%method, %url, %status, "received HTTP response");

        let mut envelope = ResponseEnvelope { method, url, status, headers, body: Vec::new() };
        match response.bytes().await {
            Ok(bytes) => {
                envelope.body = bytes.to_vec();
                Ok(envelope)
            }
            Err(source) if declares_no_body(status, &envelope.headers) => {
                debug!(%status, error = %source, "empty success body ended early");
                Ok(envelope)
            }
            Err(source) => Err(TransportError::Body { source, partial: Box::new(envelope) }),
        }
    }
}

/// A success response that frames no body: 204/304 or `Content-Length: 0`,
/// never chunked.
fn declares_no_body(status: StatusCode, headers: &HeaderMap) -> bool {
    if !status.is_success() && status != StatusCode::NOT_MODIFIED {
        return false;
    }
    if headers.contains_key(TRANSFER_ENCODING) {
        return false;
    }
    if matches!(status, StatusCode::NO_CONTENT | StatusCode::NOT_MODIFIED) {
        return true;
    }
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|length| length.trim() == "0")
}

/// Builder for [`ReqwestTransport`].
#[derive(Debug)]
pub struct ReqwestTransportBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    default_headers: Option<HeaderMap>,
    accept_invalid_certs: bool,
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: None,
            default_headers: None,
            accept_invalid_certs: false,
        }
    }
}

impl ReqwestTransportBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    /// Skip TLS certificate verification.
    pub fn accept_invalid_certs(mut self, enabled: bool) -> Self {
        self.accept_invalid_certs = enabled;
        self
    }

    pub fn build(self) -> Result<ReqwestTransport, reqwest::Error> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout);

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        if self.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(ReqwestTransport { client: builder.build()? })
    }
}
