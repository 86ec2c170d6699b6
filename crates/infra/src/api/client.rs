//! API client shared by per-service clients
//!
//! [`ApiClient`] owns the base URL, signing strategy and transport chain for
//! one service. Service clients hold an `Arc<ApiClient>` and drive it through
//! [`ApiClient::request`], [`ApiClient::build`] and [`ApiClient::execute`].

use std::fmt;
use std::fs::OpenOptions;
use std::sync::Arc;

use dipapi_common::auth::AccessTokenSource;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Request};
use tracing::{debug, info, instrument};
use url::Url;

use super::auth::SigningContext;
use super::errors::ApiError;
use super::request::{build_request, BuildContext, RequestSpec, LIBRARY_VERSION};
use super::response::{check_response, Decode};
use crate::config::{ClientConfig, ServiceResolver};
use crate::http::{compose, debug_sink, DebugSink, ReqwestTransport, ResponseEnvelope, Transport};

/// Request pipeline for one service
pub struct ApiClient {
    service: String,
    base_url: Url,
    transport: Arc<dyn Transport>,
    signing: SigningContext,
    user_agent: String,
    api_version: Option<String>,
    accept: String,
    retry_count: u32,
}

impl ApiClient {
    /// Create a builder for fluent configuration
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Start describing a call relative to the base URL
    pub fn request(&self, method: Method, path: impl Into<String>) -> RequestSpec {
        RequestSpec::new(method, path)
    }

    /// Assemble and sign a request. Nothing is sent.
    ///
    /// # Errors
    /// `Build` for encoding, signing input or hook failures, `Signing` when no
    /// bearer token can be obtained
    pub async fn build(&self, spec: RequestSpec) -> Result<Request, ApiError> {
        let ctx = BuildContext {
            base_url: &self.base_url,
            signing: &self.signing,
            user_agent: &self.user_agent,
            api_version: self.api_version.as_deref(),
            accept: &self.accept,
        };
        build_request(&ctx, spec).await
    }

    /// Send a built request and decode the response with `mode`.
    ///
    /// The envelope is returned alongside the decoded value so callers can
    /// read headers such as `Location`.
    ///
    /// # Errors
    /// `Transport` when no response arrived, `EmptyResult` for a 404 in a
    /// search mode, `Status` for any other non-success status, `Decode` when
    /// the body does not fit `mode`
    #[instrument(
        skip(self, request, mode),
        fields(service = %self.service, method = %request.method(), url = %request.url())
    )]
    pub async fn execute<D: Decode>(
        &self,
        request: Request,
        mode: D,
    ) -> Result<(D::Output, ResponseEnvelope), ApiError> {
        let envelope = self.transport.round_trip(request).await?;
        debug!(status = %envelope.status, bytes = envelope.body.len(), "response received");

        check_response(&envelope, D::IS_SEARCH)?;
        let output = mode.decode(&envelope)?;
        Ok((output, envelope))
    }

    /// [`build`](Self::build) followed by [`execute`](Self::execute)
    ///
    /// # Errors
    /// Any error of either step
    pub async fn send<D: Decode>(
        &self,
        spec: RequestSpec,
        mode: D,
    ) -> Result<(D::Output, ResponseEnvelope), ApiError> {
        let request = self.build(spec).await?;
        self.execute(request, mode).await
    }

    /// Current bearer token, refreshed by the token source when needed
    ///
    /// # Errors
    /// `Config` for HMAC-signed clients, `Auth` when the source fails
    pub async fn current_token(&self) -> Result<String, ApiError> {
        match &self.signing {
            SigningContext::Bearer(source) => Ok(source.access_token().await?),
            SigningContext::Hmac(_) => Err(self.no_token_source()),
        }
    }

    /// Force the token source to refresh its session
    ///
    /// # Errors
    /// `Config` for HMAC-signed clients, `Auth` when the refresh fails
    pub async fn token_refresh(&self) -> Result<(), ApiError> {
        match &self.signing {
            SigningContext::Bearer(source) => Ok(source.force_refresh().await?),
            SigningContext::Hmac(_) => Err(self.no_token_source()),
        }
    }

    /// Retry count configured for this service.
    ///
    /// The pipeline itself never retries; service clients decide.
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    fn no_token_source(&self) -> ApiError {
        ApiError::Config(format!("{}: client signs with HMAC and has no token source", self.service))
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("service", &self.service)
            .field("base_url", &self.base_url.as_str())
            .field("signing", &self.signing)
            .field("api_version", &self.api_version)
            .field("retry_count", &self.retry_count)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ApiClient`]
///
/// Exactly one signing strategy must be configured: a token source, or an
/// HMAC secret in the [`ClientConfig`].
#[derive(Default)]
pub struct ApiClientBuilder {
    config: Option<ClientConfig>,
    token_source: Option<Arc<dyn AccessTokenSource>>,
    resolver: Option<Arc<dyn ServiceResolver>>,
    debug_sink: Option<DebugSink>,
    transport: Option<Arc<dyn Transport>>,
}

impl ApiClientBuilder {
    /// Set the client configuration
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sign with bearer tokens from `source`
    pub fn token_source(mut self, source: Arc<dyn AccessTokenSource>) -> Self {
        self.token_source = Some(source);
        self
    }

    /// Resolve region/environment to a base URL
    pub fn resolver(mut self, resolver: Arc<dyn ServiceResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Dump requests and responses to `sink`; overrides `debug_log`
    pub fn debug_sink(mut self, sink: DebugSink) -> Self {
        self.debug_sink = Some(sink);
        self
    }

    /// Replace the reqwest transport at the bottom of the chain
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the API client
    ///
    /// # Errors
    ///
    /// `ApiError::Config` if the configuration is missing or invalid, the
    /// signing strategy is ambiguous, the base URL cannot be resolved or
    /// parsed, the debug log cannot be opened, or the HTTP client fails to
    /// initialize
    pub fn build(self) -> Result<ApiClient, ApiError> {
        let config =
            self.config.ok_or_else(|| ApiError::Config("client configuration not set".to_string()))?;
        config.validate()?;

        let signing = match (self.token_source, config.hmac_secret.clone()) {
            (Some(source), None) => SigningContext::bearer(source),
            (None, Some(secret)) => SigningContext::hmac(secret),
            (Some(_), Some(_)) => {
                return Err(ApiError::Config(format!(
                    "{}: token source and HMAC secret are mutually exclusive",
                    config.service
                )))
            }
            (None, None) => {
                return Err(ApiError::Config(format!(
                    "{}: either a token source or an HMAC secret is required",
                    config.service
                )))
            }
        };

        let base_url = parse_base_url(&config.resolve_base_url(self.resolver.as_deref())?)?;
        let headers = static_headers(&config)?;

        let sink = match (self.debug_sink, &config.debug_log) {
            (Some(sink), _) => Some(sink),
            (None, Some(path)) => {
                let file = OpenOptions::new().create(true).append(true).open(path).map_err(|e| {
                    ApiError::Config(format!("failed to open debug log {}: {e}", path.display()))
                })?;
                Some(debug_sink(file))
            }
            (None, None) => None,
        };

        let base: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(
                ReqwestTransport::builder()
                    .timeout(config.timeout())
                    .accept_invalid_certs(config.skip_verify)
                    .build()
                    .map_err(|e| ApiError::Config(format!("failed to build HTTP client: {e}")))?,
            ),
        };

        info!(service = %config.service, base_url = %base_url, "API client ready");

        Ok(ApiClient {
            user_agent: format!("dip-api/{}/{LIBRARY_VERSION}", config.service),
            transport: compose(base, headers, sink),
            base_url,
            signing,
            api_version: config.api_version,
            accept: config.accept,
            retry_count: config.retry_count,
            service: config.service,
        })
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ApiError> {
    let url =
        Url::parse(raw).map_err(|e| ApiError::Config(format!("invalid base URL {raw}: {e}")))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ApiError::Config(format!("invalid base URL {raw}: not an HTTP(S) URL")));
    }
    Ok(url)
}

fn static_headers(config: &ClientConfig) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ApiError::Config(format!("invalid header name {name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ApiError::Config(format!("invalid value for header {name}: {e}")))?;
        headers.insert(name, value);
    }
    Ok(headers)
}
