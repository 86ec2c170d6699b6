//! Request construction
//!
//! A [`RequestSpec`] collects method, path, query options, body and hooks.
//! Encoding failures are recorded and surface as `ApiError::Build` when the
//! spec is built, so the builder methods stay chainable.

use std::fmt;
use std::sync::Arc;

use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, Request};
use serde::Serialize;
use url::Url;

use super::auth::{is_mutating, SigningContext};
use super::errors::ApiError;

/// Version of this library, reported in the `User-Agent`.
pub const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default `Accept` value.
pub const DEFAULT_ACCEPT: &str = "application/json";

/// Caller hook run on the finished request, in registration order.
pub type RequestHook = Arc<dyn Fn(&mut Request) -> Result<(), String> + Send + Sync>;

/// Description of a single API call.
#[derive(Clone)]
pub struct RequestSpec {
    method: Method,
    path: String,
    query: Option<String>,
    body: Option<Vec<u8>>,
    api_version: Option<String>,
    accept: Option<String>,
    hooks: Vec<RequestHook>,
    error: Option<String>,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            body: None,
            api_version: None,
            accept: None,
            hooks: Vec::new(),
            error: None,
        }
    }

    /// Encode typed query options; `None` fields are omitted.
    ///
    /// Spaces are encoded as `%20`.
    pub fn query<Q: Serialize + ?Sized>(mut self, options: &Q) -> Self {
        match encode_query(options) {
            Ok(encoded) => self.query = (!encoded.is_empty()).then_some(encoded),
            Err(message) => self.record(message),
        }
        self
    }

    /// JSON-encode a body. Only attached for POST and PUT.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Self {
        match serde_json::to_vec(body) {
            Ok(bytes) => self.body = Some(bytes),
            Err(e) => self.record(format!("failed to encode body: {e}")),
        }
        self
    }

    /// Override the client's `Api-Version` for this request.
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Override the client's `Accept` for this request.
    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    /// Register a hook run after all standard headers are set.
    pub fn hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Request) -> Result<(), String> + Send + Sync + 'static,
    {
        self.hooks.push(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    fn record(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(message);
        }
    }
}

impl fmt::Debug for RequestSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSpec")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("body_len", &self.body.as_ref().map(Vec::len))
            .field("api_version", &self.api_version)
            .field("accept", &self.accept)
            .field("hooks", &self.hooks.len())
            .field("error", &self.error)
            .finish()
    }
}

/// Client-wide inputs to [`build_request`].
pub(crate) struct BuildContext<'a> {
    pub base_url: &'a Url,
    pub signing: &'a SigningContext,
    pub user_agent: &'a str,
    pub api_version: Option<&'a str>,
    pub accept: &'a str,
}

/// Assemble a signed request from a spec. Nothing is sent.
pub(crate) async fn build_request(
    ctx: &BuildContext<'_>,
    spec: RequestSpec,
) -> Result<Request, ApiError> {
    let RequestSpec { method, path, query, body, api_version, accept, hooks, error } = spec;

    let mut url = join_url(ctx.base_url, &path)
        .map_err(|e| ApiError::build(&method, format!("{}{path}", ctx.base_url), e))?;
    if let Some(message) = error {
        return Err(ApiError::build(&method, url.as_str(), message));
    }

    let body = body.filter(|_| is_mutating(&method));
    if body.is_some() {
        url.set_query(None);
    } else if let Some(query) = query.as_deref() {
        url.set_query(Some(query));
    }

    let url_text = url.to_string();
    let authorization = ctx.signing.authorization(&method, &url_text, body.as_deref()).await?;
    let accept =
        header_value(&method, &url_text, "Accept", accept.as_deref().unwrap_or(ctx.accept))?;
    let user_agent = header_value(&method, &url_text, "User-Agent", ctx.user_agent)?;
    let api_version = api_version
        .as_deref()
        .or(ctx.api_version)
        .map(|version| header_value(&method, &url_text, "Api-Version", version))
        .transpose()?;

    let mut request = Request::new(method.clone(), url);
    let headers = request.headers_mut();
    if let Some(value) = authorization {
        headers.insert(AUTHORIZATION, value);
    }
    if body.is_some() {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    headers.insert(ACCEPT, accept);
    headers.insert(USER_AGENT, user_agent);
    if let Some(value) = api_version {
        headers.insert("Api-Version", value);
    }
    if let Some(body) = body {
        *request.body_mut() = Some(body.into());
    }

    for hook in &hooks {
        hook(&mut request).map_err(|message| {
            ApiError::build(&method, &url_text, format!("request hook failed: {message}"))
        })?;
    }

    Ok(request)
}

fn header_value(
    method: &Method,
    url: &str,
    name: &str,
    value: &str,
) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(value)
        .map_err(|e| ApiError::build(method, url, format!("invalid {name} header: {e}")))
}

/// Append `path` to `base`, keeping the base path as an opaque prefix.
///
/// Pre-encoded segments in either part are left as they are.
pub fn join_url(base: &Url, path: &str) -> Result<Url, String> {
    let mut prefix = base.clone();
    prefix.set_query(None);
    prefix.set_fragment(None);
    let joined = format!(
        "{}/{}",
        prefix.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| format!("invalid request URL {joined}: {e}"))
}

/// Form-encode query options with `%20` for spaces.
pub fn encode_query<Q: Serialize + ?Sized>(options: &Q) -> Result<String, String> {
    serde_html_form::to_string(options)
        .map(|encoded| encoded.replace('+', "%20"))
        .map_err(|e| format!("failed to encode query: {e}"))
}
