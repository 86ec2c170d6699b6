//! Client configuration
//!
//! [`ClientConfig`] is plain data, loadable from the environment or a file
//! (see [`super::loader`]). Runtime collaborators such as token sources and
//! debug sinks are supplied to [`crate::api::ApiClientBuilder`] instead.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::api::request::DEFAULT_ACCEPT;
use crate::api::ApiError;

/// Maps a service name plus region/environment to a base URL.
///
/// Lookup tables are maintained outside this crate; clients only depend on
/// this boundary.
pub trait ServiceResolver: Send + Sync {
    fn resolve(&self, service: &str, region: &str, environment: &str) -> Option<String>;
}

/// In-memory [`ServiceResolver`].
#[derive(Debug, Clone, Default)]
pub struct StaticServiceResolver {
    entries: BTreeMap<(String, String, String), String>,
}

impl StaticServiceResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, service: &str, region: &str, environment: &str, url: &str) -> Self {
        self.entries.insert(
            (service.to_string(), region.to_string(), environment.to_string()),
            url.to_string(),
        );
        self
    }
}

impl ServiceResolver for StaticServiceResolver {
    fn resolve(&self, service: &str, region: &str, environment: &str) -> Option<String> {
        self.entries
            .get(&(service.to_string(), region.to_string(), environment.to_string()))
            .cloned()
    }
}

/// Configuration for one service client.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Service name, used in the `User-Agent` and for URL resolution
    pub service: String,

    /// Explicit base URL; takes precedence over region/environment
    pub base_url: Option<String>,

    pub region: Option<String>,

    pub environment: Option<String>,

    /// Default `Api-Version` header, omitted when unset
    pub api_version: Option<String>,

    /// Default `Accept` header
    pub accept: String,

    /// Shared secret for HMAC signing; mutually exclusive with a token source
    #[serde(deserialize_with = "optional_secret")]
    pub hmac_secret: Option<SecretString>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Accept invalid TLS certificates
    pub skip_verify: bool,

    /// Retry count exposed to service clients; the pipeline never retries
    pub retry_count: u32,

    /// Append request/response dumps to this file
    pub debug_log: Option<PathBuf>,

    /// Headers injected into every request
    pub headers: BTreeMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            service: String::new(),
            base_url: None,
            region: None,
            environment: None,
            api_version: None,
            accept: DEFAULT_ACCEPT.to_string(),
            hmac_secret: None,
            timeout_secs: 30,
            skip_verify: false,
            retry_count: 0,
            debug_log: None,
            headers: BTreeMap::new(),
        }
    }
}

impl ClientConfig {
    /// Configuration for `service` with every other field defaulted
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self { service: service.into(), ..Self::default() }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>, environment: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self.environment = Some(environment.into());
        self
    }

    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    #[must_use]
    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = accept.into();
        self
    }

    #[must_use]
    pub fn with_hmac_secret(mut self, secret: SecretString) -> Self {
        self.hmac_secret = Some(secret);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    #[must_use]
    pub fn with_skip_verify(mut self, skip: bool) -> Self {
        self.skip_verify = skip;
        self
    }

    #[must_use]
    pub fn with_retry_count(mut self, retries: u32) -> Self {
        self.retry_count = retries;
        self
    }

    #[must_use]
    pub fn with_debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_log = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check field-level consistency.
    ///
    /// # Errors
    /// `ApiError::Config` for an empty service name, a zero timeout, an
    /// empty `Accept`, or neither a base URL nor a complete
    /// region/environment pair
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.service.trim().is_empty() {
            return Err(ApiError::Config("service name cannot be empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(ApiError::Config("timeout must be greater than zero".to_string()));
        }
        if self.accept.trim().is_empty() {
            return Err(ApiError::Config("Accept header cannot be empty".to_string()));
        }
        let has_region = self.region.is_some() && self.environment.is_some();
        if self.base_url.as_deref().map_or(true, str::is_empty) && !has_region {
            return Err(ApiError::Config(format!(
                "{}: either a base URL or a region and environment is required",
                self.service
            )));
        }
        Ok(())
    }

    /// Resolve the base URL, consulting `resolver` when none is set.
    ///
    /// # Errors
    /// `ApiError::Config` if nothing resolves
    pub fn resolve_base_url(
        &self,
        resolver: Option<&dyn ServiceResolver>,
    ) -> Result<String, ApiError> {
        if let Some(url) = self.base_url.as_deref().filter(|url| !url.is_empty()) {
            return Ok(url.to_string());
        }

        let (Some(region), Some(environment)) = (&self.region, &self.environment) else {
            return Err(ApiError::Config(format!("{}: no base URL configured", self.service)));
        };
        let resolver = resolver.ok_or_else(|| {
            ApiError::Config(format!(
                "{}: region {region}/{environment} given but no service resolver",
                self.service
            ))
        })?;

        resolver.resolve(&self.service, region, environment).ok_or_else(|| {
            ApiError::Config(format!(
                "{}: no URL known for region {region} and environment {environment}",
                self.service
            ))
        })
    }
}

fn optional_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}
