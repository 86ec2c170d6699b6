//! Configuration loader
//!
//! Loads [`ClientConfig`] and [`IamConfig`] from environment variables or
//! files.
//!
//! ## Environment Variables
//! - `DIPAPI_SERVICE`: Service name (required)
//! - `DIPAPI_BASE_URL`: Explicit base URL
//! - `DIPAPI_REGION` / `DIPAPI_ENVIRONMENT`: Resolved through a
//!   [`ServiceResolver`](super::ServiceResolver) when no base URL is set
//! - `DIPAPI_API_VERSION`: Default `Api-Version` header
//! - `DIPAPI_ACCEPT`: Default `Accept` header
//! - `DIPAPI_TIMEOUT_SECS`: Request timeout in seconds
//! - `DIPAPI_SKIP_VERIFY`: Accept invalid TLS certificates (true/false)
//! - `DIPAPI_RETRY_COUNT`: Retry count for service clients
//! - `DIPAPI_DEBUG_LOG`: Append request/response dumps to this file
//! - `DIPAPI_HMAC_SECRET`: Shared secret for HMAC signing
//! - `DIPAPI_IAM_URL`, `DIPAPI_OAUTH2_CLIENT_ID`, `DIPAPI_OAUTH2_SECRET`:
//!   Token endpoint settings for [`load_iam_from_env`]
//!
//! ## File Locations
//! [`probe_config_paths`] looks for `dipapi.{toml,json}` in the working
//! directory, its parent, and next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use dipapi_common::auth::IamConfig;
use secrecy::SecretString;

use super::settings::ClientConfig;
use crate::api::ApiError;

type Result<T> = std::result::Result<T, ApiError>;

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If that fails, falls
/// back to the first config file found by [`probe_config_paths`].
///
/// # Errors
/// Returns `ApiError::Config` if neither source yields a valid configuration
pub fn load() -> Result<ClientConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!(service = %config.service, "Configuration loaded from environment");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            let path = probe_config_paths().ok_or_else(|| {
                ApiError::Config("No config file found in any of the standard locations".to_string())
            })?;
            load_from_file(&path)
        }
    }
}

/// Load a client configuration from `DIPAPI_*` environment variables
///
/// # Errors
/// Returns `ApiError::Config` if `DIPAPI_SERVICE` is missing, a value does
/// not parse, or the result fails [`ClientConfig::validate`]
pub fn load_from_env() -> Result<ClientConfig> {
    load_from_lookup(|key| std::env::var(key).ok())
}

/// Same as [`load_from_env`] with a custom variable lookup
///
/// # Errors
/// See [`load_from_env`]
pub fn load_from_lookup<F>(lookup: F) -> Result<ClientConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let vars = Vars(lookup);
    let mut config = ClientConfig::new(vars.required("DIPAPI_SERVICE")?);

    config.base_url = vars.get("DIPAPI_BASE_URL");
    config.region = vars.get("DIPAPI_REGION");
    config.environment = vars.get("DIPAPI_ENVIRONMENT");
    config.api_version = vars.get("DIPAPI_API_VERSION");
    config.hmac_secret = vars.get("DIPAPI_HMAC_SECRET").map(SecretString::from);
    config.debug_log = vars.get("DIPAPI_DEBUG_LOG").map(PathBuf::from);
    if let Some(accept) = vars.get("DIPAPI_ACCEPT") {
        config.accept = accept;
    }
    if let Some(timeout) = vars.parsed::<u64>("DIPAPI_TIMEOUT_SECS")? {
        config.timeout_secs = timeout;
    }
    if let Some(retries) = vars.parsed::<u32>("DIPAPI_RETRY_COUNT")? {
        config.retry_count = retries;
    }
    config.skip_verify = vars.flag("DIPAPI_SKIP_VERIFY", false);

    config.validate()?;
    Ok(config)
}

/// Load the token endpoint configuration from environment variables
///
/// # Errors
/// Returns `ApiError::Config` if the IAM URL, client id or secret is missing
pub fn load_iam_from_env() -> Result<IamConfig> {
    load_iam_from_lookup(|key| std::env::var(key).ok())
}

/// Same as [`load_iam_from_env`] with a custom variable lookup
///
/// # Errors
/// See [`load_iam_from_env`]
pub fn load_iam_from_lookup<F>(lookup: F) -> Result<IamConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let vars = Vars(lookup);
    let mut config = IamConfig::new(
        vars.required("DIPAPI_IAM_URL")?,
        vars.required("DIPAPI_OAUTH2_CLIENT_ID")?,
        SecretString::from(vars.required("DIPAPI_OAUTH2_SECRET")?),
    );
    if let Some(timeout) = vars.parsed::<u64>("DIPAPI_TIMEOUT_SECS")? {
        config.timeout = Duration::from_secs(timeout);
    }
    config.skip_verify = vars.flag("DIPAPI_SKIP_VERIFY", false);
    Ok(config)
}

/// Load a client configuration from a file
///
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `ApiError::Config` if:
/// - File not found
/// - File format is invalid or unsupported
/// - The result fails [`ClientConfig::validate`]
pub fn load_from_file(path: &Path) -> Result<ClientConfig> {
    if !path.exists() {
        return Err(ApiError::Config(format!("Config file not found: {}", path.display())));
    }

    tracing::info!(path = %path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(path)
        .map_err(|e| ApiError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, path)?;
    config.validate()?;
    Ok(config)
}

fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ApiError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ApiError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(ApiError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe standard locations for a `dipapi.toml` or `dipapi.json`
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.extend([cwd.clone(), cwd.join("..")]);
    }
    if let Some(exe_dir) =
        std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        dirs.push(exe_dir);
    }

    dirs.iter()
        .flat_map(|dir| [dir.join("dipapi.toml"), dir.join("dipapi.json")])
        .find(|path| path.exists())
}

struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.get(key).ok_or_else(|| {
            ApiError::Config(format!("Missing required environment variable: {key}"))
        })
    }

    fn parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key)
            .map(|raw| {
                raw.parse::<T>().map_err(|e| ApiError::Config(format!("Invalid {key} {raw:?}: {e}")))
            })
            .transpose()
    }

    /// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off`
    /// (case-insensitive)
    fn flag(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(default)
    }
}
