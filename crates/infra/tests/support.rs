//! Shared fixtures for the pipeline integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use dipapi_common::auth::AccessTokenSource;
use dipapi_common::testing::StaticTokenSource;
use dipapi_infra::{ApiClient, ClientConfig};
use hmac::{Hmac, Mac};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use wiremock::MockServer;

pub const TOKEN: &str = "test-token";

/// A resource with a mix of required, optional and nested fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub resource_type: String,
    pub id: String,
    pub group_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_description: Option<String>,
    pub managing_organization: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
}

impl Group {
    pub fn sample(id: &str) -> Self {
        Self {
            resource_type: "Group".to_string(),
            id: id.to_string(),
            group_name: format!("group {id}"),
            group_description: Some("test group".to_string()),
            managing_organization: "org-1".to_string(),
            members: vec!["user-1".to_string(), "user-2".to_string()],
        }
    }
}

pub fn client_with_source(server: &MockServer, source: Arc<dyn AccessTokenSource>) -> ApiClient {
    ApiClient::builder()
        .config(ClientConfig::new("idm").with_base_url(server.uri()).with_api_version("1"))
        .token_source(source)
        .build()
        .expect("client should build")
}

/// Bearer-signed client for `server` with a fixed token.
pub fn bearer_client(server: &MockServer) -> ApiClient {
    client_with_source(server, Arc::new(StaticTokenSource::new(TOKEN)))
}

/// HMAC-signed client for `server`.
pub fn hmac_client(server: &MockServer, secret: &str) -> ApiClient {
    ApiClient::builder()
        .config(
            ClientConfig::new("logging")
                .with_base_url(server.uri())
                .with_hmac_secret(SecretString::from(secret.to_string())),
        )
        .build()
        .expect("client should build")
}

/// Signature computed independently of the library.
pub fn expected_signature(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("any key length");
    mac.update(body);
    STANDARD.encode(mac.finalize().into_bytes())
}
