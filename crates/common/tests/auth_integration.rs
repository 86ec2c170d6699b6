//! Integration tests for the auth module
//!
//! Drives `TokenManager` over the real `IamTokenClient` against a wiremock
//! token endpoint.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dipapi_common::auth::{AuthError, IamConfig, SessionStatus, TokenManager};
use dipapi_common::testing::init_test_tracing;
use secrecy::SecretString;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token_body(access_token: &str, refresh_token: &str) -> serde_json::Value {
    serde_json::json!({
        "access_token": access_token,
        "refresh_token": refresh_token,
        "token_type": "Bearer",
        "scope": "mail",
        "expires_in": 1799
    })
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/authorize/oauth2/token"))
        .and(body_string_contains("grant_type=password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("first", "r1")))
        .expect(1)
        .mount(server)
        .await;
}

fn manager_for(server: &MockServer) -> TokenManager<dipapi_common::auth::IamTokenClient> {
    let config =
        IamConfig::new(server.uri(), "TestClient".to_string(), SecretString::from("Secret"));
    TokenManager::from_config(config).expect("valid config")
}

async fn force_expiry(manager: &TokenManager<dipapi_common::auth::IamTokenClient>) {
    let session = manager.session().await.expect("active session");
    manager.store_session(session.with_expires_at(Utc::now() - chrono::Duration::seconds(1))).await;
}

/// Login followed by `current_token` returns the literal token without any
/// further endpoint traffic.
#[tokio::test(flavor = "multi_thread")]
async fn test_login_then_current_token() -> anyhow::Result<()> {
    init_test_tracing();
    let server = MockServer::start().await;
    mount_login(&server).await;
    let manager = manager_for(&server);

    manager.login("username", "password").await?;

    assert_eq!(manager.current_token().await?, "first");
    assert_eq!(manager.current_token().await?, "first");
    Ok(())
}

/// A session forced one second into the past triggers exactly one refresh.
#[tokio::test(flavor = "multi_thread")]
async fn test_expired_session_triggers_exactly_one_refresh() {
    init_test_tracing();
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/authorize/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=r1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("second", "r2")))
        .expect(1)
        .mount(&server)
        .await;
    let manager = manager_for(&server);

    manager.login("username", "password").await.unwrap();
    force_expiry(&manager).await;

    assert_eq!(manager.current_token().await.unwrap(), "second");
    assert_eq!(manager.current_token().await.unwrap(), "second");
}

/// Concurrent callers that find the session expired share a single refresh.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_refresh_is_single_flight() {
    init_test_tracing();
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/authorize/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("shared", "r2"))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;
    let manager = Arc::new(manager_for(&server));

    manager.login("username", "password").await.unwrap();
    force_expiry(&manager).await;

    let tasks: Vec<_> = (0..12)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.current_token().await })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), "shared");
    }
}

/// A rejected refresh drops the session until the next login.
#[tokio::test(flavor = "multi_thread")]
async fn test_rejected_refresh_requires_login() {
    init_test_tracing();
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/authorize/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "refresh token expired"
        })))
        .mount(&server)
        .await;
    let manager = manager_for(&server);

    manager.login("username", "password").await.unwrap();
    let err = manager.token_refresh().await.unwrap_err();

    assert_eq!(
        err,
        AuthError::InvalidCredentials {
            status: 400,
            message: "invalid_grant: refresh token expired".to_string()
        }
    );
    assert_eq!(manager.status().await, SessionStatus::Expired);
    assert_eq!(manager.current_token().await, Err(AuthError::SessionExpired));
}

/// Transport failures surface as `AuthError::Transport`.
#[tokio::test(flavor = "multi_thread")]
async fn test_unreachable_endpoint() {
    let config = IamConfig {
        timeout: Duration::from_millis(500),
        ..IamConfig::new(
            "http://127.0.0.1:9".to_string(),
            "TestClient".to_string(),
            SecretString::from("Secret"),
        )
    };
    let manager = TokenManager::from_config(config).unwrap();

    let err = manager.login("username", "password").await.unwrap_err();

    assert!(matches!(err, AuthError::Transport(_)));
    assert_eq!(manager.status().await, SessionStatus::Unauthenticated);
}

/// Introspection goes through the manager to the endpoint.
#[tokio::test(flavor = "multi_thread")]
async fn test_introspect_through_manager() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/authorize/oauth2/introspect"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "active": false
        })))
        .mount(&server)
        .await;
    let manager = manager_for(&server);

    let result = manager.introspect("revoked").await.unwrap();

    assert!(!result.active);
    assert!(result.organizations.is_none());
}

/// An absurd `expires_in` from the endpoint yields a usable session.
#[tokio::test]
async fn test_login_with_out_of_range_lifetime() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/authorize/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "forever", "expires_in": i64::MAX
        })))
        .mount(&server)
        .await;
    let manager = manager_for(&server);

    manager.login("username", "password").await?;

    assert_eq!(manager.current_token().await?, "forever");
    Ok(())
}
