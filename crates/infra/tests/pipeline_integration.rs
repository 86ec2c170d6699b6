//! Integration tests for the request pipeline
//!
//! Drives `ApiClient` end to end against wiremock servers: request
//! construction, signing, status classification and decoding.

mod support;

use std::sync::Arc;
use std::time::Duration;

use dipapi_common::testing::{init_test_tracing, StaticTokenSource};
use dipapi_common::ErrorClassification;
use dipapi_infra::api::{CopyRaw, DecodeBundleOf, DecodeInto, Discard};
use dipapi_infra::{ApiClient, ApiError, ApiErrorCategory, ClientConfig};
use reqwest::Method;
use serde::Serialize;
use support::{bearer_client, expected_signature, hmac_client, Group, TOKEN};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

#[derive(Serialize)]
struct GroupSearch<'a> {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(rename = "groupName", skip_serializing_if = "Option::is_none")]
    group_name: Option<&'a str>,
    #[serde(rename = "organizationId", skip_serializing_if = "Option::is_none")]
    organization_id: Option<&'a str>,
    #[serde(rename = "_count", skip_serializing_if = "Option::is_none")]
    count: Option<u32>,
}

/// Replies with the request body.
struct Echo;

impl Respond for Echo {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("Content-Type", "application/json")
            .set_body_bytes(request.body.clone())
    }
}

#[tokio::test]
async fn test_get_query_contains_exactly_the_set_fields() {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Group"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "resourceType": "Bundle", "type": "searchset", "total": 0, "entry": []
        })))
        .expect(1)
        .mount(&server)
        .await;
    let client = bearer_client(&server);

    let options = GroupSearch {
        id: None,
        group_name: Some("dip admins"),
        organization_id: Some("org-1"),
        count: None,
    };
    let spec = client.request(Method::GET, "Group").query(&options);
    let (groups, _) = client.send(spec, DecodeBundleOf::<Group>::new()).await.unwrap();

    assert!(groups.is_empty());
    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].url.query(), Some("groupName=dip%20admins&organizationId=org-1"));
    assert!(received[0].body.is_empty());
    assert_eq!(received[0].headers.get("authorization").unwrap(), &format!("Bearer {TOKEN}"));
}

#[tokio::test]
async fn test_hmac_signature_matches_sent_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/core/log/LogEvent"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    let client = hmac_client(&server, "shared-secret");

    let payload = serde_json::json!({
        "resourceType": "Bundle",
        "type": "transaction",
        "entry": [{"resource": {"logTime": "2024-01-01T00:00:00Z", "severity": "INFO"}}]
    });
    let spec = client.request(Method::POST, "core/log/LogEvent").json(&payload);
    client.send(spec, Discard).await.unwrap();

    let received = server.received_requests().await.unwrap();
    let sent = &received[0];
    assert_eq!(sent.body, serde_json::to_vec(&payload).unwrap());
    assert_eq!(
        sent.headers.get("authorization").unwrap().to_str().unwrap(),
        expected_signature("shared-secret", &sent.body)
    );
    assert_eq!(sent.headers.get("content-type").unwrap(), "application/json");
}

#[tokio::test]
async fn test_hmac_get_is_unsigned() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).mount(&server).await;
    let client = hmac_client(&server, "shared-secret");

    client.send(client.request(Method::GET, "core/log/LogEvent"), Discard).await.unwrap();

    let received = server.received_requests().await.unwrap();
    assert!(received[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_not_found_on_list_is_empty_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Group"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let client = bearer_client(&server);

    let list = client.send(client.request(Method::GET, "Group"), DecodeBundleOf::<Group>::new()).await;
    let single = client.send(client.request(Method::GET, "Group"), DecodeInto::<Group>::new()).await;

    let list_err = list.unwrap_err();
    assert!(matches!(list_err, ApiError::EmptyResult { .. }));
    assert_eq!(list_err.category(), ApiErrorCategory::Empty);
    assert!(matches!(single.unwrap_err(), ApiError::Status { .. }));
}

#[tokio::test]
async fn test_bundle_with_one_malformed_entry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Group"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "resourceType": "Bundle",
            "type": "searchset",
            "total": 2,
            "entry": [
                {"resource": Group::sample("g1")},
                {"resource": {"resourceType": "Group", "id": 42}}
            ]
        })))
        .mount(&server)
        .await;
    let client = bearer_client(&server);

    let (groups, _) =
        client.send(client.request(Method::GET, "Group"), DecodeBundleOf::<Group>::new()).await.unwrap();

    assert_eq!(groups.total, Some(2));
    assert_eq!(groups.items, vec![Group::sample("g1")]);
    assert_eq!(groups.skipped, 1);
}

#[tokio::test]
async fn test_echo_round_trip_preserves_fields() {
    let server = MockServer::start().await;
    Mock::given(method("PUT")).and(path("/Group/g7")).respond_with(Echo).mount(&server).await;
    let client = bearer_client(&server);

    let group = Group::sample("g7");
    let spec = client.request(Method::PUT, "Group/g7").json(&group);
    let (echoed, envelope) = client.send(spec, DecodeInto::<Group>::new()).await.unwrap();

    assert_eq!(echoed, Some(group));
    assert_eq!(envelope.status_code(), 200);
}

#[tokio::test]
async fn test_operation_outcome_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
            "resourceType": "OperationOutcome",
            "issue": [{"severity": "error", "code": "invalid", "diagnostics": "groupName is required"}]
        })))
        .mount(&server)
        .await;
    let client = bearer_client(&server);

    let spec = client.request(Method::POST, "Group").json(&serde_json::json!({}));
    let err = client.send(spec, Discard).await.unwrap_err();

    match &err {
        ApiError::Status { status, outcome, .. } => {
            assert_eq!(status.as_u16(), 422);
            assert_eq!(outcome.as_ref().map(|o| o.issue.len()), Some(1));
        }
        other => panic!("expected status error, got {other:?}"),
    }
    let message = err.to_string();
    assert!(message.starts_with("POST "));
    assert!(message.contains("/Group"));
    assert!(message.contains("groupName is required"));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_server_error_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(503)).mount(&server).await;
    let client = bearer_client(&server);

    let err = client.send(client.request(Method::GET, "Group/g1"), Discard).await.unwrap_err();

    assert_eq!(err.category(), ApiErrorCategory::Server);
    assert!(err.is_retryable());
    assert_eq!(err.retry_delay_secs(), 10);
}

#[tokio::test]
async fn test_created_with_location_and_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Group"))
        .and(header("Content-Type", "application/json"))
        .respond_with(ResponseTemplate::new(201).insert_header("Location", "Group/new-id/_history/1"))
        .mount(&server)
        .await;
    let client = bearer_client(&server);

    let spec = client.request(Method::POST, "Group").json(&Group::sample("new-id"));
    let (raw, envelope) = client.send(spec, CopyRaw(Vec::new())).await.unwrap();
    let (decoded, _) = client
        .send(
            client.request(Method::POST, "Group").json(&Group::sample("new-id")),
            DecodeInto::<Group>::new(),
        )
        .await
        .unwrap();

    assert!(raw.is_empty());
    assert_eq!(envelope.location(), Some("Group/new-id/_history/1"));
    assert_eq!(decoded, None);
}

#[tokio::test]
async fn test_timeout_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;
    let client = ApiClient::builder()
        .config(ClientConfig::new("idm").with_base_url(server.uri()).with_timeout(Duration::from_secs(1)))
        .token_source(Arc::new(StaticTokenSource::new(TOKEN)))
        .build()
        .unwrap();

    let err = client.send(client.request(Method::GET, "Group"), Discard).await.unwrap_err();

    assert!(matches!(err, ApiError::Transport(_)));
    assert_eq!(err.category(), ApiErrorCategory::Network);
    assert!(err.to_string().contains("GET"));
}

#[tokio::test]
async fn test_unreachable_host_is_transport_error() {
    let client = ApiClient::builder()
        .config(ClientConfig::new("idm").with_base_url("http://127.0.0.1:1"))
        .token_source(Arc::new(StaticTokenSource::new(TOKEN)))
        .build()
        .unwrap();

    let err = client.send(client.request(Method::GET, "Group"), Discard).await.unwrap_err();

    assert!(matches!(err, ApiError::Transport(_)));
    assert!(err.status().is_none());
}

#[tokio::test]
async fn test_truncated_chunked_body_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 2048];
        let _ = socket.read(&mut buf).await;
        socket
            .write_all(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n10\r\n{\"id\":\"12345678")
            .await
            .unwrap();
        socket.shutdown().await.ok();
    });
    let client = ApiClient::builder()
        .config(ClientConfig::new("idm").with_base_url(format!("http://{addr}")))
        .token_source(Arc::new(StaticTokenSource::new(TOKEN)))
        .build()
        .unwrap();

    let err = client
        .send(client.request(Method::GET, "Group/1"), DecodeInto::<Group>::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Transport(_)));
    assert_eq!(err.envelope().map(|envelope| envelope.status_code()), Some(200));
}
