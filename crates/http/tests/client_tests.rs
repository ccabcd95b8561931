//! Integration tests for the BidTun HTTP client

use bidtun_core::{CredentialStore, SessionStore, TokenPair};
use bidtun_http::client::{
    ClientError, GatewayClient, GatewayClientBuilder, GatewayConfig, RefreshTransport, global,
};
use bidtun_http::types::LoginRequest;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn mint_access(sub: &str) -> String {
    encode(
        &Header::default(),
        &json!({ "sub": sub, "exp": 4_102_444_800_i64 }),
        &EncodingKey::from_secret(b"server-secret"),
    )
    .unwrap()
}

fn login_request() -> LoginRequest {
    LoginRequest {
        email: "bidder@bidtun.com".to_string(),
        password: "hunter22".to_string(),
    }
}

#[tokio::test]
async fn test_client_builder() {
    let client = GatewayClient::builder()
        .base_url("http://localhost:8000/")
        .store(Arc::new(SessionStore::new()))
        .build();

    assert!(client.is_ok());
    let client = client.unwrap();
    assert_eq!(client.base_url(), "http://localhost:8000");
    assert_eq!(
        client.request(reqwest::Method::GET, "/listings").url(),
        "http://localhost:8000/listings"
    );
}

#[tokio::test]
async fn test_client_builder_requires_base_url_and_store() {
    let result = GatewayClient::builder()
        .store(Arc::new(SessionStore::new()))
        .build();
    assert!(matches!(result, Err(ClientError::Configuration(_))));

    let result = GatewayClient::builder().base_url("http://localhost").build();
    assert!(matches!(result, Err(ClientError::Configuration(_))));
}

#[tokio::test]
async fn test_builder_from_config() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token/refresh"))
        .and(header("authorization", "Bearer r1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "access": "a2" } })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = GatewayConfig {
        base_url: mock_server.uri(),
        ..GatewayConfig::default()
    };
    config.refresh.path = "/api/token/refresh".to_string();
    config.refresh.transport = RefreshTransport::Header;

    let store = Arc::new(SessionStore::new());
    store.login(TokenPair::new("a1", Some("r1".into()))).unwrap();

    let client = GatewayClientBuilder::from_config(&config)
        .store(store.clone())
        .build()
        .unwrap();
    client.refresh_now().await.unwrap();
    assert_eq!(store.current().access_token(), Some("a2"));
}

#[tokio::test]
async fn test_login_stores_tokens_and_subject() {
    let mock_server = MockServer::start().await;
    let access = mint_access("user-17");

    Mock::given(method("POST"))
        .and(path("/auth/login/"))
        .and(body_json(json!({ "email": "bidder@bidtun.com", "password": "hunter22" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Welcome back",
            "data": {
                "user": { "email": "bidder@bidtun.com", "first_name": "Amel" },
                "tokens": { "access": access, "refresh": "r1" }
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(SessionStore::new());
    store.set_guest("g-9");
    let client = GatewayClient::builder()
        .base_url(mock_server.uri())
        .store(store.clone())
        .build()
        .unwrap();

    let response = client.login(&login_request()).await.unwrap();
    assert_eq!(response.user["first_name"], "Amel");

    let session = store.current();
    assert_eq!(session.access_token(), Some(access.as_str()));
    assert_eq!(session.refresh_token(), Some("r1"));
    assert_eq!(session.subject_id(), Some("user-17"));
    assert_eq!(session.guest_id(), Some("g-9"));
}

#[tokio::test]
async fn test_login_rejection_is_not_refreshed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login/"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid credentials"))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let store = Arc::new(SessionStore::new());
    let client = GatewayClient::builder()
        .base_url(mock_server.uri())
        .store(store.clone())
        .build()
        .unwrap();

    let result = client.login(&login_request()).await;
    assert!(matches!(result, Err(ClientError::AuthenticationFailed(_))));
    assert!(!store.current().is_authenticated());
}

#[tokio::test]
async fn test_logout_clears_session_even_on_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/logout/"))
        .and(header("authorization", "Bearer a1"))
        .and(body_json(json!({ "refresh": "r1" })))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(SessionStore::new());
    store.login(TokenPair::new("a1", Some("r1".into()))).unwrap();
    let client = GatewayClient::builder()
        .base_url(mock_server.uri())
        .store(store.clone())
        .build()
        .unwrap();

    let result = client.logout().await;
    assert!(matches!(
        result,
        Err(ClientError::ServerError { status: 503, .. })
    ));
    assert!(!store.current().is_authenticated());
}

#[tokio::test]
async fn test_global_gateway_installs_once() {
    let build = || {
        GatewayClient::builder()
            .base_url("http://localhost:8000")
            .store(Arc::new(SessionStore::new()))
            .build()
            .unwrap()
    };

    let installed = global::install(build()).unwrap();
    assert_eq!(installed.base_url(), "http://localhost:8000");
    assert!(global::gateway().is_some());

    let second = global::install(build());
    assert!(matches!(second, Err(ClientError::AlreadyInitialized)));
}
