//! End-to-end tests for the gateway's HTTP surface.
//!
//! These build the real router around an in-memory client directory and
//! drive it with `tower::ServiceExt::oneshot`.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::ConnectInfo,
    http::{Request, StatusCode, header},
    response::Response,
};
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;
use tower::ServiceExt;

use request_gateway::{
    app::{AppState, router},
    auth::{AuthGateway, RequestSigner, SignedHeaders},
    config::GatewayConfig,
    models::client::{ClientRecord, ClientStatus, SecretVersion},
    services::directory::InMemoryDirectory,
};

const SECRET: &str = "dGVzdC1zZWNyZXQtZm9yLWMx";

fn clients() -> Vec<ClientRecord> {
    let secrets = vec![SecretVersion {
        version: "v1".to_string(),
        secret_enc: SECRET.to_string(),
        active: true,
    }];
    vec![
        ClientRecord {
            client_id: "c1".to_string(),
            status: ClientStatus::Active,
            allowed_sources: vec![],
            rate_per_minute: 29,
            secrets: secrets.clone(),
        },
        ClientRecord {
            client_id: "office".to_string(),
            status: ClientStatus::Active,
            allowed_sources: vec!["10.0.0.0/8".to_string(), "192.168.7.7".to_string()],
            rate_per_minute: 0,
            secrets,
        },
    ]
}

fn app(strict_mode: bool) -> Router {
    let config = GatewayConfig {
        strict_mode,
        ..GatewayConfig::default()
    };
    let gateway = AuthGateway::new(config, Arc::new(InMemoryDirectory::new(clients())));
    router(AppState::new(gateway))
}

fn sign(uri: &str, at: DateTime<Utc>) -> SignedHeaders {
    RequestSigner::new(SECRET, "v1")
        .sign("GET", uri, b"", at)
        .unwrap()
}

fn signed(client_id: &str, uri: &str, headers: &SignedHeaders) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("X-Client-Id", client_id)
        .header("X-Key-Version", &headers.key_version)
        .header("X-Date", &headers.date)
        .header("X-Nonce", &headers.nonce)
        .header("X-Signature", &headers.signature)
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn assert_rejected(response: Response, status: StatusCode, kind: &str) {
    assert_eq!(response.status(), status);
    let body = json_body(response).await;
    assert_eq!(body["error"], kind);
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
}

#[tokio::test]
async fn health_is_public() {
    let app = app(true);
    let response = send(
        &app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["strict_mode"], true);
}

#[tokio::test]
async fn signed_request_reaches_handler_with_identity() {
    let app = app(true);
    let uri = "/api/v1/whoami?z=last&a=first";
    let response = send(&app, signed("c1", uri, &sign(uri, Utc::now()))).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["client_id"], "c1");
    assert_eq!(body["key_version"], "v1");
    assert_eq!(body["mode"], "signed");
}

#[tokio::test]
async fn strict_mode_scenario() {
    let app = app(true);
    let uri = "/api/v1/whoami";

    // Fresh request admitted
    let headers = sign(uri, Utc::now());
    assert_eq!(send(&app, signed("c1", uri, &headers)).await.status(), StatusCode::OK);

    // Identical request replayed
    assert_rejected(
        send(&app, signed("c1", uri, &headers)).await,
        StatusCode::UNAUTHORIZED,
        "replay_detected",
    )
    .await;

    // Dated two minutes ago
    let stale = sign(uri, Utc::now() - TimeDelta::seconds(120));
    assert_rejected(
        send(&app, signed("c1", uri, &stale)).await,
        StatusCode::BAD_REQUEST,
        "date_skew_too_large",
    )
    .await;

    // One admitted so far; 28 more fill the 29/minute bucket
    for _ in 0..28 {
        let fresh = sign(uri, Utc::now());
        assert_eq!(send(&app, signed("c1", uri, &fresh)).await.status(), StatusCode::OK);
    }

    let over = sign(uri, Utc::now());
    let response = send(&app, signed("c1", uri, &over)).await;
    assert_eq!(
        response.headers().get(header::RETRY_AFTER).unwrap(),
        "60"
    );
    assert_rejected(response, StatusCode::TOO_MANY_REQUESTS, "rate_limited").await;
}

#[tokio::test]
async fn missing_client_id() {
    let app = app(false);
    let response = send(
        &app,
        Request::builder()
            .uri("/api/v1/whoami")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_rejected(response, StatusCode::UNAUTHORIZED, "missing_client_id").await;
}

#[tokio::test]
async fn unsigned_request_in_strict_mode() {
    let app = app(true);
    let request = Request::builder()
        .uri("/api/v1/whoami")
        .header("X-Client-Id", "c1")
        .header("X-Client-Secret", SECRET)
        .body(Body::empty())
        .unwrap();
    assert_rejected(send(&app, request).await, StatusCode::UNAUTHORIZED, "signature_required")
        .await;
}

#[tokio::test]
async fn shared_secret_in_permissive_mode() {
    let app = app(false);
    let request = Request::builder()
        .uri("/api/v1/whoami")
        .header("X-Client-Id", "c1")
        .header("X-Client-Secret", SECRET)
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["mode"], "shared_secret");
}

#[tokio::test]
async fn forwarded_address_outside_allowlist() {
    let app = app(false);
    let request = Request::builder()
        .uri("/api/v1/whoami")
        .header("X-Client-Id", "office")
        .header("X-Client-Secret", SECRET)
        .header("X-Forwarded-For", "11.0.0.1, 10.0.0.1")
        .body(Body::empty())
        .unwrap();
    assert_rejected(send(&app, request).await, StatusCode::FORBIDDEN, "ip_not_allowed").await;
}

#[tokio::test]
async fn peer_address_inside_allowlist() {
    let app = app(false);
    let peer: SocketAddr = "192.168.7.7:51515".parse().unwrap();
    let request = Request::builder()
        .uri("/api/v1/whoami")
        .header("X-Client-Id", "office")
        .header("X-Client-Secret", SECRET)
        .extension(ConnectInfo(peer))
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn tampered_query_rejected() {
    let app = app(true);
    let headers = sign("/api/v1/whoami?page=1", Utc::now());
    assert_rejected(
        send(&app, signed("c1", "/api/v1/whoami?page=2", &headers)).await,
        StatusCode::UNAUTHORIZED,
        "signature_mismatch",
    )
    .await;
}

#[tokio::test]
async fn non_utf8_query_bytes_are_signed() {
    let app = app(true);
    let headers = sign("/api/v1/whoami?a=%FF", Utc::now());
    assert_rejected(
        send(&app, signed("c1", "/api/v1/whoami?a=%FE", &headers)).await,
        StatusCode::UNAUTHORIZED,
        "signature_mismatch",
    )
    .await;

    let headers = sign("/api/v1/whoami?a=%FF", Utc::now());
    assert_eq!(
        send(&app, signed("c1", "/api/v1/whoami?a=%FF", &headers)).await.status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn corrupt_signature_encoding_reads_as_mismatch() {
    let app = app(true);
    let mut headers = sign("/api/v1/whoami", Utc::now());
    headers.signature = "not*base64".to_string();
    assert_rejected(
        send(&app, signed("c1", "/api/v1/whoami", &headers)).await,
        StatusCode::UNAUTHORIZED,
        "signature_mismatch",
    )
    .await;
}

#[tokio::test]
async fn bad_date_is_client_error() {
    let app = app(true);
    let mut headers = sign("/api/v1/whoami", Utc::now());
    headers.date = "next tuesday".to_string();
    assert_rejected(
        send(&app, signed("c1", "/api/v1/whoami", &headers)).await,
        StatusCode::BAD_REQUEST,
        "bad_date",
    )
    .await;
}

#[tokio::test]
async fn unknown_client() {
    let app = app(true);
    let uri = "/api/v1/whoami";
    assert_rejected(
        send(&app, signed("ghost", uri, &sign(uri, Utc::now()))).await,
        StatusCode::UNAUTHORIZED,
        "unknown_or_disabled_client",
    )
    .await;
}
