//! Relay toggle against a fake Shelly device.
//!
//! The fake device records every request it receives and always answers
//! `500`, so the tests also show that the gateway does not care about the
//! device's status code.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::{OriginalUri, State};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceExt;

use shelly_core::DeviceTable;
use shelly_gateway::application::{DeviceCommandDispatcher, RelayClient};
use shelly_gateway::domain::{DeviceStore, SessionConfig};
use shelly_gateway::infrastructure::acceptor::SessionAcceptor;
use shelly_gateway::infrastructure::routes::tls_router;
use shelly_gateway::infrastructure::HttpRelayClient;

// ── Fake device ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Seen {
    method: Method,
    uri: String,
    authorization: Option<String>,
}

type Log = Arc<Mutex<Vec<Seen>>>;

async fn record(
    State(log): State<Log>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> (StatusCode, &'static str) {
    log.lock().unwrap().push(Seen {
        method,
        uri: uri.to_string(),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });
    (StatusCode::INTERNAL_SERVER_ERROR, "{\"ison\":true}")
}

async fn spawn_device() -> (SocketAddr, Log) {
    let log: Log = Arc::default();
    let app = Router::new()
        .route("/relay/{channel}", any(record))
        .with_state(Arc::clone(&log));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    (addr, log)
}

fn devices_for(addr: SocketAddr) -> DeviceTable {
    DeviceTable::from_json(&format!(
        r#"[
            {{"name": "Apartment", "address": "{addr}", "user": "u", "password": "p"}},
            {{"name": "Wall Low", "address": "{addr}", "relay": 1, "user": "brad", "password": "unstable"}}
        ]"#
    ))
    .unwrap()
}

fn client() -> HttpRelayClient {
    HttpRelayClient::new(Duration::from_secs(2)).unwrap()
}

// ── Relay client ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_toggle_sends_one_authenticated_get() {
    // Arrange
    let (addr, log) = spawn_device().await;
    let devices = devices_for(addr);
    let apartment = devices.find("apartment").unwrap();

    // Act
    let body = client().toggle(apartment).await.unwrap();

    // Assert
    assert_eq!(body, "{\"ison\":true}");
    let seen = log.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].method, Method::GET);
    assert_eq!(seen[0].uri, "/relay/0?turn=toggle");
    // base64("u:p")
    assert_eq!(seen[0].authorization.as_deref(), Some("Basic dTpw"));
}

#[tokio::test]
async fn test_toggle_targets_relay_channel() {
    let (addr, log) = spawn_device().await;
    let devices = devices_for(addr);

    client().toggle(devices.find("walllow").unwrap()).await.unwrap();

    let seen = log.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].uri, "/relay/1?turn=toggle");
}

#[tokio::test]
async fn test_unreachable_device_is_transport_error() {
    // Arrange: a port nothing listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let devices = devices_for(addr);

    // Act
    let result = client().toggle(devices.find("apartment").unwrap()).await;

    // Assert: the error never carries the credentials
    let message = result.unwrap_err().to_string();
    assert!(message.contains("Apartment"));
    assert!(!message.contains("u:p@"));
}

// ── Toggle route ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_toggle_route_returns_200_even_when_device_fails() {
    // Arrange
    let (addr, log) = spawn_device().await;
    let dispatcher = Arc::new(DeviceCommandDispatcher::new(
        Arc::new(DeviceStore::new(devices_for(addr))),
        Arc::new(client()) as Arc<dyn RelayClient>,
    ));
    let router = tls_router(
        SessionAcceptor::new(SessionConfig::default()),
        dispatcher,
        std::path::Path::new("public"),
    );

    // Act
    let response = router
        .oneshot(
            Request::get("/shelly/apartment/toggle")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"{\"ison\":true}");
    assert_eq!(log.lock().unwrap().len(), 1);
}
