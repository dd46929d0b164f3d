//! HTTP route tables for the two listeners.
//!
//! ```text
//! plaintext listener (TrustLevel::Lan)
//!   /event/{device}/{on|off}     relay event callback, logged
//!
//! TLS listener (TrustLevel::Secure)
//!   /wss                         WebSocket session
//!   /shelly/{device}/toggle      switch a relay
//!   /*                           files from the public directory
//! ```
//!
//! The plaintext table has no file service, no WebSocket and no toggle: a
//! device on the LAN can report state but cannot command anything.

use std::path::Path;
use std::sync::Arc;

use axum::extract::{FromRef, Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use shelly_core::{DeviceCommand, SwitchState, TrustLevel};

use crate::application::{DeviceCommandDispatcher, DispatchError};
use crate::infrastructure::acceptor::{upgrade, SessionAcceptor};

/// Shared state of the TLS router.
#[derive(Clone)]
pub struct TlsState {
    pub acceptor: SessionAcceptor,
    pub dispatcher: Arc<DeviceCommandDispatcher>,
}

impl FromRef<TlsState> for SessionAcceptor {
    fn from_ref(state: &TlsState) -> Self {
        state.acceptor.clone()
    }
}

impl FromRef<TlsState> for Arc<DeviceCommandDispatcher> {
    fn from_ref(state: &TlsState) -> Self {
        Arc::clone(&state.dispatcher)
    }
}

/// Routes served on the plaintext listener.
pub fn plaintext_router(dispatcher: Arc<DeviceCommandDispatcher>) -> Router {
    Router::new()
        .route("/event/{device}/{state}", any(report_event))
        .layer(TraceLayer::new_for_http())
        .with_state(dispatcher)
}

/// Routes served on the TLS listener.
///
/// Anything not matched by `/wss` or a toggle route is looked up under
/// `public_dir`; a missing file is a 404.
pub fn tls_router(
    acceptor: SessionAcceptor,
    dispatcher: Arc<DeviceCommandDispatcher>,
    public_dir: &Path,
) -> Router {
    Router::new()
        .route("/wss", any(upgrade))
        .route("/shelly/{device}/toggle", any(toggle_device))
        .fallback_service(ServeDir::new(public_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(TlsState {
            acceptor,
            dispatcher,
        })
}

async fn report_event(
    State(dispatcher): State<Arc<DeviceCommandDispatcher>>,
    UrlPath((device, state)): UrlPath<(String, String)>,
) -> Result<StatusCode, DispatchError> {
    let Ok(state) = state.parse::<SwitchState>() else {
        return Ok(StatusCode::NOT_FOUND);
    };
    dispatcher
        .dispatch(TrustLevel::Lan, &device, DeviceCommand::Report(state))
        .await?;
    Ok(StatusCode::OK)
}

async fn toggle_device(
    State(dispatcher): State<Arc<DeviceCommandDispatcher>>,
    UrlPath(device): UrlPath<String>,
) -> Result<String, DispatchError> {
    let outcome = dispatcher
        .dispatch(TrustLevel::Secure, &device, DeviceCommand::Toggle)
        .await?;
    Ok(outcome.into_body())
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = match self {
            DispatchError::UnknownDevice(_) => StatusCode::NOT_FOUND,
            DispatchError::NotPermitted { .. } => StatusCode::FORBIDDEN,
        };
        (status, self.to_string()).into_response()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatcher::MockRelayClient;
    use crate::domain::{DeviceStore, SessionConfig};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use shelly_core::DeviceTable;
    use tower::ServiceExt;

    fn dispatcher(relay: MockRelayClient) -> Arc<DeviceCommandDispatcher> {
        let table = DeviceTable::from_json(
            r#"[{"name": "Porch", "address": "192.168.1.92", "user": "u", "password": "p"}]"#,
        )
        .unwrap();
        Arc::new(DeviceCommandDispatcher::new(
            Arc::new(DeviceStore::new(table)),
            Arc::new(relay),
        ))
    }

    fn quiet_relay() -> MockRelayClient {
        let mut relay = MockRelayClient::new();
        relay.expect_toggle().times(0);
        relay
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn test_event_route_accepts_known_device() {
        let (status, _) = get(plaintext_router(dispatcher(quiet_relay())), "/event/porch/on").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_event_route_rejects_unknown_state() {
        let (status, _) = get(
            plaintext_router(dispatcher(quiet_relay())),
            "/event/porch/maybe",
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_event_route_unknown_device_is_404() {
        let (status, _) = get(
            plaintext_router(dispatcher(quiet_relay())),
            "/event/garage/off",
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_plaintext_listener_has_no_toggle_or_files() {
        let router = plaintext_router(dispatcher(quiet_relay()));
        let (toggle, _) = get(router.clone(), "/shelly/porch/toggle").await;
        let (index, _) = get(router, "/index.html").await;
        assert_eq!(toggle, StatusCode::NOT_FOUND);
        assert_eq!(index, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_toggle_route_returns_device_body() {
        // Arrange
        let mut relay = MockRelayClient::new();
        relay
            .expect_toggle()
            .times(1)
            .returning(|_| Ok("{\"ison\":false}".to_string()));
        let public = tempfile::tempdir().unwrap();
        let router = tls_router(
            SessionAcceptor::new(SessionConfig::default()),
            dispatcher(relay),
            public.path(),
        );

        // Act
        let (status, body) = get(router, "/shelly/porch/toggle").await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "{\"ison\":false}");
    }

    #[tokio::test]
    async fn test_tls_router_serves_public_files() {
        let public = tempfile::tempdir().unwrap();
        std::fs::write(public.path().join("index.html"), "<h1>relays</h1>").unwrap();
        let router = tls_router(
            SessionAcceptor::new(SessionConfig::default()),
            dispatcher(quiet_relay()),
            public.path(),
        );

        let (status, body) = get(router.clone(), "/index.html").await;
        let (missing, _) = get(router, "/nope.js").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<h1>relays</h1>");
        assert_eq!(missing, StatusCode::NOT_FOUND);
    }
}
