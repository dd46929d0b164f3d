//! Listener runtime tests: fail-fast behaviour and the plaintext route over a
//! real socket.

use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::time::timeout;

use shelly_gateway::application::RelayClient;
use shelly_gateway::domain::{DeviceStore, GatewayConfig, TlsPaths};
use shelly_gateway::infrastructure::{
    HttpRelayClient, ListenerError, ListenerFailure, ListenerKind, ServiceRuntime,
};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn loopback(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

/// A port that was free a moment ago.
fn free_port() -> u16 {
    StdTcpListener::bind(loopback(0))
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Writes a self-signed certificate and key for `localhost` into `dir`.
fn write_credentials(dir: &Path) -> TlsPaths {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let paths = TlsPaths {
        cert: dir.join("cert.pem"),
        key: dir.join("privkey.pem"),
    };
    std::fs::write(&paths.cert, certified.cert.pem()).unwrap();
    std::fs::write(&paths.key, certified.key_pair.serialize_pem()).unwrap();
    paths
}

fn config(
    dir: &TempDir,
    plain_addr: SocketAddr,
    tls_addr: SocketAddr,
    tls: TlsPaths,
) -> GatewayConfig {
    GatewayConfig {
        plain_addr,
        tls_addr,
        tls,
        public_dir: dir.path().join("public"),
        devices_path: dir.path().join("config.json"),
        ..GatewayConfig::default()
    }
}

async fn run(config: GatewayConfig) -> ListenerFailure {
    let relay: Arc<dyn RelayClient> =
        Arc::new(HttpRelayClient::new(Duration::from_secs(1)).unwrap());
    let runtime = ServiceRuntime::new(config, Arc::new(DeviceStore::default()), relay);
    timeout(Duration::from_secs(10), runtime.run())
        .await
        .expect("runtime should fail fast")
}

/// Retries a TCP connect for up to 2.5 s.
async fn accepts_connections(addr: SocketAddr) -> bool {
    for _ in 0..50 {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

// ── Fail-fast ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_plaintext_port_in_use_fails_runtime_while_tls_is_healthy() {
    // Arrange: something else already holds the plaintext port
    let dir = tempfile::tempdir().unwrap();
    let blocker = StdTcpListener::bind(loopback(0)).unwrap();
    let taken = blocker.local_addr().unwrap();
    let tls = write_credentials(dir.path());
    let tls_addr = loopback(free_port());

    // Act
    let failure = run(config(&dir, taken, tls_addr, tls)).await;

    // Assert: the plaintext bind is what ended the runtime
    assert_eq!(failure.listener, ListenerKind::Plaintext);
    assert!(
        matches!(failure.error, ListenerError::Bind { addr, .. } if addr == taken),
        "unexpected failure: {failure}"
    );

    // ... while the TLS listener is up and accepting connections
    assert!(
        accepts_connections(tls_addr).await,
        "TLS listener never came up on {tls_addr}"
    );
}

#[tokio::test]
async fn test_missing_tls_credentials_fail_runtime() {
    // Arrange: an empty directory, so neither PEM file exists
    let dir = tempfile::tempdir().unwrap();
    let tls = TlsPaths {
        cert: dir.path().join("cert.pem"),
        key: dir.path().join("privkey.pem"),
    };

    // Act
    let failure = run(config(&dir, loopback(0), loopback(0), tls)).await;

    // Assert
    assert_eq!(failure.listener, ListenerKind::Tls);
    assert!(matches!(failure.error, ListenerError::TlsCredentials { .. }));
}

#[tokio::test]
async fn test_tls_port_in_use_fails_runtime() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = StdTcpListener::bind(loopback(0)).unwrap();
    let taken = blocker.local_addr().unwrap();
    let tls = write_credentials(dir.path());

    let failure = run(config(&dir, loopback(0), taken, tls)).await;

    assert_eq!(failure.listener, ListenerKind::Tls);
    assert!(matches!(
        failure.error,
        ListenerError::Bind { .. } | ListenerError::Serve { .. }
    ));
}

// ── Healthy runtime ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_plaintext_event_route_uses_devices_loaded_at_tls_start() {
    // Arrange: a device file and a healthy pair of listeners
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.json"),
        r#"[{"name": "Porch Light", "address": "192.168.1.92", "user": "u", "password": "p"}]"#,
    )
    .unwrap();
    let plain = loopback(free_port());
    let tls = write_credentials(dir.path());
    let relay: Arc<dyn RelayClient> =
        Arc::new(HttpRelayClient::new(Duration::from_secs(1)).unwrap());
    let runtime = ServiceRuntime::new(
        config(&dir, plain, loopback(0), tls),
        Arc::new(DeviceStore::default()),
        relay,
    );
    let running = tokio::spawn(runtime.run());

    // Act: retry until the listener is up and the device table is loaded
    let client = reqwest::Client::new();
    let mut status = None;
    for _ in 0..50 {
        if let Ok(response) = client
            .get(format!("http://{plain}/event/porchlight/on"))
            .send()
            .await
        {
            status = Some(response.status());
            if response.status().is_success() {
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // Assert
    assert_eq!(status.map(|s| s.as_u16()), Some(200));
    let unknown = client
        .get(format!("http://{plain}/event/garage/on"))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status().as_u16(), 404);
    assert!(!running.is_finished());
    running.abort();
}
