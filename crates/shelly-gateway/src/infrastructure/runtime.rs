//! Service runtime: two listeners, one failure channel.
//!
//! [`ServiceRuntime::run`] starts the plaintext listener and the TLS listener
//! as independent Tokio tasks and then waits on a shared failure channel:
//!
//! ```text
//!   serve_plaintext ──┐
//!                     ├──▶ failure channel (capacity 1) ──▶ run() returns
//!   serve_tls ────────┘
//! ```
//!
//! A listener only ever returns by failing: bind errors, bad TLS credentials,
//! a serve error, or even a clean stop all count.  The first report wins and
//! `run` hands it to `main`, which logs it and exits with status 1.  A
//! listener task that panics reports [`ListenerError::Aborted`] from its drop
//! guard, so a crash is never silent.
//!
//! There is no graceful shutdown and no restart: a gateway with one dead
//! listener is treated as a dead gateway.

use std::fmt;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::application::{DeviceCommandDispatcher, RelayClient};
use crate::domain::{DeviceStore, GatewayConfig};
use crate::infrastructure::acceptor::SessionAcceptor;
use crate::infrastructure::routes::{plaintext_router, tls_router};
use crate::infrastructure::storage::reload_or_keep;
use crate::infrastructure::tls::{install_crypto_provider, load_credentials};

// ── Failure types ─────────────────────────────────────────────────────────────

/// Which listener a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerKind {
    Plaintext,
    Tls,
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerKind::Plaintext => f.write_str("plaintext"),
            ListenerKind::Tls => f.write_str("TLS"),
        }
    }
}

/// Why a listener stopped.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The listening socket could not be bound.
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The certificate or key could not be loaded.
    #[error("cannot load TLS credentials from {cert} and {key}: {source}")]
    TlsCredentials {
        cert: PathBuf,
        key: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The server stopped with an error after binding.
    #[error("server on {addr} failed: {source}")]
    Serve {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The server returned without an error.
    #[error("server on {addr} stopped")]
    Stopped { addr: SocketAddr },

    /// The listener task ended without reporting, e.g. by panicking.
    #[error("listener task aborted")]
    Aborted,
}

/// A listener-terminal failure, as delivered on the failure channel.
#[derive(Debug, Error)]
#[error("{listener} listener failed: {error}")]
pub struct ListenerFailure {
    pub listener: ListenerKind,
    #[source]
    pub error: ListenerError,
}

/// One listener's end of the failure channel.
///
/// Consumed by [`report`](Self::report).  Dropping it unreported sends
/// [`ListenerError::Aborted`].
struct FailureReporter {
    listener: ListenerKind,
    tx: Option<mpsc::Sender<ListenerFailure>>,
}

impl FailureReporter {
    fn new(listener: ListenerKind, tx: mpsc::Sender<ListenerFailure>) -> Self {
        Self {
            listener,
            tx: Some(tx),
        }
    }

    fn report(mut self, error: ListenerError) {
        self.send(error);
    }

    fn send(&mut self, error: ListenerError) {
        let Some(tx) = self.tx.take() else { return };
        let failure = ListenerFailure {
            listener: self.listener,
            error,
        };
        // Capacity is one: a full channel means another failure got there
        // first, and that one is what the process exits on.
        if let Err(e) = tx.try_send(failure) {
            debug!("failure not delivered: {}", e.into_inner());
        }
    }
}

impl Drop for FailureReporter {
    fn drop(&mut self) {
        self.send(ListenerError::Aborted);
    }
}

// ── Runtime ───────────────────────────────────────────────────────────────────

/// Both listeners plus the state they share.
pub struct ServiceRuntime {
    config: Arc<GatewayConfig>,
    devices: Arc<DeviceStore>,
    dispatcher: Arc<DeviceCommandDispatcher>,
    acceptor: SessionAcceptor,
}

impl ServiceRuntime {
    /// Wires the dispatcher and session acceptor.  Nothing is bound yet.
    pub fn new(
        config: GatewayConfig,
        devices: Arc<DeviceStore>,
        relay: Arc<dyn RelayClient>,
    ) -> Self {
        let dispatcher = Arc::new(DeviceCommandDispatcher::new(Arc::clone(&devices), relay));
        let acceptor = SessionAcceptor::new(config.session.clone());
        Self {
            config: Arc::new(config),
            devices,
            dispatcher,
            acceptor,
        }
    }

    /// Starts both listeners and returns the first listener failure.
    ///
    /// This future never completes while both listeners are healthy.
    pub async fn run(self) -> ListenerFailure {
        install_crypto_provider();
        let (tx, mut failures) = mpsc::channel(1);

        tokio::spawn(serve_plaintext(
            Arc::clone(&self.config),
            Arc::clone(&self.dispatcher),
            FailureReporter::new(ListenerKind::Plaintext, tx.clone()),
        ));
        tokio::spawn(serve_tls(
            Arc::clone(&self.config),
            Arc::clone(&self.devices),
            self.acceptor.clone(),
            Arc::clone(&self.dispatcher),
            FailureReporter::new(ListenerKind::Tls, tx.clone()),
        ));

        // `tx` stays alive in this frame, so `recv` only ever yields a value.
        loop {
            if let Some(failure) = failures.recv().await {
                return failure;
            }
        }
    }
}

async fn serve_plaintext(
    config: Arc<GatewayConfig>,
    dispatcher: Arc<DeviceCommandDispatcher>,
    reporter: FailureReporter,
) {
    let addr = config.plain_addr;
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(source) => return reporter.report(ListenerError::Bind { addr, source }),
    };
    info!("plaintext listener on {addr}");

    let app = plaintext_router(dispatcher);
    match axum::serve(listener, app).await {
        Ok(()) => reporter.report(ListenerError::Stopped { addr }),
        Err(source) => reporter.report(ListenerError::Serve { addr, source }),
    }
}

async fn serve_tls(
    config: Arc<GatewayConfig>,
    devices: Arc<DeviceStore>,
    acceptor: SessionAcceptor,
    dispatcher: Arc<DeviceCommandDispatcher>,
    reporter: FailureReporter,
) {
    let addr = config.tls_addr;
    reload_or_keep(&devices, &config.devices_path).await;

    let credentials = match load_credentials(&config.tls).await {
        Ok(credentials) => credentials,
        Err(source) => {
            return reporter.report(ListenerError::TlsCredentials {
                cert: config.tls.cert.clone(),
                key: config.tls.key.clone(),
                source,
            })
        }
    };
    info!("TLS listener on {addr}");

    let app = tls_router(acceptor, dispatcher, &config.public_dir);
    let served = axum_server::bind_rustls(addr, credentials)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await;

    // axum-server binds inside `serve`, so a bind error surfaces here.
    match served {
        Ok(()) => reporter.report(ListenerError::Stopped { addr }),
        Err(source) if is_bind_error(&source) => {
            reporter.report(ListenerError::Bind { addr, source });
        }
        Err(source) => reporter.report(ListenerError::Serve { addr, source }),
    }
}

fn is_bind_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::AddrInUse | ErrorKind::AddrNotAvailable | ErrorKind::PermissionDenied
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
