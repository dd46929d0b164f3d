//! Gateway configuration types.
//!
//! [`GatewayConfig`] is the single source of truth for all runtime settings.
//! `main.rs` builds it from the optional TOML settings file plus CLI overrides
//! (see `infrastructure::storage::settings`); tests build it directly.
//!
//! Keeping configuration as a plain struct (no global state, no environment
//! reads in here) lets the runtime be started several times in one test
//! process with different ports and timers.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use shelly_core::session::liveness::{MAX_MESSAGE_SIZE, OUTBOUND_CAPACITY};
use shelly_core::Liveness;

/// Default plaintext (LAN event) port.
pub const DEFAULT_PLAIN_PORT: u16 = 7863;

/// Default TLS port.
pub const DEFAULT_TLS_PORT: u16 = 7862;

/// Certificate and private key locations for the TLS listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    /// PEM certificate chain.
    pub cert: PathBuf,
    /// PEM private key.
    pub key: PathBuf,
}

impl Default for TlsPaths {
    fn default() -> Self {
        Self {
            cert: PathBuf::from("cert.pem"),
            key: PathBuf::from("privkey.pem"),
        }
    }
}

/// Per-session settings shared by every accepted WebSocket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Write wait, pong wait and ping period.
    pub liveness: Liveness,

    /// Largest inbound message accepted, in bytes.  Larger messages end the
    /// session.
    pub max_message_size: usize,

    /// Capacity of the outbound queue, in messages.
    pub outbound_capacity: usize,

    /// Send each normalised inbound message back to the same session.
    pub echo: bool,

    /// First message queued on every new session, if any.
    pub greeting: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            liveness: Liveness::default(),
            max_message_size: MAX_MESSAGE_SIZE,
            outbound_capacity: OUTBOUND_CAPACITY,
            echo: false,
            greeting: None,
        }
    }
}

/// All runtime configuration for the gateway.
///
/// # Example
///
/// ```rust
/// use shelly_gateway::domain::GatewayConfig;
///
/// let cfg = GatewayConfig::default();
/// assert_eq!(cfg.plain_addr.port(), 7863);
/// assert_eq!(cfg.tls_addr.port(), 7862);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Address of the plaintext listener (LAN event reports only).
    pub plain_addr: SocketAddr,

    /// Address of the TLS listener (files, WebSocket, toggles).
    pub tls_addr: SocketAddr,

    /// Certificate and key for the TLS listener.
    pub tls: TlsPaths,

    /// Directory served verbatim at `/` on the TLS listener.
    pub public_dir: PathBuf,

    /// JSON device file, reloaded whenever the TLS listener starts.
    pub devices_path: PathBuf,

    /// Timeout for one outbound relay request.
    pub relay_timeout: Duration,

    /// Settings applied to every WebSocket session.
    pub session: SessionConfig,
}

impl Default for GatewayConfig {
    /// | Field           | Default            |
    /// |-----------------|--------------------|
    /// | plain_addr      | `0.0.0.0:7863`     |
    /// | tls_addr        | `0.0.0.0:7862`     |
    /// | tls             | `cert.pem`, `privkey.pem` |
    /// | public_dir      | `./public`         |
    /// | devices_path    | `config.json`      |
    /// | relay_timeout   | 5 seconds          |
    fn default() -> Self {
        Self {
            plain_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PLAIN_PORT)),
            tls_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_TLS_PORT)),
            tls: TlsPaths::default(),
            public_dir: PathBuf::from("./public"),
            devices_path: PathBuf::from("config.json"),
            relay_timeout: Duration::from_secs(5),
            session: SessionConfig::default(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
