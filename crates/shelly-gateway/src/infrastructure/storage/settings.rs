//! Optional TOML settings file.
//!
//! Every value has a default, so the file may be absent, empty, or list only
//! the keys an operator wants to change.  A complete file looks like this:
//!
//! ```toml
//! [listeners]
//! bind = "0.0.0.0"
//! plain_port = 7863
//! tls_port = 7862
//!
//! [tls]
//! cert = "cert.pem"
//! key = "privkey.pem"
//!
//! [files]
//! public_dir = "./public"
//! devices = "config.json"
//!
//! [session]
//! write_wait_secs = 10
//! pong_wait_secs = 60
//! # ping_period_secs defaults to nine tenths of pong_wait_secs
//! max_message_size = 512
//! outbound_capacity = 256
//! echo = false
//! greeting = "Hi Client!"
//!
//! [relay]
//! timeout_secs = 5
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` take the value of
//! `some_fn()` when the key is missing.  The same functions back the
//! `Default` impls, so "no file" and "empty file" mean exactly the same thing.
//!
//! `main.rs` loads the file, applies command-line overrides to the
//! [`GatewaySettings`] value, and only then calls
//! [`GatewaySettings::into_config`], which validates the combined result.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use shelly_core::session::liveness::{MAX_MESSAGE_SIZE, OUTBOUND_CAPACITY};
use shelly_core::{Liveness, LivenessError};

use crate::domain::config::{DEFAULT_PLAIN_PORT, DEFAULT_TLS_PORT};
use crate::domain::{GatewayConfig, SessionConfig, TlsPaths};

/// Error type for the settings file and its validation.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The file exists but could not be read.
    #[error("I/O error reading settings at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse settings TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// `listeners.bind` is not an IP address.
    #[error("invalid bind address '{0}'")]
    InvalidAddress(String),

    /// The timer values break the liveness invariant.
    #[error("invalid session timers: {0}")]
    Liveness(#[from] LivenessError),

    /// A size or capacity that must be positive is zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

// ── Settings schema types ─────────────────────────────────────────────────────

/// Top-level settings file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct GatewaySettings {
    #[serde(default)]
    pub listeners: ListenerSettings,
    #[serde(default)]
    pub tls: TlsSettings,
    #[serde(default)]
    pub files: FileSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub relay: RelaySettings,
}

/// Listener addresses.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ListenerSettings {
    /// IP address both listeners bind to.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Plaintext (LAN event) port.
    #[serde(default = "default_plain_port")]
    pub plain_port: u16,
    /// TLS port.
    #[serde(default = "default_tls_port")]
    pub tls_port: u16,
}

/// TLS certificate and key files.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TlsSettings {
    #[serde(default = "default_cert")]
    pub cert: PathBuf,
    #[serde(default = "default_key")]
    pub key: PathBuf,
}

/// Static files and the device file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FileSettings {
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,
    #[serde(default = "default_devices")]
    pub devices: PathBuf,
}

/// Per-session timers and limits.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SessionSettings {
    #[serde(default = "default_write_wait")]
    pub write_wait_secs: u64,
    #[serde(default = "default_pong_wait")]
    pub pong_wait_secs: u64,
    /// Derived from `pong_wait_secs` when absent.
    #[serde(default)]
    pub ping_period_secs: Option<u64>,
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,
    #[serde(default)]
    pub echo: bool,
    #[serde(default)]
    pub greeting: Option<String>,
}

/// Outbound relay requests.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RelaySettings {
    #[serde(default = "default_relay_timeout")]
    pub timeout_secs: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_plain_port() -> u16 {
    DEFAULT_PLAIN_PORT
}
fn default_tls_port() -> u16 {
    DEFAULT_TLS_PORT
}
fn default_cert() -> PathBuf {
    TlsPaths::default().cert
}
fn default_key() -> PathBuf {
    TlsPaths::default().key
}
fn default_public_dir() -> PathBuf {
    PathBuf::from("./public")
}
fn default_devices() -> PathBuf {
    PathBuf::from("config.json")
}
fn default_write_wait() -> u64 {
    Liveness::default().write_wait().as_secs()
}
fn default_pong_wait() -> u64 {
    Liveness::default().pong_wait().as_secs()
}
fn default_max_message_size() -> usize {
    MAX_MESSAGE_SIZE
}
fn default_outbound_capacity() -> usize {
    OUTBOUND_CAPACITY
}
fn default_relay_timeout() -> u64 {
    5
}

impl Default for ListenerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            plain_port: default_plain_port(),
            tls_port: default_tls_port(),
        }
    }
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self {
            cert: default_cert(),
            key: default_key(),
        }
    }
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            public_dir: default_public_dir(),
            devices: default_devices(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            write_wait_secs: default_write_wait(),
            pong_wait_secs: default_pong_wait(),
            ping_period_secs: None,
            max_message_size: default_max_message_size(),
            outbound_capacity: default_outbound_capacity(),
            echo: false,
            greeting: None,
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_relay_timeout(),
        }
    }
}

// ── Conversion ────────────────────────────────────────────────────────────────

impl GatewaySettings {
    /// Validates the settings and converts them to a [`GatewayConfig`].
    ///
    /// # Errors
    ///
    /// - [`SettingsError::InvalidAddress`] if `bind` is not an IP address.
    /// - [`SettingsError::Liveness`] if a timer is zero or the ping period is
    ///   not shorter than the pong wait.
    /// - [`SettingsError::Zero`] for a zero message size or queue capacity.
    pub fn into_config(self) -> Result<GatewayConfig, SettingsError> {
        let ip: IpAddr = self
            .listeners
            .bind
            .parse()
            .map_err(|_| SettingsError::InvalidAddress(self.listeners.bind.clone()))?;

        let session = self.session;
        let write_wait = Duration::from_secs(session.write_wait_secs);
        let pong_wait = Duration::from_secs(session.pong_wait_secs);
        let liveness = match session.ping_period_secs {
            Some(ping) => Liveness::new(write_wait, pong_wait, Duration::from_secs(ping))?,
            None => Liveness::from_pong_wait(write_wait, pong_wait)?,
        };
        if session.max_message_size == 0 {
            return Err(SettingsError::Zero("max_message_size"));
        }
        if session.outbound_capacity == 0 {
            return Err(SettingsError::Zero("outbound_capacity"));
        }

        Ok(GatewayConfig {
            plain_addr: SocketAddr::new(ip, self.listeners.plain_port),
            tls_addr: SocketAddr::new(ip, self.listeners.tls_port),
            tls: TlsPaths {
                cert: self.tls.cert,
                key: self.tls.key,
            },
            public_dir: self.files.public_dir,
            devices_path: self.files.devices,
            relay_timeout: Duration::from_secs(self.relay.timeout_secs),
            session: SessionConfig {
                liveness,
                max_message_size: session.max_message_size,
                outbound_capacity: session.outbound_capacity,
                echo: session.echo,
                greeting: session.greeting,
            },
        })
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Loads settings from `path`, returning the defaults if the file does not
/// exist.
///
/// # Errors
///
/// Returns [`SettingsError::Io`] for file-system errors other than "not
/// found", and [`SettingsError::Parse`] if the TOML is malformed.
pub fn load_settings(path: &Path) -> Result<GatewaySettings, SettingsError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(GatewaySettings::default()),
        Err(e) => Err(SettingsError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
