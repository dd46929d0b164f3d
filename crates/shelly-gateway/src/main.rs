//! Shelly Gateway: entry point.
//!
//! Runs two listeners side by side:
//!
//! - **TLS** (default port 7862): the browser UI from the public directory,
//!   a WebSocket session per open page at `/wss`, and relay toggles at
//!   `/shelly/{device}/toggle`.
//! - **Plaintext** (default port 7863): event callbacks the relays push on
//!   the LAN, at `/event/{device}/{on|off}`.
//!
//! If either listener stops, the process logs which one and exits with status
//! 1.  A supervisor (systemd, Docker) is expected to restart it.
//!
//! # Usage
//!
//! ```text
//! shelly-gateway [OPTIONS]
//!
//! Options:
//!   --settings <FILE>          Optional TOML settings file
//!   --plain-port <PORT>        Plaintext listener port [default: 7863]
//!   --tls-port <PORT>          TLS listener port [default: 7862]
//!   --bind <IP>                Bind address for both listeners [default: 0.0.0.0]
//!   --cert <FILE>              PEM certificate chain [default: cert.pem]
//!   --key <FILE>               PEM private key [default: privkey.pem]
//!   --public-dir <DIR>         Static files served at / [default: ./public]
//!   --devices <FILE>           JSON device file [default: config.json]
//!   --write-wait <SECS>        Per-frame write deadline [default: 10]
//!   --pong-wait <SECS>         Read deadline [default: 60]
//!   --ping-period <SECS>       Ping interval [default: 9/10 of pong wait]
//!   --max-message-size <BYTES> Largest inbound message [default: 512]
//!   --echo                     Send inbound messages back to their session
//!   --greeting <TEXT>          First message on every new session
//! ```
//!
//! # Where values come from
//!
//! Built-in defaults, then the settings file, then environment variables and
//! flags.  Each flag has a `SHELLY_*` environment variable (e.g.
//! `SHELLY_TLS_PORT`); a flag on the command line beats the variable.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use shelly_gateway::domain::{DeviceStore, GatewayConfig};
use shelly_gateway::infrastructure::storage::{load_settings, reload_or_keep, GatewaySettings};
use shelly_gateway::infrastructure::{HttpRelayClient, ServiceRuntime};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Shelly home-automation gateway.
///
/// Every option is optional: a missing option keeps the value from the
/// settings file, or the built-in default when there is no file.
#[derive(Debug, Default, Parser)]
#[command(
    name = "shelly-gateway",
    about = "Browser WebSocket sessions and Shelly relay toggles over TLS, relay events over plaintext",
    version
)]
struct Cli {
    /// TOML settings file.  A missing file means built-in defaults.
    #[arg(long, env = "SHELLY_SETTINGS")]
    settings: Option<PathBuf>,

    /// Plaintext (LAN event) listener port.
    #[arg(long, env = "SHELLY_PLAIN_PORT")]
    plain_port: Option<u16>,

    /// TLS listener port.
    #[arg(long, env = "SHELLY_TLS_PORT")]
    tls_port: Option<u16>,

    /// IP address both listeners bind to.
    ///
    /// Use `0.0.0.0` for every interface or `127.0.0.1` for local only.
    #[arg(long, env = "SHELLY_BIND")]
    bind: Option<String>,

    /// PEM certificate chain for the TLS listener.
    #[arg(long, env = "SHELLY_CERT")]
    cert: Option<PathBuf>,

    /// PEM private key for the TLS listener.
    #[arg(long, env = "SHELLY_KEY")]
    key: Option<PathBuf>,

    /// Directory served at `/` on the TLS listener.
    #[arg(long, env = "SHELLY_PUBLIC_DIR")]
    public_dir: Option<PathBuf>,

    /// JSON device file.
    #[arg(long, env = "SHELLY_DEVICES")]
    devices: Option<PathBuf>,

    /// Seconds allowed for writing one frame to a browser.
    #[arg(long, env = "SHELLY_WRITE_WAIT")]
    write_wait: Option<u64>,

    /// Seconds a session may stay silent before it is closed.
    #[arg(long, env = "SHELLY_PONG_WAIT")]
    pong_wait: Option<u64>,

    /// Seconds between pings.  Must be shorter than the pong wait.
    #[arg(long, env = "SHELLY_PING_PERIOD")]
    ping_period: Option<u64>,

    /// Largest inbound WebSocket message, in bytes.
    #[arg(long, env = "SHELLY_MAX_MESSAGE_SIZE")]
    max_message_size: Option<usize>,

    /// Send every inbound message back to the session it came from.
    #[arg(long, env = "SHELLY_ECHO")]
    echo: bool,

    /// Message queued first on every new session.
    #[arg(long, env = "SHELLY_GREETING")]
    greeting: Option<String>,
}

impl Cli {
    /// Writes every option given on the command line over `settings`.
    fn apply(self, settings: &mut GatewaySettings) {
        let listeners = &mut settings.listeners;
        if let Some(port) = self.plain_port {
            listeners.plain_port = port;
        }
        if let Some(port) = self.tls_port {
            listeners.tls_port = port;
        }
        if let Some(bind) = self.bind {
            listeners.bind = bind;
        }

        if let Some(cert) = self.cert {
            settings.tls.cert = cert;
        }
        if let Some(key) = self.key {
            settings.tls.key = key;
        }
        if let Some(dir) = self.public_dir {
            settings.files.public_dir = dir;
        }
        if let Some(devices) = self.devices {
            settings.files.devices = devices;
        }

        let session = &mut settings.session;
        if let Some(secs) = self.write_wait {
            session.write_wait_secs = secs;
        }
        if let Some(secs) = self.pong_wait {
            session.pong_wait_secs = secs;
        }
        if let Some(secs) = self.ping_period {
            session.ping_period_secs = Some(secs);
        }
        if let Some(size) = self.max_message_size {
            session.max_message_size = size;
        }
        if self.echo {
            session.echo = true;
        }
        if let Some(greeting) = self.greeting {
            session.greeting = Some(greeting);
        }
    }

    /// Loads the settings file (if any), applies the CLI overrides and
    /// validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file cannot be read or parsed, or if
    /// the combined values are invalid (bad bind address, ping period not
    /// shorter than pong wait, zero sizes).
    fn into_gateway_config(self) -> anyhow::Result<GatewayConfig> {
        let mut settings = match &self.settings {
            Some(path) => load_settings(path)
                .with_context(|| format!("failed to load settings from {}", path.display()))?,
            None => GatewaySettings::default(),
        };
        self.apply(&mut settings);
        settings
            .into_config()
            .context("invalid gateway configuration")
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. `tracing_subscriber` is initialised.  The log level comes from
///    `RUST_LOG` (e.g. `RUST_LOG=debug`) and defaults to `info`.
/// 2. CLI arguments and the settings file become a [`GatewayConfig`].
/// 3. The device file is loaded.  A missing or broken file is only a warning.
/// 4. [`ServiceRuntime::run`] starts both listeners and waits for the first
///    one to fail; the process then exits with status 1.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ─────────────────────────────────────────────────────────
    let config = Cli::parse().into_gateway_config()?;

    info!(
        "Shelly gateway starting, plaintext={}, tls={}, public={}",
        config.plain_addr,
        config.tls_addr,
        config.public_dir.display()
    );

    let devices = Arc::new(DeviceStore::default());
    reload_or_keep(&devices, &config.devices_path).await;

    let relay = HttpRelayClient::new(config.relay_timeout)
        .context("failed to build the HTTP relay client")?;

    // ── Listeners ─────────────────────────────────────────────────────────────
    let failure = ServiceRuntime::new(config, devices, Arc::new(relay))
        .run()
        .await;

    error!("{failure}");
    std::process::exit(1);
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cli_without_arguments_overrides_nothing() {
        // Arrange
        let cli = Cli::parse_from(["shelly-gateway"]);

        // Act
        let config = cli.into_gateway_config().unwrap();

        // Assert
        assert_eq!(config, GatewayConfig::default());
    }

    #[test]
    fn test_cli_port_overrides() {
        let cli = Cli::parse_from(["shelly-gateway", "--plain-port", "8080", "--tls-port", "8443"]);
        let config = cli.into_gateway_config().unwrap();
        assert_eq!(config.plain_addr.port(), 8080);
        assert_eq!(config.tls_addr.port(), 8443);
    }

    #[test]
    fn test_cli_bind_applies_to_both_listeners() {
        let cli = Cli::parse_from(["shelly-gateway", "--bind", "127.0.0.1"]);
        let config = cli.into_gateway_config().unwrap();
        assert_eq!(config.plain_addr.to_string(), "127.0.0.1:7863");
        assert_eq!(config.tls_addr.to_string(), "127.0.0.1:7862");
    }

    #[test]
    fn test_cli_invalid_bind_returns_error() {
        // Arrange: provide an invalid IP address string
        let cli = Cli {
            bind: Some("not.an.ip".to_string()),
            ..Cli::default()
        };

        // Act
        let result = cli.into_gateway_config();

        // Assert: must return an error, not panic
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_session_timers() {
        let cli = Cli::parse_from([
            "shelly-gateway",
            "--write-wait",
            "2",
            "--pong-wait",
            "30",
            "--ping-period",
            "20",
        ]);
        let config = cli.into_gateway_config().unwrap();
        let liveness = config.session.liveness;
        assert_eq!(liveness.write_wait(), Duration::from_secs(2));
        assert_eq!(liveness.pong_wait(), Duration::from_secs(30));
        assert_eq!(liveness.ping_period(), Duration::from_secs(20));
    }

    #[test]
    fn test_cli_ping_period_not_shorter_than_pong_wait_is_rejected() {
        let cli = Cli::parse_from(["shelly-gateway", "--pong-wait", "10", "--ping-period", "10"]);
        assert!(cli.into_gateway_config().is_err());
    }

    #[test]
    fn test_cli_echo_and_greeting() {
        let cli = Cli::parse_from(["shelly-gateway", "--echo", "--greeting", "Hi Client!"]);
        let config = cli.into_gateway_config().unwrap();
        assert!(config.session.echo);
        assert_eq!(config.session.greeting.as_deref(), Some("Hi Client!"));
    }

    #[test]
    fn test_cli_overrides_settings_file() {
        // Arrange: a settings file choosing one port and enabling echo
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        std::fs::write(
            &path,
            "[listeners]\nplain_port = 9000\ntls_port = 9443\n\n[session]\necho = true\n",
        )
        .unwrap();
        let settings = path.to_str().unwrap();

        // Act: the flag replaces only the TLS port
        let cli = Cli::parse_from(["shelly-gateway", "--settings", settings, "--tls-port", "8443"]);
        let config = cli.into_gateway_config().unwrap();

        // Assert
        assert_eq!(config.plain_addr.port(), 9000);
        assert_eq!(config.tls_addr.port(), 8443);
        assert!(config.session.echo);
    }

    #[test]
    fn test_cli_unreadable_settings_file_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[listeners\n").unwrap();

        let cli = Cli {
            settings: Some(path),
            ..Cli::default()
        };

        assert!(cli.into_gateway_config().is_err());
    }

    #[test]
    fn test_cli_file_paths() {
        let cli = Cli::parse_from([
            "shelly-gateway",
            "--cert",
            "/etc/shelly/fullchain.pem",
            "--key",
            "/etc/shelly/privkey.pem",
            "--public-dir",
            "/srv/shelly",
            "--devices",
            "/etc/shelly/devices.json",
        ]);
        let config = cli.into_gateway_config().unwrap();
        assert_eq!(config.tls.cert, PathBuf::from("/etc/shelly/fullchain.pem"));
        assert_eq!(config.tls.key, PathBuf::from("/etc/shelly/privkey.pem"));
        assert_eq!(config.public_dir, PathBuf::from("/srv/shelly"));
        assert_eq!(config.devices_path, PathBuf::from("/etc/shelly/devices.json"));
    }
}
