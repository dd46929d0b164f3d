//! Domain layer for shelly-gateway.
//!
//! Plain data owned by the process: the runtime configuration and the
//! swappable device table.  No sockets, no file reads, no tokio.

pub mod config;
pub mod devices;

pub use config::{GatewayConfig, SessionConfig, TlsPaths};
pub use devices::DeviceStore;
