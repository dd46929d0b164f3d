//! Infrastructure layer for shelly-gateway.
//!
//! The infrastructure layer handles all I/O: binding the two listeners,
//! upgrading browser connections to WebSocket sessions, reading files, and
//! sending relay requests to devices.
//!
//! # Responsibilities
//!
//! - `session`: the reader and writer loops of one WebSocket session
//! - `acceptor`: the `/wss` upgrade handler that launches sessions
//! - `routes`: the plaintext and TLS route tables
//! - `relay_client`: the outbound HTTP toggle request
//! - `runtime`: both listeners and the shared failure channel
//! - `tls`: crypto provider and certificate loading
//! - `storage`: the settings file and the device file
//!
//! # What does NOT belong here?
//!
//! - Trust rules and command handling (that is the application layer)
//! - Configuration types (that is the domain layer)
//! - Command-line parsing (that is done in `main.rs`)

pub mod acceptor;
pub mod relay_client;
pub mod routes;
pub mod runtime;
pub mod session;
pub mod storage;
pub mod tls;

// Re-export the primary entry points so `main.rs` can call them concisely.
pub use relay_client::HttpRelayClient;
pub use runtime::{ListenerError, ListenerFailure, ListenerKind, ServiceRuntime};
