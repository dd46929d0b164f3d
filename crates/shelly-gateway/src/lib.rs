//! shelly-gateway library crate.
//!
//! A small home-automation gateway: it serves a browser UI over TLS, keeps a
//! live WebSocket session with every open page, and switches Shelly relays
//! when asked.  A second, plaintext listener receives the event callbacks the
//! relays push on the local network.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Browser (HTTPS + WebSocket)         Shelly relays (HTTP callbacks)
//!         ↕                                     ↓
//! [shelly-gateway]
//!   ├── domain/           GatewayConfig, SessionConfig, DeviceStore
//!   ├── application/      Device command dispatch, inbound message handling
//!   └── infrastructure/
//!         ├── session/    Reader and writer loops per WebSocket
//!         ├── acceptor/   /wss upgrade handler
//!         ├── routes/     Plaintext and TLS route tables
//!         ├── runtime/    Both listeners + failure channel
//!         └── storage/    Settings TOML, device JSON
//!         ↓
//! Shelly relays (HTTP GET /relay/{n}?turn=toggle)
//! ```
//!
//! # Layer rules
//!
//! - `domain` does no I/O and spawns no tasks.
//! - `application` depends on `domain` and `shelly-core`; I/O only reaches it
//!   through the `RelayClient` and `Outbound` traits.
//! - `infrastructure` depends on all other layers plus `tokio`, `axum`,
//!   `axum-server` and `reqwest`.

/// Domain layer: configuration and the device store.
pub mod domain;

/// Application layer: command dispatch and inbound message handling.
pub mod application;

/// Infrastructure layer: sessions, listeners, files and the relay client.
pub mod infrastructure;
