//! # shelly-core
//!
//! Shared, I/O-free building blocks for the Shelly home-automation gateway.
//!
//! The gateway binary (`shelly-gateway`) owns every socket, file and timer.
//! This crate only describes *what* flows through them:
//!
//! - **`domain`** – Relay device records as they appear in the JSON device
//!   file, the lookup key used by the HTTP routes, and the command vocabulary
//!   (toggle, on/off event reports) together with the trust level each command
//!   requires.
//!
//! - **`session`** – The rules a duplex browser session follows on the wire:
//!   how inbound payloads are normalised, how queued outbound messages are
//!   coalesced into one frame, and the liveness timer values (write wait, pong
//!   wait, ping period) with the invariant that ties them together.
//!
//! Nothing here spawns tasks or touches the network, so every rule can be unit
//! tested and benchmarked without a runtime.

pub mod domain;
pub mod session;

pub use domain::command::{DeviceCommand, SwitchState, TrustLevel};
pub use domain::device::{Device, DeviceConfigError, DeviceTable};
pub use session::frame::{normalize_inbound, FrameBuilder, FramePayload};
pub use session::liveness::{Liveness, LivenessError};
