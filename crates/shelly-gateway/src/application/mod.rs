//! Application layer for shelly-gateway.
//!
//! Decides *what* happens to a request or a message; the infrastructure layer
//! owns the sockets, files and tasks.
//!
//! - `dispatcher`: device commands from both listeners, with the trust check
//!   and the relay client seam.
//! - `inbound`: what a WebSocket session does with messages it reads.

pub mod dispatcher;
pub mod inbound;

pub use dispatcher::{
    DeviceCommandDispatcher, DispatchError, DispatchOutcome, RelayClient, RelayError,
};
pub use inbound::{EchoInbound, EnqueueError, InboundHandler, LogInbound, Outbound};
