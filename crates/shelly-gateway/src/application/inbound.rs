//! What a session does with normalised inbound messages.
//!
//! The reader loop never writes to the socket.  When a handler wants to answer
//! it goes through [`Outbound`], which is the session's own queue, so the
//! answer is sent by the writer loop like every other message.

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// The outbound queue refused a message.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum EnqueueError {
    /// The queue is at capacity.
    #[error("outbound queue is full")]
    Full,
    /// The session has shut down.
    #[error("session is closed")]
    Closed,
}

/// Producer side of a session's outbound queue.
pub trait Outbound: Send + Sync {
    /// Session the queue belongs to.
    fn session_id(&self) -> Uuid;

    /// Queues `message` without waiting.
    fn enqueue(&self, message: Bytes) -> Result<(), EnqueueError>;
}

/// Receives every normalised application message a session reads.
pub trait InboundHandler: Send + Sync {
    fn on_message(&self, session: &dyn Outbound, message: Bytes);
}

/// Logs the message and drops it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogInbound;

impl InboundHandler for LogInbound {
    fn on_message(&self, session: &dyn Outbound, message: Bytes) {
        debug!(
            "session {}: received {} bytes: {}",
            session.session_id(),
            message.len(),
            String::from_utf8_lossy(&message)
        );
    }
}

/// Sends every message back to the session it came from.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoInbound;

impl InboundHandler for EchoInbound {
    fn on_message(&self, session: &dyn Outbound, message: Bytes) {
        if let Err(e) = session.enqueue(message) {
            // A full queue means the peer is not draining; the message is dropped.
            warn!("session {}: echo dropped: {e}", session.session_id());
        }
    }
}
