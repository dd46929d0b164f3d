//! Inbound normalisation and outbound coalescing.
//!
//! # Coalescing
//!
//! When the writer wakes up for a queued message it also takes every message
//! that was already waiting at that instant and packs them all into the same
//! frame, one per line:
//!
//! ```text
//! queue: [A] [B] [C]        →   frame: "A\nB\nC"
//! ```
//!
//! [`FrameBuilder`] does the packing.  It never reorders: messages appear in
//! the frame in the order they were pushed, which is the order they were
//! dequeued.

use bytes::{Bytes, BytesMut};

/// Separator placed between coalesced messages.
pub const FRAME_SEPARATOR: u8 = b'\n';

/// Normalises an inbound application payload.
///
/// Every newline becomes a single space, then leading and trailing ASCII
/// whitespace (including `\r`) is trimmed.  A multi-line message therefore
/// reaches the application as one line.
pub fn normalize_inbound(payload: &[u8]) -> Bytes {
    let replaced: Vec<u8> = payload
        .iter()
        .map(|&b| if b == b'\n' { b' ' } else { b })
        .collect();
    Bytes::copy_from_slice(replaced.trim_ascii())
}

/// Accumulates one outbound frame out of one or more queued messages.
#[derive(Debug)]
pub struct FrameBuilder {
    buf: BytesMut,
    messages: usize,
}

impl FrameBuilder {
    /// Starts a frame with its first message.
    pub fn new(first: &[u8]) -> Self {
        let mut buf = BytesMut::with_capacity(first.len());
        buf.extend_from_slice(first);
        Self { buf, messages: 1 }
    }

    /// Appends another message, preceded by [`FRAME_SEPARATOR`].
    pub fn push(&mut self, next: &[u8]) {
        self.buf.reserve(next.len() + 1);
        self.buf.extend_from_slice(&[FRAME_SEPARATOR]);
        self.buf.extend_from_slice(next);
        self.messages += 1;
    }

    /// Number of messages packed so far.
    pub fn message_count(&self) -> usize {
        self.messages
    }

    /// Finishes the frame and decides how it goes on the wire.
    pub fn finish(self) -> FramePayload {
        FramePayload::classify(self.buf.freeze())
    }
}

/// Outbound frame contents, typed for the WebSocket frame kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePayload {
    /// Valid UTF-8: sent as a text frame.
    Text(String),
    /// Anything else: sent as a binary frame.
    Binary(Bytes),
}

impl FramePayload {
    /// Text when the bytes are UTF-8, binary otherwise.
    pub fn classify(bytes: Bytes) -> Self {
        match std::str::from_utf8(&bytes) {
            Ok(text) => FramePayload::Text(text.to_owned()),
            Err(_) => FramePayload::Binary(bytes),
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        match self {
            FramePayload::Text(s) => s.len(),
            FramePayload::Binary(b) => b.len(),
        }
    }

    /// `true` for a zero-length payload.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
