//! Wire rules for a duplex browser session.
//!
//! The reader and writer loops in `shelly-gateway` own the socket halves and
//! the timers; the decisions they make about bytes and durations live here.

/// Inbound normalisation and outbound coalescing.
pub mod frame;

/// Write wait, pong wait and ping period.
pub mod liveness;
