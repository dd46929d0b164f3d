//! Liveness timers for duplex sessions.
//!
//! Three durations govern every session:
//!
//! | Timer         | Default | Meaning                                            |
//! |---------------|---------|----------------------------------------------------|
//! | `write_wait`  | 10 s    | Deadline for one frame (data, ping or close) write |
//! | `pong_wait`   | 60 s    | Read deadline, renewed by every inbound frame      |
//! | `ping_period` | 54 s    | Interval between pings sent by the writer          |
//!
//! The ping period must be shorter than the pong wait: a healthy peer answers
//! each ping with a pong, and that pong has to arrive before the read deadline
//! runs out.

use std::time::Duration;

use thiserror::Error;

/// Default deadline for writing one frame.
pub const WRITE_WAIT: Duration = Duration::from_secs(10);

const PONG_WAIT_SECS: u64 = 60;

/// Default read deadline.
pub const PONG_WAIT: Duration = Duration::from_secs(PONG_WAIT_SECS);

/// Default ping period: nine tenths of [`PONG_WAIT`].
pub const PING_PERIOD: Duration = Duration::from_secs(PONG_WAIT_SECS * 9 / 10);

/// Largest inbound message accepted from a peer, in bytes.
pub const MAX_MESSAGE_SIZE: usize = 512;

/// Capacity of each session's outbound queue, in messages.
pub const OUTBOUND_CAPACITY: usize = 256;

/// A timer combination that violates the liveness invariant.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LivenessError {
    /// A timer was zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    /// Pings would not refresh the read deadline in time.
    #[error("ping period ({ping_period:?}) must be shorter than pong wait ({pong_wait:?})")]
    PingNotShorterThanPongWait {
        ping_period: Duration,
        pong_wait: Duration,
    },
}

/// Validated set of liveness timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Liveness {
    write_wait: Duration,
    pong_wait: Duration,
    ping_period: Duration,
}

impl Liveness {
    /// Builds a timer set after checking the invariant.
    ///
    /// # Errors
    ///
    /// [`LivenessError::Zero`] for a zero duration and
    /// [`LivenessError::PingNotShorterThanPongWait`] when
    /// `ping_period >= pong_wait`.
    pub fn new(
        write_wait: Duration,
        pong_wait: Duration,
        ping_period: Duration,
    ) -> Result<Self, LivenessError> {
        if write_wait.is_zero() {
            return Err(LivenessError::Zero("write wait"));
        }
        if pong_wait.is_zero() {
            return Err(LivenessError::Zero("pong wait"));
        }
        if ping_period.is_zero() {
            return Err(LivenessError::Zero("ping period"));
        }
        if ping_period >= pong_wait {
            return Err(LivenessError::PingNotShorterThanPongWait {
                ping_period,
                pong_wait,
            });
        }
        Ok(Self {
            write_wait,
            pong_wait,
            ping_period,
        })
    }

    /// Derives the ping period as nine tenths of `pong_wait`.
    ///
    /// # Errors
    ///
    /// Same as [`Liveness::new`].
    pub fn from_pong_wait(
        write_wait: Duration,
        pong_wait: Duration,
    ) -> Result<Self, LivenessError> {
        Self::new(write_wait, pong_wait, pong_wait * 9 / 10)
    }

    pub fn write_wait(&self) -> Duration {
        self.write_wait
    }

    pub fn pong_wait(&self) -> Duration {
        self.pong_wait
    }

    pub fn ping_period(&self) -> Duration {
        self.ping_period
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self {
            write_wait: WRITE_WAIT,
            pong_wait: PONG_WAIT,
            ping_period: PING_PERIOD,
        }
    }
}
