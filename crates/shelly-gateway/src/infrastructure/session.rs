//! Duplex WebSocket session: one reader loop, one writer loop.
//!
//! Each upgraded connection is split into a read half and a write half.  The
//! read half goes to [`read_loop`] and the write half to [`write_loop`]; each
//! loop runs in its own Tokio task and is the only code that ever touches its
//! half.  Nothing else can write to the socket: producers hold a
//! [`SessionHandle`], which only reaches the bounded outbound queue the writer
//! drains.
//!
//! ```text
//!                   ┌──────────── Session ────────────┐
//!  producers ──▶ SessionHandle ──▶ queue (256) ──▶ write_loop ──▶ sink  ──▶ peer
//!                   │                                              ▲
//!                   │                                  ping ticker ┘
//!  peer ──▶ stream ──▶ read_loop ──▶ InboundHandler
//!                   └─────────── Lifecycle (shared) ───────────────┘
//! ```
//!
//! # Shutdown
//!
//! Either loop may hit a terminal condition first (read error, read deadline,
//! close frame, write error, queue closed).  It then calls
//! [`Lifecycle::close`], which is idempotent and wakes the sibling wherever it
//! is waiting.  The session moves `Open → Closing` on the first close and
//! `Closing → Closed` once both loops have returned.  Cleanup runs from a drop
//! guard, so it also happens if a loop panics.

use std::fmt::Display;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{close_code, Message};
use bytes::Bytes;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use shelly_core::{normalize_inbound, FrameBuilder, FramePayload, Liveness};

use crate::application::{EnqueueError, InboundHandler, Outbound};

// ── Lifecycle ─────────────────────────────────────────────────────────────────

/// Observable session state shared by both loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Both loops active.
    Open,
    /// One loop closed the connection; the other may still be returning.
    Closing,
    /// Both loops have returned.
    Closed,
}

const OPEN: u8 = 0;
const CLOSING: u8 = 1;
const CLOSED: u8 = 2;

/// Close signal and state cell shared by the reader and the writer.
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
    running_loops: AtomicU8,
    closed: CancellationToken,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(OPEN),
            running_loops: AtomicU8::new(2),
            closed: CancellationToken::new(),
        }
    }

    /// Closes the connection.  Safe to call any number of times from any
    /// task; returns `true` only for the call that moved the session out of
    /// `Open`.
    pub fn close(&self) -> bool {
        let first = self
            .state
            .compare_exchange(OPEN, CLOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        self.closed.cancel();
        first
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        match self.state.load(Ordering::Acquire) {
            OPEN => SessionState::Open,
            CLOSING => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    fn loop_exited(&self) {
        if self.running_loops.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.state.store(CLOSED, Ordering::Release);
        }
    }
}

/// Runs a loop's cleanup on every exit path, unwinding included.
struct LoopGuard(Arc<Lifecycle>);

impl Drop for LoopGuard {
    fn drop(&mut self) {
        self.0.close();
        self.0.loop_exited();
    }
}

// ── Session and handle ────────────────────────────────────────────────────────

/// Producer handle for a session's outbound queue.
///
/// Cloning is cheap.  The queue closes once every handle (including the one
/// the [`Session`] itself holds) has been dropped; the writer then sends a
/// close frame and exits.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    tx: mpsc::Sender<Bytes>,
    lifecycle: Arc<Lifecycle>,
}

impl SessionHandle {
    /// Session identifier used in log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.lifecycle.state()
    }

    /// Queues `message`, waiting for room when the queue is full.
    ///
    /// # Errors
    ///
    /// [`EnqueueError::Closed`] once the writer has stopped.
    pub async fn send(&self, message: impl Into<Bytes>) -> Result<(), EnqueueError> {
        self.tx
            .send(message.into())
            .await
            .map_err(|_| EnqueueError::Closed)
    }

    /// Queues `message` without waiting.
    ///
    /// # Errors
    ///
    /// [`EnqueueError::Full`] at capacity, [`EnqueueError::Closed`] once the
    /// writer has stopped.
    pub fn try_send(&self, message: impl Into<Bytes>) -> Result<(), EnqueueError> {
        self.tx.try_send(message.into()).map_err(|e| match e {
            TrySendError::Full(_) => EnqueueError::Full,
            TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }

    /// Closes the connection from outside the loops.
    pub fn close(&self) -> bool {
        self.lifecycle.close()
    }
}

impl Outbound for SessionHandle {
    fn session_id(&self) -> Uuid {
        self.id
    }

    fn enqueue(&self, message: Bytes) -> Result<(), EnqueueError> {
        self.try_send(message)
    }
}

/// One upgraded connection's shared state.
///
/// Owned by the reader loop.  The matching queue receiver goes to the writer.
#[derive(Debug)]
pub struct Session {
    handle: SessionHandle,
}

impl Session {
    /// Creates a session with an empty queue of `capacity` messages.
    ///
    /// Returns the session and the receiver the writer loop drains.
    pub fn open(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = SessionHandle {
            id: Uuid::new_v4(),
            tx,
            lifecycle: Arc::new(Lifecycle::new()),
        };
        (Self { handle }, rx)
    }

    pub fn id(&self) -> Uuid {
        self.handle.id
    }

    /// A new producer handle.
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// The lifecycle cell shared with the writer.
    pub fn lifecycle(&self) -> Arc<Lifecycle> {
        Arc::clone(&self.handle.lifecycle)
    }
}

// ── Reader loop ───────────────────────────────────────────────────────────────

/// Why the reader loop returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadEnd {
    /// The peer sent a close frame (with its close code, if any).
    PeerClosed(Option<u16>),
    /// The stream ended without a close frame.
    StreamEnded,
    /// Nothing arrived within the pong wait.
    DeadlineExceeded,
    /// The transport reported an error.
    Transport(String),
    /// The writer closed the connection first.
    SiblingClosed,
}

impl ReadEnd {
    /// `true` for endings the operator should hear about.
    ///
    /// Only going away and abnormal closure (a stream that stops without a
    /// close frame) are routine.  A close frame without a code counts as
    /// "no status received" and is reported like any other code.
    pub fn is_unexpected(&self) -> bool {
        match self {
            ReadEnd::StreamEnded | ReadEnd::SiblingClosed => false,
            ReadEnd::PeerClosed(Some(code)) => {
                !matches!(*code, close_code::AWAY | close_code::ABNORMAL)
            }
            ReadEnd::PeerClosed(None) | ReadEnd::DeadlineExceeded | ReadEnd::Transport(_) => true,
        }
    }
}

/// Reads frames until a terminal condition, then closes the connection.
///
/// The read deadline starts at now + pong wait and is pushed out by the same
/// amount on every inbound frame, pongs included.  Application payloads are
/// normalised and passed to `inbound`.
pub async fn read_loop<S, E>(
    session: Session,
    mut stream: S,
    inbound: Arc<dyn InboundHandler>,
    liveness: Liveness,
) -> ReadEnd
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let lifecycle = session.lifecycle();
    let _guard = LoopGuard(Arc::clone(&lifecycle));
    let id = session.id();
    let pong_wait = liveness.pong_wait();
    let mut deadline = Instant::now() + pong_wait;

    let end = loop {
        let next = tokio::select! {
            () = lifecycle.closed() => break ReadEnd::SiblingClosed,
            next = time::timeout_at(deadline, stream.next()) => next,
        };

        let message = match next {
            Err(_) => break ReadEnd::DeadlineExceeded,
            Ok(None) => break ReadEnd::StreamEnded,
            Ok(Some(Err(e))) => break ReadEnd::Transport(e.to_string()),
            Ok(Some(Ok(message))) => message,
        };

        deadline = Instant::now() + pong_wait;

        match message {
            Message::Text(text) => {
                inbound.on_message(&session.handle, normalize_inbound(text.as_str().as_bytes()));
            }
            Message::Binary(data) => {
                inbound.on_message(&session.handle, normalize_inbound(&data));
            }
            Message::Pong(_) => trace!("session {id}: pong"),
            // The WebSocket library queues the pong reply itself.
            Message::Ping(_) => trace!("session {id}: ping"),
            Message::Close(frame) => break ReadEnd::PeerClosed(frame.map(|f| f.code)),
        }
    };

    if end.is_unexpected() {
        warn!("session {id}: reader stopped: {end:?}");
    } else {
        debug!("session {id}: reader stopped: {end:?}");
    }
    end
}

// ── Writer loop ───────────────────────────────────────────────────────────────

/// A frame write that did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteFailure {
    /// The write wait elapsed.
    DeadlineExceeded,
    /// The sink returned an error.
    Transport(String),
}

/// Why the writer loop returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteEnd {
    /// Every producer handle was dropped; a close frame was sent.
    QueueClosed,
    /// Writing a data frame failed.
    Write(WriteFailure),
    /// Writing a ping failed.
    Ping(WriteFailure),
    /// The reader closed the connection first.
    SiblingClosed,
}

/// Drains `queue` into `sink` and pings every ping period, until a terminal
/// condition; then closes the sink.
///
/// A queued message wakes the writer, which also takes exactly the messages
/// already waiting at that instant and coalesces them into the same frame.
pub async fn write_loop<K>(
    lifecycle: Arc<Lifecycle>,
    id: Uuid,
    mut queue: mpsc::Receiver<Bytes>,
    mut sink: K,
    liveness: Liveness,
) -> WriteEnd
where
    K: Sink<Message> + Unpin,
    K::Error: Display,
{
    let _guard = LoopGuard(Arc::clone(&lifecycle));
    let write_wait = liveness.write_wait();
    let period = liveness.ping_period();
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let end = loop {
        tokio::select! {
            () = lifecycle.closed() => break WriteEnd::SiblingClosed,
            queued = queue.recv() => {
                let Some(first) = queued else {
                    if let Err(e) = write_frame(&mut sink, Message::Close(None), write_wait).await {
                        debug!("session {id}: close frame not sent: {e:?}");
                    }
                    break WriteEnd::QueueClosed;
                };
                let frame = coalesce_queued(&mut queue, first);
                if let Err(e) = write_frame(&mut sink, into_message(frame), write_wait).await {
                    break WriteEnd::Write(e);
                }
            }
            _ = ticker.tick() => {
                let ping = Message::Ping(Bytes::new());
                if let Err(e) = write_frame(&mut sink, ping, write_wait).await {
                    break WriteEnd::Ping(e);
                }
            }
        }
    };

    if time::timeout(write_wait, sink.close()).await.is_err() {
        debug!("session {id}: sink close timed out");
    }

    match &end {
        WriteEnd::Write(_) | WriteEnd::Ping(_) => warn!("session {id}: writer stopped: {end:?}"),
        WriteEnd::QueueClosed | WriteEnd::SiblingClosed => {
            debug!("session {id}: writer stopped: {end:?}");
        }
    }
    end
}

/// Builds one frame from `first` plus everything queued right now.
///
/// The count is taken once, before draining, so a message that arrives while
/// the frame is being built goes into the next frame.
fn coalesce_queued(queue: &mut mpsc::Receiver<Bytes>, first: Bytes) -> FramePayload {
    let mut builder = FrameBuilder::new(&first);
    let waiting = queue.len();
    for _ in 0..waiting {
        match queue.try_recv() {
            Ok(next) => builder.push(&next),
            Err(_) => break,
        }
    }
    builder.finish()
}

fn into_message(frame: FramePayload) -> Message {
    match frame {
        FramePayload::Text(text) => Message::Text(text.into()),
        FramePayload::Binary(data) => Message::Binary(data),
    }
}

async fn write_frame<K>(sink: &mut K, message: Message, wait: Duration) -> Result<(), WriteFailure>
where
    K: Sink<Message> + Unpin,
    K::Error: Display,
{
    match time::timeout(wait, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(WriteFailure::Transport(e.to_string())),
        Err(_) => Err(WriteFailure::DeadlineExceeded),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
