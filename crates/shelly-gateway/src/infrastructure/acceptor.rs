//! Session acceptor: turns an upgrade request into a running session.
//!
//! The `/wss` route hands every request to [`upgrade`].  A request that is not
//! a valid WebSocket handshake gets the rejection response and nothing else
//! happens.  A valid one is upgraded, split into its read and write halves,
//! and passed to [`SessionAcceptor::launch`], which spawns the two session
//! loops and returns straight away.
//!
//! The acceptor never waits for a session to finish, so one slow browser
//! cannot hold up the next handshake.

use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::{IntoResponse, Response};
use futures_util::{Sink, Stream, StreamExt};
use tracing::{info, warn};

use crate::application::{EchoInbound, InboundHandler, LogInbound};
use crate::domain::SessionConfig;
use crate::infrastructure::session::{read_loop, write_loop, Session, SessionHandle};

/// Starts a session for every accepted WebSocket.
#[derive(Clone)]
pub struct SessionAcceptor {
    config: Arc<SessionConfig>,
    inbound: Arc<dyn InboundHandler>,
}

impl SessionAcceptor {
    /// Builds an acceptor whose sessions echo or just log inbound messages,
    /// depending on `config.echo`.
    pub fn new(config: SessionConfig) -> Self {
        let inbound: Arc<dyn InboundHandler> = if config.echo {
            Arc::new(EchoInbound)
        } else {
            Arc::new(LogInbound)
        };
        Self::with_inbound(config, inbound)
    }

    /// Builds an acceptor with a custom inbound handler.
    pub fn with_inbound(config: SessionConfig, inbound: Arc<dyn InboundHandler>) -> Self {
        Self {
            config: Arc::new(config),
            inbound,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Spawns the reader and writer loops for one connection.
    ///
    /// The greeting, when configured, is queued before either loop starts so
    /// it is always the first frame the peer sees.  Returns a producer handle
    /// for the new session.
    pub fn launch<S, E, K>(&self, stream: S, sink: K, peer: SocketAddr) -> SessionHandle
    where
        S: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
        E: Display + Send + 'static,
        K: Sink<Message> + Unpin + Send + 'static,
        K::Error: Display,
    {
        let (session, queue) = Session::open(self.config.outbound_capacity);
        let handle = session.handle();
        info!("session {} opened for {peer}", handle.id());

        if let Some(greeting) = &self.config.greeting {
            // The queue is empty and has room for at least one message.
            if let Err(e) = handle.try_send(greeting.clone()) {
                warn!("session {}: greeting not queued: {e}", handle.id());
            }
        }

        let liveness = self.config.liveness;
        tokio::spawn(write_loop(
            session.lifecycle(),
            session.id(),
            queue,
            sink,
            liveness,
        ));
        tokio::spawn(read_loop(
            session,
            stream,
            Arc::clone(&self.inbound),
            liveness,
        ));

        handle
    }
}

/// `/wss` handler.
///
/// Origins are not checked: any page that can reach the TLS listener may open
/// a session.
pub async fn upgrade(
    State(acceptor): State<SessionAcceptor>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            warn!("upgrade from {peer} rejected: {rejection}");
            return rejection.into_response();
        }
    };

    ws.max_message_size(acceptor.config.max_message_size)
        .on_failed_upgrade(move |e| warn!("upgrade from {peer} failed: {e}"))
        .on_upgrade(move |socket| async move {
            let (sink, stream) = socket.split();
            acceptor.launch(stream, sink, peer);
        })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
