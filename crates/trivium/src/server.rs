//! `TriviumServer` builder and server loop.
//!
//! This is the entry point for running a Trivium server. It ties
//! together all the layers: transport → protocol → room.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use trivium_protocol::JsonCodec;
use trivium_room::{GameContent, GameOptions, RoomManager};

use crate::TriviumError;
use crate::handler::handle_connection;
use crate::transport::WebSocketTransport;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState {
    pub(crate) rooms: Mutex<RoomManager>,
    pub(crate) codec: JsonCodec,
    pub(crate) join_timeout: Duration,
    pub(crate) idle_timeout: Duration,
}

/// Builder for configuring and starting a Trivium server.
///
/// # Example
///
/// ```rust,ignore
/// let server = TriviumServer::builder()
///     .bind("0.0.0.0:8080")
///     .options(GameOptions::default())
///     .build(content)
///     .await?;
/// server.run().await
/// ```
pub struct TriviumServerBuilder {
    bind_addr: String,
    options: GameOptions,
    join_timeout: Duration,
    idle_timeout: Duration,
    reap_interval: Duration,
}

impl TriviumServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            options: GameOptions::default(),
            join_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            reap_interval: Duration::from_secs(1),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Options of every room the server creates.
    pub fn options(mut self, options: GameOptions) -> Self {
        self.options = options;
        self
    }

    /// How long a new socket has to send its join request.
    pub fn join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// Closes sockets that stay silent this long.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// How often finished rooms are collected.
    pub fn reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }

    /// Binds the listener. Every room plays with `content`.
    pub async fn build(self, content: GameContent) -> Result<TriviumServer, TriviumError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            rooms: Mutex::new(RoomManager::new(self.options, content)),
            codec: JsonCodec,
            join_timeout: self.join_timeout,
            idle_timeout: self.idle_timeout,
        });

        Ok(TriviumServer {
            transport,
            state,
            reap_interval: self.reap_interval,
        })
    }
}

impl Default for TriviumServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Trivium server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct TriviumServer {
    transport: WebSocketTransport,
    state: Arc<ServerState>,
    reap_interval: Duration,
}

impl TriviumServer {
    pub fn builder() -> TriviumServerBuilder {
        TriviumServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop.
    ///
    /// Spawns a handler task per socket and periodically drops the rooms
    /// whose game is over. Runs until the task is cancelled.
    pub async fn run(self) -> Result<(), TriviumError> {
        tracing::info!("Trivium server running");
        let mut reap = tokio::time::interval(self.reap_interval);

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(incoming) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            let addr = incoming.peer_addr();
                            let conn = match incoming.upgrade().await {
                                Ok(conn) => conn,
                                Err(e) => {
                                    tracing::debug!(%addr, error = %e, "handshake failed");
                                    return;
                                }
                            };
                            let conn_id = conn.id();
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(%conn_id, error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
                _ = reap.tick() => {
                    let finished = self.state.rooms.lock().await.reap();
                    for (room_id, outcome) in finished {
                        tracing::info!(
                            %room_id,
                            natural_end = outcome.natural_end,
                            players = outcome.replay.players.len(),
                            "game over"
                        );
                    }
                }
            }
        }
    }
}
