//! Parlor chat server.
//!
//! A single-room broadcast engine over TCP. The pieces map one-to-one onto
//! the connection lifecycle:
//!
//! - [`ChatServer`]: binds the endpoint and runs the accept loop, spawning one
//!   session task per connection. Accept never blocks on session work.
//! - `session`: the per-connection state machine - name handshake, then the
//!   relay loop that turns inbound units into broadcasts.
//! - [`Registry`]: the shared, mutex-guarded set of outbound channels, one per
//!   registered session. Broadcast fan-out happens under the same lock that
//!   guards membership, so joins and leaves can never race an in-flight
//!   broadcast and every recipient observes the same broadcast order.
//!
//! There is no history: events are forwarded to whoever is registered at the
//! moment of broadcast and then dropped. The sender receives its own
//! broadcasts like everyone else, which keeps one authoritative order instead
//! of client-side echo.

mod connection;
mod error;
mod registry;
mod session;

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

pub use error::ServerError;
pub use registry::{Outbound, Registry, SessionId};
use tokio::net::TcpListener;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (e.g. "0.0.0.0:1000").
    pub bind_address: String,
    /// Depth of each session's outbound queue. A broadcast to a session whose
    /// queue is full is dropped for that one session rather than stalling
    /// delivery to the rest of the room.
    pub channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0:1000".to_string(), channel_capacity: 64 }
    }
}

/// The listener: accepts connections and spawns an independent session task
/// for each one.
pub struct ChatServer {
    listener: TcpListener,
    registry: Arc<Registry>,
    next_session_id: AtomicU64,
    channel_capacity: usize,
}

impl ChatServer {
    /// Bind the listening endpoint.
    ///
    /// Bind failure is fatal at startup and reported, never retried.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.bind_address)
            .await
            .map_err(|source| ServerError::Bind { addr: config.bind_address.clone(), source })?;

        Ok(Self {
            listener,
            registry: Arc::new(Registry::new()),
            next_session_id: AtomicU64::new(1),
            channel_capacity: config.channel_capacity,
        })
    }

    /// Address the server is bound to.
    ///
    /// With port 0 this is where the kernel actually put us, which is what
    /// tests connect to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(ServerError::Transport)
    }

    /// Handle to the registry shared with every session.
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Run the accept loop.
    ///
    /// Accept errors on the bound listener are logged and the loop continues;
    /// they are not fatal. Session failures never reach this task.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!(addr = %self.local_addr()?, "server listening");

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
                    let registry = Arc::clone(&self.registry);
                    let capacity = self.channel_capacity;

                    tracing::debug!(session = id, %peer, "connection accepted");
                    tokio::spawn(session::run(stream, id, registry, capacity));
                },
                Err(error) => {
                    tracing::warn!(%error, "accept failed");
                },
            }
        }
    }
}
