//! `RoomcastServer` builder and server loop.
//!
//! This is the entry point for running a Roomcast node. It ties together
//! all the layers: transport → protocol → coordinator → broker.

use std::sync::Arc;

use roomcast_broker::Broker;
use roomcast_transport::{Transport, WebSocketTransport};

use crate::coordinator::BroadcastCoordinator;
use crate::handler::handle_connection;
use crate::listener::RelayListener;
use crate::{RelayConfig, RoomcastError};

/// Builder for configuring and starting a Roomcast server.
///
/// # Example
///
/// ```rust,no_run
/// use roomcast::prelude::*;
///
/// # async fn start() -> Result<(), RoomcastError> {
/// let server = RoomcastServer::builder()
///     .bind("0.0.0.0:8080")
///     .build(MemoryBroker::new())
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct RoomcastServerBuilder {
    bind_addr: String,
    relay_config: RelayConfig,
}

impl RoomcastServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            relay_config: RelayConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the relay configuration.
    pub fn relay_config(mut self, config: RelayConfig) -> Self {
        self.relay_config = config;
        self
    }

    /// Binds the listener, starts the coordinator on `broker`, and returns
    /// a server ready to [`run`](RoomcastServer::run).
    pub async fn build<B: Broker>(self, broker: B) -> Result<RoomcastServer<B>, RoomcastError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let (coordinator, listener) = BroadcastCoordinator::start(&self.relay_config, broker).await?;

        Ok(RoomcastServer {
            transport,
            coordinator,
            listener,
        })
    }
}

impl Default for RoomcastServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A Roomcast node accepting WebSocket clients.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct RoomcastServer<B: Broker> {
    transport: WebSocketTransport,
    coordinator: Arc<BroadcastCoordinator<B>>,
    listener: RelayListener,
}

impl RoomcastServer<roomcast_broker::MemoryBroker> {
    /// Creates a new builder.
    pub fn builder() -> RoomcastServerBuilder {
        RoomcastServerBuilder::new()
    }
}

impl<B: Broker> RoomcastServer<B> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The coordinator shared by every connection on this node. Server code
    /// can use it to broadcast into rooms directly.
    pub fn coordinator(&self) -> Arc<BroadcastCoordinator<B>> {
        Arc::clone(&self.coordinator)
    }

    /// Runs the server accept loop.
    ///
    /// Spawns a task per accepted socket that runs the WebSocket handshake
    /// and then the connection handler. Returns when the relay
    /// listener stops, since the node can no longer see other processes'
    /// broadcasts after that.
    pub async fn run(self) -> Result<(), RoomcastError> {
        let Self {
            mut transport,
            coordinator,
            listener,
        } = self;
        tracing::info!(origin = %coordinator.origin(), "roomcast server running");

        let relay = listener.finished();
        tokio::pin!(relay);

        loop {
            tokio::select! {
                exit = &mut relay => {
                    tracing::error!(?exit, "relay listener stopped, shutting down");
                    transport.shutdown().await?;
                    return Ok(());
                }
                accepted = transport.accept_tcp() => match accepted {
                    Ok(pending) => {
                        let coordinator = Arc::clone(&coordinator);
                        tokio::spawn(async move {
                            let peer = pending.peer_addr();
                            let conn = match pending.handshake().await {
                                Ok(conn) => conn,
                                Err(e) => {
                                    tracing::debug!(%peer, error = %e, "handshake failed");
                                    return;
                                }
                            };
                            if let Err(e) = handle_connection(conn, coordinator).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }
    }

    /// Unsubscribes the relay and drops the listener socket.
    pub async fn shutdown(self) -> Result<(), RoomcastError> {
        let exit = self.listener.stop().await;
        tracing::info!(?exit, "relay listener stopped");
        self.transport.shutdown().await?;
        Ok(())
    }
}
