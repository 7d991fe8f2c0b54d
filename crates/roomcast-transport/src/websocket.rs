//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! Each accepted socket is split in two. The read half stays with the
//! [`WebSocketConnection`] (owned by the connection handler task); the
//! write half is driven by a writer task fed through an unbounded channel.
//! [`WebSocketMember`] holds the channel sender, so rooms can deliver to a
//! client from any task without touching the socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::{Connection, DeliveryError, Member, MemberId, Transport, TransportError};

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// How long a client gets to complete the WebSocket upgrade.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts the next TCP connection without touching the WebSocket
    /// handshake, so one slow client cannot hold up the accept loop.
    pub async fn accept_tcp(&mut self) -> Result<PendingConnection, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        Ok(PendingConnection { stream, addr })
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    /// Accepts a socket and completes its handshake before returning.
    ///
    /// The handshake is bounded by [`HANDSHAKE_TIMEOUT`], but a server loop
    /// should prefer [`accept_tcp`](WebSocketTransport::accept_tcp) and run
    /// the handshake in the per-connection task.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        self.accept_tcp().await?.handshake().await
    }

    /// The listener socket is released when the transport is dropped; this
    /// only logs the request.
    async fn shutdown(&self) -> Result<(), Self::Error> {
        tracing::info!("WebSocket transport shutting down");
        Ok(())
    }
}

/// A TCP connection whose WebSocket handshake has not run yet.
pub struct PendingConnection {
    stream: TcpStream,
    addr: SocketAddr,
}

impl PendingConnection {
    /// The peer address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Runs the WebSocket upgrade, giving up after [`HANDSHAKE_TIMEOUT`].
    pub async fn handshake(self) -> Result<WebSocketConnection, TransportError> {
        let addr = self.addr;
        let ws = match tokio::time::timeout(
            HANDSHAKE_TIMEOUT,
            tokio_tungstenite::accept_async(self.stream),
        )
        .await
        {
            Ok(Ok(ws)) => ws,
            Ok(Err(e)) => {
                return Err(TransportError::AcceptFailed(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    e,
                )));
            }
            Err(_) => {
                tracing::debug!(%addr, "WebSocket handshake timed out");
                return Err(TransportError::AcceptFailed(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "websocket handshake timed out",
                )));
            }
        };

        let id = MemberId::generate();
        tracing::debug!(%id, %addr, "accepted WebSocket connection");

        Ok(WebSocketConnection::spawn(id, ws))
    }
}

/// Frame written to the client for every delivery.
#[derive(Serialize)]
struct OutboundFrame<'a> {
    event: &'a str,
    args: &'a [Value],
}

/// The delivery side of a WebSocket client.
///
/// Cheap to share behind an `Arc`; delivering only enqueues a text frame
/// for the connection's writer task.
#[derive(Debug)]
pub struct WebSocketMember {
    id: MemberId,
    outbound: mpsc::UnboundedSender<Message>,
}

impl WebSocketMember {
    fn enqueue(&self, msg: Message) -> Result<(), DeliveryError> {
        self.outbound
            .send(msg)
            .map_err(|_| DeliveryError::Closed(self.id.clone()))
    }
}

impl Member for WebSocketMember {
    fn id(&self) -> &MemberId {
        &self.id
    }

    fn deliver(&self, message: &str, args: &[Value]) -> Result<(), DeliveryError> {
        let frame = OutboundFrame {
            event: message,
            args,
        };
        let text = serde_json::to_string(&frame).map_err(DeliveryError::Encode)?;
        self.enqueue(Message::Text(text.into()))
    }
}

/// A single WebSocket connection (the read half plus its member handle).
pub struct WebSocketConnection {
    member: Arc<WebSocketMember>,
    stream: SplitStream<WsStream>,
}

impl WebSocketConnection {
    fn spawn(id: MemberId, ws: WsStream) -> Self {
        let (mut sink, stream) = ws.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

        let writer_id = id.clone();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = sink.send(msg).await {
                    tracing::debug!(member = %writer_id, error = %e, "websocket write failed");
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
            tracing::trace!(member = %writer_id, "websocket writer stopped");
        });

        Self {
            member: Arc::new(WebSocketMember { id, outbound: tx }),
            stream,
        }
    }
}

impl Connection for WebSocketConnection {
    type Member = WebSocketMember;
    type Error = TransportError;

    fn member(&self) -> Arc<Self::Member> {
        Arc::clone(&self.member)
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>, Self::Error> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // skip ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.member
            .enqueue(Message::Close(None))
            .map_err(|e| TransportError::ConnectionClosed(e.to_string()))
    }

    fn id(&self) -> &MemberId {
        &self.member.id
    }
}
