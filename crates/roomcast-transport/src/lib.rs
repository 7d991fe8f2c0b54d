//! Client transport layer for Roomcast.
//!
//! Provides the [`Member`] trait (a locally connected client that rooms can
//! deliver to) and the [`Transport`] and [`Connection`] traits that abstract
//! over how clients connect.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::{DeliveryError, TransportError};
#[cfg(feature = "websocket")]
pub use websocket::{
    HANDSHAKE_TIMEOUT, PendingConnection, WebSocketConnection, WebSocketMember, WebSocketTransport,
};

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of a connected client.
///
/// Identifiers travel between processes as suppression targets, so they
/// must be unique across the whole deployment, not just one process.
/// [`MemberId::generate`] produces a random UUID for that reason.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(String);

impl MemberId {
    /// Wraps an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh, fleet-unique identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the identifier, returning the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for MemberId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for MemberId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// A locally connected client that can receive room broadcasts.
///
/// Members are process-local handles. They are stored in rooms as
/// `Arc<dyn Member>` and never serialized; only their [`MemberId`]
/// crosses the process boundary.
///
/// `deliver` must not block: implementations queue the message for the
/// connection's writer and return.
pub trait Member: Send + Sync + 'static {
    /// Returns the member's stable identifier.
    fn id(&self) -> &MemberId;

    /// Delivers a named message with its arguments to this client.
    ///
    /// # Errors
    /// Returns [`DeliveryError`] when the underlying connection can no
    /// longer accept writes.
    fn deliver(&self, message: &str, args: &[Value]) -> Result<(), DeliveryError>;
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Signals that no more connections will be accepted. Transports that
    /// release their listener on drop may treat this as a no-op.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// A single client connection: an inbound byte stream plus the
/// [`Member`] handle used to deliver broadcasts back to it.
pub trait Connection: Send + 'static {
    /// The member handle type for this connection.
    type Member: Member;
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Returns a shareable handle for delivering messages to this client.
    fn member(&self) -> Arc<Self::Member>;

    /// Receives the next message from the client.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> &MemberId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_id_new_and_into_inner() {
        let id = MemberId::new("alice");
        assert_eq!(id.as_str(), "alice");
        assert_eq!(id.into_inner(), "alice");
    }

    #[test]
    fn test_member_id_display() {
        let id = MemberId::from("bob");
        assert_eq!(id.to_string(), "bob");
    }

    #[test]
    fn test_member_id_generate_is_unique() {
        let a = MemberId::generate();
        let b = MemberId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_member_id_serializes_as_plain_string() {
        let id = MemberId::new("carol");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"carol\"");
        let back: MemberId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_member_id_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(MemberId::new("1"), "alice");
        map.insert(MemberId::new("2"), "bob");
        assert_eq!(map[&MemberId::new("1")], "alice");
    }
}
