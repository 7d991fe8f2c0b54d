use crate::MemberId;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}

/// A single member could not accept a delivery.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The member's connection is gone; its writer no longer accepts frames.
    #[error("member {0} is disconnected")]
    Closed(MemberId),

    /// The outbound frame could not be serialized.
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),

    /// Transport-specific rejection.
    #[error("delivery to member {member} rejected: {reason}")]
    Rejected {
        /// The member the write was meant for.
        member: MemberId,
        /// Why the transport refused it.
        reason: String,
    },
}
