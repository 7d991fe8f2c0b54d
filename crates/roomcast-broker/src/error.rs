//! Error types for the broker layer.

/// Errors that can occur talking to a broker.
///
/// None of these are fatal to local room operations; they only cost the
/// process its cross-process relay.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The Redis client reported an error.
    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The subscription's event stream ended unexpectedly.
    #[error("subscription stream closed")]
    Closed,

    /// The broker cannot be reached or has shut down.
    #[error("broker unavailable: {0}")]
    Unavailable(String),
}
