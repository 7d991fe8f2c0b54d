//! Publish/subscribe broker abstraction for Roomcast.
//!
//! Processes relay room broadcasts to each other through a broker. This
//! crate defines what the coordinator needs from one:
//!
//! - [`Broker::publish`] — fire a payload at a channel
//! - [`Broker::psubscribe`] — subscribe to a channel glob pattern and get a
//!   [`Subscription`], a queue of [`BrokerEvent`]s fed by a background task
//!
//! # Implementations
//!
//! - [`MemoryBroker`] — in-process bus, for tests and single-host setups
//! - `RedisBroker` (feature `redis`) — Redis `PUBLISH` / `PSUBSCRIBE`

mod error;
mod memory;
mod pattern;
#[cfg(feature = "redis")]
mod redis_broker;
mod subscription;

pub use error::BrokerError;
pub use memory::MemoryBroker;
pub use pattern::matches;
#[cfg(feature = "redis")]
pub use redis_broker::RedisBroker;
pub use subscription::{Subscription, SubscriptionFeed};

use std::fmt;
use std::future::Future;

/// Default queue depth between a broker's pump task and its subscriber.
pub const SUBSCRIPTION_BUFFER: usize = 256;

/// One event read from a pattern subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    /// A payload published on a channel matching the pattern.
    Message {
        /// The concrete channel it was published on.
        channel: String,
        /// The raw payload.
        payload: Vec<u8>,
    },

    /// A subscription lifecycle notification.
    ///
    /// `count` is the number of patterns the connection is still
    /// subscribed to; zero means the subscription is over.
    Subscription {
        kind: SubscriptionKind,
        channel: String,
        count: usize,
    },
}

/// Which lifecycle change a [`BrokerEvent::Subscription`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    Subscribe,
    Unsubscribe,
}

impl fmt::Display for SubscriptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subscribe => write!(f, "psubscribe"),
            Self::Unsubscribe => write!(f, "punsubscribe"),
        }
    }
}

/// A publish/subscribe message bus.
///
/// Both methods return `Send` futures so the coordinator can call them
/// from spawned tasks. Implementations may still be written as plain
/// `async fn`.
pub trait Broker: Send + Sync + 'static {
    /// Publishes `payload` on `channel`.
    ///
    /// # Errors
    /// Returns [`BrokerError`] if the broker cannot accept the message.
    fn publish(
        &self,
        channel: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Subscribes to every channel matching the glob `pattern`.
    ///
    /// The first event on a fresh subscription is a
    /// [`BrokerEvent::Subscription`] with kind
    /// [`SubscriptionKind::Subscribe`].
    ///
    /// # Errors
    /// Returns [`BrokerError`] if the subscription cannot be established.
    fn psubscribe(
        &self,
        pattern: &str,
    ) -> impl Future<Output = Result<Subscription, BrokerError>> + Send;
}
