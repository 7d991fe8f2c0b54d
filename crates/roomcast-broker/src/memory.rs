//! In-process broker built on a `tokio::sync::broadcast` channel.
//!
//! Every clone of a [`MemoryBroker`] shares one bus, so several
//! coordinators in the same process (or test) can relay to each other
//! exactly as they would through Redis. Each pattern subscription gets its
//! own bus receiver and a pump task that filters by pattern.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::{
    Broker, BrokerError, BrokerEvent, SUBSCRIPTION_BUFFER, Subscription, SubscriptionFeed,
    SubscriptionKind, matches,
};

/// Capacity of the shared bus. A subscriber that falls this far behind
/// skips the oldest messages.
const BUS_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct Published {
    channel: Arc<str>,
    payload: Arc<[u8]>,
}

/// An in-process [`Broker`].
#[derive(Debug, Clone)]
pub struct MemoryBroker {
    bus: broadcast::Sender<Published>,
}

impl MemoryBroker {
    /// Creates a broker with the default bus capacity.
    pub fn new() -> Self {
        Self::with_capacity(BUS_CAPACITY)
    }

    /// Creates a broker whose bus holds up to `capacity` unread messages
    /// per subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        let (bus, _) = broadcast::channel(capacity);
        Self { bus }
    }

    /// Number of live pattern subscriptions on this bus.
    pub fn subscriber_count(&self) -> usize {
        self.bus.receiver_count()
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker for MemoryBroker {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        let published = Published {
            channel: Arc::from(channel),
            payload: Arc::from(payload),
        };
        // No receivers is not an error: a publish with nobody listening is
        // simply lost, same as on Redis.
        let receivers = self.bus.send(published).unwrap_or(0);
        tracing::trace!(channel, receivers, "published on memory bus");
        Ok(())
    }

    async fn psubscribe(&self, pattern: &str) -> Result<Subscription, BrokerError> {
        // Subscribe to the bus before returning, so nothing published after
        // this call is missed.
        let bus = self.bus.subscribe();
        let (feed, subscription) = Subscription::channel(pattern, SUBSCRIPTION_BUFFER);
        tokio::spawn(pump(bus, pattern.to_owned(), feed));
        Ok(subscription)
    }
}

async fn pump(mut bus: broadcast::Receiver<Published>, pattern: String, feed: SubscriptionFeed) {
    let SubscriptionFeed { events, mut stop } = feed;

    let subscribed = BrokerEvent::Subscription {
        kind: SubscriptionKind::Subscribe,
        channel: pattern.clone(),
        count: 1,
    };
    if events.send(Ok(subscribed)).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            _ = &mut stop => {
                let unsubscribed = BrokerEvent::Subscription {
                    kind: SubscriptionKind::Unsubscribe,
                    channel: pattern.clone(),
                    count: 0,
                };
                let _ = events.send(Ok(unsubscribed)).await;
                break;
            }
            received = bus.recv() => match received {
                Ok(published) => {
                    if !matches(&pattern, &published.channel) {
                        continue;
                    }
                    let event = BrokerEvent::Message {
                        channel: published.channel.to_string(),
                        payload: published.payload.to_vec(),
                    };
                    if events.send(Ok(event)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(%pattern, skipped, "memory subscription lagged, messages dropped");
                }
                Err(RecvError::Closed) => {
                    let _ = events.send(Err(BrokerError::Closed)).await;
                    break;
                }
            }
        }
    }

    tracing::debug!(%pattern, "memory subscription pump stopped");
}
