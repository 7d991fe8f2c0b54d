//! Redis-backed broker: `PUBLISH` over a multiplexed connection and
//! `PSUBSCRIBE` over a dedicated pub/sub connection per subscription.

use futures_util::StreamExt;
use redis::AsyncCommands;
use redis::aio::{MultiplexedConnection, PubSub};

use crate::{
    Broker, BrokerError, BrokerEvent, SUBSCRIPTION_BUFFER, Subscription, SubscriptionFeed,
    SubscriptionKind,
};

/// A [`Broker`] backed by a Redis server.
#[derive(Clone)]
pub struct RedisBroker {
    client: redis::Client,
    publisher: MultiplexedConnection,
}

impl RedisBroker {
    /// Connects to the Redis server at `url` (e.g. `redis://127.0.0.1:6379/`).
    ///
    /// # Errors
    /// Returns [`BrokerError::Redis`] if the URL is invalid or the server
    /// cannot be reached.
    pub async fn connect(url: &str) -> Result<Self, BrokerError> {
        let client = redis::Client::open(url)?;
        let publisher = client.get_multiplexed_async_connection().await?;
        tracing::info!(url, "connected to redis");
        Ok(Self { client, publisher })
    }
}

impl Broker for RedisBroker {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        let mut conn = self.publisher.clone();
        let receivers: i64 = conn.publish(channel, payload).await?;
        tracing::trace!(channel, receivers, "published on redis");
        Ok(())
    }

    async fn psubscribe(&self, pattern: &str) -> Result<Subscription, BrokerError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.psubscribe(pattern).await?;
        let (feed, subscription) = Subscription::channel(pattern, SUBSCRIPTION_BUFFER);
        tokio::spawn(pump(pubsub, pattern.to_owned(), feed));
        Ok(subscription)
    }
}

async fn pump(pubsub: PubSub, pattern: String, feed: SubscriptionFeed) {
    let SubscriptionFeed { events, mut stop } = feed;

    // The PSUBSCRIBE round trip already succeeded; report it the way the
    // server's confirmation reads.
    let subscribed = BrokerEvent::Subscription {
        kind: SubscriptionKind::Subscribe,
        channel: pattern.clone(),
        count: 1,
    };
    if events.send(Ok(subscribed)).await.is_err() {
        return;
    }

    let mut messages = Box::pin(pubsub.into_on_message());
    loop {
        tokio::select! {
            _ = &mut stop => {
                // Dropping the stream closes the pub/sub connection, which
                // drops the pattern server-side.
                let unsubscribed = BrokerEvent::Subscription {
                    kind: SubscriptionKind::Unsubscribe,
                    channel: pattern.clone(),
                    count: 0,
                };
                let _ = events.send(Ok(unsubscribed)).await;
                break;
            }
            next = messages.next() => match next {
                Some(msg) => {
                    let event = BrokerEvent::Message {
                        channel: msg.get_channel_name().to_owned(),
                        payload: msg.get_payload_bytes().to_vec(),
                    };
                    if events.send(Ok(event)).await.is_err() {
                        break;
                    }
                }
                None => {
                    let _ = events.send(Err(BrokerError::Closed)).await;
                    break;
                }
            }
        }
    }

    tracing::debug!(%pattern, "redis subscription pump stopped");
}
