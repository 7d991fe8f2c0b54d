//! The subscriber's side of a pattern subscription.

use tokio::sync::{mpsc, oneshot};

use crate::{BrokerError, BrokerEvent};

/// A live pattern subscription.
///
/// Events arrive through a bounded queue filled by the broker's pump task.
/// The sequence is not restartable: once [`recv`](Self::recv) returns
/// `None`, the subscription is finished for good.
#[derive(Debug)]
pub struct Subscription {
    pattern: String,
    events: mpsc::Receiver<Result<BrokerEvent, BrokerError>>,
    stop: Option<oneshot::Sender<()>>,
}

/// The broker's side of a [`Subscription`], handed to its pump task.
///
/// The pump pushes events into `events` and must wind down once `stop`
/// resolves (an unsubscribe request, or the `Subscription` being dropped).
#[derive(Debug)]
pub struct SubscriptionFeed {
    pub events: mpsc::Sender<Result<BrokerEvent, BrokerError>>,
    pub stop: oneshot::Receiver<()>,
}

impl Subscription {
    /// Creates a connected subscription/feed pair with a queue of `buffer`
    /// events.
    pub fn channel(pattern: impl Into<String>, buffer: usize) -> (SubscriptionFeed, Self) {
        let (events_tx, events_rx) = mpsc::channel(buffer);
        let (stop_tx, stop_rx) = oneshot::channel();
        let feed = SubscriptionFeed {
            events: events_tx,
            stop: stop_rx,
        };
        let subscription = Self {
            pattern: pattern.into(),
            events: events_rx,
            stop: Some(stop_tx),
        };
        (feed, subscription)
    }

    /// The pattern this subscription was created for.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Waits for the next event.
    ///
    /// Returns `None` once the pump task has finished.
    pub async fn recv(&mut self) -> Option<Result<BrokerEvent, BrokerError>> {
        self.events.recv().await
    }

    /// Asks the broker to end this subscription.
    ///
    /// The pump answers with a final zero-count
    /// [`BrokerEvent::Subscription`] and then closes the queue. Calling this
    /// more than once has no further effect.
    pub fn unsubscribe(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}
