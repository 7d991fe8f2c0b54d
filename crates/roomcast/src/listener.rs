//! Background task that reads the relay subscription.

use std::sync::Arc;

use roomcast_broker::{Broker, BrokerError, BrokerEvent, Subscription};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::coordinator::BroadcastCoordinator;

/// Why a relay listener stopped.
#[derive(Debug)]
pub enum ListenerExit {
    /// The subscription count dropped to zero (normally after
    /// [`RelayListener::stop`]).
    Unsubscribed,
    /// The broker closed the event stream.
    Closed,
    /// The broker reported an error; the relay is gone for this process.
    Failed(BrokerError),
    /// The listener task panicked or was aborted.
    Crashed(String),
}

/// Handle to a coordinator's relay listener task.
///
/// Dropping the handle detaches the task; it keeps running until its
/// subscription ends.
#[derive(Debug)]
pub struct RelayListener {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<ListenerExit>,
}

impl RelayListener {
    /// Spawns a task that feeds every message on `subscription` to
    /// `coordinator`.
    pub fn spawn<B: Broker>(
        coordinator: Arc<BroadcastCoordinator<B>>,
        subscription: Subscription,
    ) -> Self {
        let (stop, stop_rx) = oneshot::channel();
        let task = tokio::spawn(run(coordinator, subscription, stop_rx));
        Self {
            stop: Some(stop),
            task,
        }
    }

    /// Returns `true` once the listener task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the listener to exit on its own.
    pub async fn finished(self) -> ListenerExit {
        join(self.task).await
    }

    /// Unsubscribes and waits for the listener to exit.
    pub async fn stop(mut self) -> ListenerExit {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        join(self.task).await
    }
}

async fn join(task: JoinHandle<ListenerExit>) -> ListenerExit {
    match task.await {
        Ok(exit) => exit,
        Err(e) => ListenerExit::Crashed(e.to_string()),
    }
}

async fn run<B: Broker>(
    coordinator: Arc<BroadcastCoordinator<B>>,
    mut subscription: Subscription,
    mut stop: oneshot::Receiver<()>,
) -> ListenerExit {
    let origin = coordinator.origin().to_string();
    let mut stop_armed = true;

    let exit = loop {
        let event = tokio::select! {
            requested = &mut stop, if stop_armed => {
                stop_armed = false;
                // A dropped handle detaches instead of unsubscribing.
                if requested.is_ok() {
                    tracing::debug!(%origin, pattern = subscription.pattern(), "unsubscribing relay");
                    subscription.unsubscribe();
                }
                continue;
            }
            event = subscription.recv() => event,
        };

        match event {
            Some(Ok(BrokerEvent::Message { channel, payload })) => {
                coordinator.on_relay_message(&channel, &payload).await;
            }
            Some(Ok(BrokerEvent::Subscription {
                kind,
                channel,
                count,
            })) => {
                tracing::info!(%origin, %kind, %channel, count, "relay subscription changed");
                if count == 0 {
                    break ListenerExit::Unsubscribed;
                }
            }
            Some(Err(e)) => {
                tracing::error!(%origin, error = %e, "relay subscription failed");
                break ListenerExit::Failed(e);
            }
            None => {
                tracing::warn!(%origin, "relay subscription closed");
                break ListenerExit::Closed;
            }
        }
    };

    tracing::debug!(%origin, exit = ?exit, "relay listener stopped");
    exit
}
