//! Integration tests for coordinators relaying through a shared broker.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use roomcast::prelude::*;
use roomcast::broker::{BrokerError, BrokerEvent, Subscription, SubscriptionKind};
use roomcast::transport::DeliveryError;
use serde_json::{Value, json};

// =========================================================================
// Test members
// =========================================================================

type Inbox = Arc<Mutex<Vec<(String, Vec<Value>)>>>;

/// A member that records every delivery into a shared inbox.
struct Recorder {
    id: MemberId,
    inbox: Inbox,
}

fn recorder(id: &str) -> (Arc<dyn Member>, Inbox) {
    let inbox = Inbox::default();
    let member: Arc<dyn Member> = Arc::new(Recorder {
        id: MemberId::new(id),
        inbox: Arc::clone(&inbox),
    });
    (member, inbox)
}

impl Member for Recorder {
    fn id(&self) -> &MemberId {
        &self.id
    }

    fn deliver(&self, message: &str, args: &[Value]) -> Result<(), DeliveryError> {
        self.inbox
            .lock()
            .unwrap()
            .push((message.to_owned(), args.to_vec()));
        Ok(())
    }
}

// =========================================================================
// Scripted broker
// =========================================================================

/// How a [`ScriptedBroker`] subscription ends after confirming.
#[derive(Clone, Copy)]
enum Ending {
    Error,
    Hangup,
}

/// A broker whose subscriptions confirm and then end the scripted way.
struct ScriptedBroker(Ending);

impl Broker for ScriptedBroker {
    async fn publish(&self, _channel: &str, _payload: Vec<u8>) -> Result<(), BrokerError> {
        Ok(())
    }

    async fn psubscribe(&self, pattern: &str) -> Result<Subscription, BrokerError> {
        let (feed, subscription) = Subscription::channel(pattern, 8);
        let ending = self.0;
        let pattern = pattern.to_owned();
        tokio::spawn(async move {
            let subscribed = BrokerEvent::Subscription {
                kind: SubscriptionKind::Subscribe,
                channel: pattern,
                count: 1,
            };
            let _ = feed.events.send(Ok(subscribed)).await;
            if let Ending::Error = ending {
                let _ = feed
                    .events
                    .send(Err(BrokerError::Unavailable("connection reset".into())))
                    .await;
            }
            // Dropping the feed ends the event stream.
        });
        Ok(subscription)
    }
}

// =========================================================================
// Helpers
// =========================================================================

type Node = (Arc<BroadcastCoordinator<MemoryBroker>>, RelayListener);

fn config() -> RelayConfig {
    RelayConfig {
        channel_namespace: "test".into(),
        ..RelayConfig::default()
    }
}

async fn node(broker: &MemoryBroker) -> Node {
    BroadcastCoordinator::start(&config(), broker.clone())
        .await
        .expect("coordinator should start")
}

/// Waits until `inbox` holds `expected` deliveries, then a little longer to
/// catch duplicates.
async fn settle(inbox: &Inbox, expected: usize) -> Vec<(String, Vec<Value>)> {
    for _ in 0..200 {
        if inbox.lock().unwrap().len() >= expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    inbox.lock().unwrap().clone()
}

async fn next_message(sub: &mut Subscription) -> (String, Vec<u8>) {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("event should arrive")
            .expect("subscription open")
            .expect("no broker error");
        if let BrokerEvent::Message { channel, payload } = event {
            return (channel, payload);
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_each_member_receives_exactly_once_across_nodes() {
    let broker = MemoryBroker::new();
    let (a, _la) = node(&broker).await;
    let (b, _lb) = node(&broker).await;
    let (c, _lc) = node(&broker).await;

    let (alice, alice_inbox) = recorder("alice");
    let (carol, carol_inbox) = recorder("carol");
    let (bob, bob_inbox) = recorder("bob");
    let (dave, dave_inbox) = recorder("dave");
    a.join("lobby", alice);
    a.join("lobby", carol);
    b.join("lobby", bob);
    c.join("lobby", dave);

    let sender = MemberId::new("alice");
    a.send(Some(&sender), "lobby", "chat", &[json!("hi")]).await;

    let expected = vec![("chat".to_string(), vec![json!("hi")])];
    assert_eq!(settle(&carol_inbox, 1).await, expected);
    assert_eq!(settle(&bob_inbox, 1).await, expected);
    assert_eq!(settle(&dave_inbox, 1).await, expected);
    assert!(alice_inbox.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_relay_does_not_republish() {
    let broker = MemoryBroker::new();
    let (a, _la) = node(&broker).await;
    let (b, _lb) = node(&broker).await;

    let mut spy = broker.psubscribe("test#*").await.unwrap();

    let (alice, _) = recorder("alice");
    let (bob, _) = recorder("bob");
    a.join("lobby", alice);
    b.join("lobby", bob);

    a.send(None, "lobby", "chat", &[]).await;

    let (channel, _) = next_message(&mut spy).await;
    assert_eq!(channel, a.origin().channel_key());

    // Only the original publish ever reaches the bus.
    let extra = tokio::time::timeout(Duration::from_millis(150), next_message(&mut spy)).await;
    assert!(extra.is_err(), "relay was republished: {extra:?}");
}

#[tokio::test]
async fn test_published_envelope_carries_suppression_target() {
    let broker = MemoryBroker::new();
    let (a, _la) = node(&broker).await;
    let mut spy = broker.psubscribe("test#*").await.unwrap();

    let (alice, _) = recorder("alice");
    a.join("lobby", alice);
    a.send(Some(&MemberId::new("alice")), "lobby", "move", &[json!({"x": 1})])
        .await;

    let (_, payload) = next_message(&mut spy).await;
    let wire: Value = serde_json::from_slice(&payload).unwrap();
    assert_eq!(
        wire,
        json!({"args": [{"x": 1}], "opts": ["alice", "lobby", "move"]})
    );
}

#[tokio::test]
async fn test_lobby_scenario_across_two_nodes() {
    let broker = MemoryBroker::new();
    let (p1, _l1) = node(&broker).await;
    let (p2, _l2) = node(&broker).await;

    let (alice, alice_inbox) = recorder("alice");
    let (bob, bob_inbox) = recorder("bob");
    let (carol, carol_inbox) = recorder("carol");
    p1.join("lobby", alice);
    p1.join("lobby", bob);
    p2.join("lobby", carol);

    // Misspelled room: no-op on both nodes.
    let outcome = p1.send(None, "lobbie", "chat", &[json!("hi")]).await;
    assert_eq!(outcome, SendOutcome::default());
    assert!(settle(&carol_inbox, 1).await.is_empty());
    assert!(bob_inbox.lock().unwrap().is_empty());

    p1.send(Some(&MemberId::new("alice")), "lobby", "chat", &[json!("hi")])
        .await;

    let expected = vec![("chat".to_string(), vec![json!("hi")])];
    assert_eq!(settle(&bob_inbox, 1).await, expected);
    assert_eq!(settle(&carol_inbox, 1).await, expected);
    assert!(alice_inbox.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_sender_on_other_node_is_suppressed_by_id() {
    let broker = MemoryBroker::new();
    let (a, _la) = node(&broker).await;
    let (b, _lb) = node(&broker).await;

    // The same client id present on both nodes, e.g. mid-reconnect.
    let (alice_a, _) = recorder("alice");
    let (alice_b, alice_b_inbox) = recorder("alice");
    let (bob, bob_inbox) = recorder("bob");
    a.join("lobby", alice_a);
    b.join("lobby", alice_b);
    b.join("lobby", bob);

    a.send(Some(&MemberId::new("alice")), "lobby", "chat", &[])
        .await;

    assert_eq!(settle(&bob_inbox, 1).await.len(), 1);
    assert!(alice_b_inbox.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_relay_payload_does_not_stop_listener() {
    let broker = MemoryBroker::new();
    let (a, la) = node(&broker).await;
    let (bob, bob_inbox) = recorder("bob");
    a.join("lobby", bob);

    broker
        .publish("test#elsewhere", b"{not json".to_vec())
        .await
        .unwrap();
    broker
        .publish("test#elsewhere", br#"{"args": []}"#.to_vec())
        .await
        .unwrap();
    broker
        .publish(
            "test#elsewhere",
            br#"{"args": ["ok"], "opts": [null, "lobby", "chat"]}"#.to_vec(),
        )
        .await
        .unwrap();

    assert_eq!(
        settle(&bob_inbox, 1).await,
        vec![("chat".to_string(), vec![json!("ok")])]
    );
    assert!(!la.is_finished());
}

#[tokio::test]
async fn test_stop_unsubscribes_listener() {
    let broker = MemoryBroker::new();
    let (_a, listener) = node(&broker).await;
    assert_eq!(broker.subscriber_count(), 1);

    let exit = tokio::time::timeout(Duration::from_secs(1), listener.stop())
        .await
        .expect("listener should stop");
    assert!(matches!(exit, ListenerExit::Unsubscribed), "got {exit:?}");
}

#[tokio::test]
async fn test_stopped_node_still_delivers_locally() {
    let broker = MemoryBroker::new();
    let (a, listener) = node(&broker).await;
    let (b, _lb) = node(&broker).await;
    listener.stop().await;

    let (alice, alice_inbox) = recorder("alice");
    let (bob, _) = recorder("bob");
    a.join("lobby", alice);
    b.join("lobby", bob);

    b.send(Some(&MemberId::new("bob")), "lobby", "chat", &[]).await;
    let outcome = a.send(None, "lobby", "local", &[]).await;

    assert_eq!(outcome.delivered, 1);
    assert_eq!(
        settle(&alice_inbox, 1).await,
        vec![("local".to_string(), vec![])]
    );
}

#[tokio::test]
async fn test_listener_exits_on_subscription_error() {
    let (_coordinator, listener) =
        BroadcastCoordinator::start(&config(), ScriptedBroker(Ending::Error))
            .await
            .expect("coordinator should start");

    let exit = tokio::time::timeout(Duration::from_secs(1), listener.finished())
        .await
        .expect("listener should exit");
    assert!(
        matches!(exit, ListenerExit::Failed(BrokerError::Unavailable(_))),
        "got {exit:?}"
    );
}

#[tokio::test]
async fn test_listener_exits_when_stream_closes() {
    let (coordinator, listener) =
        BroadcastCoordinator::start(&config(), ScriptedBroker(Ending::Hangup))
            .await
            .expect("coordinator should start");

    let exit = tokio::time::timeout(Duration::from_secs(1), listener.finished())
        .await
        .expect("listener should exit");
    assert!(matches!(exit, ListenerExit::Closed), "got {exit:?}");

    // Local delivery keeps working without the relay.
    let (alice, alice_inbox) = recorder("alice");
    coordinator.join("lobby", alice);
    assert_eq!(coordinator.send(None, "lobby", "chat", &[]).await.delivered, 1);
    assert_eq!(alice_inbox.lock().unwrap().len(), 1);
}
