//! The broadcast coordinator: local fan-out plus cross-process relay.
//!
//! A send on any process reaches the room's members on every process:
//!
//! ```text
//!   process A                         broker                     process B
//!   ---------                         ------                     ---------
//!   send(room, msg)
//!     ├─ deliver to A's members
//!     └─ publish ns#<A> ───────────▶ ns#* ──────────▶ listener (ns#*)
//!                                      │                 └─ on_relay_message
//!   listener (ns#*) ◀──────────────────┘                      ├─ deliver to B's members
//!     └─ origin == A: drop (self-echo)                        └─ no publish (relay origin)
//! ```
//!
//! Loops are prevented two ways: a process drops relay traffic carrying
//! its own origin, and a send triggered by relay traffic is never
//! published again. The second is decided per call through [`SendOrigin`].

use std::sync::Arc;

use roomcast_broker::Broker;
use roomcast_protocol::{JsonCodec, MessageEnvelope, ProtocolError};
use roomcast_room::RoomRegistry;
use roomcast_transport::{Member, MemberId};
use serde_json::Value;

use crate::listener::RelayListener;
use crate::{OriginTag, RelayConfig, RoomcastError};

/// What triggered a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOrigin {
    /// A local client or server code. Delivered locally and published.
    Local,
    /// An inbound relay message. Delivered locally only.
    Relay,
}

/// What one send did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOutcome {
    /// Members the message was handed to.
    pub delivered: usize,
    /// Members whose delivery failed.
    pub failed: usize,
    /// Whether the envelope was accepted by the broker.
    pub published: bool,
}

/// What happened to one inbound relay message.
#[derive(Debug)]
pub enum RelayOutcome {
    /// Published by this process; ignored.
    SelfEcho,
    /// The payload could not be decoded; dropped.
    Dropped(ProtocolError),
    /// Delivered to local members.
    Delivered(SendOutcome),
}

/// Coordinates room membership and broadcasts for one process.
///
/// Shared behind an `Arc` by every connection task and the relay listener.
pub struct BroadcastCoordinator<B: Broker> {
    origin: OriginTag,
    rooms: RoomRegistry,
    broker: B,
    codec: JsonCodec,
}

impl<B: Broker> BroadcastCoordinator<B> {
    /// Creates a coordinator with a fresh origin tag. Does not subscribe;
    /// use [`start`](Self::start) for a coordinator that receives relays.
    pub fn new(config: &RelayConfig, broker: B) -> Self {
        Self::with_origin(OriginTag::generate(&config.channel_namespace), broker)
    }

    /// Creates a coordinator with a given origin tag.
    pub fn with_origin(origin: OriginTag, broker: B) -> Self {
        Self {
            origin,
            rooms: RoomRegistry::new(),
            broker,
            codec: JsonCodec,
        }
    }

    /// Creates a coordinator, subscribes it to the namespace pattern, and
    /// spawns its relay listener.
    ///
    /// # Errors
    /// Returns [`RoomcastError::Broker`] if the subscription cannot be
    /// established; no coordinator is produced in that case.
    pub async fn start(
        config: &RelayConfig,
        broker: B,
    ) -> Result<(Arc<Self>, RelayListener), RoomcastError> {
        let coordinator = Arc::new(Self::new(config, broker));
        let pattern = coordinator.origin.pattern();
        let subscription = coordinator.broker.psubscribe(&pattern).await?;

        tracing::info!(
            origin = %coordinator.origin,
            channel = coordinator.origin.channel_key(),
            %pattern,
            "broadcast coordinator started"
        );

        let listener = RelayListener::spawn(Arc::clone(&coordinator), subscription);
        Ok((coordinator, listener))
    }

    /// This process's origin tag.
    pub fn origin(&self) -> &OriginTag {
        &self.origin
    }

    /// The local room registry.
    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// The broker relays go through.
    pub fn broker(&self) -> &B {
        &self.broker
    }

    /// Adds a local member to a room.
    pub fn join(&self, room: &str, member: Arc<dyn Member>) {
        self.rooms.join(room, member);
    }

    /// Removes a local member from a room.
    pub fn leave(&self, room: &str, member: &MemberId) {
        self.rooms.leave(room, member);
    }

    /// Removes a local member from every room. Returns the rooms it left.
    pub fn leave_all(&self, member: &MemberId) -> Vec<String> {
        self.rooms.leave_all(member)
    }

    /// Broadcasts `message` to `room` on every process, skipping `ignore`.
    pub async fn send(
        &self,
        ignore: Option<&MemberId>,
        room: &str,
        message: &str,
        args: &[Value],
    ) -> SendOutcome {
        self.dispatch(ignore, room, message, args, SendOrigin::Local)
            .await
    }

    /// Delivers to the room's local members and, for
    /// [`SendOrigin::Local`], publishes the envelope for other processes.
    ///
    /// A room with no local members is a no-op: nothing is delivered and
    /// nothing is published.
    pub async fn dispatch(
        &self,
        ignore: Option<&MemberId>,
        room: &str,
        message: &str,
        args: &[Value],
        origin: SendOrigin,
    ) -> SendOutcome {
        let Some(members) = self.rooms.members_of(room) else {
            tracing::trace!(room, message, "send to unknown room ignored");
            return SendOutcome::default();
        };

        let mut outcome = SendOutcome::default();
        for member in members {
            if ignore.is_some_and(|id| id == member.id()) {
                continue;
            }
            match member.deliver(message, args) {
                Ok(()) => outcome.delivered += 1,
                Err(e) => {
                    outcome.failed += 1;
                    tracing::warn!(room, member = %member.id(), error = %e, "delivery failed");
                }
            }
        }

        if origin == SendOrigin::Local {
            let envelope = MessageEnvelope {
                message: message.to_owned(),
                args: args.to_vec(),
                room: room.to_owned(),
                suppress: ignore.cloned(),
            };
            outcome.published = self.publish(&envelope).await;
        }

        tracing::debug!(
            room,
            message,
            ?origin,
            delivered = outcome.delivered,
            failed = outcome.failed,
            published = outcome.published,
            "broadcast sent"
        );
        outcome
    }

    async fn publish(&self, envelope: &MessageEnvelope) -> bool {
        let payload = match envelope.encode(&self.codec) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(room = %envelope.room, error = %e, "failed to encode relay envelope");
                return false;
            }
        };
        match self
            .broker
            .publish(self.origin.channel_key(), payload)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    room = %envelope.room,
                    channel = self.origin.channel_key(),
                    error = %e,
                    "failed to publish relay envelope"
                );
                false
            }
        }
    }

    /// Handles one message read from the relay subscription.
    ///
    /// Own echoes and undecodable payloads are dropped. Anything else is
    /// delivered to local members as a [`SendOrigin::Relay`] send, skipping
    /// the suppression target if that client is connected here.
    pub async fn on_relay_message(&self, channel: &str, payload: &[u8]) -> RelayOutcome {
        if self.origin.is_own(channel) {
            tracing::trace!(channel, "ignoring own relay message");
            return RelayOutcome::SelfEcho;
        }

        let envelope = match MessageEnvelope::decode(&self.codec, payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(channel, error = %e, "dropping undecodable relay message");
                return RelayOutcome::Dropped(e);
            }
        };

        let ignore = envelope.suppress.filter(|id| {
            let local = self.rooms.contains(&envelope.room, id);
            if !local {
                tracing::trace!(member = %id, room = %envelope.room, "suppression target not connected here");
            }
            local
        });

        let outcome = self
            .dispatch(
                ignore.as_ref(),
                &envelope.room,
                &envelope.message,
                &envelope.args,
                SendOrigin::Relay,
            )
            .await;
        RelayOutcome::Delivered(outcome)
    }
}

impl<B: Broker> std::fmt::Debug for BroadcastCoordinator<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastCoordinator")
            .field("origin", &self.origin)
            .field("rooms", &self.rooms)
            .finish_non_exhaustive()
    }
}
