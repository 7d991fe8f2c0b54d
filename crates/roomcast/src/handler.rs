//! Per-connection handler: frame decoding and room routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Register a membership guard for the connection's member id
//!   2. Loop: receive frames → join / leave / send through the coordinator
//!   3. On close (or any exit), the guard removes the member from every room

use std::sync::Arc;

use roomcast_broker::Broker;
use roomcast_protocol::{ClientFrame, Codec, JsonCodec};
use roomcast_transport::{Connection, Member, MemberId, WebSocketConnection};
use serde_json::Value;

use crate::coordinator::BroadcastCoordinator;
use crate::RoomcastError;

/// Event name used to report a rejected frame back to its sender.
pub const ERROR_EVENT: &str = "error";

/// Drop guard that removes a member from all rooms when the handler exits,
/// including by panic.
struct MembershipGuard<B: Broker> {
    member: MemberId,
    coordinator: Arc<BroadcastCoordinator<B>>,
}

impl<B: Broker> Drop for MembershipGuard<B> {
    fn drop(&mut self) {
        let left = self.coordinator.leave_all(&self.member);
        tracing::debug!(member = %self.member, rooms = left.len(), "member left all rooms");
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<B: Broker>(
    mut conn: WebSocketConnection,
    coordinator: Arc<BroadcastCoordinator<B>>,
) -> Result<(), RoomcastError> {
    let member = conn.member();
    let member_id = member.id().clone();
    let codec = JsonCodec;
    tracing::info!(member = %member_id, "client connected");

    let _guard = MembershipGuard {
        member: member_id.clone(),
        coordinator: Arc::clone(&coordinator),
    };

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(member = %member_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(member = %member_id, error = %e, "recv error");
                return Err(e.into());
            }
        };

        let frame: ClientFrame = match codec.decode(&data) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(member = %member_id, error = %e, "failed to decode frame");
                if let Err(e) = member.deliver(ERROR_EVENT, &[Value::String(e.to_string())]) {
                    tracing::debug!(member = %member_id, error = %e, "failed to report frame error");
                }
                continue;
            }
        };

        match frame {
            ClientFrame::Join { room } => {
                tracing::debug!(member = %member_id, %room, "join");
                coordinator.join(&room, Arc::clone(&member) as Arc<dyn Member>);
            }
            ClientFrame::Leave { room } => {
                tracing::debug!(member = %member_id, %room, "leave");
                coordinator.leave(&room, &member_id);
            }
            ClientFrame::Send { room, event, args } => {
                coordinator
                    .send(Some(&member_id), &room, &event, &args)
                    .await;
            }
        }
    }

    // _guard drops here → member leaves every room.
    Ok(())
}
