//! Frames a connected client sends to its server.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A command from a client.
///
/// Internally tagged, so a join looks like
/// `{"type": "join", "room": "lobby"}` and a send like
/// `{"type": "send", "room": "lobby", "event": "chat", "args": ["hi"]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Join a room (created on first join).
    Join { room: String },

    /// Leave a room.
    Leave { room: String },

    /// Broadcast `event` with `args` to everyone else in `room`, on every
    /// process.
    Send {
        room: String,
        event: String,
        #[serde(default)]
        args: Vec<Value>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_frame_json_format() {
        let frame: ClientFrame =
            serde_json::from_value(json!({"type": "join", "room": "lobby"})).unwrap();
        assert_eq!(
            frame,
            ClientFrame::Join {
                room: "lobby".into()
            }
        );
    }

    #[test]
    fn test_send_frame_args_default_to_empty() {
        let frame: ClientFrame =
            serde_json::from_value(json!({"type": "send", "room": "r", "event": "ping"}))
                .unwrap();
        assert_eq!(
            frame,
            ClientFrame::Send {
                room: "r".into(),
                event: "ping".into(),
                args: vec![],
            }
        );
    }

    #[test]
    fn test_unknown_frame_type_is_rejected() {
        let result: Result<ClientFrame, _> =
            serde_json::from_value(json!({"type": "kick", "room": "r"}));
        assert!(result.is_err());
    }
}
