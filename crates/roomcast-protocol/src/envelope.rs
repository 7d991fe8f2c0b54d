//! The relay envelope: one room broadcast on its way to other processes.
//!
//! On the wire an envelope is a JSON object with exactly two keys:
//!
//! ```text
//! {
//!   "args": [ ...opaque values... ],
//!   "opts": [ suppress-id-or-null, room, message ]
//! }
//! ```
//!
//! The key names and the order inside `opts` are shared by every process
//! in a deployment and must not change.
//!
//! Decoding is two-step. [`RawEnvelope`] captures the structure (both keys
//! present, `opts` an array); [`RawEnvelope::validate`] then types each
//! `opts` slot. A structural problem fails the decode. A slot holding the
//! wrong JSON type is replaced by its default (`None` for the suppression
//! target, `""` for room and message) with a warning, and the envelope is
//! still delivered.

use roomcast_transport::MemberId;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::{Codec, ProtocolError};

/// A typed relay envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEnvelope {
    /// The event name delivered to each member.
    pub message: String,
    /// Opaque event arguments, in order.
    pub args: Vec<Value>,
    /// The room the broadcast targets.
    pub room: String,
    /// The client excluded from delivery (usually the sender), carried by
    /// identifier because member handles cannot cross processes.
    pub suppress: Option<MemberId>,
}

#[derive(Serialize)]
struct WireEnvelope<'a> {
    args: &'a [Value],
    opts: (Option<&'a MemberId>, &'a str, &'a str),
}

impl Serialize for MessageEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireEnvelope {
            args: &self.args,
            opts: (self.suppress.as_ref(), &self.room, &self.message),
        }
        .serialize(serializer)
    }
}

impl MessageEnvelope {
    /// Encodes the envelope into its wire form.
    pub fn encode<C: Codec>(&self, codec: &C) -> Result<Vec<u8>, ProtocolError> {
        codec.encode(self)
    }

    /// Decodes and validates an envelope from its wire form.
    ///
    /// # Errors
    /// Fails on malformed input or a structurally invalid envelope. Field
    /// type mismatches do not fail; see [`RawEnvelope::validate`].
    pub fn decode<C: Codec>(codec: &C, data: &[u8]) -> Result<Self, ProtocolError> {
        codec.decode::<RawEnvelope>(data)?.validate()
    }
}

/// An envelope as parsed off the wire, before its fields are typed.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEnvelope {
    /// Must be present. An array, or `null` for a send without arguments.
    pub args: Value,
    /// Must be present and an array of at least three elements.
    pub opts: Vec<Value>,
}

impl RawEnvelope {
    /// Types the raw fields into a [`MessageEnvelope`].
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidMessage`] when `args` is neither an
    /// array nor `null`, or when `opts` has fewer than three elements.
    pub fn validate(self) -> Result<MessageEnvelope, ProtocolError> {
        let args = match self.args {
            Value::Array(args) => args,
            Value::Null => Vec::new(),
            other => {
                return Err(ProtocolError::InvalidMessage(format!(
                    "args must be an array, got {}",
                    json_type(&other)
                )));
            }
        };

        if self.opts.len() < 3 {
            return Err(ProtocolError::InvalidMessage(format!(
                "opts must have 3 elements, got {}",
                self.opts.len()
            )));
        }

        let mut opts = self.opts.into_iter();
        let suppress = opts.next().unwrap_or(Value::Null);
        let room = opts.next().unwrap_or(Value::Null);
        let message = opts.next().unwrap_or(Value::Null);

        let suppress = match suppress {
            Value::String(id) => Some(MemberId::from(id)),
            Value::Null => None,
            other => {
                tracing::warn!(got = json_type(&other), "suppress target is not a string, ignoring it");
                None
            }
        };
        let room = string_or_default("room", room);
        let message = string_or_default("message", message);

        Ok(MessageEnvelope {
            message,
            args,
            room,
            suppress,
        })
    }
}

fn string_or_default(field: &'static str, value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => {
            tracing::warn!(field, got = json_type(&other), "envelope field is not a string, using empty string");
            String::new()
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
