//! Wire protocol for Roomcast.
//!
//! Two kinds of messages travel on the wire:
//!
//! - **Relay envelopes** ([`MessageEnvelope`]) — one room broadcast crossing
//!   the process boundary through the pub/sub broker. Their JSON shape
//!   (`{"args": [...], "opts": [suppress, room, message]}`) is the
//!   compatibility contract between every process in a deployment.
//! - **Client frames** ([`ClientFrame`]) — join/leave/send commands that a
//!   connected client sends to its server.
//!
//! Encoding goes through the [`Codec`] trait ([`JsonCodec`] by default).
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (ClientFrame / MessageEnvelope) → Coordinator
//! ```

mod codec;
mod envelope;
mod error;
mod frame;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use envelope::{MessageEnvelope, RawEnvelope};
pub use error::ProtocolError;
pub use frame::ClientFrame;
