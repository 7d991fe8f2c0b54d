//! # Roomcast
//!
//! Room broadcasting that spans processes.
//!
//! Clients connect to any node and join named rooms. A broadcast into a
//! room reaches its members on the sending node directly and its members on
//! every other node through a publish/subscribe relay, exactly once each.
//! The sending client can be excluded everywhere.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roomcast::prelude::*;
//!
//! # async fn start() -> Result<(), RoomcastError> {
//! let server = RoomcastServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .relay_config(RelayConfig::default())
//!     .build(MemoryBroker::new())
//!     .await?;
//! server.run().await
//! # }
//! ```
//!
//! Embedding without the WebSocket server goes through
//! [`BroadcastCoordinator::start`] directly.

mod config;
mod coordinator;
mod error;
mod handler;
mod listener;
mod origin;
mod server;

pub use config::RelayConfig;
pub use coordinator::{BroadcastCoordinator, RelayOutcome, SendOrigin, SendOutcome};
pub use error::RoomcastError;
pub use handler::ERROR_EVENT;
pub use listener::{ListenerExit, RelayListener};
pub use origin::OriginTag;
pub use server::{RoomcastServer, RoomcastServerBuilder};

pub use roomcast_broker as broker;
pub use roomcast_protocol as protocol;
pub use roomcast_room as room;
pub use roomcast_transport as transport;

/// Convenience re-exports for the common case.
pub mod prelude {
    pub use crate::{
        BroadcastCoordinator, ListenerExit, RelayConfig, RelayListener, RoomcastError,
        RoomcastServer, SendOrigin, SendOutcome,
    };
    pub use roomcast_broker::{Broker, MemoryBroker};
    #[cfg(feature = "redis")]
    pub use roomcast_broker::RedisBroker;
    pub use roomcast_transport::{Member, MemberId};
}
