//! Room membership for Roomcast.
//!
//! A room is a named group of locally connected clients that receive the
//! same broadcasts. [`RoomRegistry`] is the process's only shared mutable
//! state: many connection tasks join, leave, and fan out concurrently.
//!
//! # Key types
//!
//! - [`RoomRegistry`] — room name → member set, with snapshot reads

mod registry;

pub use registry::RoomRegistry;
