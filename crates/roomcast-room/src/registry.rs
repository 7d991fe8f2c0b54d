//! Room membership registry.
//!
//! Maps a room name to the members currently in it. Rooms exist only while
//! they have members: the first join creates one, and the leave that
//! empties it removes it.
//!
//! # Concurrency note
//!
//! Rooms live in a `DashMap`, which shards its keys across independently
//! locked buckets. Every operation here touches one room key under that
//! key's shard lock, so operations on the same room are atomic and
//! operations on different rooms mostly do not contend. Readers get
//! snapshots ([`RoomRegistry::members_of`]); no lock is held while the
//! caller delivers to the members it got back.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use roomcast_transport::{Member, MemberId};

type Members = HashMap<MemberId, Arc<dyn Member>>;

/// Concurrency-safe mapping from room name to its members.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, Members>,
}

impl RoomRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `member` to `room`, creating the room if needed.
    ///
    /// Members are keyed by identifier, so joining twice keeps a single
    /// entry (the newer handle replaces the older one). Returns `true` if
    /// the member was not already in the room.
    pub fn join(&self, room: &str, member: Arc<dyn Member>) -> bool {
        let id = member.id().clone();
        let mut members = self.rooms.entry(room.to_owned()).or_default();
        let added = members.insert(id.clone(), member).is_none();
        let count = members.len();
        drop(members);

        if added {
            tracing::debug!(room, member = %id, members = count, "member joined room");
        }
        added
    }

    /// Removes the member with `id` from `room`.
    ///
    /// A missing room or member is a no-op. When the last member leaves,
    /// the room itself is removed in the same atomic step. Returns `true`
    /// if a member was removed.
    pub fn leave(&self, room: &str, id: &MemberId) -> bool {
        match self.rooms.entry(room.to_owned()) {
            Entry::Occupied(mut occupied) => {
                let removed = occupied.get_mut().remove(id).is_some();
                if occupied.get().is_empty() {
                    occupied.remove();
                    tracing::debug!(room, "room emptied and removed");
                }
                if removed {
                    tracing::debug!(room, member = %id, "member left room");
                }
                removed
            }
            Entry::Vacant(_) => false,
        }
    }

    /// Removes the member with `id` from every room it is in.
    ///
    /// Returns the names of the rooms it left.
    pub fn leave_all(&self, id: &MemberId) -> Vec<String> {
        let candidates: Vec<String> = self
            .rooms
            .iter()
            .filter(|entry| entry.value().contains_key(id))
            .map(|entry| entry.key().clone())
            .collect();

        candidates
            .into_iter()
            .filter(|room| self.leave(room, id))
            .collect()
    }

    /// Returns a snapshot of the room's members, or `None` if the room
    /// does not exist.
    pub fn members_of(&self, room: &str) -> Option<Vec<Arc<dyn Member>>> {
        self.rooms
            .get(room)
            .map(|members| members.values().cloned().collect())
    }

    /// Looks up one member of a room by identifier.
    pub fn member(&self, room: &str, id: &MemberId) -> Option<Arc<dyn Member>> {
        self.rooms
            .get(room)
            .and_then(|members| members.get(id).cloned())
    }

    /// Returns `true` if `room` exists and contains the member with `id`.
    pub fn contains(&self, room: &str, id: &MemberId) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|members| members.contains_key(id))
    }

    /// Number of members in `room` (0 if it does not exist).
    pub fn member_count(&self, room: &str) -> usize {
        self.rooms.get(room).map_or(0, |members| members.len())
    }

    /// Number of rooms that currently exist.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Names of all rooms that currently exist, in no particular order.
    pub fn rooms(&self) -> Vec<String> {
        self.rooms.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl std::fmt::Debug for RoomRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomRegistry")
            .field("rooms", &self.rooms.len())
            .finish()
    }
}
