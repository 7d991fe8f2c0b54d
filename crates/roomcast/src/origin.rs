//! Per-process origin tag and relay channel naming.
//!
//! Each coordinator publishes on `<namespace>#<origin>` and subscribes to
//! `<namespace>#*`. The wildcard also matches the process's own channel,
//! so the origin suffix is how a process recognizes its own echoes.

use std::fmt;

/// Separates the namespace from the origin id in a channel name.
pub const SEPARATOR: char = '#';

/// A process-unique origin identifier plus the channel names derived from
/// it. Fixed for the lifetime of the coordinator that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginTag {
    id: String,
    namespace: String,
    channel_key: String,
}

impl OriginTag {
    /// Generates a fresh random (UUID v4) origin in `namespace`.
    pub fn generate(namespace: &str) -> Self {
        Self::with_id(namespace, uuid::Uuid::new_v4().to_string())
    }

    /// Builds a tag with a caller-chosen origin id.
    pub fn with_id(namespace: &str, id: impl Into<String>) -> Self {
        let id = id.into();
        let channel_key = format!("{namespace}{SEPARATOR}{id}");
        Self {
            id,
            namespace: namespace.to_owned(),
            channel_key,
        }
    }

    /// The origin id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The channel namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The channel this process publishes on.
    pub fn channel_key(&self) -> &str {
        &self.channel_key
    }

    /// The pattern matching every process's channel in the namespace.
    pub fn pattern(&self) -> String {
        format!("{}{SEPARATOR}*", self.namespace)
    }

    /// Extracts the origin id from a relay channel name: the text after
    /// the last separator, or the whole name if there is none.
    pub fn origin_of(channel: &str) -> &str {
        channel
            .rsplit_once(SEPARATOR)
            .map_or(channel, |(_, origin)| origin)
    }

    /// Returns `true` if `channel` was published by this process.
    pub fn is_own(&self, channel: &str) -> bool {
        Self::origin_of(channel) == self.id
    }
}

impl fmt::Display for OriginTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}
