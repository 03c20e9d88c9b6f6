//! Chat domain types shared by the connection manager, pipeline and views.
//!
//! DESIGN
//! ======
//! `ChatMessage` mirrors the backend's JSON shape exactly (the room field is
//! `roomid` on the wire) and keeps the timestamp as the raw ISO-8601 string
//! it arrived with. Parsing happens only where ordering needs it, so a
//! message with an odd timestamp still renders.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::ChatError;

/// Sender name used for synthetic join/leave notices.
pub const SYSTEM_SENDER: &str = "System";

const JOINED_SUFFIX: &str = " joined the chat";
const LEFT_SUFFIX: &str = " left the chat";

/// Number of avatar colours the views cycle through.
pub const AVATAR_PALETTE_SIZE: u64 = 8;

// =============================================================================
// ROOM
// =============================================================================

/// The fixed set of chat rooms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Room {
    #[default]
    General,
    Development,
    Gaming,
}

impl Room {
    pub const ALL: [Room; 3] = [Room::General, Room::Development, Room::Gaming];

    /// Numeric id used on the wire.
    #[must_use]
    pub fn id(self) -> i32 {
        match self {
            Self::General => 1,
            Self::Development => 2,
            Self::Gaming => 3,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::General => "General",
            Self::Development => "Development",
            Self::Gaming => "Gaming",
        }
    }

    #[must_use]
    pub fn from_id(id: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|room| room.id() == id)
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Room {
    type Err = ChatError;

    /// Accepts a room id (`"2"`) or a case-insensitive name (`"gaming"`).
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if let Ok(id) = raw.parse::<i32>() {
            return Self::from_id(id).ok_or_else(|| ChatError::UnknownRoom(raw.to_owned()));
        }
        Self::ALL
            .into_iter()
            .find(|room| room.name().eq_ignore_ascii_case(raw))
            .ok_or_else(|| ChatError::UnknownRoom(raw.to_owned()))
    }
}

// =============================================================================
// CHAT MESSAGE
// =============================================================================

/// A single chat message as carried by the broker and the history endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Backend-assigned id; absent on messages this client publishes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(deserialize_with = "null_as_default")]
    pub sender: String,
    /// ISO-8601 timestamp as produced by the sender.
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: String,
    #[serde(rename = "roomid", default)]
    pub room_id: Option<i32>,
}

/// A presence change announced by a system message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence<'a> {
    Joined(&'a str),
    Left(&'a str),
}

impl ChatMessage {
    /// Build a message stamped with the current UTC time.
    #[must_use]
    pub fn new(content: impl Into<String>, sender: impl Into<String>, room: Room) -> Self {
        Self {
            id: None,
            content: content.into(),
            sender: sender.into(),
            timestamp: now_timestamp(),
            room_id: Some(room.id()),
        }
    }

    /// Build a synthetic notice from the `System` sender.
    #[must_use]
    pub fn system(content: impl Into<String>, room: Room) -> Self {
        Self::new(content, SYSTEM_SENDER, room)
    }

    #[must_use]
    pub fn is_system(&self) -> bool {
        self.sender == SYSTEM_SENDER
    }

    /// Parsed timestamp, `None` when the sender used a format we can't read.
    #[must_use]
    pub fn sent_at(&self) -> Option<OffsetDateTime> {
        match OffsetDateTime::parse(&self.timestamp, &Rfc3339) {
            Ok(at) => Some(at),
            Err(_) => None,
        }
    }

    /// Join/leave announcement carried by a system message, if any.
    #[must_use]
    pub fn presence(&self) -> Option<Presence<'_>> {
        if !self.is_system() {
            return None;
        }
        if let Some(name) = self.content.strip_suffix(JOINED_SUFFIX) {
            return Some(Presence::Joined(name));
        }
        self.content.strip_suffix(LEFT_SUFFIX).map(Presence::Left)
    }
}

/// Text of the system notice published when a user joins.
#[must_use]
pub fn join_notice(username: &str) -> String {
    format!("{username}{JOINED_SUFFIX}")
}

/// Text of the system notice published when a user leaves.
#[must_use]
pub fn leave_notice(username: &str) -> String {
    format!("{username}{LEFT_SUFFIX}")
}

/// The backend writes unset fields as `null`; read those as empty.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn now_timestamp() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

/// Stable avatar colour slot for a username.
///
/// Same string hash the web UI used, so a user keeps their colour across
/// clients: `hash = code_unit + ((hash << 5) - hash)` over UTF-16 code units,
/// where the shift operates on the 32-bit truncation of `hash`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn avatar_color_index(username: &str) -> usize {
    let mut hash: i64 = 0;
    for unit in username.encode_utf16() {
        let shifted = i64::from((hash as i32).wrapping_shl(5));
        hash = i64::from(unit) + shifted - hash;
    }
    (hash.unsigned_abs() % AVATAR_PALETTE_SIZE) as usize
}

#[cfg(test)]
#[path = "models_test.rs"]
mod tests;
