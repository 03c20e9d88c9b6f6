//! Connection session record.

use crate::models::Room;

/// Lifecycle of the broker connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl ConnectionState {
    /// Status banner text.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting...",
            Self::Connected => "Connected",
            Self::Failed => "Connection Failed",
        }
    }
}

/// The one active session of a client. Mutated only by `ConnectionManager`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub current_room: Room,
    pub connection_state: ConnectionState,
    /// Consecutive failed attempts in the current failure streak.
    pub reconnect_attempts: u32,
}

impl Session {
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection_state == ConnectionState::Connected
    }
}
