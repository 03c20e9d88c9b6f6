//! Client error taxonomy.
//!
//! ERROR HANDLING
//! ==============
//! Every failure the client can observe maps to one of three kinds:
//! transport failures feed the reconnect loop, validation failures are
//! rejected locally before any network call, and fetch failures are
//! surfaced as recoverable notices without an automatic retry. Nothing here
//! is fatal to the process.

/// Broad class of a [`ChatError`], used to route it to the right handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connect or publish failure; triggers the reconnect loop.
    Transport,
    /// Bad local input; rejected before touching the network.
    Validation,
    /// History load failure; surfaced as a notice, never retried.
    Fetch,
}

/// Errors produced by chat client operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("Username must be at least {min} characters long")]
    UsernameTooShort { min: usize },

    #[error("Username must be less than {max} characters")]
    UsernameTooLong { max: usize },

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Message is too long. Maximum {max} characters allowed.")]
    MessageTooLong { max: usize },

    #[error("Not connected to server")]
    NotConnected,

    #[error("unknown room: {0}")]
    UnknownRoom(String),

    /// The WebSocket/STOMP transport failed to connect, publish or stay up.
    #[error("transport failed: {0}")]
    Transport(String),

    /// The configured backend URL has no usable scheme.
    #[error("invalid backend URL: {0}")]
    InvalidBaseUrl(String),

    /// The history request could not be sent or its body could not be read.
    #[error("history request failed: {0}")]
    Fetch(String),

    /// The history endpoint answered with a non-success status.
    #[error("history request failed with status {status}")]
    FetchStatus { status: u16 },

    /// The history request was superseded by a room switch or disconnect.
    #[error("history request cancelled")]
    Cancelled,
}

impl ChatError {
    /// Classify the error for routing.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) | Self::InvalidBaseUrl(_) => ErrorKind::Transport,
            Self::Fetch(_) | Self::FetchStatus { .. } | Self::Cancelled => ErrorKind::Fetch,
            Self::UsernameTooShort { .. }
            | Self::UsernameTooLong { .. }
            | Self::EmptyMessage
            | Self::MessageTooLong { .. }
            | Self::NotConnected
            | Self::UnknownRoom(_) => ErrorKind::Validation,
        }
    }

    /// Stable machine-readable code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UsernameTooShort { .. } => "E_USERNAME_TOO_SHORT",
            Self::UsernameTooLong { .. } => "E_USERNAME_TOO_LONG",
            Self::EmptyMessage => "E_EMPTY_MESSAGE",
            Self::MessageTooLong { .. } => "E_MESSAGE_TOO_LONG",
            Self::NotConnected => "E_NOT_CONNECTED",
            Self::UnknownRoom(_) => "E_UNKNOWN_ROOM",
            Self::Transport(_) => "E_TRANSPORT",
            Self::InvalidBaseUrl(_) => "E_INVALID_BASE_URL",
            Self::Fetch(_) => "E_FETCH",
            Self::FetchStatus { .. } => "E_FETCH_STATUS",
            Self::Cancelled => "E_CANCELLED",
        }
    }

    /// Whether trying the same operation again could succeed.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Fetch(_) | Self::FetchStatus { status: 429 | 500..=599 })
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
