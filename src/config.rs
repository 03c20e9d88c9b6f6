//! Client configuration: backend resolution, protocol endpoints and limits.
//!
//! DESIGN
//! ======
//! Defaults live in constants; `ChatConfig::from_env` overlays `CHAT_*`
//! environment variables and the CLI overlays its flags on top of that.
//! The backend base URL is resolved from, in order: an explicit override,
//! the production hostname pattern, a persisted override file (local
//! development only), and finally `<scheme>://<hostname>:8080`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::error::ChatError;

pub const DEFAULT_BACKEND_PORT: u16 = 8080;
pub const PRODUCTION_HOST_PATTERN: &str = "onrender.com";
pub const PRODUCTION_BACKEND_URL: &str = "https://realchatapp-1-ogou.onrender.com";
pub const DEFAULT_OVERRIDE_FILE: &str = ".chat-backend";

/// Raw WebSocket transport of the backend's SockJS endpoint at `/ws`. A
/// plain upgrade on `/ws` itself gets the SockJS greeting, not a 101.
pub const DEFAULT_WS_PATH: &str = "/ws/websocket";
pub const MESSAGES_PATH: &str = "/message";
pub const HEALTH_PATH: &str = "/health";
pub const MESSAGES_TOPIC: &str = "/topic/messages";
pub const CHAT_DESTINATION: &str = "/app/chat";

pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 3000;
pub const DEFAULT_TYPING_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

pub const MAX_MESSAGE_LENGTH: usize = 500;
pub const MIN_USERNAME_LENGTH: usize = 2;
pub const MAX_USERNAME_LENGTH: usize = 20;

// =============================================================================
// INPUT LIMITS
// =============================================================================

/// Local validation bounds, checked before anything touches the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub username_min: usize,
    pub username_max: usize,
    pub message_max: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            username_min: MIN_USERNAME_LENGTH,
            username_max: MAX_USERNAME_LENGTH,
            message_max: MAX_MESSAGE_LENGTH,
        }
    }
}

impl Limits {
    /// Trim and length-check a username, counting characters.
    ///
    /// # Errors
    ///
    /// `UsernameTooShort` / `UsernameTooLong` outside `[username_min, username_max]`.
    pub fn check_username(&self, raw: &str) -> Result<String, ChatError> {
        let name = raw.trim();
        let len = name.chars().count();
        if len < self.username_min {
            return Err(ChatError::UsernameTooShort { min: self.username_min });
        }
        if len > self.username_max {
            return Err(ChatError::UsernameTooLong { max: self.username_max });
        }
        Ok(name.to_owned())
    }

    /// Trim and length-check outgoing message content.
    ///
    /// # Errors
    ///
    /// `EmptyMessage` for blank input, `MessageTooLong` above `message_max`.
    pub fn check_message(&self, raw: &str) -> Result<String, ChatError> {
        let content = raw.trim();
        if content.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if content.chars().count() > self.message_max {
            return Err(ChatError::MessageTooLong { max: self.message_max });
        }
        Ok(content.to_owned())
    }
}

// =============================================================================
// BACKEND RESOLUTION
// =============================================================================

/// Inputs to backend URL resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendHints {
    /// Runtime override (`--backend-url` / `CHAT_BACKEND_URL`).
    pub explicit: Option<String>,
    /// Contents of the persisted override file, if present.
    pub persisted: Option<String>,
    /// Host the client considers itself served from.
    pub hostname: String,
    /// `http` or `https`.
    pub scheme: String,
}

impl Default for BackendHints {
    fn default() -> Self {
        Self {
            explicit: None,
            persisted: None,
            hostname: "localhost".to_owned(),
            scheme: "http".to_owned(),
        }
    }
}

/// Pick the backend base URL from the available hints.
#[must_use]
pub fn resolve_backend_url(hints: &BackendHints) -> String {
    if let Some(url) = non_empty(hints.explicit.as_deref()) {
        return trim_base(url);
    }
    if hints.hostname.contains(PRODUCTION_HOST_PATTERN) {
        return PRODUCTION_BACKEND_URL.to_owned();
    }
    if hints.hostname == "localhost" {
        if let Some(url) = non_empty(hints.persisted.as_deref()) {
            return trim_base(url);
        }
    }
    format!("{}://{}:{DEFAULT_BACKEND_PORT}", hints.scheme, hints.hostname)
}

/// Read a persisted backend override, ignoring a missing or blank file.
#[must_use]
pub fn read_persisted_override(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => non_empty(Some(contents.trim())).map(ToOwned::to_owned),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "no persisted backend override");
            None
        }
    }
}

/// Persist a backend override for later local runs.
///
/// # Errors
///
/// Propagates the filesystem error if the file cannot be written.
pub fn persist_backend_override(path: &Path, url: &str) -> std::io::Result<()> {
    std::fs::write(path, format!("{}\n", url.trim()))
}

/// Location of the persisted override (`CHAT_BACKEND_OVERRIDE_FILE`).
#[must_use]
pub fn override_file_path() -> PathBuf {
    PathBuf::from(env_string("CHAT_BACKEND_OVERRIDE_FILE").unwrap_or_else(|| DEFAULT_OVERRIDE_FILE.to_owned()))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_owned()
}

// =============================================================================
// CHAT CONFIG
// =============================================================================

/// Everything the client needs to reach the backend and pace itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Backend base URL without trailing slash, e.g. `http://localhost:8080`.
    pub backend_url: String,
    pub ws_path: String,
    pub topic: String,
    pub send_destination: String,
    pub max_reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    pub typing_timeout: Duration,
    pub connect_timeout: Duration,
    pub http_timeout: Duration,
    /// Drop history entries whose `roomid` differs from the current room.
    pub filter_history_by_room: bool,
    pub limits: Limits,
}

impl ChatConfig {
    /// Defaults for a given backend.
    #[must_use]
    pub fn for_backend(backend_url: &str) -> Self {
        Self {
            backend_url: trim_base(backend_url),
            ws_path: DEFAULT_WS_PATH.to_owned(),
            topic: MESSAGES_TOPIC.to_owned(),
            send_destination: CHAT_DESTINATION.to_owned(),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            typing_timeout: Duration::from_millis(DEFAULT_TYPING_TIMEOUT_MS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            filter_history_by_room: false,
            limits: Limits::default(),
        }
    }

    /// Build config from environment variables.
    ///
    /// `explicit_backend` wins over every other source when set.
    ///
    /// Optional:
    /// - `CHAT_BACKEND_URL`: explicit backend base URL
    /// - `CHAT_HOSTNAME` / `CHAT_SCHEME`: default `localhost` / `http`
    /// - `CHAT_BACKEND_OVERRIDE_FILE`: default `.chat-backend`
    /// - `CHAT_WS_PATH`: default `/ws/websocket`
    /// - `CHAT_MAX_RECONNECT_ATTEMPTS`: default 5
    /// - `CHAT_RECONNECT_DELAY_MS`: default 3000
    /// - `CHAT_TYPING_TIMEOUT_MS`: default 2000
    /// - `CHAT_CONNECT_TIMEOUT_SECS` / `CHAT_HTTP_TIMEOUT_SECS`: default 10
    /// - `CHAT_FILTER_HISTORY_BY_ROOM`: default false
    #[must_use]
    pub fn from_env(explicit_backend: Option<String>) -> Self {
        let hints = BackendHints {
            explicit: explicit_backend.or_else(|| env_string("CHAT_BACKEND_URL")),
            persisted: read_persisted_override(&override_file_path()),
            hostname: env_string("CHAT_HOSTNAME").unwrap_or_else(|| "localhost".to_owned()),
            scheme: env_string("CHAT_SCHEME").unwrap_or_else(|| "http".to_owned()),
        };

        let mut config = Self::for_backend(&resolve_backend_url(&hints));
        if let Some(path) = env_string("CHAT_WS_PATH") {
            config.ws_path = path;
        }
        config.max_reconnect_attempts = env_parse("CHAT_MAX_RECONNECT_ATTEMPTS", DEFAULT_MAX_RECONNECT_ATTEMPTS);
        config.reconnect_delay = Duration::from_millis(env_parse("CHAT_RECONNECT_DELAY_MS", DEFAULT_RECONNECT_DELAY_MS));
        config.typing_timeout = Duration::from_millis(env_parse("CHAT_TYPING_TIMEOUT_MS", DEFAULT_TYPING_TIMEOUT_MS));
        config.connect_timeout = Duration::from_secs(env_parse("CHAT_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS));
        config.http_timeout = Duration::from_secs(env_parse("CHAT_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS));
        config.filter_history_by_room = env_parse("CHAT_FILTER_HISTORY_BY_ROOM", false);
        config
    }

    /// WebSocket URL for the STOMP endpoint (`http` → `ws`, `https` → `wss`).
    ///
    /// # Errors
    ///
    /// `InvalidBaseUrl` when the backend URL is neither http nor https.
    pub fn ws_url(&self) -> Result<String, ChatError> {
        let path = &self.ws_path;
        if let Some(rest) = self.backend_url.strip_prefix("http://") {
            return Ok(format!("ws://{rest}{path}"));
        }
        if let Some(rest) = self.backend_url.strip_prefix("https://") {
            return Ok(format!("wss://{rest}{path}"));
        }
        Err(ChatError::InvalidBaseUrl(self.backend_url.clone()))
    }

    #[must_use]
    pub fn messages_url(&self) -> String {
        format!("{}{MESSAGES_PATH}", self.backend_url)
    }

    #[must_use]
    pub fn health_url(&self) -> String {
        format!("{}{HEALTH_PATH}", self.backend_url)
    }
}

fn env_string(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value.trim().to_owned()),
        _ => None,
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    env_string(key).map_or(default, |v| v.parse::<T>().unwrap_or(default))
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
