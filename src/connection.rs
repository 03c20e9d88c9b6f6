//! Connection manager: the broker session lifecycle.
//!
//! DESIGN
//! ======
//! `ConnectionManager` owns the `Session` and the one live `Link`. It never
//! spawns or sleeps on its own; instead it exposes `next_wakeup()` (the next
//! link event or the armed reconnect deadline) so the event loop can select
//! over it alongside everything else, then feeds the wakeup back through
//! `handle()`.
//!
//! Failures follow a fixed-interval policy: every transport failure marks
//! the session `Failed`, tells the user, and arms one reconnect deadline if
//! the error is retryable and the current streak has attempts left. Arming
//! replaces any pending deadline. A successful connect ends the streak.

#[cfg(test)]
#[path = "connection_test.rs"]
mod connection_test;

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{ChatConfig, Limits};
use crate::error::ChatError;
use crate::models::{ChatMessage, Room, join_notice, leave_notice};
use crate::net::transport::{Connector, Link, LinkEvent, LinkTarget};
use crate::state::reconnect::ReconnectPolicy;
use crate::state::session::{ConnectionState, Session};
use crate::state::surface::{Severity, SurfaceHandle};
use crate::timer::sleep_until_or_pending;

/// Notice shown on every connection failure.
pub const CONNECT_FAILED_NOTICE: &str = "Failed to connect to chat server. Please try again.";

/// What woke the connection manager up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionWakeup {
    Link(LinkEvent),
    ReconnectDue,
}

/// Result of handling a wakeup that the rest of the client cares about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inbound {
    /// A chat message arrived on the topic.
    Message(ChatMessage),
    /// A scheduled reconnect succeeded.
    Reconnected,
}

pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    surface: SurfaceHandle,
    target: LinkTarget,
    send_destination: String,
    limits: Limits,
    policy: ReconnectPolicy,
    session: Session,
    link: Option<Link>,
    reconnect_at: Option<Instant>,
}

impl ConnectionManager {
    /// # Errors
    ///
    /// `InvalidBaseUrl` when the configured backend has no WebSocket form.
    pub fn new(config: &ChatConfig, connector: Arc<dyn Connector>, surface: SurfaceHandle) -> Result<Self, ChatError> {
        Ok(Self {
            connector,
            surface,
            target: LinkTarget::from_config(config)?,
            send_destination: config.send_destination.clone(),
            limits: config.limits,
            policy: ReconnectPolicy::new(config.max_reconnect_attempts, config.reconnect_delay),
            session: Session::default(),
            link: None,
            reconnect_at: None,
        })
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Pending reconnect deadline, if one is armed.
    #[must_use]
    pub fn reconnect_deadline(&self) -> Option<Instant> {
        self.reconnect_at
    }

    /// Open a session for `username` and announce the join.
    ///
    /// # Errors
    ///
    /// The transport error, after the failure has been surfaced and a
    /// reconnect armed if the policy allows.
    pub async fn connect(&mut self, username: &str) -> Result<(), ChatError> {
        self.session.username = username.to_owned();
        self.set_state(ConnectionState::Connecting);
        info!(username, url = %self.target.url, "connecting");

        match self.connector.connect(&self.target).await {
            Ok(link) => {
                self.link = Some(link);
                self.reconnect_at = None;
                self.session.reconnect_attempts = 0;
                self.set_state(ConnectionState::Connected);
                self.surface.add_online_user(username);
                info!(username, "connected");
                self.send_system(join_notice(username));
                Ok(())
            }
            Err(e) => {
                self.handle_failure(&e);
                Err(e)
            }
        }
    }

    /// Retry with the session's username.
    pub async fn reconnect(&mut self) {
        let username = self.session.username.clone();
        info!(
            attempt = self.session.reconnect_attempts,
            max = self.policy.max_attempts,
            "attempting reconnect"
        );
        if let Err(e) = self.connect(&username).await {
            debug!(error = %e, "reconnect attempt failed");
        }
    }

    /// Wait for the next link event or the reconnect deadline. Cancel-safe.
    pub async fn next_wakeup(&mut self) -> ConnectionWakeup {
        let reconnect_at = self.reconnect_at;
        let link = self.link.as_mut();
        tokio::select! {
            event = next_link_event(link) => ConnectionWakeup::Link(event),
            () = sleep_until_or_pending(reconnect_at) => ConnectionWakeup::ReconnectDue,
        }
    }

    /// Act on a wakeup from `next_wakeup`.
    pub async fn handle(&mut self, wakeup: ConnectionWakeup) -> Option<Inbound> {
        match wakeup {
            ConnectionWakeup::Link(LinkEvent::Message(body)) => match serde_json::from_str::<ChatMessage>(&body) {
                Ok(message) => Some(Inbound::Message(message)),
                Err(e) => {
                    warn!(error = %e, "dropping undecodable chat message");
                    None
                }
            },
            ConnectionWakeup::Link(LinkEvent::Closed(reason)) => {
                self.handle_failure(&ChatError::Transport(reason));
                None
            }
            ConnectionWakeup::ReconnectDue => {
                self.reconnect_at = None;
                if self.session.is_connected() || self.session.username.is_empty() {
                    return None;
                }
                self.reconnect().await;
                self.session.is_connected().then_some(Inbound::Reconnected)
            }
        }
    }

    /// Validate and publish a chat message from the local user.
    ///
    /// # Errors
    ///
    /// `NotConnected`, `EmptyMessage` or `MessageTooLong` without publishing,
    /// or `Transport` if the link died under the publish.
    pub fn send(&mut self, raw: &str) -> Result<ChatMessage, ChatError> {
        if !self.session.is_connected() {
            return Err(ChatError::NotConnected);
        }
        let content = self.limits.check_message(raw)?;
        let message = ChatMessage::new(content, self.session.username.as_str(), self.session.current_room);
        self.publish(&message)?;
        Ok(message)
    }

    /// Publish a `System` message. No-op while disconnected.
    pub fn send_system(&mut self, content: String) {
        if !self.session.is_connected() {
            return;
        }
        let message = ChatMessage::system(content, self.session.current_room);
        if let Err(e) = self.publish(&message) {
            warn!(error = %e, "system message not published");
        }
    }

    /// Announce the leave, close the link and reset to `Disconnected`.
    pub fn disconnect(&mut self) {
        if self.session.is_connected() {
            let notice = leave_notice(&self.session.username);
            self.send_system(notice);
        }
        if let Some(link) = self.link.take() {
            link.close();
        }
        self.reconnect_at = None;
        self.set_state(ConnectionState::Disconnected);
        info!(username = %self.session.username, "disconnected");
    }

    pub fn set_room(&mut self, room: Room) {
        self.session.current_room = room;
    }

    /// Start a fresh failure streak.
    pub fn reset_attempts(&mut self) {
        self.session.reconnect_attempts = 0;
    }

    fn publish(&mut self, message: &ChatMessage) -> Result<(), ChatError> {
        let Some(link) = &self.link else {
            return Err(ChatError::NotConnected);
        };
        let body = serde_json::to_string(message).map_err(|e| ChatError::Transport(e.to_string()))?;
        if let Err(e) = link.publish(&self.send_destination, body) {
            self.handle_failure(&e);
            return Err(e);
        }
        debug!(destination = %self.send_destination, sender = %message.sender, "published");
        Ok(())
    }

    fn handle_failure(&mut self, error: &ChatError) {
        self.link = None;
        self.set_state(ConnectionState::Failed);
        warn!(error = %error, attempts = self.session.reconnect_attempts, "connection failed");

        let attempts = self.session.reconnect_attempts;
        let delay = error.retryable().then(|| self.policy.next_delay(attempts)).flatten();
        match delay {
            Some(delay) => {
                self.session.reconnect_attempts += 1;
                self.reconnect_at = Some(Instant::now() + delay);
                self.surface.show_notice(CONNECT_FAILED_NOTICE, Severity::Warning);
                info!(
                    attempt = self.session.reconnect_attempts,
                    max = self.policy.max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "reconnect scheduled"
                );
            }
            None => {
                self.reconnect_at = None;
                self.surface.show_notice(CONNECT_FAILED_NOTICE, Severity::Error);
                if error.retryable() {
                    warn!(max = self.policy.max_attempts, "reconnect attempts exhausted");
                } else {
                    warn!(code = error.error_code(), "not retrying");
                }
            }
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.session.connection_state = state;
        self.surface.set_connection_status(state);
    }
}

async fn next_link_event(link: Option<&mut Link>) -> LinkEvent {
    match link {
        Some(link) => link.next_event().await,
        None => std::future::pending().await,
    }
}
