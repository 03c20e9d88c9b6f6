//! Chat client orchestrator.
//!
//! SYSTEM CONTEXT
//! ==============
//! `ChatApp` builds the connection manager and the message pipeline around
//! one `SurfaceHandle` and owns all mutable client state. `run` is the single
//! event loop: it selects over connection wakeups, the history fetch in
//! flight, the typing deadline and user commands, and handles each to
//! completion before waiting again.
//!
//! User actions are also callable directly (`join`, `send`, ...), which is
//! how tests and embedders drive the client without a command channel.

#[cfg(test)]
#[path = "app_test.rs"]
mod app_test;

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::{ChatConfig, Limits};
use crate::connection::{ConnectionManager, ConnectionWakeup, Inbound};
use crate::error::{ChatError, ErrorKind};
use crate::models::{ChatMessage, Room};
use crate::net::api::HistorySource;
use crate::net::transport::Connector;
use crate::pipeline::{HistoryOutcome, MessagePipeline};
use crate::state::session::ConnectionState;
use crate::state::surface::{Severity, SurfaceHandle};
use crate::state::typing::TypingDebounce;
use crate::timer::sleep_until_or_pending;

pub const REFRESHING_NOTICE: &str = "Refreshing messages...";
pub const REFRESHED_NOTICE: &str = "Messages refreshed successfully!";

/// User actions accepted by [`ChatApp::run`].
#[derive(Debug)]
pub enum AppCommand {
    Join(String),
    Send(String),
    SwitchRoom(Room),
    Refresh,
    Keystroke,
    Disconnect,
    Status(oneshot::Sender<ConnectionInfo>),
    Shutdown,
}

/// Snapshot of the connection for status displays.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub username: String,
    pub room: Room,
    pub state: ConnectionState,
    pub connected: bool,
    pub reconnect_attempts: u32,
}

#[derive(Debug)]
enum AppEvent {
    Command(Option<AppCommand>),
    Connection(ConnectionWakeup),
    History(HistoryOutcome),
    TypingExpired,
}

pub struct ChatApp {
    limits: Limits,
    surface: SurfaceHandle,
    connection: ConnectionManager,
    pipeline: MessagePipeline,
    typing: TypingDebounce,
    refresh_pending: bool,
}

impl ChatApp {
    /// # Errors
    ///
    /// `InvalidBaseUrl` when the backend URL has no WebSocket form.
    pub fn new(
        config: &ChatConfig,
        connector: Arc<dyn Connector>,
        history: Arc<dyn HistorySource>,
        surface: SurfaceHandle,
    ) -> Result<Self, ChatError> {
        Ok(Self {
            limits: config.limits,
            connection: ConnectionManager::new(config, connector, surface.clone())?,
            pipeline: MessagePipeline::new(history, surface.clone(), config.filter_history_by_room),
            typing: TypingDebounce::new(config.typing_timeout),
            surface,
            refresh_pending: false,
        })
    }

    #[must_use]
    pub fn surface(&self) -> &SurfaceHandle {
        &self.surface
    }

    // =========================================================================
    // USER ACTIONS
    // =========================================================================

    /// Validate the username and open a session, replacing any current one.
    /// History for the current room starts loading once connected.
    ///
    /// # Errors
    ///
    /// Validation errors (with a notice, nothing sent), or the transport
    /// error of the first attempt; a reconnect is already armed in that case.
    pub async fn join(&mut self, raw_username: &str) -> Result<(), ChatError> {
        let username = self.limits.check_username(raw_username).map_err(|e| self.reject(e))?;
        if self.connection.session().connection_state != ConnectionState::Disconnected {
            self.disconnect();
        }

        let room = self.connection.session().current_room;
        self.connection.reset_attempts();
        self.pipeline.set_local_user(Some(username.clone()));
        self.surface.set_profile(&username);
        self.surface.set_active_room(room);
        self.surface.show_room_placeholder(room);

        self.connection.connect(&username).await?;
        info!(username = %username, room = %room, "joined");
        self.pipeline.begin_load(room);
        Ok(())
    }

    /// Publish a chat message. The broker echo is what renders it.
    ///
    /// # Errors
    ///
    /// Validation or transport errors; nothing is published.
    pub fn send(&mut self, raw: &str) -> Result<ChatMessage, ChatError> {
        match self.connection.send(raw) {
            Ok(message) => {
                if self.typing.hide() {
                    self.surface.set_typing_indicator(false);
                }
                Ok(message)
            }
            Err(ChatError::EmptyMessage) => Err(ChatError::EmptyMessage),
            Err(e) if e.kind() == ErrorKind::Validation => Err(self.reject(e)),
            Err(e) => Err(e),
        }
    }

    /// Move to `room`: clear the view and load that room's history.
    pub fn switch_room(&mut self, room: Room) {
        info!(room = %room, "switching room");
        self.connection.set_room(room);
        self.refresh_pending = false;
        self.pipeline.switch_room(room);
    }

    /// Reload the current room's history.
    ///
    /// # Errors
    ///
    /// `NotConnected` before a username has been accepted.
    pub fn refresh(&mut self) -> Result<(), ChatError> {
        if self.connection.session().username.is_empty() {
            return Err(self.reject(ChatError::NotConnected));
        }
        self.surface.show_notice(REFRESHING_NOTICE, Severity::Info);
        self.refresh_pending = true;
        self.pipeline.begin_load(self.connection.session().current_room);
        Ok(())
    }

    /// Local typing activity. Ignored while not connected.
    pub fn keystroke(&mut self) {
        if !self.connection.session().is_connected() {
            return;
        }
        let was_visible = self.typing.is_visible();
        self.typing.keystroke(Instant::now());
        if !was_visible {
            self.surface.set_typing_indicator(true);
        }
    }

    /// Leave the chat: announce, close, and drop any history in flight.
    pub fn disconnect(&mut self) {
        self.pipeline.cancel();
        self.refresh_pending = false;
        self.connection.disconnect();
        if self.typing.hide() {
            self.surface.set_typing_indicator(false);
        }
    }

    #[must_use]
    pub fn status(&self) -> ConnectionInfo {
        let session = self.connection.session();
        ConnectionInfo {
            username: session.username.clone(),
            room: session.current_room,
            state: session.connection_state,
            connected: session.is_connected(),
            reconnect_attempts: session.reconnect_attempts,
        }
    }

    // =========================================================================
    // EVENT LOOP
    // =========================================================================

    /// Serve `commands` until `Shutdown` or the sender is dropped, then
    /// disconnect.
    pub async fn run(mut self, mut commands: mpsc::Receiver<AppCommand>) {
        info!("chat client running");
        loop {
            let event = self.wait(Some(&mut commands)).await;
            if !self.process(event).await {
                break;
            }
        }
        self.disconnect();
        info!("chat client stopped");
    }

    /// Handle the next internal event (connection, history or typing).
    /// Pending while none is due.
    pub async fn tick(&mut self) {
        let event = self.wait(None).await;
        self.process(event).await;
    }

    async fn wait(&mut self, commands: Option<&mut mpsc::Receiver<AppCommand>>) -> AppEvent {
        let typing_deadline = self.typing.deadline();
        tokio::select! {
            biased;
            wakeup = self.connection.next_wakeup() => AppEvent::Connection(wakeup),
            outcome = self.pipeline.next_history() => AppEvent::History(outcome),
            () = sleep_until_or_pending(typing_deadline) => AppEvent::TypingExpired,
            command = recv_or_pending(commands) => AppEvent::Command(command),
        }
    }

    /// Returns `false` when the loop should stop.
    async fn process(&mut self, event: AppEvent) -> bool {
        match event {
            AppEvent::Command(None | Some(AppCommand::Shutdown)) => return false,
            AppEvent::Command(Some(command)) => self.dispatch(command).await,
            AppEvent::Connection(wakeup) => match self.connection.handle(wakeup).await {
                Some(Inbound::Message(message)) => self.pipeline.on_live_message(&message),
                Some(Inbound::Reconnected) => self.pipeline.begin_load(self.connection.session().current_room),
                None => {}
            },
            AppEvent::History(outcome) => self.finish_history(outcome),
            AppEvent::TypingExpired => {
                if self.typing.expire(Instant::now()) {
                    self.surface.set_typing_indicator(false);
                }
            }
        }
        true
    }

    async fn dispatch(&mut self, command: AppCommand) {
        let result = match command {
            AppCommand::Join(username) => self.join(&username).await,
            AppCommand::Send(content) => self.send(&content).map(|_| ()),
            AppCommand::SwitchRoom(room) => {
                self.switch_room(room);
                Ok(())
            }
            AppCommand::Refresh => self.refresh(),
            AppCommand::Keystroke => {
                self.keystroke();
                Ok(())
            }
            AppCommand::Disconnect => {
                self.disconnect();
                Ok(())
            }
            AppCommand::Status(reply) => {
                if reply.send(self.status()).is_err() {
                    debug!("status requester went away");
                }
                Ok(())
            }
            AppCommand::Shutdown => Ok(()),
        };
        if let Err(e) = result {
            debug!(error = %e, code = e.error_code(), "command failed");
        }
    }

    fn finish_history(&mut self, outcome: HistoryOutcome) {
        let refreshed = std::mem::take(&mut self.refresh_pending);
        match self.pipeline.apply_history(outcome) {
            Ok(_) if refreshed => self.surface.show_notice(REFRESHED_NOTICE, Severity::Success),
            Ok(_) => {}
            Err(e) => debug!(error = %e, "history not applied"),
        }
    }

    /// Surface a validation error and hand it back.
    fn reject(&self, error: ChatError) -> ChatError {
        self.surface.show_notice(error.to_string(), Severity::Error);
        error
    }
}

async fn recv_or_pending(commands: Option<&mut mpsc::Receiver<AppCommand>>) -> Option<AppCommand> {
    match commands {
        Some(commands) => commands.recv().await,
        None => std::future::pending().await,
    }
}
