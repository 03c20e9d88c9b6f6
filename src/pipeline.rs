//! Message pipeline: history loading and live message delivery.
//!
//! DESIGN
//! ======
//! A history load is split into `begin_load` (spawn the fetch),
//! `next_history` (await it; cancel-safe, so it can sit in the event loop's
//! `select!`) and `apply_history` (render). Live messages keep rendering
//! while a fetch is in flight.
//!
//! Every fetch carries its own `CancellationToken`. Starting another load,
//! switching rooms or disconnecting cancels the previous one, and an
//! outcome for a room other than the current one is dropped, so history for
//! a room the user has left never reaches the surface.

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod pipeline_test;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ChatError;
use crate::models::{ChatMessage, Presence, Room};
use crate::net::api::HistorySource;
use crate::state::surface::{Severity, SurfaceHandle};

/// Notice shown when the history endpoint answers with an error status.
pub const HISTORY_STATUS_NOTICE: &str = "Failed to load previous messages";
/// Notice shown when the history request itself fails.
pub const HISTORY_UNREACHABLE_NOTICE: &str = "Unable to load previous messages. Please check your connection.";

/// A finished history fetch.
#[derive(Debug)]
pub struct HistoryOutcome {
    pub room: Room,
    pub result: Result<Vec<ChatMessage>, ChatError>,
}

struct InFlight {
    room: Room,
    token: CancellationToken,
    handle: JoinHandle<Result<Vec<ChatMessage>, ChatError>>,
}

pub struct MessagePipeline {
    history: Arc<dyn HistorySource>,
    surface: SurfaceHandle,
    local_user: Option<String>,
    filter_by_room: bool,
    current_room: Room,
    in_flight: Option<InFlight>,
}

impl MessagePipeline {
    pub fn new(history: Arc<dyn HistorySource>, surface: SurfaceHandle, filter_by_room: bool) -> Self {
        Self {
            history,
            surface,
            local_user: None,
            filter_by_room,
            current_room: Room::default(),
            in_flight: None,
        }
    }

    /// Username whose messages render as own.
    pub fn set_local_user(&mut self, username: Option<String>) {
        self.local_user = username;
    }

    #[must_use]
    pub fn current_room(&self) -> Room {
        self.current_room
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Start fetching history for `room`, superseding any fetch in flight.
    pub fn begin_load(&mut self, room: Room) {
        self.cancel();
        self.current_room = room;

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let history = Arc::clone(&self.history);
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancelled.cancelled() => Err(ChatError::Cancelled),
                result = history.fetch_messages(room) => result,
            }
        });
        debug!(room = %room, "history load started");
        self.in_flight = Some(InFlight { room, token, handle });
    }

    /// Wait for the fetch in flight. Pending forever when there is none.
    /// Cancel-safe.
    pub async fn next_history(&mut self) -> HistoryOutcome {
        let Some(in_flight) = self.in_flight.as_mut() else {
            return std::future::pending().await;
        };
        let joined = (&mut in_flight.handle).await;
        let room = in_flight.room;
        let cancelled = in_flight.token.is_cancelled();
        self.in_flight = None;

        let result = match joined {
            Ok(_) if cancelled => Err(ChatError::Cancelled),
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(ChatError::Cancelled),
            Err(e) => Err(ChatError::Fetch(e.to_string())),
        };
        HistoryOutcome { room, result }
    }

    /// Render a finished fetch. Returns how many messages were rendered.
    ///
    /// # Errors
    ///
    /// `Cancelled` for stale or superseded outcomes (nothing shown), or the
    /// fetch error after an error notice has been shown.
    pub fn apply_history(&mut self, outcome: HistoryOutcome) -> Result<usize, ChatError> {
        if outcome.room != self.current_room {
            debug!(room = %outcome.room, current = %self.current_room, "discarding stale history");
            return Err(ChatError::Cancelled);
        }
        let mut messages = match outcome.result {
            Ok(messages) => messages,
            Err(ChatError::Cancelled) => return Err(ChatError::Cancelled),
            Err(e) => {
                warn!(error = %e, room = %outcome.room, "history load failed");
                self.surface.show_notice(history_failure_notice(&e), Severity::Error);
                return Err(e);
            }
        };

        if self.filter_by_room {
            let id = outcome.room.id();
            messages.retain(|m| m.room_id == Some(id));
        }
        sort_history(&mut messages);
        info!(room = %outcome.room, count = messages.len(), "history loaded");
        if messages.is_empty() {
            return Ok(0);
        }

        self.surface.clear_messages();
        for message in &messages {
            self.surface.render_message(message, self.is_own(message), false);
        }
        self.surface.scroll_to_latest();
        Ok(messages.len())
    }

    /// Fetch and render history for `room` in one go.
    ///
    /// # Errors
    ///
    /// As for [`Self::apply_history`].
    pub async fn load_history(&mut self, room: Room) -> Result<usize, ChatError> {
        self.begin_load(room);
        let outcome = self.next_history().await;
        self.apply_history(outcome)
    }

    /// Abandon the fetch in flight, if any.
    pub fn cancel(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.token.cancel();
            in_flight.handle.abort();
            debug!(room = %in_flight.room, "history load cancelled");
        }
    }

    /// Render a message pushed by the broker.
    pub fn on_live_message(&mut self, message: &ChatMessage) {
        if self.filter_by_room && message.room_id.is_some_and(|id| id != self.current_room.id()) {
            debug!(room_id = ?message.room_id, "ignoring live message for another room");
            return;
        }
        let own = self.is_own(message);
        self.surface.render_message(message, own, true);
        self.surface.scroll_to_latest();
        if !own && !message.is_system() {
            self.surface.notification_cue();
        }
        match message.presence() {
            Some(Presence::Joined(name)) => self.surface.add_online_user(name),
            Some(Presence::Left(name)) => self.surface.remove_online_user(name),
            None => {}
        }
    }

    /// Show `room` empty and start loading its history.
    pub fn switch_room(&mut self, room: Room) {
        self.surface.clear_messages();
        self.surface.set_active_room(room);
        self.surface.show_room_placeholder(room);
        self.begin_load(room);
    }

    fn is_own(&self, message: &ChatMessage) -> bool {
        self.local_user.as_deref() == Some(message.sender.as_str())
    }
}

fn history_failure_notice(error: &ChatError) -> &'static str {
    match error {
        ChatError::FetchStatus { .. } => HISTORY_STATUS_NOTICE,
        _ => HISTORY_UNREACHABLE_NOTICE,
    }
}

/// Order ascending by timestamp. Stable; unparseable timestamps sort first.
pub fn sort_history(messages: &mut [ChatMessage]) {
    messages.sort_by_cached_key(ChatMessage::sent_at);
}
