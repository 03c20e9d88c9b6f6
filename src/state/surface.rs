//! Presentation surface: the UI state every view projects.
//!
//! DESIGN
//! ======
//! Every observable UI operation is a `SurfaceChange`. `SurfaceHandle`
//! applies the change to `SurfaceState` first, then hands it to the view's
//! `on_change` hook, so the state is always the source of truth and views
//! stay dumb projections. The handle is cloned into the connection manager
//! and the pipeline at construction time; nothing looks it up globally.

#[cfg(test)]
#[path = "surface_test.rs"]
mod surface_test;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::models::{ChatMessage, Room};
use crate::state::session::ConnectionState;

/// Oldest notices are dropped past this many.
pub const MAX_NOTICES: usize = 50;

/// Severity of a transient notice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// A message as placed on the surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedMessage {
    pub message: ChatMessage,
    /// Sent by the local user.
    pub own: bool,
    /// Arrived live from the broker rather than from history.
    pub live: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub severity: Severity,
}

/// One observable UI operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SurfaceChange {
    RenderMessage(RenderedMessage),
    ClearMessages,
    ShowRoomPlaceholder(Room),
    SetActiveRoom(Room),
    SetProfile(String),
    SetConnectionStatus(ConnectionState),
    SetTypingIndicator(bool),
    AddOnlineUser(String),
    RemoveOnlineUser(String),
    ShowNotice(Notice),
    ScrollToLatest,
    NotificationCue,
}

/// Complete UI state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SurfaceState {
    /// Local username once joined.
    pub profile: Option<String>,
    pub active_room: Room,
    /// Welcome placeholder shown while the room has no messages on screen.
    pub placeholder: Option<Room>,
    pub messages: Vec<RenderedMessage>,
    pub connection_status: ConnectionState,
    pub typing_visible: bool,
    pub online_users: BTreeSet<String>,
    pub notices: Vec<Notice>,
    /// Bumped on every scroll-to-latest request.
    pub scroll_seq: u64,
    /// Bumped on every notification cue.
    pub cue_seq: u64,
}

impl SurfaceState {
    /// Apply one change. Pure: no I/O, no clocks.
    pub fn apply(&mut self, change: &SurfaceChange) {
        match change {
            SurfaceChange::RenderMessage(rendered) => {
                self.placeholder = None;
                self.messages.push(rendered.clone());
            }
            SurfaceChange::ClearMessages => {
                self.placeholder = None;
                self.messages.clear();
            }
            SurfaceChange::ShowRoomPlaceholder(room) => {
                self.messages.clear();
                self.placeholder = Some(*room);
            }
            SurfaceChange::SetActiveRoom(room) => self.active_room = *room,
            SurfaceChange::SetProfile(name) => self.profile = Some(name.clone()),
            SurfaceChange::SetConnectionStatus(status) => self.connection_status = *status,
            SurfaceChange::SetTypingIndicator(visible) => self.typing_visible = *visible,
            SurfaceChange::AddOnlineUser(name) => {
                self.online_users.insert(name.clone());
            }
            SurfaceChange::RemoveOnlineUser(name) => {
                self.online_users.remove(name);
            }
            SurfaceChange::ShowNotice(notice) => {
                if self.notices.len() >= MAX_NOTICES {
                    self.notices.remove(0);
                }
                self.notices.push(notice.clone());
            }
            SurfaceChange::ScrollToLatest => self.scroll_seq += 1,
            SurfaceChange::NotificationCue => self.cue_seq += 1,
        }
    }

    /// Most recent notice, if any.
    #[must_use]
    pub fn last_notice(&self) -> Option<&Notice> {
        self.notices.last()
    }
}

/// A view over `SurfaceState`.
pub trait ChatSurface: Send {
    fn state(&self) -> &SurfaceState;
    fn state_mut(&mut self) -> &mut SurfaceState;

    /// Called after `change` has been applied to the state.
    fn on_change(&mut self, _change: &SurfaceChange) {}
}

/// The state alone is a valid headless surface.
impl ChatSurface for SurfaceState {
    fn state(&self) -> &SurfaceState {
        self
    }

    fn state_mut(&mut self) -> &mut SurfaceState {
        self
    }
}

/// Shared, cloneable handle to the one surface of a client.
#[derive(Clone)]
pub struct SurfaceHandle {
    inner: Arc<Mutex<Box<dyn ChatSurface>>>,
}

impl fmt::Debug for SurfaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceHandle").finish_non_exhaustive()
    }
}

impl SurfaceHandle {
    pub fn new(surface: impl ChatSurface + 'static) -> Self {
        Self { inner: Arc::new(Mutex::new(Box::new(surface))) }
    }

    /// Surface with no view attached.
    #[must_use]
    pub fn headless() -> Self {
        Self::new(SurfaceState::default())
    }

    pub fn apply(&self, change: SurfaceChange) {
        let mut surface = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        surface.state_mut().apply(&change);
        surface.on_change(&change);
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> SurfaceState {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state()
            .clone()
    }

    pub fn render_message(&self, message: &ChatMessage, own: bool, live: bool) {
        self.apply(SurfaceChange::RenderMessage(RenderedMessage { message: message.clone(), own, live }));
    }

    pub fn clear_messages(&self) {
        self.apply(SurfaceChange::ClearMessages);
    }

    pub fn show_room_placeholder(&self, room: Room) {
        self.apply(SurfaceChange::ShowRoomPlaceholder(room));
    }

    pub fn set_active_room(&self, room: Room) {
        self.apply(SurfaceChange::SetActiveRoom(room));
    }

    pub fn set_profile(&self, username: &str) {
        self.apply(SurfaceChange::SetProfile(username.to_owned()));
    }

    pub fn set_connection_status(&self, status: ConnectionState) {
        self.apply(SurfaceChange::SetConnectionStatus(status));
    }

    pub fn set_typing_indicator(&self, visible: bool) {
        self.apply(SurfaceChange::SetTypingIndicator(visible));
    }

    pub fn add_online_user(&self, username: &str) {
        self.apply(SurfaceChange::AddOnlineUser(username.to_owned()));
    }

    pub fn remove_online_user(&self, username: &str) {
        self.apply(SurfaceChange::RemoveOnlineUser(username.to_owned()));
    }

    pub fn show_notice(&self, text: impl Into<String>, severity: Severity) {
        self.apply(SurfaceChange::ShowNotice(Notice { text: text.into(), severity }));
    }

    pub fn scroll_to_latest(&self) {
        self.apply(SurfaceChange::ScrollToLatest);
    }

    pub fn notification_cue(&self) {
        self.apply(SurfaceChange::NotificationCue);
    }
}
