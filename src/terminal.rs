//! Line-oriented terminal view and input parsing.
//!
//! `TerminalView` projects surface changes as text lines on any writer.
//! Sender names get a stable ANSI colour from the avatar hash, own messages
//! are marked `(you)`, system messages are set apart, and notification cues
//! ring the terminal bell.

#[cfg(test)]
#[path = "terminal_test.rs"]
mod terminal_test;

use std::io::Write;

use time::macros::format_description;
use tracing::debug;

use crate::error::ChatError;
use crate::models::{ChatMessage, Room, avatar_color_index};
use crate::state::surface::{ChatSurface, RenderedMessage, Severity, SurfaceChange, SurfaceState};

/// ANSI foreground codes, one per avatar palette slot.
const AVATAR_COLORS: [u8; 8] = [31, 32, 33, 34, 35, 36, 91, 94];
const BELL: &str = "\x07";
const UNKNOWN_CLOCK: &str = "--:--";

pub const HELP_TEXT: &str = "Commands: /room <1-3|name>, /refresh, /users, /status, /help, /quit. Anything else is sent as a message.";

// =============================================================================
// VIEW
// =============================================================================

/// Surface that writes each change as a line.
pub struct TerminalView<W> {
    state: SurfaceState,
    out: W,
    color: bool,
}

impl<W: Write + Send> TerminalView<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { state: SurfaceState::default(), out, color }
    }
}

impl<W: Write + Send> ChatSurface for TerminalView<W> {
    fn state(&self) -> &SurfaceState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut SurfaceState {
        &mut self.state
    }

    fn on_change(&mut self, change: &SurfaceChange) {
        let written = match change {
            SurfaceChange::NotificationCue => write!(self.out, "{BELL}"),
            SurfaceChange::ScrollToLatest => self.out.flush(),
            other => match render_change(other, self.color) {
                Some(line) => writeln!(self.out, "{line}"),
                None => Ok(()),
            },
        };
        if let Err(e) = written {
            debug!(error = %e, "terminal write failed");
        }
    }
}

/// Text line for a change, if the change is visible as one.
#[must_use]
pub fn render_change(change: &SurfaceChange, color: bool) -> Option<String> {
    match change {
        SurfaceChange::RenderMessage(rendered) => Some(format_message_line(rendered, color)),
        SurfaceChange::ShowRoomPlaceholder(room) => Some(room_placeholder(*room)),
        SurfaceChange::SetActiveRoom(room) => Some(format!("== #{room} ==")),
        SurfaceChange::SetProfile(name) => Some(format!("Joined as {name}")),
        SurfaceChange::SetConnectionStatus(status) => Some(format!("-- {} --", status.label())),
        SurfaceChange::SetTypingIndicator(true) => Some("You are typing...".to_owned()),
        SurfaceChange::ShowNotice(notice) => Some(format!("[{}] {}", severity_tag(notice.severity), notice.text)),
        SurfaceChange::SetTypingIndicator(false)
        | SurfaceChange::ClearMessages
        | SurfaceChange::AddOnlineUser(_)
        | SurfaceChange::RemoveOnlineUser(_)
        | SurfaceChange::ScrollToLatest
        | SurfaceChange::NotificationCue => None,
    }
}

#[must_use]
pub fn room_placeholder(room: Room) -> String {
    format!("Welcome to {room}! No messages yet. Start the conversation.")
}

/// `[HH:MM] sender: content`, with own and system messages marked.
#[must_use]
pub fn format_message_line(rendered: &RenderedMessage, color: bool) -> String {
    let message = &rendered.message;
    let clock = format_clock(message);
    if message.is_system() {
        return format!("[{clock}] * {}", message.content);
    }
    let mut name = if color { paint(&message.sender) } else { message.sender.clone() };
    if rendered.own {
        name.push_str(" (you)");
    }
    format!("[{clock}] {name}: {}", message.content)
}

/// `HH:MM` of the message timestamp in UTC.
#[must_use]
pub fn format_clock(message: &ChatMessage) -> String {
    let Some(at) = message.sent_at() else {
        return UNKNOWN_CLOCK.to_owned();
    };
    match at.format(format_description!("[hour]:[minute]")) {
        Ok(clock) => clock,
        Err(_) => UNKNOWN_CLOCK.to_owned(),
    }
}

fn paint(name: &str) -> String {
    let code = AVATAR_COLORS[avatar_color_index(name) % AVATAR_COLORS.len()];
    format!("\x1b[{code}m{name}\x1b[0m")
}

fn severity_tag(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "info",
        Severity::Success => "ok",
        Severity::Warning => "warn",
        Severity::Error => "error",
    }
}

// =============================================================================
// INPUT
// =============================================================================

/// One line typed by the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputLine {
    Message(String),
    Room(Room),
    Refresh,
    Users,
    Status,
    Help,
    Quit,
    Empty,
}

/// Parse a composer line. Lines starting with `/` are commands.
///
/// # Errors
///
/// `UnknownRoom` for a bad `/room` argument; unknown commands are reported
/// the same way as `Help`.
pub fn parse_input_line(line: &str) -> Result<InputLine, ChatError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(InputLine::Empty);
    }
    let Some(command) = trimmed.strip_prefix('/') else {
        return Ok(InputLine::Message(trimmed.to_owned()));
    };
    let (name, arg) = command.split_once(char::is_whitespace).unwrap_or((command, ""));
    let parsed = match name.to_ascii_lowercase().as_str() {
        "room" | "join" => InputLine::Room(arg.parse()?),
        "refresh" => InputLine::Refresh,
        "users" => InputLine::Users,
        "status" => InputLine::Status,
        "quit" | "exit" => InputLine::Quit,
        _ => InputLine::Help,
    };
    Ok(parsed)
}
