use super::*;

fn msg(content: &str, sender: &str) -> ChatMessage {
    ChatMessage {
        id: None,
        content: content.to_owned(),
        sender: sender.to_owned(),
        timestamp: "2024-05-01T10:00:00Z".to_owned(),
        room_id: Some(1),
    }
}

/// View that records every change it is handed.
struct RecordingView {
    state: SurfaceState,
    seen: Arc<Mutex<Vec<SurfaceChange>>>,
}

impl ChatSurface for RecordingView {
    fn state(&self) -> &SurfaceState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut SurfaceState {
        &mut self.state
    }

    fn on_change(&mut self, change: &SurfaceChange) {
        if let SurfaceChange::SetTypingIndicator(visible) = change {
            assert_eq!(self.state.typing_visible, *visible, "state is updated before the view sees the change");
        }
        self.seen.lock().expect("seen lock").push(change.clone());
    }
}

// =============================================================
// SurfaceState::apply
// =============================================================

#[test]
fn default_state_is_disconnected_general_and_empty() {
    let state = SurfaceState::default();
    assert_eq!(state.connection_status, ConnectionState::Disconnected);
    assert_eq!(state.active_room, Room::General);
    assert!(state.messages.is_empty());
    assert!(state.online_users.is_empty());
    assert!(!state.typing_visible);
}

#[test]
fn rendering_a_message_removes_placeholder() {
    let mut state = SurfaceState::default();
    state.apply(&SurfaceChange::ShowRoomPlaceholder(Room::Gaming));
    assert_eq!(state.placeholder, Some(Room::Gaming));

    state.apply(&SurfaceChange::RenderMessage(RenderedMessage { message: msg("hi", "Bob"), own: false, live: true }));
    assert_eq!(state.placeholder, None);
    assert_eq!(state.messages.len(), 1);
}

#[test]
fn placeholder_replaces_rendered_messages() {
    let mut state = SurfaceState::default();
    state.apply(&SurfaceChange::RenderMessage(RenderedMessage { message: msg("a", "Bob"), own: false, live: false }));
    state.apply(&SurfaceChange::ShowRoomPlaceholder(Room::Development));
    assert!(state.messages.is_empty());
    assert_eq!(state.placeholder, Some(Room::Development));
}

#[test]
fn online_users_are_a_set() {
    let mut state = SurfaceState::default();
    state.apply(&SurfaceChange::AddOnlineUser("Bob".into()));
    state.apply(&SurfaceChange::AddOnlineUser("Alice".into()));
    state.apply(&SurfaceChange::AddOnlineUser("Bob".into()));
    assert_eq!(state.online_users.iter().collect::<Vec<_>>(), ["Alice", "Bob"]);

    state.apply(&SurfaceChange::RemoveOnlineUser("Bob".into()));
    state.apply(&SurfaceChange::RemoveOnlineUser("Nobody".into()));
    assert_eq!(state.online_users.len(), 1);
}

#[test]
fn notices_are_bounded() {
    let mut state = SurfaceState::default();
    for i in 0..(MAX_NOTICES + 5) {
        state.apply(&SurfaceChange::ShowNotice(Notice { text: format!("n{i}"), severity: Severity::Info }));
    }
    assert_eq!(state.notices.len(), MAX_NOTICES);
    assert_eq!(state.notices[0].text, "n5");
    assert_eq!(state.last_notice().map(|n| n.text.as_str()), Some(format!("n{}", MAX_NOTICES + 4).as_str()));
}

#[test]
fn scroll_and_cue_bump_sequence_counters() {
    let mut state = SurfaceState::default();
    state.apply(&SurfaceChange::ScrollToLatest);
    state.apply(&SurfaceChange::ScrollToLatest);
    state.apply(&SurfaceChange::NotificationCue);
    assert_eq!(state.scroll_seq, 2);
    assert_eq!(state.cue_seq, 1);
}

// =============================================================
// SurfaceHandle
// =============================================================

#[test]
fn handle_clones_share_one_surface() {
    let surface = SurfaceHandle::headless();
    let other = surface.clone();
    surface.set_profile("Alice");
    other.set_connection_status(ConnectionState::Connected);
    other.render_message(&msg("hi", "Alice"), true, true);

    let snapshot = surface.snapshot();
    assert_eq!(snapshot.profile.as_deref(), Some("Alice"));
    assert_eq!(snapshot.connection_status, ConnectionState::Connected);
    assert!(snapshot.messages[0].own);
}

#[test]
fn handle_forwards_changes_to_view_after_applying() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let surface = SurfaceHandle::new(RecordingView { state: SurfaceState::default(), seen: Arc::clone(&seen) });

    surface.set_typing_indicator(true);
    surface.show_notice("Refreshing messages...", Severity::Info);
    surface.set_typing_indicator(false);

    let seen = seen.lock().expect("seen lock");
    assert_eq!(
        *seen,
        vec![
            SurfaceChange::SetTypingIndicator(true),
            SurfaceChange::ShowNotice(Notice { text: "Refreshing messages...".into(), severity: Severity::Info }),
            SurfaceChange::SetTypingIndicator(false),
        ]
    );
    assert!(!surface.snapshot().typing_visible);
}
