use super::*;
use crate::test_helpers::{MockHistory, message_at};
use std::time::Duration;

fn ts(seconds: u32) -> String {
    format!("2024-05-01T10:00:{seconds:02}Z")
}

fn pipeline(history: MockHistory) -> (MessagePipeline, SurfaceHandle) {
    let surface = SurfaceHandle::headless();
    let mut pipeline = MessagePipeline::new(Arc::new(history), surface.clone(), false);
    pipeline.set_local_user(Some("Alice".into()));
    (pipeline, surface)
}

fn rendered_contents(surface: &SurfaceHandle) -> Vec<String> {
    surface.snapshot().messages.into_iter().map(|m| m.message.content).collect()
}

// =============================================================
// sort_history
// =============================================================

#[test]
fn sort_orders_by_timestamp() {
    let mut messages = vec![
        message_at("ten", "Bob", &ts(10), Room::General),
        message_at("five", "Bob", &ts(5), Room::General),
        message_at("twenty", "Bob", &ts(20), Room::General),
    ];
    sort_history(&mut messages);
    let order: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(order, ["five", "ten", "twenty"]);
}

#[test]
fn sort_is_stable_and_puts_unparseable_first() {
    let mut messages = vec![
        message_at("b1", "Bob", &ts(7), Room::General),
        message_at("junk", "Bob", "yesterday", Room::General),
        message_at("b2", "Bob", &ts(7), Room::General),
        message_at("a", "Bob", &ts(1), Room::General),
    ];
    sort_history(&mut messages);
    let order: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(order, ["junk", "a", "b1", "b2"]);
}

#[test]
fn sort_is_non_decreasing_for_every_permutation() {
    let base = [3, 1, 4, 1, 5];
    let mut rotations = Vec::new();
    for shift in 0..base.len() {
        let mut order = base.to_vec();
        order.rotate_left(shift);
        rotations.push(order.clone());
        order.reverse();
        rotations.push(order);
    }
    for order in rotations {
        let mut messages: Vec<_> = order
            .iter()
            .map(|s| message_at(&s.to_string(), "Bob", &ts(*s), Room::General))
            .collect();
        sort_history(&mut messages);
        let times: Vec<_> = messages.iter().map(ChatMessage::sent_at).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]), "order {order:?}");
    }
}

// =============================================================
// load_history
// =============================================================

#[tokio::test]
async fn history_renders_in_timestamp_order() {
    let history = MockHistory::new().with(
        Room::General,
        Ok(vec![
            message_at("10", "Bob", &ts(10), Room::General),
            message_at("5", "Alice", &ts(5), Room::General),
            message_at("20", "Bob", &ts(20), Room::General),
        ]),
    );
    let (mut pipeline, surface) = pipeline(history);

    assert_eq!(pipeline.load_history(Room::General).await, Ok(3));

    assert_eq!(rendered_contents(&surface), ["5", "10", "20"]);
    let snapshot = surface.snapshot();
    assert!(snapshot.messages[0].own);
    assert!(!snapshot.messages[1].own);
    assert!(snapshot.messages.iter().all(|m| !m.live));
    assert_eq!(snapshot.scroll_seq, 1);
    assert_eq!(snapshot.cue_seq, 0, "history never cues");
}

#[tokio::test]
async fn empty_history_keeps_placeholder() {
    let (mut pipeline, surface) = pipeline(MockHistory::new());
    pipeline.switch_room(Room::Gaming);
    let outcome = pipeline.next_history().await;
    assert_eq!(pipeline.apply_history(outcome), Ok(0));

    let snapshot = surface.snapshot();
    assert_eq!(snapshot.placeholder, Some(Room::Gaming));
    assert_eq!(snapshot.active_room, Room::Gaming);
    assert!(snapshot.messages.is_empty());
}

#[tokio::test]
async fn failed_history_shows_notice_and_keeps_render_state() {
    let history = MockHistory::new().with(Room::General, Err(ChatError::FetchStatus { status: 503 }));
    let (mut pipeline, surface) = pipeline(history.clone());
    pipeline.on_live_message(&message_at("live", "Bob", &ts(1), Room::General));

    assert_eq!(pipeline.load_history(Room::General).await, Err(ChatError::FetchStatus { status: 503 }));

    let snapshot = surface.snapshot();
    assert_eq!(rendered_contents(&surface), ["live"]);
    assert_eq!(snapshot.last_notice().map(|n| n.text.as_str()), Some("Failed to load previous messages"));
    assert_eq!(history.calls(), [Room::General], "no automatic retry");
}

#[tokio::test]
async fn unreachable_history_asks_to_check_the_connection() {
    let history = MockHistory::new().with(Room::Gaming, Err(ChatError::Fetch("connection refused".into())));
    let (mut pipeline, surface) = pipeline(history);

    assert_eq!(
        pipeline.load_history(Room::Gaming).await,
        Err(ChatError::Fetch("connection refused".into()))
    );

    let notice = surface.snapshot().last_notice().cloned().expect("notice");
    assert_eq!(notice.text, "Unable to load previous messages. Please check your connection.");
    assert_eq!(notice.severity, Severity::Error);
}

#[tokio::test]
async fn room_filter_is_opt_in() {
    let history = MockHistory::new().with(
        Room::Development,
        Ok(vec![
            message_at("dev", "Bob", &ts(1), Room::Development),
            message_at("general", "Bob", &ts(2), Room::General),
        ]),
    );

    let (mut unfiltered, surface) = pipeline(history.clone());
    assert_eq!(unfiltered.load_history(Room::Development).await, Ok(2));
    assert_eq!(rendered_contents(&surface), ["dev", "general"]);

    let surface = SurfaceHandle::headless();
    let mut filtered = MessagePipeline::new(Arc::new(history), surface.clone(), true);
    assert_eq!(filtered.load_history(Room::Development).await, Ok(1));
    assert_eq!(rendered_contents(&surface), ["dev"]);
}

// =============================================================
// stale history
// =============================================================

#[tokio::test(start_paused = true)]
async fn stale_history_is_never_rendered_after_room_switch() {
    let history = MockHistory::new()
        .with(Room::General, Ok(vec![message_at("old general", "Bob", &ts(1), Room::General)]))
        .delayed(Room::General, Duration::from_millis(500))
        .with(Room::Gaming, Ok(vec![message_at("gaming", "Bob", &ts(2), Room::Gaming)]))
        .delayed(Room::Gaming, Duration::from_millis(1000));
    let (mut pipeline, surface) = pipeline(history);

    pipeline.begin_load(Room::General);
    pipeline.switch_room(Room::Gaming);
    assert!(pipeline.is_loading());

    let outcome = pipeline.next_history().await;
    assert_eq!(outcome.room, Room::Gaming);
    assert_eq!(pipeline.apply_history(outcome), Ok(1));
    assert_eq!(rendered_contents(&surface), ["gaming"]);

    tokio::time::sleep(Duration::from_millis(2000)).await;
    assert!(!pipeline.is_loading());
    assert_eq!(rendered_contents(&surface), ["gaming"]);
}

#[tokio::test(start_paused = true)]
async fn history_landing_after_live_message_replaces_it() {
    let history = MockHistory::new()
        .with(Room::General, Ok(vec![message_at("old", "Bob", &ts(1), Room::General)]))
        .delayed(Room::General, Duration::from_millis(500));
    let (mut pipeline, surface) = pipeline(history);

    pipeline.begin_load(Room::General);
    pipeline.on_live_message(&message_at("live", "Carol", &ts(30), Room::General));
    assert!(pipeline.is_loading());
    assert_eq!(rendered_contents(&surface), ["live"]);

    let outcome = pipeline.next_history().await;
    assert_eq!(pipeline.apply_history(outcome), Ok(1));
    assert_eq!(rendered_contents(&surface), ["old"]);
    assert!(surface.snapshot().messages.iter().all(|m| !m.live));
}

#[tokio::test(start_paused = true)]
async fn empty_history_landing_after_live_message_keeps_it() {
    let history = MockHistory::new().delayed(Room::General, Duration::from_millis(500));
    let (mut pipeline, surface) = pipeline(history);

    pipeline.begin_load(Room::General);
    pipeline.on_live_message(&message_at("live", "Carol", &ts(30), Room::General));

    let outcome = pipeline.next_history().await;
    assert_eq!(pipeline.apply_history(outcome), Ok(0));
    assert_eq!(rendered_contents(&surface), ["live"]);
}

#[tokio::test]
async fn outcome_for_another_room_is_discarded() {
    let (mut pipeline, surface) = pipeline(MockHistory::new());
    pipeline.switch_room(Room::Development);
    let stale = HistoryOutcome {
        room: Room::General,
        result: Ok(vec![message_at("stale", "Bob", &ts(1), Room::General)]),
    };
    assert_eq!(pipeline.apply_history(stale), Err(ChatError::Cancelled));
    assert!(surface.snapshot().messages.is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancel_drops_fetch_in_flight() {
    let history = MockHistory::new()
        .with(Room::General, Ok(vec![message_at("late", "Bob", &ts(1), Room::General)]))
        .delayed(Room::General, Duration::from_millis(500));
    let (mut pipeline, surface) = pipeline(history);

    pipeline.begin_load(Room::General);
    pipeline.cancel();
    assert!(!pipeline.is_loading());

    let waited = tokio::time::timeout(Duration::from_secs(5), pipeline.next_history()).await;
    assert!(waited.is_err(), "nothing left to wait for");
    assert!(surface.snapshot().messages.is_empty());
}

// =============================================================
// live messages
// =============================================================

#[tokio::test]
async fn live_message_from_others_cues_and_scrolls() {
    let (mut pipeline, surface) = pipeline(MockHistory::new());
    pipeline.on_live_message(&message_at("hey", "Bob", &ts(1), Room::General));

    let snapshot = surface.snapshot();
    assert_eq!(snapshot.messages.len(), 1);
    assert!(snapshot.messages[0].live);
    assert!(!snapshot.messages[0].own);
    assert_eq!(snapshot.scroll_seq, 1);
    assert_eq!(snapshot.cue_seq, 1);
}

#[tokio::test]
async fn own_echo_and_system_messages_do_not_cue() {
    let (mut pipeline, surface) = pipeline(MockHistory::new());
    pipeline.on_live_message(&message_at("hi", "Alice", &ts(1), Room::General));
    pipeline.on_live_message(&ChatMessage::system("maintenance soon", Room::General));

    let snapshot = surface.snapshot();
    assert!(snapshot.messages[0].own);
    assert!(!snapshot.messages[1].own);
    assert_eq!(snapshot.cue_seq, 0);
    assert_eq!(snapshot.scroll_seq, 2);
}

#[tokio::test]
async fn presence_notices_maintain_online_users() {
    let (mut pipeline, surface) = pipeline(MockHistory::new());
    pipeline.on_live_message(&ChatMessage::system(crate::models::join_notice("Bob"), Room::General));
    pipeline.on_live_message(&ChatMessage::system(crate::models::join_notice("Carol"), Room::General));
    pipeline.on_live_message(&ChatMessage::system(crate::models::leave_notice("Bob"), Room::General));
    pipeline.on_live_message(&message_at("Dave joined the chat", "Dave", &ts(1), Room::General));

    let users: Vec<_> = surface.snapshot().online_users.into_iter().collect();
    assert_eq!(users, ["Carol"]);
}
