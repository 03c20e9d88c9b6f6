use super::*;
use serde_json::json;

#[test]
fn parse_history_keeps_backend_messages() {
    let body = json!([
        {"id": "a1", "content": "hi", "sender": "Bob", "timestamp": "2024-05-01T10:00:00Z", "roomid": 1},
        {"content": "yo", "sender": "Alice", "timestamp": "2024-05-01T10:01:00Z", "roomid": 2}
    ]);
    let messages = parse_history(body).expect("parse");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].id.as_deref(), Some("a1"));
    assert_eq!(messages[1].room_id, Some(2));
}

#[test]
fn parse_history_skips_malformed_items() {
    let body = json!([
        {"content": "ok", "sender": "Bob", "timestamp": "2024-05-01T10:00:00Z"},
        {"content": 42},
        "not a message",
        null,
        {"id": "n1", "content": "nulls", "sender": "Carol", "timestamp": null, "roomid": null}
    ]);
    let messages = parse_history(body).expect("parse");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "ok");
    assert_eq!(messages[1].content, "nulls");
    assert!(messages[1].timestamp.is_empty());
}

#[test]
fn parse_history_rejects_non_array_bodies() {
    assert!(matches!(parse_history(json!({"messages": []})), Err(ChatError::Fetch(_))));
    assert!(matches!(parse_history(Value::Null), Err(ChatError::Fetch(_))));
    assert_eq!(parse_history(json!([])), Ok(Vec::new()));
}

#[test]
fn health_status_tolerates_partial_bodies() {
    let health: HealthStatus = serde_json::from_value(json!({"status": "UP", "database": "connected"})).expect("decode");
    assert_eq!(health.status, "UP");
    assert_eq!(health.service, None);
    assert_eq!(health_summary(&health), "UP database=connected");

    let full: HealthStatus = serde_json::from_value(json!({
        "status": "UP",
        "database": "connected",
        "service": "chat-backend",
        "timestamp": "2024-05-01T10:00:00Z"
    }))
    .expect("decode");
    assert_eq!(health_summary(&full), "UP service=chat-backend database=connected");
}

#[tokio::test]
async fn rest_history_reports_unreachable_backend_as_fetch_error() {
    let mut config = ChatConfig::for_backend("http://127.0.0.1:9");
    config.http_timeout = Duration::from_millis(500);
    let history = RestHistory::new(&config).expect("client");
    let err = history.fetch_messages(Room::General).await.expect_err("unreachable");
    assert_eq!(err.kind(), crate::error::ErrorKind::Fetch);
}
