use super::*;

#[test]
fn host_of_strips_scheme_port_path_and_userinfo() {
    assert_eq!(host_of("ws://localhost:8080/ws"), "localhost");
    assert_eq!(host_of("wss://chat.example.com/ws/websocket"), "chat.example.com");
    assert_eq!(host_of("ws://user:pw@10.0.0.1:9000/ws"), "10.0.0.1");
    assert_eq!(host_of("bare-host"), "bare-host");
}

#[test]
fn target_follows_config() {
    let mut config = ChatConfig::for_backend("https://chat.example.com");
    config.connect_timeout = Duration::from_secs(3);
    let target = LinkTarget::from_config(&config).expect("target");
    assert_eq!(target.url, "wss://chat.example.com/ws/websocket");
    assert_eq!(target.host, "chat.example.com");
    assert_eq!(target.topic, "/topic/messages");
    assert_eq!(target.connect_timeout, Duration::from_secs(3));

    let bad = ChatConfig::for_backend("chat.example.com");
    assert!(matches!(LinkTarget::from_config(&bad), Err(ChatError::InvalidBaseUrl(_))));
}

#[tokio::test]
async fn publish_reaches_peer_and_events_reach_owner() {
    let (mut link, mut peer) = Link::pair();
    link.publish("/app/chat", "{}".to_owned()).expect("publish");
    assert_eq!(
        peer.commands.recv().await,
        Some(LinkCommand::Publish { destination: "/app/chat".into(), body: "{}".into() })
    );

    peer.events.send(LinkEvent::Message("hello".into())).expect("event");
    assert_eq!(link.next_event().await, LinkEvent::Message("hello".into()));
}

#[tokio::test]
async fn dropped_peer_reports_closed_and_rejects_publish() {
    let (mut link, peer) = Link::pair();
    drop(peer);
    assert!(matches!(link.next_event().await, LinkEvent::Closed(_)));
    assert!(matches!(link.publish("/app/chat", "{}".into()), Err(ChatError::Transport(_))));
    link.close();
}
