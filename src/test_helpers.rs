//! In-memory doubles for the transport and history seams.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::Instant;

use crate::error::ChatError;
use crate::models::{ChatMessage, Room};
use crate::net::api::HistorySource;
use crate::net::transport::{Connector, Link, LinkCommand, LinkEvent, LinkPeer, LinkTarget};

// =============================================================================
// CONNECTOR
// =============================================================================

#[derive(Default)]
struct ConnectorInner {
    /// Scripted outcomes, consumed in order. Empty means succeed.
    script: VecDeque<Result<(), ChatError>>,
    /// Time of every connect call.
    attempts: Vec<Instant>,
    /// Socket ends of every link handed out.
    peers: Vec<LinkPeer>,
    /// Commands drained from peers so far.
    commands: Vec<LinkCommand>,
}

/// Connector whose outcomes are scripted by the test.
#[derive(Clone, Default)]
pub struct MockConnector {
    inner: Arc<Mutex<ConnectorInner>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every future connect fails.
    pub fn failing() -> Self {
        let mock = Self::new();
        mock.script((0..64).map(|_| Err(ChatError::Transport("connection refused".into()))));
        mock
    }

    pub fn script(&self, outcomes: impl IntoIterator<Item = Result<(), ChatError>>) {
        self.inner.lock().expect("mock lock").script.extend(outcomes);
    }

    pub fn attempts(&self) -> Vec<Instant> {
        self.inner.lock().expect("mock lock").attempts.clone()
    }

    /// All commands sent on any link so far.
    pub fn commands(&self) -> Vec<LinkCommand> {
        let mut inner = self.inner.lock().expect("mock lock");
        let mut drained = Vec::new();
        for peer in &mut inner.peers {
            loop {
                match peer.commands.try_recv() {
                    Ok(command) => drained.push(command),
                    Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
                }
            }
        }
        inner.commands.extend(drained);
        inner.commands.clone()
    }

    /// Published bodies decoded as chat messages.
    pub fn published(&self) -> Vec<(String, ChatMessage)> {
        self.commands()
            .into_iter()
            .filter_map(|command| match command {
                LinkCommand::Publish { destination, body } => {
                    Some((destination, serde_json::from_str(&body).expect("published body is a ChatMessage")))
                }
                LinkCommand::Close => None,
            })
            .collect()
    }

    /// Push an event onto the most recent link.
    pub fn emit(&self, event: LinkEvent) {
        let inner = self.inner.lock().expect("mock lock");
        let peer = inner.peers.last().expect("no link handed out yet");
        peer.events.send(event).expect("link dropped");
    }

    /// Deliver a broker message on the most recent link.
    pub fn deliver(&self, message: &ChatMessage) {
        self.emit(LinkEvent::Message(serde_json::to_string(message).expect("encode")));
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _target: &LinkTarget) -> Result<Link, ChatError> {
        let mut inner = self.inner.lock().expect("mock lock");
        inner.attempts.push(Instant::now());
        inner.script.pop_front().unwrap_or(Ok(()))?;
        let (link, peer) = Link::pair();
        inner.peers.push(peer);
        Ok(link)
    }
}

// =============================================================================
// HISTORY
// =============================================================================

#[derive(Default)]
struct HistoryInner {
    rooms: HashMap<Room, Result<Vec<ChatMessage>, ChatError>>,
    delays: HashMap<Room, Duration>,
    calls: Vec<Room>,
}

/// History source serving canned per-room responses.
#[derive(Clone, Default)]
pub struct MockHistory {
    inner: Arc<Mutex<HistoryInner>>,
}

impl MockHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, room: Room, result: Result<Vec<ChatMessage>, ChatError>) -> Self {
        self.inner.lock().expect("mock lock").rooms.insert(room, result);
        self
    }

    /// Respond for `room` only after `delay`.
    pub fn delayed(self, room: Room, delay: Duration) -> Self {
        self.inner.lock().expect("mock lock").delays.insert(room, delay);
        self
    }

    pub fn calls(&self) -> Vec<Room> {
        self.inner.lock().expect("mock lock").calls.clone()
    }
}

#[async_trait]
impl HistorySource for MockHistory {
    async fn fetch_messages(&self, room: Room) -> Result<Vec<ChatMessage>, ChatError> {
        let (delay, result) = {
            let mut inner = self.inner.lock().expect("mock lock");
            inner.calls.push(room);
            (inner.delays.get(&room).copied(), inner.rooms.get(&room).cloned().unwrap_or(Ok(Vec::new())))
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }
}

// =============================================================================
// FIXTURES
// =============================================================================

/// Message with a fixed timestamp.
pub fn message_at(content: &str, sender: &str, timestamp: &str, room: Room) -> ChatMessage {
    ChatMessage {
        id: None,
        content: content.to_owned(),
        sender: sender.to_owned(),
        timestamp: timestamp.to_owned(),
        room_id: Some(room.id()),
    }
}
