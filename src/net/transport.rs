//! Transport seam between the connection manager and the broker.
//!
//! DESIGN
//! ======
//! A `Connector` turns a `LinkTarget` into a `Link`: an established,
//! subscribed session represented by two unbounded channels. The manager
//! pushes `LinkCommand`s down one and reads `LinkEvent`s from the other;
//! whatever owns the socket sits on the `LinkPeer` end. Tests substitute a
//! connector that hands out in-memory peers.

#[cfg(test)]
#[path = "transport_test.rs"]
mod transport_test;

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::ChatConfig;
use crate::error::ChatError;

/// Where and how to open a link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkTarget {
    /// WebSocket URL of the STOMP endpoint.
    pub url: String,
    /// Value of the STOMP `host` header.
    pub host: String,
    /// Topic to subscribe to once connected.
    pub topic: String,
    pub connect_timeout: Duration,
}

impl LinkTarget {
    /// Derive the target from client config.
    ///
    /// # Errors
    ///
    /// `InvalidBaseUrl` when the backend URL is not http(s).
    pub fn from_config(config: &ChatConfig) -> Result<Self, ChatError> {
        let url = config.ws_url()?;
        Ok(Self {
            host: host_of(&url).to_owned(),
            url,
            topic: config.topic.clone(),
            connect_timeout: config.connect_timeout,
        })
    }
}

/// Hostname part of a URL, without scheme, port or path.
fn host_of(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest.split('/').next().unwrap_or(rest);
    let authority = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    authority.split(':').next().unwrap_or(authority)
}

/// Instruction for the task that owns the socket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkCommand {
    /// Publish a JSON body to a destination.
    Publish { destination: String, body: String },
    /// Say goodbye to the broker and close the socket.
    Close,
}

/// Something the socket task observed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkEvent {
    /// Body of a `MESSAGE` frame on the subscribed topic.
    Message(String),
    /// The link died; the string names why.
    Closed(String),
}

/// Owner side of an established session.
#[derive(Debug)]
pub struct Link {
    commands: mpsc::UnboundedSender<LinkCommand>,
    events: mpsc::UnboundedReceiver<LinkEvent>,
}

/// Socket side of an established session.
#[derive(Debug)]
pub struct LinkPeer {
    pub commands: mpsc::UnboundedReceiver<LinkCommand>,
    pub events: mpsc::UnboundedSender<LinkEvent>,
}

impl Link {
    /// Create a connected `Link`/`LinkPeer` pair.
    #[must_use]
    pub fn pair() -> (Self, LinkPeer) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (Self { commands: command_tx, events: event_rx }, LinkPeer { commands: command_rx, events: event_tx })
    }

    /// Queue a publish.
    ///
    /// # Errors
    ///
    /// `Transport` when the socket task has already gone away.
    pub fn publish(&self, destination: &str, body: String) -> Result<(), ChatError> {
        self.commands
            .send(LinkCommand::Publish { destination: destination.to_owned(), body })
            .map_err(|_| ChatError::Transport("link is closed".to_owned()))
    }

    /// Ask the socket task to disconnect. Best effort.
    pub fn close(&self) {
        if self.commands.send(LinkCommand::Close).is_err() {
            debug!("link already closed");
        }
    }

    /// Next event from the socket task. Cancel-safe.
    pub async fn next_event(&mut self) -> LinkEvent {
        match self.events.recv().await {
            Some(event) => event,
            None => LinkEvent::Closed("link task ended".to_owned()),
        }
    }
}

/// Opens links to the broker.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect, complete the protocol handshake and subscribe to `target.topic`.
    async fn connect(&self, target: &LinkTarget) -> Result<Link, ChatError>;
}
