//! WebSocket/STOMP connector.
//!
//! The handshake (socket open, `CONNECT`, wait for `CONNECTED`, `SUBSCRIBE`)
//! runs under one timeout inside `connect`. Once it succeeds the socket is
//! moved into a pump task that serves the `LinkPeer` end until either side
//! closes.
//!
//! ERROR HANDLING
//! ==============
//! Handshake failures come back as `ChatError::Transport`, or
//! `InvalidBaseUrl` when the socket URL itself is unusable. After the
//! handshake, socket errors, a broker `ERROR` frame or a server close end the
//! pump with a single `LinkEvent::Closed`. Frames that fail to decode are
//! logged and skipped.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use stomp::{Command, Frame};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::error::ChatError;
use crate::net::transport::{Connector, Link, LinkCommand, LinkEvent, LinkPeer, LinkTarget};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Subscription id used for the single topic subscription.
const SUBSCRIPTION_ID: &str = "sub-0";

/// Connector speaking STOMP 1.2 over a real WebSocket.
#[derive(Clone, Copy, Debug, Default)]
pub struct StompWsConnector;

#[async_trait]
impl Connector for StompWsConnector {
    async fn connect(&self, target: &LinkTarget) -> Result<Link, ChatError> {
        let stream = tokio::time::timeout(target.connect_timeout, handshake(target))
            .await
            .map_err(|_| ChatError::Transport(format!("timed out connecting to {}", target.url)))??;

        let (link, peer) = Link::pair();
        tokio::spawn(pump(stream, peer));
        info!(url = %target.url, topic = %target.topic, "stomp session established");
        Ok(link)
    }
}

async fn handshake(target: &LinkTarget) -> Result<WsStream, ChatError> {
    let (mut stream, _) = connect_async(target.url.as_str()).await.map_err(transport_error)?;
    debug!(url = %target.url, "websocket open");

    send_frame(&mut stream, &Frame::connect(&target.host)).await?;
    wait_for_connected(&mut stream).await?;
    send_frame(&mut stream, &Frame::subscribe(SUBSCRIPTION_ID, &target.topic)).await?;
    Ok(stream)
}

async fn send_frame(stream: &mut WsStream, frame: &Frame) -> Result<(), ChatError> {
    stream
        .send(Message::text(stomp::encode_frame(frame)))
        .await
        .map_err(transport_error)
}

async fn wait_for_connected(stream: &mut WsStream) -> Result<(), ChatError> {
    loop {
        let Some(message) = stream.next().await else {
            return Err(ChatError::Transport("socket closed during handshake".to_owned()));
        };
        let Some(frame) = inbound_frame(message.map_err(transport_error)?)? else {
            continue;
        };
        match frame.command {
            Command::Connected => {
                debug!(version = frame.header("version").unwrap_or("?"), "stomp connected");
                return Ok(());
            }
            Command::Error => return Err(ChatError::Transport(error_reason(&frame))),
            other => debug!(command = %other, "ignoring frame before CONNECTED"),
        }
    }
}

/// Decode a socket message into a frame. `Ok(None)` for heart-beats,
/// control messages and undecodable text.
fn inbound_frame(message: Message) -> Result<Option<Frame>, ChatError> {
    let text = match &message {
        Message::Text(text) => text.as_str(),
        Message::Binary(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "dropping non-UTF-8 binary message");
                return Ok(None);
            }
        },
        Message::Close(close) => {
            let reason = close.as_ref().map_or_else(|| "closed by server".to_owned(), |c| c.reason.to_string());
            return Err(ChatError::Transport(reason));
        }
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => return Ok(None),
    };
    match stomp::decode_frame(text) {
        Ok(frame) => Ok(frame),
        Err(e) => {
            warn!(error = %e, "dropping undecodable frame");
            Ok(None)
        }
    }
}

fn error_reason(frame: &Frame) -> String {
    match frame.header("message") {
        Some(message) => message.to_owned(),
        None if !frame.body.is_empty() => frame.body.clone(),
        None => "broker sent ERROR".to_owned(),
    }
}

/// A bad URL never gets better on retry; everything else is a transport failure.
fn transport_error(e: tokio_tungstenite::tungstenite::Error) -> ChatError {
    match e {
        tokio_tungstenite::tungstenite::Error::Url(e) => ChatError::InvalidBaseUrl(e.to_string()),
        e => ChatError::Transport(e.to_string()),
    }
}

/// Serve one link until it closes.
async fn pump(stream: WsStream, mut peer: LinkPeer) {
    let (mut sink, mut source) = stream.split();

    let reason = loop {
        tokio::select! {
            command = peer.commands.recv() => match command {
                Some(LinkCommand::Publish { destination, body }) => {
                    let frame = Frame::send_json(&destination, body);
                    if let Err(e) = sink.send(Message::text(stomp::encode_frame(&frame))).await {
                        break e.to_string();
                    }
                }
                Some(LinkCommand::Close) | None => {
                    if let Err(e) = sink.send(Message::text(stomp::encode_frame(&Frame::disconnect()))).await {
                        debug!(error = %e, "DISCONNECT not delivered");
                    }
                    if let Err(e) = sink.close().await {
                        debug!(error = %e, "websocket close failed");
                    }
                    info!("stomp session closed");
                    return;
                }
            },
            inbound = source.next() => {
                let Some(inbound) = inbound else {
                    break "socket closed".to_owned();
                };
                let frame = match inbound.map_err(transport_error).and_then(inbound_frame) {
                    Ok(Some(frame)) => frame,
                    Ok(None) => continue,
                    Err(e) => break e.to_string(),
                };
                match frame.command {
                    Command::Message => {
                        if peer.events.send(LinkEvent::Message(frame.body)).is_err() {
                            debug!("link owner gone; stopping pump");
                            return;
                        }
                    }
                    Command::Error => break error_reason(&frame),
                    other => debug!(command = %other, "ignoring frame"),
                }
            }
        }
    };

    warn!(reason = %reason, "stomp session lost");
    if peer.events.send(LinkEvent::Closed(reason)).is_err() {
        debug!("link owner gone before close was reported");
    }
}
