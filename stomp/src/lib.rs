//! STOMP 1.2 frame model and text codec for the chat WebSocket transport.
//!
//! This crate owns the wire representation spoken to the message broker.
//! Frames travel as WebSocket text messages: a command line, `key:value`
//! header lines, a blank line, the body, and a terminating NUL.
//!
//! DESIGN
//! ======
//! Headers are kept as an ordered list because STOMP allows repeated keys
//! and only the first occurrence counts. Header escaping (`\\`, `\n`, `\c`,
//! `\r`) applies to every command except `CONNECT` and `CONNECTED`.
//! Bare EOLs between frames are heart-beats and decode to `None`.

use std::fmt;

/// Error returned by [`decode_frame`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    /// The text ended before a command line was found.
    #[error("frame has no command line")]
    MissingCommand,
    /// The command line is not a STOMP command.
    #[error("unknown frame command: {0}")]
    UnknownCommand(String),
    /// A header line has no `:` separator.
    #[error("malformed header line: {0}")]
    MalformedHeader(String),
    /// A header contains an escape sequence STOMP does not define.
    #[error("invalid header escape in: {0}")]
    InvalidEscape(String),
    /// The headers were not followed by a blank line.
    #[error("frame headers are not terminated")]
    UnterminatedHeaders,
    /// The `content-length` header is not a byte count.
    #[error("invalid content-length: {0}")]
    InvalidContentLength(String),
    /// The body is not terminated by a NUL octet.
    #[error("frame body is not NUL-terminated")]
    MissingNull,
}

/// STOMP frame command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    Connect,
    Stomp,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Ack,
    Nack,
    Begin,
    Commit,
    Abort,
    Disconnect,
    Message,
    Receipt,
    Error,
}

impl Command {
    /// Wire spelling of the command.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Stomp => "STOMP",
            Self::Connected => "CONNECTED",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Ack => "ACK",
            Self::Nack => "NACK",
            Self::Begin => "BEGIN",
            Self::Commit => "COMMIT",
            Self::Abort => "ABORT",
            Self::Disconnect => "DISCONNECT",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
        }
    }

    fn parse(raw: &str) -> Result<Self, CodecError> {
        let command = match raw {
            "CONNECT" => Self::Connect,
            "STOMP" => Self::Stomp,
            "CONNECTED" => Self::Connected,
            "SEND" => Self::Send,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "ACK" => Self::Ack,
            "NACK" => Self::Nack,
            "BEGIN" => Self::Begin,
            "COMMIT" => Self::Commit,
            "ABORT" => Self::Abort,
            "DISCONNECT" => Self::Disconnect,
            "MESSAGE" => Self::Message,
            "RECEIPT" => Self::Receipt,
            "ERROR" => Self::Error,
            other => return Err(CodecError::UnknownCommand(other.to_owned())),
        };
        Ok(command)
    }

    /// `CONNECT` and `CONNECTED` frames carry headers verbatim.
    fn escapes_headers(self) -> bool {
        !matches!(self, Self::Connect | Self::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single STOMP frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Frame command.
    pub command: Command,
    /// Headers in wire order. Repeated keys are allowed; the first wins.
    pub headers: Vec<(String, String)>,
    /// Frame body (UTF-8 text; the chat protocol only carries JSON).
    pub body: String,
}

impl Frame {
    /// Create a frame with no headers and an empty body.
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self { command, headers: Vec::new(), body: String::new() }
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Replace the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Look up the first value of a header.
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// `CONNECT` frame for STOMP 1.2 with heart-beating disabled.
    #[must_use]
    pub fn connect(host: &str) -> Self {
        Self::new(Command::Connect)
            .with_header("accept-version", "1.2")
            .with_header("host", host)
            .with_header("heart-beat", "0,0")
    }

    /// `SUBSCRIBE` frame for a destination with automatic acknowledgement.
    #[must_use]
    pub fn subscribe(id: &str, destination: &str) -> Self {
        Self::new(Command::Subscribe)
            .with_header("id", id)
            .with_header("destination", destination)
            .with_header("ack", "auto")
    }

    /// `SEND` frame carrying a JSON body.
    #[must_use]
    pub fn send_json(destination: &str, body: impl Into<String>) -> Self {
        let body = body.into();
        Self::new(Command::Send)
            .with_header("destination", destination)
            .with_header("content-type", "application/json")
            .with_header("content-length", body.len().to_string())
            .with_body(body)
    }

    /// `DISCONNECT` frame.
    #[must_use]
    pub fn disconnect() -> Self {
        Self::new(Command::Disconnect)
    }
}

/// Encode a frame into its text wire form, NUL terminator included.
#[must_use]
pub fn encode_frame(frame: &Frame) -> String {
    let escape = frame.command.escapes_headers();
    let mut out = String::with_capacity(frame.body.len() + 64);
    out.push_str(frame.command.as_str());
    out.push('\n');
    for (key, value) in &frame.headers {
        if escape {
            out.push_str(&escape_header(key));
            out.push(':');
            out.push_str(&escape_header(value));
        } else {
            out.push_str(key);
            out.push(':');
            out.push_str(value);
        }
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&frame.body);
    out.push('\0');
    out
}

/// Decode one frame from a WebSocket text message.
///
/// Returns `Ok(None)` for heart-beats (text made only of EOLs).
///
/// # Errors
///
/// Returns a [`CodecError`] describing the first structural problem found.
pub fn decode_frame(text: &str) -> Result<Option<Frame>, CodecError> {
    let text = text.trim_start_matches(['\r', '\n']);
    if text.is_empty() || text == "\0" {
        return Ok(None);
    }

    let (command_line, mut rest) = split_line(text).ok_or(CodecError::MissingCommand)?;
    if command_line.is_empty() {
        return Err(CodecError::MissingCommand);
    }
    let command = Command::parse(command_line)?;

    let mut headers = Vec::new();
    loop {
        let (line, tail) = split_line(rest).ok_or(CodecError::UnterminatedHeaders)?;
        rest = tail;
        if line.is_empty() {
            break;
        }
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| CodecError::MalformedHeader(line.to_owned()))?;
        if command.escapes_headers() {
            headers.push((unescape_header(key)?, unescape_header(value)?));
        } else {
            headers.push((key.to_owned(), value.to_owned()));
        }
    }

    let declared_len = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .map(|(_, v)| v.trim().parse::<usize>().map_err(|_| CodecError::InvalidContentLength(v.clone())))
        .transpose()?;

    let body = match declared_len {
        Some(len) => {
            let body = rest.get(..len).ok_or(CodecError::MissingNull)?;
            if !rest[len..].starts_with('\0') {
                return Err(CodecError::MissingNull);
            }
            body
        }
        None => {
            let end = rest.find('\0').ok_or(CodecError::MissingNull)?;
            &rest[..end]
        }
    };

    Ok(Some(Frame { command, headers, body: body.to_owned() }))
}

/// Split at the first `\n`, trimming a preceding `\r`.
fn split_line(text: &str) -> Option<(&str, &str)> {
    let (line, rest) = text.split_once('\n')?;
    Some((line.strip_suffix('\r').unwrap_or(line), rest))
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(raw: &str) -> Result<String, CodecError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            _ => return Err(CodecError::InvalidEscape(raw.to_owned())),
        }
    }
    Ok(out)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
