//! STOMP frames and the items that travel on the wire.

use std::fmt;

use bytes::Bytes;

use crate::heartbeat::Inbound;
use crate::protocol::Headers;

/// The STOMP commands this client sends or understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Connect,
    Stomp,
    Connected,
    Send,
    Message,
    Receipt,
    Error,
    Disconnect,
}

impl Command {
    pub const fn as_str(self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Connected => "CONNECTED",
            Command::Send => "SEND",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
            Command::Disconnect => "DISCONNECT",
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let command = match bytes {
            b"CONNECT" => Command::Connect,
            b"STOMP" => Command::Stomp,
            b"CONNECTED" => Command::Connected,
            b"SEND" => Command::Send,
            b"MESSAGE" => Command::Message,
            b"RECEIPT" => Command::Receipt,
            b"ERROR" => Command::Error,
            b"DISCONNECT" => Command::Disconnect,
            _ => return None,
        };
        Some(command)
    }

    /// CONNECT, STOMP and CONNECTED carry their header values unescaped.
    #[inline]
    pub fn is_handshake(self) -> bool {
        matches!(self, Command::Connect | Command::Stomp | Command::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete STOMP frame: command, ordered headers and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    command: Command,
    headers: Headers,
    body: Bytes,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self::from_parts(command, Headers::new(), Bytes::new())
    }

    pub fn with_headers(command: Command, headers: Headers) -> Self {
        Self::from_parts(command, headers, Bytes::new())
    }

    pub fn from_parts(command: Command, headers: Headers, body: Bytes) -> Self {
        Self { command, headers, body }
    }

    #[must_use]
    pub fn header(self, key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self { headers: self.headers.add(key, value), ..self }
    }

    #[must_use]
    pub fn set_body(self, body: impl Into<Bytes>) -> Self {
        Self { body: body.into(), ..self }
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_parts(self) -> (Command, Headers, Bytes) {
        (self.command, self.headers, self.body)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} body ({} bytes)", self.command, self.headers, self.body.len())
    }
}

/// An inbound frame as handed to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    command: Command,
    headers: Headers,
    body: Bytes,
}

impl Message {
    pub fn command(&self) -> Command {
        self.command
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The body as text, invalid UTF-8 sequences replaced.
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        let (command, headers, body) = frame.into_parts();
        Self { command, headers, body }
    }
}

/// One unit on the wire, either a full frame or a bare heart-beat EOL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StompItem {
    Frame(Frame),
    Heartbeat,
}

impl StompItem {
    /// How the designated reader reports this item to the activity tracker.
    pub fn inbound(&self) -> Inbound {
        match self {
            StompItem::Frame(_) => Inbound::Frame,
            StompItem::Heartbeat => Inbound::Heartbeat,
        }
    }

    pub fn into_frame(self) -> Option<Frame> {
        match self {
            StompItem::Frame(frame) => Some(frame),
            StompItem::Heartbeat => None,
        }
    }
}

impl From<Frame> for StompItem {
    fn from(frame: Frame) -> Self {
        StompItem::Frame(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_basic() {
        let headers = Headers::from([("keya", "valuea")]);
        let body = "The Message Body";
        let frame = Frame::with_headers(Command::Connect, headers.clone()).set_body(body);

        assert_eq!(frame.command(), Command::Connect);
        assert!(headers.compare(frame.headers()));
        assert_eq!(frame.body().as_ref(), body.as_bytes());
    }

    #[test]
    fn message_basic() {
        let frame = Frame::new(Command::Message).header("keya", "valuea").set_body("The Message Body");
        let message = Message::from(frame);

        assert_eq!(message.command(), Command::Message);
        assert!(Headers::from([("keya", "valuea")]).compare(message.headers()));
        assert_eq!(message.body_string(), "The Message Body");
    }

    #[test]
    fn command_round_trips_through_text() {
        for command in [
            Command::Connect,
            Command::Stomp,
            Command::Connected,
            Command::Send,
            Command::Message,
            Command::Receipt,
            Command::Error,
            Command::Disconnect,
        ] {
            assert_eq!(Command::from_bytes(command.as_str().as_bytes()), Some(command));
        }
        assert_eq!(Command::from_bytes(b"SUBSCRIBE"), None);
        assert!(Command::Connected.is_handshake());
        assert!(!Command::Message.is_handshake());
    }

    #[test]
    fn item_reports_inbound_kind() {
        assert_eq!(StompItem::Heartbeat.inbound(), Inbound::Heartbeat);
        assert_eq!(StompItem::from(Frame::new(Command::Receipt)).inbound(), Inbound::Frame);
        assert!(StompItem::Heartbeat.into_frame().is_none());
    }
}
