use std::io;
use thiserror::Error;

use crate::config::ConfigError;
use crate::heartbeat::Peer;

#[derive(Debug, Error)]
pub enum StompError {
    #[error("header error: {source}")]
    Header {
        #[from]
        source: HeaderError,
    },

    #[error("receive error: {source}")]
    Receive {
        #[from]
        source: ParseError,
    },

    #[error("send error: {source}")]
    Send {
        #[from]
        source: SendError,
    },

    #[error("heartbeat error: {source}")]
    Heartbeat {
        #[from]
        source: HeartbeatError,
    },

    #[error("connect error: {source}")]
    Connect {
        #[from]
        source: ConnectError,
    },

    #[error("config error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },
}

/// Structural and encoding problems of a [`Headers`](crate::protocol::Headers) sequence.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("unmatched headers, bad length: {len}")]
    OddLength { len: usize },

    #[error("header string not UTF8 at index {index}: {text}")]
    InvalidUtf8 { index: usize, text: String },
}

impl HeaderError {
    pub fn odd_length(len: usize) -> Self {
        Self::OddLength { len }
    }

    pub fn invalid_utf8(index: usize, raw: &[u8]) -> Self {
        Self::InvalidUtf8 { index, text: String::from_utf8_lossy(raw).into_owned() }
    }
}

/// Format errors of a `heart-beat` header value.
///
/// The messages are part of the public contract, diagnostics and tests
/// compare them verbatim.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeartbeatError {
    #[error("invalid {peer} heart-beat header: {value}")]
    InvalidHeader { peer: Peer, value: String },

    #[error("non-numeric {field} heartbeat value: {value}")]
    NonNumeric { field: &'static str, value: String },
}

impl HeartbeatError {
    pub fn invalid_header(peer: Peer, raw: &[u8]) -> Self {
        Self::InvalidHeader { peer, value: String::from_utf8_lossy(raw).into_owned() }
    }

    pub fn non_numeric(field: &'static str, raw: &[u8]) -> Self {
        Self::NonNumeric { field, value: String::from_utf8_lossy(raw).into_owned() }
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid stomp command: {command}")]
    InvalidCommand { command: String },

    #[error("body size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeBody { current_size: usize, max_size: usize },

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_command(raw: &[u8]) -> Self {
        Self::InvalidCommand { command: String::from_utf8_lossy(raw).into_owned() }
    }

    pub fn too_large_body(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeBody { current_size, max_size }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid frame: {reason}")]
    InvalidFrame { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_frame<S: ToString>(str: S) -> Self {
        Self::InvalidFrame { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

/// Failures of the CONNECT / CONNECTED handshake and of the connection lifecycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("unsupported protocol level: {level}")]
    UnsupportedProtocol { level: String },

    #[error("host header is required for protocol level {level}")]
    MissingHost { level: &'static str },

    #[error("connect rejected by server: {message}")]
    Rejected { message: String },

    #[error("unexpected {command} frame while {stage}")]
    UnexpectedFrame { command: &'static str, stage: &'static str },

    #[error("connection closed by peer while {stage}")]
    Closed { stage: &'static str },

    #[error("receipt {receipt} not received in time")]
    ReceiptTimeout { receipt: String },

    #[error("connection is not established")]
    NotConnected,
}

impl ConnectError {
    pub fn unsupported_protocol<S: ToString>(level: S) -> Self {
        Self::UnsupportedProtocol { level: level.to_string() }
    }

    pub fn rejected<S: ToString>(message: S) -> Self {
        Self::Rejected { message: message.to_string() }
    }
}
