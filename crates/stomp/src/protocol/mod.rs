//! Core STOMP protocol abstractions.
//!
//! This module holds the data model shared by the whole client:
//!
//! - **Headers** ([`headers`]): ordered, duplicate tolerant header container
//!   - [`Headers`]: flat `key, value, key, value, ...` sequence with validation
//!   - `HK_*` constants for the header keys the client relies on
//!
//! - **Protocol levels** ([`version`]): the supported level registry
//!   - [`ProtocolLevel`], [`supported`], [`protocols`]
//!
//! - **Frames** ([`frame`]): commands, frames and wire items
//!   - [`Frame`], [`Message`], [`Command`], [`StompItem`]
//!
//! - **Error Handling** ([`error`]):
//!   - [`StompError`]: Top-level error type
//!   - [`HeaderError`], [`HeartbeatError`], [`ParseError`], [`SendError`], [`ConnectError`]

mod headers;
pub use headers::Headers;
pub use headers::{
    HK_ACCEPT_VERSION, HK_CONTENT_LENGTH, HK_CONTENT_TYPE, HK_DESTINATION, HK_HEART_BEAT, HK_HOST, HK_LOGIN, HK_MESSAGE,
    HK_PASSCODE, HK_PERSISTENT, HK_RECEIPT, HK_RECEIPT_ID, HK_SERVER, HK_SESSION, HK_VERSION,
};

mod version;
pub use version::ProtocolLevel;
pub use version::{protocols, supported};

mod frame;
pub use frame::{Command, Frame, Message, StompItem};

mod error;
pub use error::ConnectError;
pub use error::HeaderError;
pub use error::HeartbeatError;
pub use error::ParseError;
pub use error::SendError;
pub use error::StompError;
