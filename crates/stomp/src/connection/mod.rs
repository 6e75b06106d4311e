//! STOMP connection handling module
//!
//! - [`StompConnection`]: runs the CONNECT / CONNECTED handshake, owns the
//!   designated reader task, the shared writer and the heart-beat monitor,
//!   and tears all of them down on disconnect
//! - [`ConnectionEvent`]: inbound frames and connection level events
//! - [`FrameWriter`]: buffered frame writer over any `AsyncWrite`

mod frame_writer;
mod stomp_connection;

pub use frame_writer::FrameWriter;
pub use stomp_connection::{ConnectionEvent, StompConnection};
