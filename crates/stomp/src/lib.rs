//! An asynchronous micro STOMP client
//!
//! This crate implements the client side of a STOMP (1.0, 1.1 and 1.2)
//! session on top of tokio, with a focus on the handshake and on heart-beat
//! negotiation and monitoring.
//!
//! # Features
//!
//! - Ordered, duplicate tolerant headers with validation
//! - Protocol level registry and `accept-version` checks
//! - Heart-beat negotiation with exact diagnostics for malformed values
//! - Send and receive heart-beat tasks with independent counters
//! - A single designated reader, so heart-beats are never consumed twice
//! - Streaming frame codec with header escaping per protocol level
//!
//! # Example
//!
//! ```no_run
//! use micro_stomp::config::ClientConfig;
//! use micro_stomp::connection::{ConnectionEvent, StompConnection};
//! use micro_stomp::protocol::{Command, Frame, Headers};
//! use tokio::net::TcpStream;
//! use tracing::{error, info};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ClientConfig::builder().heartbeats("10000,10000").build().unwrap();
//!     let (reader, writer) = TcpStream::connect(config.address()).await.unwrap().into_split();
//!
//!     let mut connection = match StompConnection::connect(reader, writer, &config.connect_headers(), &config).await {
//!         Ok(connection) => connection,
//!         Err(e) => {
//!             error!(cause = %e, "connect failed");
//!             return;
//!         }
//!     };
//!
//!     let frame = Frame::new(Command::Send).header("destination", config.destination().to_owned()).set_body("hello");
//!     connection.send(frame).await.unwrap();
//!
//!     if let Ok(ConnectionEvent::HeartbeatTimeout { silence }) = connection.receive().await {
//!         info!(?silence, "server went quiet");
//!     }
//!
//!     connection.disconnect(&Headers::from([("receipt", "bye")])).await.unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! - [`protocol`]: headers, protocol levels, frames and error types
//! - [`heartbeat`]: negotiation, activity markers and the monitor
//! - [`codec`]: frame decoding and encoding
//! - [`connection`]: handshake and connection lifecycle
//! - [`config`]: client settings, from code or from `STOMP_*` variables
//!
//! # Error Handling
//!
//! - [`protocol::StompError`]: Top-level error type
//! - [`protocol::HeaderError`]: malformed header sequences
//! - [`protocol::HeartbeatError`]: malformed `heart-beat` values
//! - [`protocol::ParseError`]: inbound decoding errors
//! - [`protocol::SendError`]: outbound encoding and write errors
//! - [`protocol::ConnectError`]: handshake and lifecycle errors
//!
//! A missed heart-beat is not an error: it is reported as
//! [`connection::ConnectionEvent::HeartbeatTimeout`] and the application
//! decides what to do with the connection.
//!
//! # Limitations
//!
//! - Only the commands needed for connect, send, receive and disconnect
//! - No TLS support (wrap the transport yourself)
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64

pub mod codec;
pub mod config;
pub mod connection;
pub mod heartbeat;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
