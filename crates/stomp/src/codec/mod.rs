//! STOMP codec module for encoding and decoding frames
//!
//! The decoder and encoder plug into `tokio_util::codec`, so the connection
//! reads through a `FramedRead` and writes through a plain buffer.
//!
//! - [`FrameDecoder`]: splits inbound bytes into frames and heart-beats
//! - [`FrameEncoder`]: writes frames and heart-beats
//!
//! Both sides escape header values according to the negotiated protocol
//! level, see [`FrameDecoder::set_protocol`].
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use micro_stomp::codec::{FrameDecoder, FrameEncoder};
//! use micro_stomp::protocol::{Command, Frame, StompItem};
//! use tokio_util::codec::{Decoder, Encoder};
//!
//! let mut buffer = BytesMut::new();
//! let frame = Frame::new(Command::Send).header("destination", "/queue/a").set_body("hi");
//! FrameEncoder::new().encode(StompItem::Frame(frame.clone()), &mut buffer).unwrap();
//!
//! let decoded = FrameDecoder::new().decode(&mut buffer).unwrap();
//! assert_eq!(decoded.and_then(StompItem::into_frame).unwrap().body(), frame.body());
//! ```

mod escape;
mod frame_decoder;
mod frame_encoder;

pub use frame_decoder::FrameDecoder;
pub use frame_encoder::FrameEncoder;
