//! STOMP frame encoder.
//!
//! Writes frames as command line, header lines, blank line, body and NUL.
//! A `content-length` header is added when the body is not empty and the
//! caller did not set one. A heart-beat is written as a single `\n`.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::Encoder;

use crate::codec::escape::escape_into;
use crate::ensure;
use crate::protocol::{Frame, HK_CONTENT_LENGTH, ProtocolLevel, SendError, StompItem};

#[derive(Debug, Clone)]
pub struct FrameEncoder {
    protocol: ProtocolLevel,
}

impl FrameEncoder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn protocol(&self) -> ProtocolLevel {
        self.protocol
    }

    pub fn set_protocol(&mut self, protocol: ProtocolLevel) {
        self.protocol = protocol;
    }

    fn encode_frame(&self, frame: &Frame, dst: &mut BytesMut) -> Result<(), SendError> {
        let headers = frame.headers();
        headers.validate().map_err(SendError::invalid_frame)?;

        let escaped = self.protocol.escapes_headers() && !frame.command().is_handshake();
        let carriage_return = self.protocol.escapes_carriage_return();

        dst.reserve(frame.command().as_str().len() + headers.as_slice().iter().map(|h| h.len() + 1).sum::<usize>() + frame.body().len() + 32);
        dst.put_slice(frame.command().as_str().as_bytes());
        dst.put_u8(b'\n');

        for (key, value) in headers.pairs() {
            if escaped {
                escape_into(key, carriage_return, dst);
                dst.put_u8(b':');
                escape_into(value, carriage_return, dst);
            } else {
                ensure!(!key.contains(&b'\n') && !key.contains(&b':'), SendError::invalid_frame("header key needs escaping"));
                ensure!(!value.contains(&b'\n'), SendError::invalid_frame("header value needs escaping"));
                dst.put_slice(key);
                dst.put_u8(b':');
                dst.put_slice(value);
            }
            dst.put_u8(b'\n');
        }

        if !frame.body().is_empty() && headers.contains(HK_CONTENT_LENGTH).is_none() {
            dst.put_slice(HK_CONTENT_LENGTH.as_bytes());
            dst.put_u8(b':');
            dst.put_slice(frame.body().len().to_string().as_bytes());
            dst.put_u8(b'\n');
        }

        dst.put_u8(b'\n');
        dst.put_slice(frame.body());
        dst.put_u8(0);
        Ok(())
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self { protocol: ProtocolLevel::V1_0 }
    }
}

impl Encoder<StompItem> for FrameEncoder {
    type Error = SendError;

    fn encode(&mut self, item: StompItem, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            StompItem::Heartbeat => {
                dst.put_u8(b'\n');
                Ok(())
            }
            StompItem::Frame(frame) => self.encode_frame(&frame, dst),
        }
    }
}

impl Encoder<&Frame> for FrameEncoder {
    type Error = SendError;

    fn encode(&mut self, frame: &Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.encode_frame(frame, dst)
    }
}
