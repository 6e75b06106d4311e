//! STOMP frame decoder.
//!
//! Splits the inbound byte stream into [`StompItem`]s:
//!
//! - a bare EOL (`\n` or `\r\n`) outside a frame is a heart-beat
//! - anything else starts a frame: command line, `key:value` header lines,
//!   a blank line, then the body terminated by NUL
//!
//! # Limits
//!
//! - Maximum header block size: 8KB
//! - Maximum number of headers: 64
//! - Optional maximum body length, see [`FrameDecoder::with_max_body_length`]
//!
//! Header slices share the frame buffer, only escaped values are copied.

use std::ops::Range;

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::escape::unescape;
use crate::ensure;
use crate::protocol::{Command, Frame, HK_CONTENT_LENGTH, Headers, ParseError, ProtocolLevel, StompItem};

/// Maximum number of headers allowed in a frame
const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes allowed for the command line plus the header section
const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Upper bound of the buffer growth requested for a body that is still in flight
const MAX_BODY_RESERVE: usize = 64 * 1024;

/// Byte ranges of one parsed header block, relative to the frame start.
#[derive(Debug)]
struct FrameIndex {
    command: Command,
    headers: Vec<(Range<usize>, Range<usize>)>,
    content_length: Option<usize>,
    body_start: usize,
}

/// Decoder for inbound STOMP frames and heart-beats.
///
/// Header unescaping depends on the negotiated protocol level, so the level
/// must be updated with [`FrameDecoder::set_protocol`] once CONNECTED was read.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    protocol: ProtocolLevel,
    max_body_length: Option<usize>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_max_body_length(max_body_length: Option<usize>) -> Self {
        Self { max_body_length, ..Default::default() }
    }

    pub fn protocol(&self) -> ProtocolLevel {
        self.protocol
    }

    pub fn set_protocol(&mut self, protocol: ProtocolLevel) {
        self.protocol = protocol;
    }

    fn decode_heartbeat(src: &mut BytesMut) -> Option<Option<StompItem>> {
        match src.as_ref() {
            [b'\n', ..] => {
                src.advance(1);
                Some(Some(StompItem::Heartbeat))
            }
            [b'\r', b'\n', ..] => {
                src.advance(2);
                Some(Some(StompItem::Heartbeat))
            }
            // a lone CR might still become a heart-beat
            [b'\r'] => Some(None),
            _ => None,
        }
    }

    fn check_body_length(&self, current_size: usize) -> Result<(), ParseError> {
        match self.max_body_length {
            Some(max_size) => {
                ensure!(current_size <= max_size, ParseError::too_large_body(current_size, max_size));
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn build_frame(&self, index: FrameIndex, frame_bytes: &Bytes, body: Range<usize>) -> Result<Frame, ParseError> {
        let escaped = self.protocol.escapes_headers() && !index.command.is_handshake();
        let carriage_return = self.protocol.escapes_carriage_return();

        let mut entries = Vec::with_capacity(index.headers.len() * 2);
        for (key, value) in index.headers {
            let key = frame_bytes.slice(key);
            let value = frame_bytes.slice(value);
            if escaped {
                entries.push(unescape(key, carriage_return)?);
                entries.push(unescape(value, carriage_return)?);
            } else {
                entries.push(key);
                entries.push(value);
            }
        }

        Ok(Frame::from_parts(index.command, Headers::from_raw(entries), frame_bytes.slice(body)))
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self { protocol: ProtocolLevel::V1_0, max_body_length: None }
    }
}

impl Decoder for FrameDecoder {
    type Item = StompItem;
    type Error = ParseError;

    /// Attempts to decode one heart-beat or one complete frame.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(StompItem::Heartbeat))`: a bare EOL between frames
    /// - `Ok(Some(StompItem::Frame(_)))`: a complete frame, body included
    /// - `Ok(None)`: need more data to proceed
    /// - `Err(_)`: malformed frame or a configured limit was exceeded
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        if let Some(item) = Self::decode_heartbeat(src) {
            return Ok(item);
        }

        let Some(index) = parse_header_block(src)? else {
            return Ok(None);
        };

        let (body_len, frame_len) = match index.content_length {
            Some(length) => {
                self.check_body_length(length)?;
                let frame_len = index
                    .body_start
                    .checked_add(length)
                    .and_then(|len| len.checked_add(1))
                    .ok_or_else(|| ParseError::invalid_content_length(format!("{length} overflows the frame size")))?;
                if src.len() < frame_len {
                    // the peer controls the length, grow with what actually arrives
                    src.reserve((frame_len - src.len()).min(MAX_BODY_RESERVE));
                    return Ok(None);
                }
                ensure!(src[frame_len - 1] == 0, ParseError::invalid_body("frame body not terminated by NUL"));
                (length, frame_len)
            }
            None => match src[index.body_start..].iter().position(|b| *b == 0) {
                Some(length) => {
                    self.check_body_length(length)?;
                    (length, index.body_start + length + 1)
                }
                None => {
                    self.check_body_length(src.len() - index.body_start)?;
                    return Ok(None);
                }
            },
        };

        trace!(command = %index.command, headers = index.headers.len(), body_size = body_len, "decoded frame");

        let frame_bytes = src.split_to(frame_len).freeze();
        let body = index.body_start..index.body_start + body_len;
        let frame = self.build_frame(index, &frame_bytes, body)?;
        Ok(Some(StompItem::Frame(frame)))
    }
}

/// Locates the end of the header block: the first empty line.
///
/// Returns the offset of the first body byte.
fn find_body_start(src: &[u8]) -> Option<usize> {
    src.iter().enumerate().filter(|(_, b)| **b == b'\n').find_map(|(i, _)| match &src[i + 1..] {
        [b'\n', ..] => Some(i + 2),
        [b'\r', b'\n', ..] => Some(i + 3),
        _ => None,
    })
}

fn parse_header_block(src: &[u8]) -> Result<Option<FrameIndex>, ParseError> {
    let Some(body_start) = find_body_start(src) else {
        ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
        return Ok(None);
    };
    ensure!(body_start <= MAX_HEADER_BYTES, ParseError::too_large_header(body_start, MAX_HEADER_BYTES));

    let mut lines = LineRanges { src: &src[..body_start], offset: 0 };

    let command_line = lines.next().ok_or_else(|| ParseError::invalid_header("missing command line"))?;
    let command = Command::from_bytes(&src[command_line.clone()]).ok_or_else(|| ParseError::invalid_command(&src[command_line]))?;

    let mut headers = Vec::new();
    let mut content_length = None;
    for line in lines.filter(|line| !line.is_empty()) {
        ensure!(headers.len() < MAX_HEADER_NUM, ParseError::too_many_headers(MAX_HEADER_NUM));

        let colon = src[line.clone()]
            .iter()
            .position(|b| *b == b':')
            .ok_or_else(|| ParseError::invalid_header(String::from_utf8_lossy(&src[line.clone()])))?;
        let key = line.start..line.start + colon;
        let value = line.start + colon + 1..line.end;

        if content_length.is_none() && &src[key.clone()] == HK_CONTENT_LENGTH.as_bytes() {
            content_length = Some(parse_content_length(&src[value.clone()])?);
        }
        headers.push((key, value));
    }

    Ok(Some(FrameIndex { command, headers, content_length, body_start }))
}

fn parse_content_length(value: &[u8]) -> Result<usize, ParseError> {
    std::str::from_utf8(value)
        .ok()
        .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ParseError::invalid_content_length(String::from_utf8_lossy(value)))
}

/// Iterates the line ranges of a header block, EOL (and a trailing CR) excluded.
struct LineRanges<'a> {
    src: &'a [u8],
    offset: usize,
}

impl Iterator for LineRanges<'_> {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.src[self.offset..];
        let eol = rest.iter().position(|b| *b == b'\n')?;
        let start = self.offset;
        let mut end = start + eol;
        if end > start && self.src[end - 1] == b'\r' {
            end -= 1;
        }
        self.offset = start + eol + 1;
        Some(start..end)
    }
}
