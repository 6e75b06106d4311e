//! Heart-beat negotiation.
//!
//! Both peers advertise `heart-beat: x,y` in milliseconds, where `x` is the
//! smallest interval at which the sender guarantees to send something and `y`
//! the interval at which it would like to receive something. Zero means
//! "cannot" or "does not want".
//!
//! For the client (`cx,cy`) against the server (`sx,sy`):
//!
//! - outbound: `max(cx, sy)`, disabled when either is zero
//! - inbound: `max(cy, sx)`, disabled when either is zero
//!
//! Negotiation only rejects malformed values; whether a rejection ends the
//! connection is up to the caller.

use std::fmt;
use std::time::Duration;

use tracing::debug;

use crate::protocol::{HK_HEART_BEAT, Headers, HeartbeatError};

/// Header value meaning "no heart-beating in either direction".
pub const HEARTBEAT_DISABLED: &str = "0,0";

/// The side that advertised a `heart-beat` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Peer {
    Client,
    Server,
}

impl Peer {
    pub const fn name(self) -> &'static str {
        match self {
            Peer::Client => "client",
            Peer::Server => "server",
        }
    }

    /// Names of the two fields, used in diagnostics.
    const fn fields(self) -> (&'static str, &'static str) {
        match self {
            Peer::Client => ("cx", "cy"),
            Peer::Server => ("sx", "sy"),
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One parsed `heart-beat` value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HeartbeatSpec {
    /// Interval the advertiser guarantees to send at, in milliseconds.
    pub guaranteed: u64,
    /// Interval the advertiser wants to receive at, in milliseconds.
    pub requested: u64,
}

impl HeartbeatSpec {
    pub const fn new(guaranteed: u64, requested: u64) -> Self {
        Self { guaranteed, requested }
    }

    /// Parses `x,y`: exactly two base-10 non-negative integers, no whitespace.
    pub fn parse(raw: &[u8], peer: Peer) -> Result<Self, HeartbeatError> {
        let mut fields = raw.split(|b| *b == b',');
        let (Some(x), Some(y), None) = (fields.next(), fields.next(), fields.next()) else {
            return Err(HeartbeatError::invalid_header(peer, raw));
        };

        let (x_name, y_name) = peer.fields();
        let guaranteed = parse_millis(x).ok_or_else(|| HeartbeatError::non_numeric(x_name, x))?;
        let requested = parse_millis(y).ok_or_else(|| HeartbeatError::non_numeric(y_name, y))?;

        Ok(Self { guaranteed, requested })
    }

    #[inline]
    pub fn is_disabled(&self) -> bool {
        self.guaranteed == 0 && self.requested == 0
    }
}

impl fmt::Display for HeartbeatSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.guaranteed, self.requested)
    }
}

fn parse_millis(field: &[u8]) -> Option<u64> {
    if field.is_empty() || !field.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(field).ok()?.parse().ok()
}

/// The negotiated cadences, at least one of them positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Negotiated {
    send: u64,
    receive: u64,
}

impl Negotiated {
    /// Applies the negotiation rule, `None` when neither direction is active.
    pub fn between(client: HeartbeatSpec, server: HeartbeatSpec) -> Option<Self> {
        let send = cadence(client.guaranteed, server.requested);
        let receive = cadence(client.requested, server.guaranteed);
        (send != 0 || receive != 0).then_some(Self { send, receive })
    }

    /// Outbound interval in milliseconds, 0 when disabled.
    #[inline]
    pub fn send_interval(&self) -> u64 {
        self.send
    }

    /// Inbound interval in milliseconds, 0 when disabled.
    #[inline]
    pub fn receive_interval(&self) -> u64 {
        self.receive
    }

    pub fn send_period(&self) -> Option<Duration> {
        (self.send > 0).then(|| Duration::from_millis(self.send))
    }

    pub fn receive_period(&self) -> Option<Duration> {
        (self.receive > 0).then(|| Duration::from_millis(self.receive))
    }
}

fn cadence(ours: u64, theirs: u64) -> u64 {
    if ours == 0 || theirs == 0 { 0 } else { ours.max(theirs) }
}

/// Negotiates heart-beating from the CONNECT headers the client sent and the
/// CONNECTED headers the server answered with.
///
/// Returns `Ok(None)` when no monitoring is needed.
///
/// # Errors
///
/// Returns [`HeartbeatError`] when either `heart-beat` value is malformed;
/// no monitoring state must be created in that case.
pub fn negotiate(client: &Headers, server: &Headers) -> Result<Option<Negotiated>, HeartbeatError> {
    let Some(client_value) = client.contains(HK_HEART_BEAT) else {
        return Ok(None);
    };
    if client_value == HEARTBEAT_DISABLED.as_bytes() {
        return Ok(None);
    }
    let client_spec = HeartbeatSpec::parse(client_value, Peer::Client)?;

    // the client cannot make up guarantees the server never gave
    let Some(server_value) = server.contains(HK_HEART_BEAT) else {
        return Ok(None);
    };
    if server_value == HEARTBEAT_DISABLED.as_bytes() {
        return Ok(None);
    }
    let server_spec = HeartbeatSpec::parse(server_value, Peer::Server)?;

    let negotiated = Negotiated::between(client_spec, server_spec);
    debug!(client = %client_spec, server = %server_spec, ?negotiated, "heart-beat negotiated");
    Ok(negotiated)
}
