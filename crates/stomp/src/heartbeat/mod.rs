//! Heart-beat negotiation and monitoring.
//!
//! - [`negotiate`] turns the CONNECT and CONNECTED `heart-beat` headers into
//!   a [`Negotiated`] pair of cadences
//! - [`Activity`] and [`InboundReader`] keep the last read and write instants
//! - [`HeartbeatMonitor`] runs the send and receive tasks for one connection

mod activity;
pub use activity::{Activity, Inbound, InboundReader};

mod negotiate;
pub use negotiate::{HEARTBEAT_DISABLED, HeartbeatSpec, Negotiated, Peer, negotiate};

mod monitor;
pub use monitor::{ConnectionHook, HeartbeatMonitor, HeartbeatWriter, TickerState};

pub use crate::protocol::HeartbeatError;
