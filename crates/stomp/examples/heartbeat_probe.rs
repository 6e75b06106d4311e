//! Connects to a broker, sends a few messages and reports heart-beat counters.
//!
//! Settings come from the `STOMP_*` variables, for example:
//!
//! ```text
//! STOMP_HEARTBEATS=1000,1000 STOMP_NMSGS=5 cargo run --example heartbeat_probe
//! ```

use std::time::Duration;

use micro_stomp::config::ClientConfig;
use micro_stomp::connection::{ConnectionEvent, StompConnection};
use micro_stomp::protocol::{Command, Frame, HK_DESTINATION, HK_PERSISTENT, HK_RECEIPT, Headers};
use tokio::net::TcpStream;
use tokio::time::sleep;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(cause = %e, "invalid configuration");
            return;
        }
    };

    info!(address = %config.address(), protocol = %config.protocol(), heartbeats = config.heartbeats(), "dialing");
    let stream = match TcpStream::connect(config.address()).await {
        Ok(stream) => stream,
        Err(e) => {
            error!(cause = %e, "connect to broker failed");
            return;
        }
    };

    let (reader, writer) = stream.into_split();
    let mut connection = match StompConnection::connect(reader, writer, &config.connect_headers(), &config).await {
        Ok(connection) => connection,
        Err(e) => {
            error!(cause = %e, "stomp handshake failed");
            return;
        }
    };

    info!(
        protocol = %connection.protocol(),
        session = connection.session(),
        server = connection.server(),
        send_ms = connection.send_ticker_interval(),
        receive_ms = connection.receive_ticker_interval(),
        "connected"
    );
    if let Some(e) = connection.heartbeat_error() {
        warn!(cause = %e, "running without heart-beats");
    }

    for n in 1..=config.message_count() {
        let mut frame = Frame::new(Command::Send).header(HK_DESTINATION, config.destination().to_owned());
        if config.persistent() {
            frame = frame.header(HK_PERSISTENT, "true");
        }
        if let Err(e) = connection.send(frame.set_body(format!("message {n}"))).await {
            error!(cause = %e, "send failed");
            break;
        }
    }

    // idle long enough for a few heart-beats in both directions
    let idle = Duration::from_millis(connection.send_ticker_interval().max(connection.receive_ticker_interval()) * 3);
    tokio::select! {
        () = sleep(idle) => {}
        event = connection.receive() => match event {
            Ok(ConnectionEvent::HeartbeatTimeout { silence }) => warn!(?silence, "broker missed its heart-beats"),
            Ok(ConnectionEvent::Message(message)) => info!(command = %message.command(), body = %message.body_string(), "received"),
            Ok(ConnectionEvent::Closed) => warn!("broker closed the connection"),
            Err(e) => error!(cause = %e, "receive failed"),
        },
    }

    info!(
        sent = connection.send_ticker_count(),
        received = connection.receive_ticker_count(),
        dirty_read = connection.dirty_read(),
        "heart-beat counters"
    );

    match connection.disconnect(&Headers::from([(HK_RECEIPT, "probe-disconnect")])).await {
        Ok(()) => info!("disconnected"),
        Err(e) => error!(cause = %e, "disconnect failed"),
    }
}
