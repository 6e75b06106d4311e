use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::select;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tokio_util::io::InspectReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::codec::FrameDecoder;
use crate::config::ClientConfig;
use crate::connection::frame_writer::{FrameWriter, SharedWriter};
use crate::heartbeat::{self, Activity, ConnectionHook, HeartbeatError, HeartbeatMonitor, Inbound, InboundReader};
use crate::protocol::{
    Command, ConnectError, Frame, HK_ACCEPT_VERSION, HK_HOST, HK_MESSAGE, HK_RECEIPT, HK_RECEIPT_ID, HK_SERVER,
    HK_SESSION, HK_VERSION, Headers, Message, ParseError, ProtocolLevel, StompError, StompItem,
};

const BUFFER_SIZE: usize = 8 * 1024;

type EventResult = Result<ConnectionEvent, ParseError>;

/// What [`StompConnection::receive`] hands to the application.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// Any frame the server sent after CONNECTED: MESSAGE, RECEIPT or ERROR.
    Message(Message),
    /// Nothing arrived for longer than the negotiated receive interval allows.
    ///
    /// The reader stops pulling bytes off the transport while the event
    /// channel is full, see [`ClientConfig::sub_chan_cap`]. An application
    /// that stops calling [`StompConnection::receive`] therefore looks like a
    /// silent server, and the timeout itself is dropped when there is no room
    /// left for it. [`HeartbeatMonitor::receive_failed`] still reports it.
    HeartbeatTimeout { silence: Duration },
    /// The server closed the transport.
    Closed,
}

/// A connected STOMP session over a split transport.
///
/// After the handshake a single reader task owns the read half. It is the
/// designated reader of the connection: every chunk of bytes is reported to
/// the shared [`Activity`] as it arrives, so a large frame trickling in keeps
/// the receive watchdog quiet. Decoded heart-beats are reported as such.
/// Writes go through a shared writer that the heart-beat send task uses too.
#[derive(Debug)]
pub struct StompConnection<W> {
    protocol: ProtocolLevel,
    connect_response: Frame,
    writer: Arc<SharedWriter<W>>,
    activity: Arc<Activity>,
    monitor: Option<HeartbeatMonitor>,
    heartbeat_error: Option<HeartbeatError>,
    events: mpsc::Receiver<EventResult>,
    reader_shutdown: CancellationToken,
    reader_task: Option<JoinHandle<()>>,
    receipt_timeout: Duration,
    connected: bool,
    closed: bool,
}

impl<W> StompConnection<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Runs the CONNECT / CONNECTED handshake and starts the connection tasks.
    ///
    /// `headers` are sent verbatim with the CONNECT (or STOMP) frame, see
    /// [`ClientConfig::connect_headers`].
    ///
    /// # Errors
    ///
    /// - the headers are malformed, name an unsupported protocol level or
    ///   miss `host` for 1.1 and later
    /// - the server answers with ERROR, anything but CONNECTED, or a level
    ///   that was not offered
    /// - reading or writing the transport fails
    /// - the `heart-beat` headers are malformed and strict heart-beats are configured
    pub async fn connect<R>(reader: R, writer: W, headers: &Headers, config: &ClientConfig) -> Result<Self, StompError>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        headers.validate()?;
        headers.validate_utf8()?;

        let offered = match headers.contains_str(HK_ACCEPT_VERSION) {
            Some(value) => ProtocolLevel::parse_list(value)?,
            None => vec![ProtocolLevel::V1_0],
        };
        let highest = offered.iter().copied().max().unwrap_or(ProtocolLevel::V1_0);
        if highest >= ProtocolLevel::V1_1 && headers.contains(HK_HOST).is_none() {
            return Err(ConnectError::MissingHost { level: highest.as_str() }.into());
        }

        let activity = Arc::new(Activity::new());
        let inbound = Arc::new(activity.designate_reader());
        let reader = InspectReader::new(reader, {
            let inbound = Arc::clone(&inbound);
            move |bytes: &[u8]| {
                if !bytes.is_empty() {
                    inbound.observe(Inbound::Frame);
                }
            }
        });
        let writer = Arc::new(SharedWriter::new(FrameWriter::with_capacity(writer, BUFFER_SIZE), Arc::clone(&activity)));
        let mut framed = FramedRead::with_capacity(reader, FrameDecoder::with_max_body_length(config.max_body_length()), BUFFER_SIZE);

        let command = if config.use_stomp() && highest >= ProtocolLevel::V1_1 { Command::Stomp } else { Command::Connect };
        info!(%command, offered = ?offered, "connecting");
        writer.send(Frame::with_headers(command, headers.clone()).into()).await?;

        let connected = await_connected(&mut framed, &inbound).await?;

        let protocol = match connected.headers().contains_str(HK_VERSION) {
            Some(version) => {
                let protocol = ProtocolLevel::try_from(version)?;
                if !offered.contains(&protocol) {
                    return Err(ConnectError::unsupported_protocol(protocol).into());
                }
                protocol
            }
            // servers that predate 1.1 send no version
            None => ProtocolLevel::V1_0,
        };
        framed.decoder_mut().set_protocol(protocol);
        writer.set_protocol(protocol).await;

        let negotiated = if protocol.supports_heartbeats() {
            heartbeat::negotiate(headers, connected.headers())
        } else {
            Ok(None)
        };
        let (negotiated, heartbeat_error) = match negotiated {
            Ok(negotiated) => (negotiated, None),
            Err(e) if config.strict_heartbeats() => {
                error!(cause = %e, "heart-beat negotiation failed, closing");
                if let Err(e) = writer.shutdown().await {
                    debug!(cause = %e, "failed to shut down the writer");
                }
                return Err(e.into());
            }
            Err(e) => {
                warn!(cause = %e, "heart-beat negotiation failed, continuing without heart-beats");
                (None, Some(e))
            }
        };

        let (sender, events) = mpsc::channel(config.sub_chan_cap());

        let monitor = negotiated.map(|negotiated| {
            let hook: Arc<dyn ConnectionHook> = Arc::new(TimeoutNotifier { events: sender.downgrade() });
            HeartbeatMonitor::start(negotiated, Arc::clone(&activity), Arc::clone(&writer) as _, hook)
        });

        let reader_shutdown = CancellationToken::new();
        let reader_task = tokio::spawn(read_frames(framed, inbound, sender, reader_shutdown.clone()));

        info!(
            %protocol,
            session = connected.headers().contains_str(HK_SESSION),
            server = connected.headers().contains_str(HK_SERVER),
            "connected"
        );

        Ok(Self {
            protocol,
            connect_response: connected,
            writer,
            activity,
            monitor,
            heartbeat_error,
            events,
            reader_shutdown,
            reader_task: Some(reader_task),
            receipt_timeout: config.receipt_timeout(),
            connected: true,
            closed: false,
        })
    }

    /// Writes one application frame.
    ///
    /// # Errors
    ///
    /// Fails when the connection is gone, the frame is a handshake or
    /// DISCONNECT frame, or the transport write fails.
    pub async fn send(&self, frame: Frame) -> Result<(), StompError> {
        if !self.connected {
            return Err(ConnectError::NotConnected.into());
        }
        if frame.command().is_handshake() || frame.command() == Command::Disconnect {
            return Err(ConnectError::UnexpectedFrame { command: frame.command().as_str(), stage: "sending" }.into());
        }

        trace!(%frame, "sending frame");
        Ok(self.writer.send(frame.into()).await?)
    }

    /// Waits for the next inbound frame or connection event.
    ///
    /// Returns [`ConnectionEvent::Closed`] for good once the transport is closed.
    ///
    /// # Errors
    ///
    /// Returns the decode error that stopped the reader.
    pub async fn receive(&mut self) -> Result<ConnectionEvent, StompError> {
        if self.closed {
            return Ok(ConnectionEvent::Closed);
        }

        match self.events.recv().await {
            Some(Ok(ConnectionEvent::Closed)) | None => {
                self.closed = true;
                Ok(ConnectionEvent::Closed)
            }
            Some(Ok(event)) => Ok(event),
            Some(Err(e)) => {
                self.closed = true;
                Err(e.into())
            }
        }
    }

    /// Ends the session.
    ///
    /// Heart-beating stops before anything else. When `headers` carry a
    /// `receipt`, the matching RECEIPT is awaited before the transport is
    /// shut down.
    ///
    /// # Errors
    ///
    /// Fails when the connection was already disconnected, the DISCONNECT
    /// cannot be written, or the receipt does not arrive in time. The
    /// connection is torn down in every case.
    pub async fn disconnect(&mut self, headers: &Headers) -> Result<(), StompError> {
        if !self.connected {
            return Err(ConnectError::NotConnected.into());
        }
        self.connected = false;

        if let Some(monitor) = &mut self.monitor {
            monitor.shutdown().await;
        }

        let result = self.send_disconnect(headers).await;

        self.reader_shutdown.cancel();
        if let Some(task) = self.reader_task.take() {
            if let Err(e) = task.await {
                error!(cause = %e, "reader task ended abnormally");
            }
        }
        self.closed = true;

        if let Err(e) = self.writer.shutdown().await {
            debug!(cause = %e, "failed to shut down the writer");
        }

        info!(ok = result.is_ok(), "disconnected");
        result
    }

    async fn send_disconnect(&mut self, headers: &Headers) -> Result<(), StompError> {
        self.writer.send(Frame::with_headers(Command::Disconnect, headers.clone()).into()).await?;

        let Some(receipt) = headers.contains_str(HK_RECEIPT) else {
            return Ok(());
        };

        match tokio::time::timeout(self.receipt_timeout, await_receipt(&mut self.events, receipt)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(ConnectError::ReceiptTimeout { receipt: receipt.to_owned() }.into()),
        }
    }

    pub fn protocol(&self) -> ProtocolLevel {
        self.protocol
    }

    /// The CONNECTED frame of the handshake.
    pub fn connect_response(&self) -> &Frame {
        &self.connect_response
    }

    pub fn session(&self) -> Option<&str> {
        self.connect_response.headers().contains_str(HK_SESSION)
    }

    pub fn server(&self) -> Option<&str> {
        self.connect_response.headers().contains_str(HK_SERVER)
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Heart-beat state, `None` when no heart-beating was negotiated.
    pub fn heartbeat(&self) -> Option<&HeartbeatMonitor> {
        self.monitor.as_ref()
    }

    /// The negotiation error the connection degraded on, if any.
    pub fn heartbeat_error(&self) -> Option<&HeartbeatError> {
        self.heartbeat_error.as_ref()
    }

    pub fn send_ticker_interval(&self) -> u64 {
        self.monitor.as_ref().map_or(0, HeartbeatMonitor::send_ticker_interval)
    }

    pub fn receive_ticker_interval(&self) -> u64 {
        self.monitor.as_ref().map_or(0, HeartbeatMonitor::receive_ticker_interval)
    }

    pub fn send_ticker_count(&self) -> u64 {
        self.monitor.as_ref().map_or(0, HeartbeatMonitor::send_ticker_count)
    }

    pub fn receive_ticker_count(&self) -> u64 {
        self.monitor.as_ref().map_or(0, HeartbeatMonitor::receive_ticker_count)
    }

    pub fn dirty_read(&self) -> bool {
        self.activity.dirty_read()
    }
}

impl<W> Drop for StompConnection<W> {
    fn drop(&mut self) {
        self.reader_shutdown.cancel();
    }
}

async fn await_connected<R>(framed: &mut FramedRead<R, FrameDecoder>, inbound: &InboundReader) -> Result<Frame, StompError>
where
    R: AsyncRead + Unpin,
{
    const STAGE: &str = "awaiting CONNECTED";

    loop {
        let item = match framed.next().await {
            Some(item) => item?,
            None => return Err(ConnectError::Closed { stage: STAGE }.into()),
        };
        inbound.observe(item.inbound());

        let Some(frame) = item.into_frame() else {
            trace!("heart-beat before CONNECTED");
            continue;
        };

        return match frame.command() {
            Command::Connected => Ok(frame),
            Command::Error => {
                let message = frame
                    .headers()
                    .contains_str(HK_MESSAGE)
                    .map_or_else(|| String::from_utf8_lossy(frame.body()).into_owned(), str::to_owned);
                error!(%message, "connect rejected");
                Err(ConnectError::rejected(message).into())
            }
            command => Err(ConnectError::UnexpectedFrame { command: command.as_str(), stage: STAGE }.into()),
        };
    }
}

async fn await_receipt(events: &mut mpsc::Receiver<EventResult>, receipt: &str) -> Result<(), StompError> {
    loop {
        match events.recv().await {
            Some(Ok(ConnectionEvent::Message(message)))
                if message.command() == Command::Receipt
                    && message.headers().contains_str(HK_RECEIPT_ID) == Some(receipt) =>
            {
                debug!(receipt, "disconnect receipt received");
                return Ok(());
            }
            Some(Ok(ConnectionEvent::Closed)) | None => {
                return Err(ConnectError::Closed { stage: "awaiting RECEIPT" }.into());
            }
            Some(Ok(event)) => trace!(?event, "dropping event while awaiting receipt"),
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

/// The designated reader: owns the read half until the connection goes away.
async fn read_frames<R>(
    mut framed: FramedRead<R, FrameDecoder>,
    inbound: Arc<InboundReader>,
    events: mpsc::Sender<EventResult>,
    shutdown: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let item = select! {
            biased;
            () = shutdown.cancelled() => break,
            item = framed.next() => item,
        };

        let event = match item {
            Some(Ok(item)) => {
                inbound.observe(item.inbound());
                match item {
                    StompItem::Heartbeat => {
                        trace!("heart-beat received");
                        continue;
                    }
                    StompItem::Frame(frame) => Ok(ConnectionEvent::Message(frame.into())),
                }
            }
            Some(Err(e)) => {
                error!(cause = %e, "can't decode next frame, stop reading");
                Err(e)
            }
            None => {
                info!("server closed the connection");
                Ok(ConnectionEvent::Closed)
            }
        };
        let last = !matches!(event, Ok(ConnectionEvent::Message(_)));

        select! {
            biased;
            () = shutdown.cancelled() => break,
            sent = events.send(event) => {
                if sent.is_err() {
                    debug!("event receiver dropped, stop reading");
                    break;
                }
            }
        }

        if last {
            break;
        }
    }

    debug!("reader task stopped");
}

/// Surfaces a missed heart-beat as [`ConnectionEvent::HeartbeatTimeout`].
#[derive(Debug)]
struct TimeoutNotifier {
    events: mpsc::WeakSender<EventResult>,
}

impl ConnectionHook for TimeoutNotifier {
    fn on_receive_timeout(&self, silence: Duration) {
        let Some(events) = self.events.upgrade() else {
            return;
        };
        if let Err(e) = events.try_send(Ok(ConnectionEvent::HeartbeatTimeout { silence })) {
            debug!(cause = %e, "heart-beat timeout not delivered");
        }
    }
}
