use std::sync::Arc;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::codec::Encoder;
use tracing::trace;

use crate::codec::FrameEncoder;
use crate::heartbeat::{Activity, HeartbeatWriter};
use crate::protocol::{ProtocolLevel, SendError, StompItem};

#[derive(Debug)]
pub struct FrameWriter<W> {
    writer: W,
    buffer: BytesMut,
    encoder: FrameEncoder,
}

impl<W> FrameWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn with_capacity(writer: W, buffer_size: usize) -> Self {
        Self { writer, buffer: BytesMut::with_capacity(buffer_size), encoder: FrameEncoder::new() }
    }

    pub fn set_protocol(&mut self, protocol: ProtocolLevel) {
        self.encoder.set_protocol(protocol);
    }

    #[inline]
    pub fn write(&mut self, item: StompItem) -> Result<(), SendError> {
        self.encoder.encode(item, &mut self.buffer)
    }

    /// Writes out everything buffered so far; the buffer is emptied even when the write fails.
    pub async fn flush(&mut self) -> Result<(), SendError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let written = self.writer.write_all(self.buffer.as_ref()).await;
        self.buffer.clear();
        written?;
        Ok(self.writer.flush().await?)
    }

    pub async fn shutdown(&mut self) -> Result<(), SendError> {
        self.flush().await?;
        Ok(self.writer.shutdown().await?)
    }
}

/// The outbound half of a connection, shared by the application and the heart-beat send task.
///
/// Every successful write moves the write marker of the connection.
#[derive(Debug)]
pub(crate) struct SharedWriter<W> {
    inner: Mutex<FrameWriter<W>>,
    activity: Arc<Activity>,
}

impl<W> SharedWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub(crate) fn new(writer: FrameWriter<W>, activity: Arc<Activity>) -> Self {
        Self { inner: Mutex::new(writer), activity }
    }

    pub(crate) async fn send(&self, item: StompItem) -> Result<(), SendError> {
        let mut writer = self.inner.lock().await;
        writer.write(item)?;
        writer.flush().await?;
        self.activity.record_write();
        Ok(())
    }

    pub(crate) async fn set_protocol(&self, protocol: ProtocolLevel) {
        self.inner.lock().await.set_protocol(protocol);
    }

    pub(crate) async fn shutdown(&self) -> Result<(), SendError> {
        self.inner.lock().await.shutdown().await
    }
}

#[async_trait]
impl<W> HeartbeatWriter for SharedWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write_heartbeat(&self) -> Result<(), SendError> {
        trace!("writing heart-beat");
        self.send(StompItem::Heartbeat).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Command, Frame};
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn frames_reach_the_transport() {
        let (client, mut server) = tokio::io::duplex(1024);
        let mut writer = FrameWriter::with_capacity(client, 64);

        writer.write(StompItem::Frame(Frame::new(Command::Disconnect).header("receipt", "r-1"))).unwrap();
        writer.write(StompItem::Heartbeat).unwrap();
        writer.flush().await.unwrap();
        writer.shutdown().await.unwrap();

        let mut received = Vec::new();
        server.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"DISCONNECT\nreceipt:r-1\n\n\0\n");
    }

    #[tokio::test(start_paused = true)]
    async fn shared_writes_move_the_write_marker() {
        let (client, mut server) = tokio::io::duplex(1024);
        let activity = Arc::new(Activity::new());
        let writer = SharedWriter::new(FrameWriter::with_capacity(client, 64), Arc::clone(&activity));
        let start = activity.last_write();

        tokio::time::sleep(Duration::from_millis(40)).await;
        writer.write_heartbeat().await.unwrap();
        assert_eq!(activity.last_write() - start, Duration::from_millis(40));

        let mut received = [0u8; 1];
        server.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"\n");
    }

    #[tokio::test]
    async fn failed_writes_do_not_move_the_marker() {
        let (client, server) = tokio::io::duplex(16);
        drop(server);
        let activity = Arc::new(Activity::new());
        let writer = SharedWriter::new(FrameWriter::with_capacity(client, 64), Arc::clone(&activity));
        let before = activity.last_write();

        assert!(writer.write_heartbeat().await.is_err());
        assert_eq!(activity.last_write(), before);
    }
}
