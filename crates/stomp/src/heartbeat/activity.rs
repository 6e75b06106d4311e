//! Last-activity markers shared between the transport and the heart-beat tasks.
//!
//! The socket has exactly one designated reader at a time. That reader reports
//! every inbound item through its [`InboundReader`] handle; the receive task
//! only ever looks at the resulting marker and never touches the socket.
//! Handing the socket to a new reader invalidates the previous handle, and a
//! heart-beat reported through a stale handle raises the dirty-read flag.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{trace, warn};

/// What the designated reader just pulled off the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Inbound {
    Frame,
    Heartbeat,
}

/// Read and write activity of one connection.
#[derive(Debug)]
pub struct Activity {
    origin: Instant,
    /// nanoseconds since `origin`
    last_read: AtomicU64,
    last_write: AtomicU64,
    designated: AtomicU64,
    next_reader: AtomicU64,
    dirty_read: AtomicBool,
}

impl Activity {
    /// Both markers start at the creation instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_read: AtomicU64::new(0),
            last_write: AtomicU64::new(0),
            designated: AtomicU64::new(0),
            next_reader: AtomicU64::new(0),
            dirty_read: AtomicBool::new(false),
        }
    }

    /// Hands the socket to a new reader, any previously issued handle stops counting.
    pub fn designate_reader(self: &Arc<Self>) -> InboundReader {
        let id = self.next_reader.fetch_add(1, Ordering::Relaxed) + 1;
        self.designated.store(id, Ordering::Release);
        trace!(reader = id, "designated inbound reader");
        InboundReader { id, activity: Arc::clone(self) }
    }

    /// Called by the writer after every frame or heart-beat it put on the wire.
    pub fn record_write(&self) {
        self.last_write.store(self.offset_now(), Ordering::Release);
    }

    pub fn last_read(&self) -> Instant {
        self.instant_at(self.last_read.load(Ordering::Acquire))
    }

    pub fn last_write(&self) -> Instant {
        self.instant_at(self.last_write.load(Ordering::Acquire))
    }

    pub fn since_last_read(&self) -> Duration {
        Instant::now().saturating_duration_since(self.last_read())
    }

    /// `true` once a heart-beat was consumed by something other than the designated reader.
    pub fn dirty_read(&self) -> bool {
        self.dirty_read.load(Ordering::Acquire)
    }

    fn offset_now(&self) -> u64 {
        u64::try_from(Instant::now().duration_since(self.origin).as_nanos()).unwrap_or(u64::MAX)
    }

    fn instant_at(&self, offset: u64) -> Instant {
        self.origin + Duration::from_nanos(offset)
    }
}

impl Default for Activity {
    fn default() -> Self {
        Self::new()
    }
}

/// The reporting handle of the reader that currently owns the socket.
#[derive(Debug)]
pub struct InboundReader {
    id: u64,
    activity: Arc<Activity>,
}

impl InboundReader {
    /// Records an inbound item.
    ///
    /// Returns `false` when this handle is no longer the designated reader, in
    /// which case the marker is left alone.
    pub fn observe(&self, inbound: Inbound) -> bool {
        if !self.is_designated() {
            if inbound == Inbound::Heartbeat {
                warn!(reader = self.id, "heart-beat consumed outside the designated reader");
                self.activity.dirty_read.store(true, Ordering::Release);
            }
            return false;
        }

        self.activity.last_read.store(self.activity.offset_now(), Ordering::Release);
        true
    }

    pub fn is_designated(&self) -> bool {
        self.activity.designated.load(Ordering::Acquire) == self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn designated_reader_moves_the_read_marker() {
        let activity = Arc::new(Activity::new());
        let reader = activity.designate_reader();
        let start = activity.last_read();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(activity.since_last_read(), Duration::from_millis(1500));

        assert!(reader.observe(Inbound::Heartbeat));
        assert_eq!(activity.last_read() - start, Duration::from_millis(1500));
        assert_eq!(activity.since_last_read(), Duration::ZERO);
        assert!(!activity.dirty_read());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_reader_heartbeat_is_a_dirty_read() {
        let activity = Arc::new(Activity::new());
        let stale = activity.designate_reader();
        let current = activity.designate_reader();
        assert!(!stale.is_designated());
        assert!(current.is_designated());

        tokio::time::sleep(Duration::from_millis(10)).await;

        // a frame through a stale handle is ignored, but not dirty
        assert!(!stale.observe(Inbound::Frame));
        assert!(!activity.dirty_read());
        assert_eq!(activity.since_last_read(), Duration::from_millis(10));

        assert!(!stale.observe(Inbound::Heartbeat));
        assert!(activity.dirty_read());
        assert_eq!(activity.since_last_read(), Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn write_marker_is_independent() {
        let activity = Arc::new(Activity::new());
        let start = activity.last_write();

        tokio::time::sleep(Duration::from_millis(200)).await;
        activity.record_write();

        assert_eq!(activity.last_write() - start, Duration::from_millis(200));
        assert_eq!(activity.since_last_read(), Duration::from_millis(200));
    }
}
