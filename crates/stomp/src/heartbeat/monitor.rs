//! Runtime heart-beat monitoring.
//!
//! A [`HeartbeatMonitor`] owns up to two background tasks:
//!
//! - the send task keeps the server from timing us out, writing a bare EOL
//!   whenever a whole interval passed without any outbound frame
//! - the receive task watches the read marker kept by the designated reader
//!   and reports silence longer than the negotiated interval (plus grace)
//!
//! Each direction has its own lock-guarded counter, the two locks are never
//! held together.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::select;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::heartbeat::{Activity, Negotiated};
use crate::protocol::SendError;

/// A receive interval may overrun by a fifth before it counts as missed.
const RECEIVE_GRACE_DIVISOR: u32 = 5;

/// Writes bare heart-beats on behalf of the send task.
///
/// Implementations are expected to record write activity like any other write.
#[async_trait]
pub trait HeartbeatWriter: Send + Sync {
    async fn write_heartbeat(&self) -> Result<(), SendError>;
}

/// Lifecycle hook notified by the receive task.
pub trait ConnectionHook: Send + Sync {
    /// Nothing was read for `silence`, longer than the receive interval allows.
    fn on_receive_timeout(&self, silence: Duration);
}

impl<F> ConnectionHook for F
where
    F: Fn(Duration) + Send + Sync,
{
    fn on_receive_timeout(&self, silence: Duration) {
        self(silence);
    }
}

/// Lifecycle of one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickerState {
    Disabled,
    Running,
    Stopped,
}

#[derive(Debug)]
struct TickerStats {
    count: u64,
    state: TickerState,
}

#[derive(Debug)]
struct Ticker {
    interval: u64,
    stats: Mutex<TickerStats>,
    failed: AtomicBool,
}

impl Ticker {
    fn new(interval: u64) -> Self {
        let state = if interval > 0 { TickerState::Running } else { TickerState::Disabled };
        Self { interval, stats: Mutex::new(TickerStats { count: 0, state }), failed: AtomicBool::new(false) }
    }

    fn stats(&self) -> MutexGuard<'_, TickerStats> {
        // the guarded data is two plain fields, a panic cannot leave it half written
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tick(&self) {
        self.failed.store(false, Ordering::Release);
        self.stats().count += 1;
    }

    fn fail(&self) {
        self.failed.store(true, Ordering::Release);
    }

    fn stop(&self) {
        let mut stats = self.stats();
        if stats.state == TickerState::Running {
            stats.state = TickerState::Stopped;
        }
    }
}

#[derive(Debug)]
struct Shared {
    send: Ticker,
    receive: Ticker,
    activity: Arc<Activity>,
}

/// Heart-beat runtime state of one connection.
///
/// Created by [`HeartbeatMonitor::start`] after a successful negotiation and
/// stopped once with [`HeartbeatMonitor::shutdown`]; it is never restarted.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    shared: Arc<Shared>,
    shutdown: CancellationToken,
    send_task: Option<JoinHandle<()>>,
    receive_task: Option<JoinHandle<()>>,
}

impl HeartbeatMonitor {
    /// Spawns the tasks the negotiated cadences call for. Must run inside a tokio runtime.
    pub fn start(
        negotiated: Negotiated,
        activity: Arc<Activity>,
        writer: Arc<dyn HeartbeatWriter>,
        hook: Arc<dyn ConnectionHook>,
    ) -> Self {
        let shared = Arc::new(Shared {
            send: Ticker::new(negotiated.send_interval()),
            receive: Ticker::new(negotiated.receive_interval()),
            activity,
        });
        let shutdown = CancellationToken::new();

        let send_task = negotiated
            .send_period()
            .map(|period| tokio::spawn(send_heartbeats(Arc::clone(&shared), period, writer, shutdown.clone())));
        let receive_task = negotiated
            .receive_period()
            .map(|period| tokio::spawn(watch_heartbeats(Arc::clone(&shared), period, hook, shutdown.clone())));

        info!(send_ms = negotiated.send_interval(), receive_ms = negotiated.receive_interval(), "heart-beat monitor started");
        Self { shared, shutdown, send_task, receive_task }
    }

    /// Outbound interval in milliseconds, 0 when disabled.
    pub fn send_ticker_interval(&self) -> u64 {
        self.shared.send.interval
    }

    /// Inbound interval in milliseconds, 0 when disabled.
    pub fn receive_ticker_interval(&self) -> u64 {
        self.shared.receive.interval
    }

    pub fn send_ticker_count(&self) -> u64 {
        self.shared.send.stats().count
    }

    pub fn receive_ticker_count(&self) -> u64 {
        self.shared.receive.stats().count
    }

    pub fn send_state(&self) -> TickerState {
        self.shared.send.stats().state
    }

    pub fn receive_state(&self) -> TickerState {
        self.shared.receive.stats().state
    }

    /// The last heart-beat write failed.
    pub fn send_failed(&self) -> bool {
        self.shared.send.failed.load(Ordering::Acquire)
    }

    /// The last receive check found the peer silent for too long.
    pub fn receive_failed(&self) -> bool {
        self.shared.receive.failed.load(Ordering::Acquire)
    }

    pub fn dirty_read(&self) -> bool {
        self.shared.activity.dirty_read()
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stops both tasks and waits until they have exited.
    ///
    /// No counter moves once this returns. Calling it again is a no-op.
    pub async fn shutdown(&mut self) {
        self.shutdown.cancel();

        for task in [self.send_task.take(), self.receive_task.take()].into_iter().flatten() {
            if let Err(e) = task.await {
                error!(cause = %e, "heart-beat task ended abnormally");
            }
        }

        self.shared.send.stop();
        self.shared.receive.stop();
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        // tasks notice the cancellation at their next poll
        self.shutdown.cancel();
    }
}

async fn send_heartbeats(shared: Arc<Shared>, period: Duration, writer: Arc<dyn HeartbeatWriter>, shutdown: CancellationToken) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_tick = Instant::now();

    loop {
        select! {
            biased;
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if shared.activity.last_write() > last_tick {
            trace!("frame written within the interval, no heart-beat needed");
            shared.send.tick();
        } else {
            let result = select! {
                biased;
                () = shutdown.cancelled() => break,
                result = writer.write_heartbeat() => result,
            };

            match result {
                Ok(()) => {
                    trace!("heart-beat sent");
                    shared.send.tick();
                }
                Err(e) => {
                    warn!(cause = %e, "failed to send heart-beat");
                    shared.send.fail();
                }
            }
        }
        last_tick = Instant::now();
    }

    debug!("heart-beat send task stopped");
}

async fn watch_heartbeats(shared: Arc<Shared>, period: Duration, hook: Arc<dyn ConnectionHook>, shutdown: CancellationToken) {
    let allowed = period + period / RECEIVE_GRACE_DIVISOR;
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        select! {
            biased;
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let silence = shared.activity.since_last_read();
        if silence > allowed {
            warn!(silence_ms = silence.as_millis(), allowed_ms = allowed.as_millis(), "heart-beat receive timeout");
            shared.receive.fail();
            hook.on_receive_timeout(silence);
        } else {
            trace!(silence_ms = silence.as_millis(), "peer alive");
            shared.receive.tick();
        }
    }

    debug!("heart-beat receive task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heartbeat::{HeartbeatSpec, Inbound};
    use std::io;
    use std::sync::atomic::AtomicU64;

    #[derive(Debug, Default)]
    struct CountingWriter {
        activity: Option<Arc<Activity>>,
        written: AtomicU64,
        broken: AtomicBool,
    }

    #[async_trait]
    impl HeartbeatWriter for CountingWriter {
        async fn write_heartbeat(&self) -> Result<(), SendError> {
            if self.broken.load(Ordering::Acquire) {
                return Err(SendError::io(io::Error::from(io::ErrorKind::BrokenPipe)));
            }
            self.written.fetch_add(1, Ordering::AcqRel);
            if let Some(activity) = &self.activity {
                activity.record_write();
            }
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct TimeoutRecorder {
        timeouts: AtomicU64,
    }

    impl ConnectionHook for TimeoutRecorder {
        fn on_receive_timeout(&self, _silence: Duration) {
            self.timeouts.fetch_add(1, Ordering::AcqRel);
        }
    }

    fn negotiated(client: (u64, u64), server: (u64, u64)) -> Negotiated {
        Negotiated::between(HeartbeatSpec::new(client.0, client.1), HeartbeatSpec::new(server.0, server.1)).expect("active heart-beat")
    }

    #[tokio::test(start_paused = true)]
    async fn send_only() {
        let activity = Arc::new(Activity::new());
        let writer = Arc::new(CountingWriter { activity: Some(Arc::clone(&activity)), ..Default::default() });
        let hook = Arc::new(TimeoutRecorder::default());

        let mut monitor = HeartbeatMonitor::start(negotiated((10000, 0), (5000, 5000)), activity, writer.clone(), hook.clone());
        assert_eq!(monitor.send_ticker_interval(), 10000);
        assert_eq!(monitor.receive_ticker_interval(), 0);
        assert_eq!(monitor.send_state(), TickerState::Running);
        assert_eq!(monitor.receive_state(), TickerState::Disabled);

        time::sleep(Duration::from_millis(25_000)).await;

        assert_eq!(monitor.send_ticker_count(), 2);
        assert_eq!(writer.written.load(Ordering::Acquire), 2);
        assert_eq!(monitor.receive_ticker_count(), 0);
        assert_eq!(hook.timeouts.load(Ordering::Acquire), 0);
        assert!(!monitor.send_failed());

        monitor.shutdown().await;
        assert_eq!(monitor.send_state(), TickerState::Stopped);
        assert_eq!(monitor.receive_state(), TickerState::Disabled);
    }

    #[tokio::test(start_paused = true)]
    async fn receive_only_with_a_live_peer() {
        let activity = Arc::new(Activity::new());
        let reader = activity.designate_reader();
        let writer = Arc::new(CountingWriter::default());
        let hook = Arc::new(TimeoutRecorder::default());

        let mut monitor = HeartbeatMonitor::start(negotiated((0, 6000), (5000, 0)), Arc::clone(&activity), writer.clone(), hook.clone());
        assert_eq!(monitor.send_ticker_interval(), 0);
        assert_eq!(monitor.receive_ticker_interval(), 6000);

        let peer = tokio::spawn(async move {
            loop {
                time::sleep(Duration::from_millis(5000)).await;
                reader.observe(Inbound::Heartbeat);
            }
        });

        time::sleep(Duration::from_millis(13_000)).await;

        assert_eq!(monitor.send_ticker_count(), 0);
        assert_eq!(writer.written.load(Ordering::Acquire), 0);
        assert_eq!(monitor.receive_ticker_count(), 2);
        assert_eq!(hook.timeouts.load(Ordering::Acquire), 0);
        assert!(!monitor.receive_failed());
        assert!(!monitor.dirty_read());

        monitor.shutdown().await;
        peer.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn silent_peer_triggers_the_hook() {
        let activity = Arc::new(Activity::new());
        let writer = Arc::new(CountingWriter::default());
        let timeouts = Arc::new(AtomicU64::new(0));
        let hook = {
            let timeouts = Arc::clone(&timeouts);
            Arc::new(move |silence: Duration| {
                assert!(silence > Duration::from_millis(1200));
                timeouts.fetch_add(1, Ordering::AcqRel);
            })
        };

        let mut monitor = HeartbeatMonitor::start(negotiated((0, 1000), (1000, 0)), activity, writer, hook);

        time::sleep(Duration::from_millis(3500)).await;

        // the first check still falls inside the grace period
        assert_eq!(monitor.receive_ticker_count(), 1);
        assert_eq!(timeouts.load(Ordering::Acquire), 2);
        assert!(monitor.receive_failed());

        monitor.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn outbound_frames_replace_heartbeats() {
        let activity = Arc::new(Activity::new());
        let writer = Arc::new(CountingWriter { activity: Some(Arc::clone(&activity)), ..Default::default() });
        let hook = Arc::new(TimeoutRecorder::default());

        let mut monitor = HeartbeatMonitor::start(negotiated((1000, 0), (0, 1000)), Arc::clone(&activity), writer.clone(), hook);

        let app = tokio::spawn(async move {
            loop {
                time::sleep(Duration::from_millis(300)).await;
                activity.record_write();
            }
        });

        time::sleep(Duration::from_millis(5500)).await;

        assert_eq!(writer.written.load(Ordering::Acquire), 0);
        assert_eq!(monitor.send_ticker_count(), 5);

        monitor.shutdown().await;
        app.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_writes_are_flagged_and_not_counted() {
        let activity = Arc::new(Activity::new());
        let writer = Arc::new(CountingWriter { broken: AtomicBool::new(true), ..Default::default() });
        let hook = Arc::new(TimeoutRecorder::default());

        let mut monitor = HeartbeatMonitor::start(negotiated((100, 0), (0, 100)), activity, writer.clone(), hook);

        time::sleep(Duration::from_millis(350)).await;
        assert!(monitor.send_failed());
        assert_eq!(monitor.send_ticker_count(), 0);

        writer.broken.store(false, Ordering::Release);
        time::sleep(Duration::from_millis(100)).await;
        assert!(!monitor.send_failed());
        assert_eq!(monitor.send_ticker_count(), 1);

        monitor.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_freezes_counters() {
        let activity = Arc::new(Activity::new());
        let reader = activity.designate_reader();
        let writer = Arc::new(CountingWriter { activity: Some(Arc::clone(&activity)), ..Default::default() });
        let hook = Arc::new(TimeoutRecorder::default());

        let mut monitor = HeartbeatMonitor::start(negotiated((250, 250), (250, 250)), activity, writer.clone(), hook);

        let peer = tokio::spawn(async move {
            loop {
                time::sleep(Duration::from_millis(200)).await;
                reader.observe(Inbound::Heartbeat);
            }
        });

        time::sleep(Duration::from_millis(2000)).await;
        assert!(monitor.send_ticker_count() > 0);
        assert!(monitor.receive_ticker_count() > 0);

        monitor.shutdown().await;
        assert!(monitor.is_stopped());
        let sent = monitor.send_ticker_count();
        let received = monitor.receive_ticker_count();
        let written = writer.written.load(Ordering::Acquire);

        time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(monitor.send_ticker_count(), sent);
        assert_eq!(monitor.receive_ticker_count(), received);
        assert_eq!(writer.written.load(Ordering::Acquire), written);
        assert_eq!(monitor.send_state(), TickerState::Stopped);
        assert_eq!(monitor.receive_state(), TickerState::Stopped);

        // a second shutdown is harmless
        monitor.shutdown().await;
        peer.abort();
    }
}
