use crate::core::error::SyncError;
use crate::stores::session_cache::SessionCache;
use crate::stores::torrent_cache::TorrentCache;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Shorter intervals, including zero, are raised to this
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Reachability of the daemon as seen by the poll cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionHealth {
    Connected,
    /// Some consecutive cycles failed entirely, but fewer than the limit
    Degraded { failed_cycles: u32 },
    /// The limit of consecutive failed cycles was reached
    Lost,
}

/// Periodically refreshes the session and torrent caches
pub struct PollScheduler {
    session: Arc<SessionCache>,
    torrents: Arc<TorrentCache>,
    interval: Duration,
    max_failed_cycles: u32,
    running: AtomicBool,
    failed_cycles: AtomicU32,
    health: watch::Sender<ConnectionHealth>,
}

impl PollScheduler {
    pub fn new(
        session: Arc<SessionCache>,
        torrents: Arc<TorrentCache>,
        interval: Duration,
        max_failed_cycles: u32,
    ) -> Self {
        let (health, _) = watch::channel(ConnectionHealth::Connected);
        Self {
            session,
            torrents,
            interval: interval.max(MIN_POLL_INTERVAL),
            max_failed_cycles: max_failed_cycles.max(1),
            running: AtomicBool::new(false),
            failed_cycles: AtomicU32::new(0),
            health,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn health(&self) -> ConnectionHealth {
        *self.health.borrow()
    }

    pub fn subscribe_health(&self) -> watch::Receiver<ConnectionHealth> {
        self.health.subscribe()
    }

    /// Run one cycle now, then one every interval until the handle is stopped.
    ///
    /// Fails with `AlreadyPolling` while a previous handle is still live.
    pub fn start(self: &Arc<Self>) -> Result<PollHandle, SyncError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::AlreadyPolling);
        }

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let scheduler = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scheduler.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        // Detached so stopping never aborts requests already sent
                        let cycle = Arc::clone(&scheduler);
                        tokio::spawn(async move {
                            cycle.refresh_now().await;
                        });
                    }
                }
            }

            debug!("Poll loop exited");
        });

        info!(interval_secs = self.interval.as_secs_f64(), "Polling started");

        Ok(PollHandle {
            scheduler: Arc::clone(self),
            stop: Some(stop_tx),
        })
    }

    /// One refresh cycle: session info, session stats and torrents.
    ///
    /// The three fetches are independent; a failing one does not block the
    /// others. Returns whether any of them succeeded.
    pub async fn refresh_now(&self) -> bool {
        let (info, stats, torrents) = tokio::join!(
            self.session.fetch_info(),
            self.session.fetch_stats(),
            self.torrents.fetch(),
        );

        let any_ok = info || stats || torrents;
        self.record_cycle(any_ok);
        any_ok
    }

    fn record_cycle(&self, any_ok: bool) {
        let next = if any_ok {
            self.failed_cycles.store(0, Ordering::SeqCst);
            ConnectionHealth::Connected
        } else {
            let failed = self.failed_cycles.fetch_add(1, Ordering::SeqCst) + 1;
            if failed >= self.max_failed_cycles {
                ConnectionHealth::Lost
            } else {
                ConnectionHealth::Degraded { failed_cycles: failed }
            }
        };

        self.health.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            match next {
                ConnectionHealth::Connected => info!("Daemon connection restored"),
                ConnectionHealth::Degraded { failed_cycles } => {
                    warn!(failed_cycles, "Poll cycle failed")
                }
                ConnectionHealth::Lost => warn!(
                    max_failed_cycles = self.max_failed_cycles,
                    "Daemon connection lost"
                ),
            }
            *current = next;
            true
        });
    }
}

/// Cancels future poll cycles when stopped or dropped
pub struct PollHandle {
    scheduler: Arc<PollScheduler>,
    stop: Option<oneshot::Sender<()>>,
}

impl PollHandle {
    pub fn stop(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
            self.scheduler.running.store(false, Ordering::SeqCst);
            info!("Polling stopped");
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
