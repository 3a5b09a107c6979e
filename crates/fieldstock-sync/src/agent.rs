//! # Sync Agent
//!
//! Background scheduler that decides when the engine drains the queue.
//!
//! ## Triggers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         SyncAgent Scheduler                             │
//! │                                                                         │
//! │  (a) enqueue ──────────────► SyncEngine::trigger_sync   (engine side)  │
//! │                                                                         │
//! │  (b) every SYNC_INTERVAL_MS                                            │
//! │      online && queue_count > 0 ──► sync_queue()                        │
//! │      cycle with failures ──► next tick waits for the backoff           │
//! │                                                                         │
//! │  (c) OnlineStatus { is_online: true, was_offline: true }               │
//! │      queue_count > 0 ──► sync_queue()                                  │
//! │      then clear_was_offline(), backoff reset                           │
//! │                                                                         │
//! │  Offline: nothing is scheduled.                                        │
//! │                                                                         │
//! │  start()    ──► start_pinging() + spawn scheduler                      │
//! │  shutdown() ──► stop scheduler + stop_pinging()                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::SyncSettings;
use crate::connectivity::ConnectivityMonitor;
use crate::engine::{SyncEngine, SyncOutcome};
use crate::remote::RemoteBackend;
use crate::session::SessionProvider;

/// Owns the scheduler task and the connectivity probe lifecycle.
pub struct SyncAgent<R: RemoteBackend, S: SessionProvider + 'static> {
    engine: Arc<SyncEngine<R, S>>,
    monitor: Arc<ConnectivityMonitor<R>>,
    settings: SyncSettings,

    /// Shutdown sender.
    shutdown_tx: Option<mpsc::Sender<()>>,

    /// Scheduler task (set after start).
    task: Option<JoinHandle<()>>,
}

impl<R: RemoteBackend, S: SessionProvider + 'static> SyncAgent<R, S> {
    /// Creates a new sync agent. The engine must observe `monitor`.
    pub fn new(
        engine: Arc<SyncEngine<R, S>>,
        monitor: Arc<ConnectivityMonitor<R>>,
        settings: SyncSettings,
    ) -> Self {
        SyncAgent {
            engine,
            monitor,
            settings,
            shutdown_tx: None,
            task: None,
        }
    }

    pub fn engine(&self) -> &Arc<SyncEngine<R, S>> {
        &self.engine
    }

    pub fn monitor(&self) -> &Arc<ConnectivityMonitor<R>> {
        &self.monitor
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Starts probing and scheduling. No-op if already running.
    pub fn start(&mut self) {
        if self.is_running() {
            debug!("Sync agent already running");
            return;
        }

        info!(
            interval_ms = self.settings.interval_ms,
            max_retry_count = self.settings.max_retry_count,
            "Starting sync agent"
        );

        self.monitor.start_pinging();

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        self.shutdown_tx = Some(shutdown_tx);
        self.task = Some(tokio::spawn(Self::scheduler(
            Arc::clone(&self.engine),
            Arc::clone(&self.monitor),
            self.settings.clone(),
            shutdown_rx,
        )));
    }

    /// Stops the scheduler and the probe. Safe to call more than once.
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Sync scheduler ended abnormally");
            }
            info!("Sync agent stopped");
        }

        self.monitor.stop_pinging();
    }

    /// Exponential backoff for periodic retries after failed cycles.
    fn create_backoff(settings: &SyncSettings) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoff {
            initial_interval: settings.initial_backoff(),
            max_interval: settings.max_backoff(),
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        };
        backoff.reset();
        backoff
    }

    /// Main scheduler loop.
    async fn scheduler(
        engine: Arc<SyncEngine<R, S>>,
        monitor: Arc<ConnectivityMonitor<R>>,
        settings: SyncSettings,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let mut online_rx = monitor.subscribe();
        let mut backoff = Self::create_backoff(&settings);
        let mut next_tick = Instant::now() + settings.interval();

        // a recovery raised before the agent started still counts
        online_rx.mark_changed();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!("Scheduler received shutdown");
                    break;
                }

                changed = online_rx.changed() => {
                    if changed.is_err() {
                        debug!("Connectivity monitor dropped");
                        break;
                    }
                    let status = *online_rx.borrow_and_update();
                    if status.is_online && status.was_offline {
                        backoff.reset();
                        Self::recover(&engine, &monitor).await;
                        next_tick = Instant::now() + settings.interval();
                    }
                }

                _ = tokio::time::sleep_until(next_tick) => {
                    let delay = Self::periodic(&engine, &monitor, &settings, &mut backoff).await;
                    next_tick = Instant::now() + delay;
                }
            }
        }

        info!("Sync scheduler stopped");
    }

    /// Drains once after coming back online, then lowers the recovery flag.
    async fn recover(engine: &SyncEngine<R, S>, monitor: &ConnectivityMonitor<R>) {
        match engine.refresh_queue_count().await {
            Ok(0) => debug!("Back online, queue empty"),
            Ok(count) => {
                info!(queue_count = count, "Back online, draining queue");
                if let Err(e) = engine.sync_queue().await {
                    warn!(error = %e, "Recovery sync failed");
                }
            }
            Err(e) => warn!(error = %e, "Failed to read queue count on recovery"),
        }
        monitor.clear_was_offline();
    }

    /// One periodic tick. Returns the delay until the next one.
    async fn periodic(
        engine: &SyncEngine<R, S>,
        monitor: &ConnectivityMonitor<R>,
        settings: &SyncSettings,
        backoff: &mut ExponentialBackoff,
    ) -> Duration {
        if !monitor.is_online() {
            return settings.interval();
        }

        match engine.refresh_queue_count().await {
            Ok(0) => return settings.interval(),
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Failed to read queue count");
                return settings.interval();
            }
        }

        let failed = match engine.sync_queue().await {
            Ok(SyncOutcome::Completed(report)) => report.failed > 0,
            Ok(SyncOutcome::Skipped(reason)) => {
                debug!(?reason, "Periodic sync skipped");
                false
            }
            Err(e) => {
                warn!(error = %e, "Periodic sync failed");
                true
            }
        };

        if !failed {
            backoff.reset();
            return settings.interval();
        }

        let delay = backoff
            .next_backoff()
            .unwrap_or_else(|| settings.max_backoff())
            .max(settings.interval());
        debug!(delay_ms = delay.as_millis() as u64, "Backing off periodic sync");
        delay
    }
}
