//! # Connectivity Monitor
//!
//! Decides whether the backend is reachable from this device.
//!
//! ## Signals
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Link layer events ──► handle_link_change(connected, reachable)        │
//! │  (fast, optimistic)            │                                        │
//! │                                ▼                                        │
//! │                     ┌─────────────────────┐    subscribe()              │
//! │                     │ watch<OnlineStatus> │ ─────────────► SyncEngine   │
//! │                     └─────────────────────┘ ─────────────► SyncAgent    │
//! │                                ▲                                        │
//! │  Active probe task ────────────┘                                        │
//! │  (ground truth) every PING_INTERVAL_MS, first one immediately,          │
//! │  each bounded by PING_TIMEOUT_MS; failure forces offline                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every offline→online transition raises `was_offline`. The flag stays up
//! until a consumer calls [`ConnectivityMonitor::clear_was_offline`].

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::ConnectivitySettings;
use crate::remote::RemoteBackend;
use crate::status::{NoOpEmitter, OnlineStatus, SyncEventEmitter};

/// Tracks backend reachability from link events and an active probe.
pub struct ConnectivityMonitor<R: RemoteBackend> {
    remote: Arc<R>,
    settings: ConnectivitySettings,
    status: Arc<watch::Sender<OnlineStatus>>,
    emitter: Arc<dyn SyncEventEmitter>,
    ping_task: Mutex<Option<JoinHandle<()>>>,
}

impl<R: RemoteBackend> ConnectivityMonitor<R> {
    pub fn new(remote: Arc<R>, settings: ConnectivitySettings) -> Self {
        Self::with_emitter(remote, settings, Arc::new(NoOpEmitter))
    }

    pub fn with_emitter(
        remote: Arc<R>,
        settings: ConnectivitySettings,
        emitter: Arc<dyn SyncEventEmitter>,
    ) -> Self {
        let (status, _) = watch::channel(OnlineStatus::default());
        ConnectivityMonitor {
            remote,
            settings,
            status: Arc::new(status),
            emitter,
            ping_task: Mutex::new(None),
        }
    }

    /// Current status snapshot.
    pub fn status(&self) -> OnlineStatus {
        *self.status.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.status.borrow().is_online
    }

    /// Receiver that observes every status change.
    pub fn subscribe(&self) -> watch::Receiver<OnlineStatus> {
        self.status.subscribe()
    }

    /// Applies a link-layer event.
    ///
    /// `reachable` is `None` when the platform cannot tell; that counts as
    /// reachable as long as the link is up.
    pub fn handle_link_change(&self, connected: bool, reachable: Option<bool>) {
        let online = connected && reachable.unwrap_or(true);
        debug!(connected, ?reachable, online, "Link state changed");
        set_online(&self.status, self.emitter.as_ref(), online);
    }

    /// Lowers the recovery flag after the caller has acted on it.
    pub fn clear_was_offline(&self) {
        let emitter = self.emitter.as_ref();
        let cleared = self.status.send_if_modified(|s| {
            let was = s.was_offline;
            s.was_offline = false;
            was
        });
        if cleared {
            emitter.emit_online_status(&self.status());
        }
    }

    /// Starts the active probe. No-op while a probe task is already running.
    pub fn start_pinging(&self) {
        let mut task = self.ping_task.lock().unwrap_or_else(|e| e.into_inner());
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("Ping task already running");
            return;
        }

        let remote = Arc::clone(&self.remote);
        let status = Arc::clone(&self.status);
        let emitter = Arc::clone(&self.emitter);
        let interval = self.settings.ping_interval();
        let timeout = self.settings.ping_timeout();

        info!(
            interval_ms = self.settings.ping_interval_ms,
            timeout_ms = self.settings.ping_timeout_ms,
            "Starting connectivity probe"
        );

        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let reachable = match tokio::time::timeout(timeout, remote.ping()).await {
                    Ok(Ok(())) => true,
                    Ok(Err(e)) => {
                        warn!(error = %e, "Backend probe failed");
                        false
                    }
                    Err(_) => {
                        warn!(timeout_ms = timeout.as_millis() as u64, "Backend probe timed out");
                        false
                    }
                };

                set_online(&status, emitter.as_ref(), reachable);
            }
        }));
    }

    /// Stops the active probe. The current status is kept.
    pub fn stop_pinging(&self) {
        let task = self
            .ping_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = task {
            handle.abort();
            info!("Connectivity probe stopped");
        }
    }

    pub fn is_pinging(&self) -> bool {
        self.ping_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Releases the probe task. No probe fires afterwards.
    pub fn cleanup(&self) {
        self.stop_pinging();
    }
}

impl<R: RemoteBackend> Drop for ConnectivityMonitor<R> {
    fn drop(&mut self) {
        self.stop_pinging();
    }
}

/// Publishes a new online value. Returns true if it changed.
fn set_online(
    status: &watch::Sender<OnlineStatus>,
    emitter: &dyn SyncEventEmitter,
    online: bool,
) -> bool {
    let changed = status.send_if_modified(|s| {
        if s.is_online == online {
            return false;
        }
        if online {
            s.was_offline = true;
        }
        s.is_online = online;
        true
    });

    if changed {
        let snapshot = *status.borrow();
        if online {
            info!("Backend reachable, device online");
        } else {
            warn!("Backend unreachable, device offline");
        }
        emitter.emit_online_status(&snapshot);
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockRemote;
    use std::time::Duration;

    fn settings() -> ConnectivitySettings {
        ConnectivitySettings {
            ping_interval_ms: 60_000,
            ping_timeout_ms: 5_000,
        }
    }

    #[tokio::test]
    async fn test_link_change_transitions() {
        let monitor = ConnectivityMonitor::new(MockRemote::new(), settings());
        assert!(!monitor.is_online());

        monitor.handle_link_change(true, None);
        assert_eq!(
            monitor.status(),
            OnlineStatus {
                is_online: true,
                was_offline: true
            }
        );

        monitor.handle_link_change(true, Some(false));
        assert!(!monitor.is_online());
        // recovery flag survives going offline again
        assert!(monitor.status().was_offline);

        monitor.handle_link_change(false, Some(true));
        assert!(!monitor.is_online());
    }

    #[tokio::test]
    async fn test_was_offline_is_one_shot() {
        let monitor = ConnectivityMonitor::new(MockRemote::new(), settings());
        monitor.handle_link_change(true, Some(true));
        assert!(monitor.status().was_offline);

        // staying online does not touch the flag
        monitor.handle_link_change(true, Some(true));
        assert!(monitor.status().was_offline);

        monitor.clear_was_offline();
        assert!(!monitor.status().was_offline);

        monitor.handle_link_change(true, None);
        assert!(!monitor.status().was_offline);

        monitor.handle_link_change(false, None);
        monitor.handle_link_change(true, None);
        assert!(monitor.status().was_offline);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let monitor = ConnectivityMonitor::new(MockRemote::new(), settings());
        let mut rx = monitor.subscribe();

        monitor.handle_link_change(true, None);
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_online);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_probe_fires_immediately() {
        let remote = MockRemote::new();
        let monitor = ConnectivityMonitor::new(remote.clone(), settings());

        monitor.start_pinging();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(remote.ping_count(), 1);
        assert!(monitor.is_online());
        assert!(monitor.status().was_offline);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(remote.ping_count(), 2);
        monitor.cleanup();
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_failure_forces_offline_with_link_up() {
        let remote = MockRemote::new();
        let monitor = ConnectivityMonitor::new(remote.clone(), settings());
        monitor.handle_link_change(true, None);
        assert!(monitor.is_online());

        remote.set_ping_fails(true);
        monitor.start_pinging();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(!monitor.is_online());
        monitor.cleanup();
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_timeout_forces_offline() {
        let remote = MockRemote::new();
        remote.set_ping_delay(Duration::from_secs(30));
        let monitor = ConnectivityMonitor::new(remote.clone(), settings());
        monitor.handle_link_change(true, None);

        monitor.start_pinging();
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(remote.ping_count(), 1);
        assert!(!monitor.is_online());
        monitor.cleanup();
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_pinging_is_idempotent() {
        let remote = MockRemote::new();
        let monitor = ConnectivityMonitor::new(remote.clone(), settings());

        monitor.start_pinging();
        monitor.start_pinging();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(remote.ping_count(), 1);
        assert!(monitor.is_pinging());
        monitor.cleanup();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_probe_after_cleanup() {
        let remote = MockRemote::new();
        let monitor = ConnectivityMonitor::new(remote.clone(), settings());

        monitor.start_pinging();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(remote.ping_count(), 1);

        monitor.cleanup();
        assert!(!monitor.is_pinging());

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(remote.ping_count(), 1);

        // cleanup twice is harmless
        monitor.cleanup();
    }
}
