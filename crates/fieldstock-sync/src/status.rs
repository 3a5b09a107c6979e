//! # Sync Status
//!
//! UI-facing projections of the sync layer and the emitter they are pushed
//! through. Nothing here is persisted: the queue count is rebuilt from the
//! durable queue, online state from network signals.
//!
//! ## Events
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SyncEngine ─────────► emit_queue_state   { queue_count, is_syncing,  │
//! │                                              last_sync_time, last_error}│
//! │  ConnectivityMonitor ► emit_online_status { is_online, was_offline }   │
//! │  SyncEngine ─────────► emit_error         "Sync failed: ..."           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Progress of the durable queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SyncQueueState {
    /// Movements waiting in the queue.
    pub queue_count: i64,

    /// A drain cycle is running.
    pub is_syncing: bool,

    /// End of the last completed drain cycle.
    #[ts(as = "Option<String>")]
    pub last_sync_time: Option<DateTime<Utc>>,

    /// Last engine-level failure, cleared by the next completed cycle.
    pub last_error: Option<String>,
}

/// Reachability of the backend as seen from this device.
///
/// Starts offline until the first probe or link event says otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OnlineStatus {
    pub is_online: bool,

    /// Set on every offline→online transition; cleared only by
    /// [`ConnectivityMonitor::clear_was_offline`](crate::connectivity::ConnectivityMonitor::clear_was_offline).
    pub was_offline: bool,
}

/// Sink for sync events (implemented by the UI bridge).
pub trait SyncEventEmitter: Send + Sync {
    /// Emits a queue progress change.
    fn emit_queue_state(&self, state: &SyncQueueState);

    /// Emits an online/offline change.
    fn emit_online_status(&self, status: &OnlineStatus);

    /// Emits an engine-level failure.
    fn emit_error(&self, message: &str);
}

/// No-op event emitter.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_queue_state(&self, _state: &SyncQueueState) {}
    fn emit_online_status(&self, _status: &OnlineStatus) {}
    fn emit_error(&self, _message: &str) {}
}
