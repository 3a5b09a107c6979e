//! # Sync Engine
//!
//! Owns the durable movement queue on the sync side: enqueues validated
//! movements and drains them to the backend.
//!
//! ## Drain Cycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  sync_queue()                                                          │
//! │     │                                                                   │
//! │     ├── offline?            ──► Skipped(Offline)                       │
//! │     ├── no user?            ──► Skipped(NotAuthenticated)              │
//! │     ├── sync_lock.try_lock  ──► Skipped(AlreadySyncing)                │
//! │     ▼                                                                   │
//! │  get_queued_transactions()  (FIFO snapshot)                            │
//! │     │                                                                   │
//! │     ▼  for tx in snapshot   (strictly serial)                          │
//! │  ┌────────────────────────────────────────────────────────────────┐    │
//! │  │ timeout(TRANSACTION_TIMEOUT, submit_<domain>_transaction(tx))  │    │
//! │  │    ok   → remove_from_queue                                    │    │
//! │  │    err  → increment_retry_count                                │    │
//! │  │           retry_count >= MAX_RETRY_COUNT                       │    │
//! │  │              → quarantine (error log insert + queue delete)    │    │
//! │  └────────────────────────────────────────────────────────────────┘    │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  refresh item cache for the selected domain (failures only logged)    │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  Completed(SyncReport)                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Exactly-Once Delivery
//! A movement leaves the queue only after the backend confirmed it, so a
//! crash or lost response means it is sent again. The idempotency key it
//! carries lets the backend apply it once.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use fieldstock_core::validation::{validate_domain, validate_new_transaction};
use fieldstock_core::{
    Batch, NewTransaction, PendingCommit, QueuedTransaction, SyncErrorRecord, SyncErrorStatus,
};
use fieldstock_db::{Database, DbError};

use crate::config::SyncSettings;
use crate::error::{SyncError, SyncResult};
use crate::remote::{RemoteBackend, SubmitTransactionRequest};
use crate::session::SessionProvider;
use crate::status::{NoOpEmitter, OnlineStatus, SyncEventEmitter, SyncQueueState};

// =============================================================================
// Cycle Outcome
// =============================================================================

/// Why a drain cycle did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Offline,
    NotAuthenticated,
    AlreadySyncing,
}

/// Counts of one drain cycle.
///
/// `failed` includes the movements that were quarantined in this cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub quarantined: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Skipped(SkipReason),
    Completed(SyncReport),
}

impl SyncOutcome {
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::Completed(report) => Some(report),
            SyncOutcome::Skipped(_) => None,
        }
    }
}

// =============================================================================
// Sync Engine
// =============================================================================

/// Enqueues movements and drains the durable queue.
pub struct SyncEngine<R: RemoteBackend, S: SessionProvider + 'static> {
    db: Database,
    remote: Arc<R>,
    session: Arc<S>,
    online: watch::Receiver<OnlineStatus>,
    settings: SyncSettings,

    /// Held for the whole drain cycle.
    sync_lock: Mutex<()>,

    state: RwLock<SyncQueueState>,
    emitter: Arc<dyn SyncEventEmitter>,
}

impl<R: RemoteBackend, S: SessionProvider + 'static> SyncEngine<R, S> {
    pub fn new(
        db: Database,
        remote: Arc<R>,
        session: Arc<S>,
        online: watch::Receiver<OnlineStatus>,
        settings: SyncSettings,
    ) -> Self {
        SyncEngine {
            db,
            remote,
            session,
            online,
            settings,
            sync_lock: Mutex::new(()),
            state: RwLock::new(SyncQueueState::default()),
            emitter: Arc::new(NoOpEmitter),
        }
    }

    /// Sets the event emitter.
    pub fn with_emitter(mut self, emitter: Arc<dyn SyncEventEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Current queue projection.
    pub async fn state(&self) -> SyncQueueState {
        self.state.read().await.clone()
    }

    fn is_online(&self) -> bool {
        self.online.borrow().is_online
    }

    async fn update_state(&self, f: impl FnOnce(&mut SyncQueueState)) {
        let snapshot = {
            let mut state = self.state.write().await;
            f(&mut state);
            state.clone()
        };
        self.emitter.emit_queue_state(&snapshot);
    }

    /// Rebuilds `queue_count` from the durable queue.
    pub async fn refresh_queue_count(&self) -> SyncResult<i64> {
        let count = self.db.queue().get_queue_count().await?;
        self.update_state(|s| s.queue_count = count).await;
        Ok(count)
    }

    // =========================================================================
    // Enqueue
    // =========================================================================

    /// Validates and persists one movement, then starts a drain if online.
    ///
    /// Returns once the movement is durable; never waits on the network.
    pub async fn queue_transaction(
        self: &Arc<Self>,
        params: NewTransaction,
    ) -> SyncResult<QueuedTransaction> {
        let tx = self.persist(params).await?;
        self.after_enqueue().await;
        Ok(tx)
    }

    /// Queues the resolver's confirmed delta as one movement.
    pub async fn queue_pending_commit(
        self: &Arc<Self>,
        commit: &PendingCommit,
    ) -> SyncResult<QueuedTransaction> {
        self.queue_transaction(commit.to_new_transaction()).await
    }

    /// Queues one movement per batch item and clears the batch.
    ///
    /// On a failure partway through, the items already persisted are removed
    /// from the batch so a second commit cannot queue them twice; the rest
    /// stay in the batch and the error is returned.
    pub async fn queue_batch(
        self: &Arc<Self>,
        batch: &mut Batch,
        notes: Option<&str>,
    ) -> SyncResult<Vec<QueuedTransaction>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let mut queued = Vec::with_capacity(batch.total_items());
        for params in batch.to_new_transactions(notes) {
            let item_id = params.item_id.clone();
            match self.persist(params).await {
                Ok(tx) => queued.push(tx),
                Err(e) => {
                    warn!(
                        item_id = %item_id,
                        persisted = queued.len(),
                        error = %e,
                        "Batch commit stopped partway"
                    );
                    let persisted: Vec<&str> =
                        queued.iter().map(|tx| tx.item_id.as_str()).collect();
                    batch.remove_items(&persisted);
                    if !queued.is_empty() {
                        self.after_enqueue().await;
                    }
                    return Err(e);
                }
            }
        }

        info!(count = queued.len(), "Batch committed to queue");
        batch.clear();
        self.after_enqueue().await;
        Ok(queued)
    }

    async fn persist(&self, params: NewTransaction) -> SyncResult<QueuedTransaction> {
        let user_id = self
            .session
            .current_user_id()
            .ok_or(SyncError::NotAuthenticated)?;
        let domain = self
            .session
            .selected_domain()
            .ok_or(SyncError::NoDomainSelected)?;
        validate_domain(&domain)?;

        let params = validate_new_transaction(&params)?;
        let now = Utc::now();

        let tx = QueuedTransaction {
            id: Uuid::new_v4().to_string(),
            idempotency_key: params
                .idempotency_key
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            transaction_type: params.transaction_type,
            item_id: params.item_id,
            quantity: params.quantity,
            notes: params.notes,
            source_location_id: params.source_location_id,
            destination_location_id: params.destination_location_id,
            device_timestamp: params.device_timestamp.unwrap_or(now),
            user_id,
            domain,
            retry_count: 0,
            last_error: None,
            created_at: now,
        };

        self.db.queue().add_to_queue(&tx).await?;

        info!(
            transaction_id = %tx.id,
            item_id = %tx.item_id,
            transaction_type = %tx.transaction_type,
            quantity = tx.quantity,
            "Movement queued"
        );

        Ok(tx)
    }

    async fn after_enqueue(self: &Arc<Self>) {
        if let Err(e) = self.refresh_queue_count().await {
            warn!(error = %e, "Failed to refresh queue count");
        }
        self.trigger_sync();
    }

    /// Starts a drain in the background if online.
    pub fn trigger_sync(self: &Arc<Self>) {
        if !self.is_online() {
            debug!("Offline, movement stays queued");
            return;
        }

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = engine.sync_queue().await {
                warn!(error = %e, "Background sync failed");
            }
        });
    }

    // =========================================================================
    // Drain
    // =========================================================================

    /// Runs one drain cycle over a snapshot of the queue.
    pub async fn sync_queue(&self) -> SyncResult<SyncOutcome> {
        if !self.is_online() {
            debug!("Sync skipped: offline");
            return Ok(SyncOutcome::Skipped(SkipReason::Offline));
        }

        if self.session.current_user_id().is_none() {
            debug!("Sync skipped: no authenticated user");
            return Ok(SyncOutcome::Skipped(SkipReason::NotAuthenticated));
        }

        let Ok(_guard) = self.sync_lock.try_lock() else {
            debug!("Sync skipped: cycle already running");
            return Ok(SyncOutcome::Skipped(SkipReason::AlreadySyncing));
        };

        self.update_state(|s| s.is_syncing = true).await;

        let report = match self.drain().await {
            Ok(report) => report,
            Err(e) => {
                let message = format!("Sync failed: {e}");
                error!(error = %e, "Sync cycle aborted");
                self.update_state(|s| {
                    s.is_syncing = false;
                    s.last_error = Some(message.clone());
                })
                .await;
                self.emitter.emit_error(&message);
                return Err(e);
            }
        };

        self.refresh_item_cache().await;

        let count = match self.db.queue().get_queue_count().await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!(error = %e, "Failed to read queue count after sync");
                None
            }
        };

        self.update_state(|s| {
            s.is_syncing = false;
            s.last_sync_time = Some(Utc::now());
            s.last_error = None;
            if let Some(count) = count {
                s.queue_count = count;
            }
        })
        .await;

        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            quarantined = report.quarantined,
            "Sync cycle complete"
        );

        Ok(SyncOutcome::Completed(report))
    }

    async fn drain(&self) -> SyncResult<SyncReport> {
        let queued = self.db.queue().get_queued_transactions().await?;
        let mut report = SyncReport {
            attempted: queued.len(),
            ..Default::default()
        };

        if queued.is_empty() {
            return Ok(report);
        }
        debug!(count = queued.len(), "Draining queue");

        for tx in &queued {
            match self.submit(tx).await {
                Ok(()) => {
                    report.succeeded += 1;
                    match self.db.queue().remove_from_queue(&tx.id).await {
                        Ok(_) => debug!(transaction_id = %tx.id, "Movement confirmed"),
                        Err(e) => error!(
                            transaction_id = %tx.id,
                            error = %e,
                            "Confirmed movement could not be removed from queue"
                        ),
                    }
                }
                Err(err) => {
                    report.failed += 1;
                    match self.record_failure(tx, &err).await {
                        Ok(true) => report.quarantined += 1,
                        Ok(false) => {}
                        Err(e) => error!(
                            transaction_id = %tx.id,
                            error = %e,
                            "Failed to record submission failure"
                        ),
                    }
                }
            }
        }

        Ok(report)
    }

    async fn submit(&self, tx: &QueuedTransaction) -> SyncResult<()> {
        let procedure = tx.procedure_name();
        let request = SubmitTransactionRequest::from(tx);

        match tokio::time::timeout(
            self.settings.transaction_timeout(),
            self.remote.submit_transaction(&procedure, &request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout(self.settings.transaction_timeout_ms)),
        }
    }

    /// Bumps the retry count; quarantines at the ceiling. Returns true if the
    /// movement was quarantined.
    async fn record_failure(&self, tx: &QueuedTransaction, err: &SyncError) -> SyncResult<bool> {
        let message = err.to_string();
        let retry_count = self
            .db
            .queue()
            .increment_retry_count(&tx.id, &message)
            .await?;

        if retry_count < self.settings.max_retry_count {
            warn!(
                transaction_id = %tx.id,
                retry_count,
                retryable = err.is_retryable(),
                error = %message,
                "Submission failed, will retry"
            );
            return Ok(false);
        }

        let failed = QueuedTransaction {
            retry_count,
            last_error: Some(message.clone()),
            ..tx.clone()
        };
        self.db.sync_errors().quarantine(&failed, &message).await?;

        error!(
            transaction_id = %tx.id,
            retry_count,
            error = %message,
            "Retry limit reached, movement moved to error log"
        );
        Ok(true)
    }

    async fn refresh_item_cache(&self) {
        let Some(domain) = self.session.selected_domain() else {
            return;
        };

        let fetched = tokio::time::timeout(
            self.settings.transaction_timeout(),
            self.remote.fetch_items(&domain),
        )
        .await;

        match fetched {
            Ok(Ok(items)) => match self.db.items().replace_domain(&domain, &items).await {
                Ok(count) => debug!(domain = %domain, count, "Item cache refreshed"),
                Err(e) => warn!(domain = %domain, error = %e, "Failed to store item cache"),
            },
            Ok(Err(e)) => warn!(domain = %domain, error = %e, "Item cache refresh failed"),
            Err(_) => warn!(domain = %domain, "Item cache refresh timed out"),
        }
    }

    // =========================================================================
    // Error Log
    // =========================================================================

    /// Lists the error log, newest first.
    pub async fn sync_errors(
        &self,
        status: Option<SyncErrorStatus>,
    ) -> SyncResult<Vec<SyncErrorRecord>> {
        Ok(self.db.sync_errors().list(status).await?)
    }

    /// Puts a quarantined movement back into the queue with a fresh retry
    /// budget. Id and idempotency key are unchanged.
    ///
    /// Only `pending` records can be retried; a second retry of the same
    /// record fails with [`SyncError::NotRetryable`].
    pub async fn retry_sync_error(self: &Arc<Self>, error_id: &str) -> SyncResult<QueuedTransaction> {
        let record = self
            .db
            .sync_errors()
            .get_by_id(error_id)
            .await?
            .ok_or_else(|| SyncError::not_found("Sync error", error_id))?;

        if record.status != SyncErrorStatus::Pending {
            return Err(SyncError::NotRetryable {
                id: error_id.to_string(),
                status: record.status.as_str().to_string(),
            });
        }

        let tx = QueuedTransaction {
            retry_count: 0,
            last_error: None,
            ..record.transaction()?
        };

        self.db
            .sync_errors()
            .requeue(error_id, &tx)
            .await
            .map_err(|e| match e {
                DbError::InvalidStatus { id, status, .. } => SyncError::NotRetryable { id, status },
                other => other.into(),
            })?;
        info!(error_id = %error_id, transaction_id = %tx.id, "Quarantined movement retried");

        self.after_enqueue().await;
        Ok(tx)
    }

    /// Marks an error record as reviewed and dropped.
    pub async fn dismiss_sync_error(&self, error_id: &str) -> SyncResult<()> {
        self.db
            .sync_errors()
            .set_status(error_id, SyncErrorStatus::Dismissed)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    SyncError::not_found("Sync error", error_id)
                } else {
                    e.into()
                }
            })?;
        info!(error_id = %error_id, "Sync error dismissed");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
