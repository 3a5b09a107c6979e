//! Test doubles shared by the engine, connectivity and agent tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;

use fieldstock_core::InventoryItem;
use fieldstock_db::{Database, DbConfig};

use crate::error::{SyncError, SyncResult};
use crate::remote::{RemoteBackend, SubmitTransactionRequest};

/// In-memory backend that records every call.
///
/// Applied movements are deduplicated by idempotency key, the way the real
/// procedure does it.
#[derive(Default)]
pub struct MockRemote {
    calls: Mutex<Vec<(String, SubmitTransactionRequest)>>,
    applied: Mutex<HashMap<String, SubmitTransactionRequest>>,
    /// Remaining submissions that fail without being applied.
    fail_next: AtomicUsize,
    /// Every submission fails.
    fail_always: AtomicBool,
    /// Remaining submissions that are applied but answer with an error.
    lose_next_response: AtomicUsize,
    submit_delay: Mutex<Option<Duration>>,
    /// When set, each submission waits for a permit.
    gate: Mutex<Option<Arc<Semaphore>>>,

    ping_calls: AtomicUsize,
    ping_fails: AtomicBool,
    ping_delay: Mutex<Option<Duration>>,

    fetch_calls: AtomicUsize,
    fetch_fails: AtomicBool,
    items: Mutex<Vec<InventoryItem>>,
}

impl MockRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn fail_always(&self, fail: bool) {
        self.fail_always.store(fail, Ordering::SeqCst);
    }

    pub fn lose_next_response(&self, n: usize) {
        self.lose_next_response.store(n, Ordering::SeqCst);
    }

    pub fn set_submit_delay(&self, delay: Duration) {
        *self.submit_delay.lock().unwrap() = Some(delay);
    }

    /// Blocks submissions until permits are added to the returned semaphore.
    pub fn install_gate(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn set_ping_fails(&self, fails: bool) {
        self.ping_fails.store(fails, Ordering::SeqCst);
    }

    pub fn set_ping_delay(&self, delay: Duration) {
        *self.ping_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_fetch_fails(&self, fails: bool) {
        self.fetch_fails.store(fails, Ordering::SeqCst);
    }

    pub fn set_items(&self, items: Vec<InventoryItem>) {
        *self.items.lock().unwrap() = items;
    }

    pub fn calls(&self) -> Vec<(String, SubmitTransactionRequest)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn applied_count(&self) -> usize {
        self.applied.lock().unwrap().len()
    }

    pub fn ping_count(&self) -> usize {
        self.ping_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    fn take_one(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl RemoteBackend for MockRemote {
    async fn submit_transaction(
        &self,
        procedure: &str,
        request: &SubmitTransactionRequest,
    ) -> SyncResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push((procedure.to_string(), request.clone()));

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }

        let delay = *self.submit_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_always.load(Ordering::SeqCst) || Self::take_one(&self.fail_next) {
            return Err(SyncError::Http {
                status: 503,
                message: "Backend server error (HTTP 503)".into(),
            });
        }

        self.applied
            .lock()
            .unwrap()
            .entry(request.idempotency_key.clone())
            .or_insert_with(|| request.clone());

        if Self::take_one(&self.lose_next_response) {
            return Err(SyncError::ConnectionFailed("connection reset".into()));
        }
        Ok(())
    }

    async fn ping(&self) -> SyncResult<()> {
        self.ping_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.ping_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.ping_fails.load(Ordering::SeqCst) {
            return Err(SyncError::ConnectionFailed("unreachable".into()));
        }
        Ok(())
    }

    async fn fetch_items(&self, _domain: &str) -> SyncResult<Vec<InventoryItem>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fetch_fails.load(Ordering::SeqCst) {
            return Err(SyncError::Http {
                status: 500,
                message: "Backend server error (HTTP 500)".into(),
            });
        }
        Ok(self.items.lock().unwrap().clone())
    }
}

pub async fn memory_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

pub fn item(id: &str, domain: &str) -> InventoryItem {
    InventoryItem {
        id: id.to_string(),
        domain: domain.to_string(),
        name: format!("Item {id}"),
        sku: None,
        barcode: Some(format!("BC-{id}")),
        current_stock: 10.0,
        unit: Some("pcs".to_string()),
        updated_at: Utc::now(),
    }
}

/// Polls `condition` every few milliseconds for up to two seconds.
pub async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
