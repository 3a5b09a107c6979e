//! # fieldstock-sync: Connectivity and Sync Engine for FieldStock
//!
//! Moves queued stock movements from the device to the central backend,
//! exactly once, whenever the backend is reachable.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Layer Architecture                          │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                    SyncAgent (scheduler task)                    │  │
//! │  │  periodic tick • recovery after offline • backoff on failures    │  │
//! │  └───────────────┬───────────────────────────────┬──────────────────┘  │
//! │                  │                               │                      │
//! │                  ▼                               ▼                      │
//! │  ┌────────────────────────────┐   ┌──────────────────────────────────┐ │
//! │  │    ConnectivityMonitor     │   │           SyncEngine             │ │
//! │  │                            │   │                                  │ │
//! │  │ link events + HTTP probe   │──►│ queue_transaction / queue_batch  │ │
//! │  │ watch<OnlineStatus>        │   │ sync_queue (FIFO, serial, lock)  │ │
//! │  └─────────────┬──────────────┘   │ retry ceiling → error log        │ │
//! │                │                  └───────┬──────────────────┬───────┘ │
//! │                ▼                          ▼                  ▼         │
//! │  ┌────────────────────────────┐   ┌──────────────┐  ┌───────────────┐ │
//! │  │  RemoteBackend (reqwest)   │◄──│ fieldstock-db│  │SessionProvider│ │
//! │  │  submit / ping / fetch     │   │ queue, errors│  │ user, domain  │ │
//! │  └────────────────────────────┘   │ item cache   │  └───────────────┘ │
//! │                                   └──────────────┘                     │
//! │                                                                         │
//! │  EVENTS (to the UI via SyncEventEmitter):                              │
//! │  • queue state  - { queue_count, is_syncing, last_sync_time, ... }    │
//! │  • online state - { is_online, was_offline }                          │
//! │  • errors       - engine-level failures                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`agent`] - `SyncAgent` scheduler
//! - [`config`] - Sync configuration (TOML + env)
//! - [`connectivity`] - `ConnectivityMonitor`
//! - [`engine`] - `SyncEngine`
//! - [`error`] - Sync error types
//! - [`remote`] - `RemoteBackend` trait and HTTP implementation
//! - [`session`] - `SessionProvider` and `StaticSession`
//! - [`status`] - UI projections and `SyncEventEmitter`
//!
//! ## Usage
//! ```rust,ignore
//! let config = SyncConfig::load(None)?;
//! let remote = Arc::new(HttpRemoteBackend::from_config(&config)?);
//! let monitor = Arc::new(ConnectivityMonitor::new(remote.clone(), config.connectivity.clone()));
//! let session = Arc::new(StaticSession::from_config(&config.session));
//! let engine = Arc::new(SyncEngine::new(db, remote, session, monitor.subscribe(), config.sync.clone()));
//!
//! let mut agent = SyncAgent::new(engine.clone(), monitor, config.sync.clone());
//! agent.start();
//! engine.queue_transaction(NewTransaction::new("item-1", TransactionType::In, 2.0)).await?;
//! ```

pub mod agent;
pub mod config;
pub mod connectivity;
pub mod engine;
pub mod error;
pub mod remote;
pub mod session;
pub mod status;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use agent::SyncAgent;
pub use config::{
    BackendConfig, ConnectivitySettings, DeviceConfig, SessionConfig, SyncConfig, SyncSettings,
    MAX_RETRY_COUNT, PING_INTERVAL_MS, PING_TIMEOUT_MS, SYNC_INTERVAL_MS, TRANSACTION_TIMEOUT_MS,
};
pub use connectivity::ConnectivityMonitor;
pub use engine::{SkipReason, SyncEngine, SyncOutcome, SyncReport};
pub use error::{SyncError, SyncResult};
pub use remote::{HttpRemoteBackend, RemoteBackend, SubmitTransactionRequest};
pub use session::{SessionProvider, StaticSession};
pub use status::{NoOpEmitter, OnlineStatus, SyncEventEmitter, SyncQueueState};
