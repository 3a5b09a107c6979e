//! # Repository Module
//!
//! Database repository implementations for FieldStock.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SyncEngine                                                             │
//! │       │                                                                 │
//! │       │  db.queue().get_queued_transactions()                          │
//! │       ▼                                                                 │
//! │  PendingTransactionRepository                                          │
//! │  ├── add_to_queue / get_by_id                                          │
//! │  ├── get_queued_transactions (FIFO) / get_queue_count                  │
//! │  └── increment_retry_count / remove_from_queue                         │
//! │                                                                         │
//! │  SyncErrorRepository                                                   │
//! │  ├── quarantine  (insert error + delete from queue, one transaction)   │
//! │  └── requeue     (insert into queue + mark retrying, one transaction)  │
//! │                                                                         │
//! │  ItemCacheRepository                                                   │
//! │  └── replace_domain (delete + insert, one transaction)                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Queries use the runtime `sqlx::query` / `query_as` API with `FromRow`
//! mapping, so the crate builds without a live database or offline query data.

pub mod item;
pub mod queue;
pub mod sync_error;
