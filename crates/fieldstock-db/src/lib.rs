//! # fieldstock-db: Database Layer for FieldStock
//!
//! Device-local persistence for the offline movement queue.
//! It uses SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        FieldStock Data Flow                             │
//! │                                                                         │
//! │  SyncEngine (queue_transaction / sync_queue)                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   fieldstock-db (THIS CRATE)                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────────┐  ┌────────────┐  │   │
//! │  │   │   Database    │    │    Repositories    │  │ Migrations │  │   │
//! │  │   │   (pool.rs)   │    │                    │  │ (embedded) │  │   │
//! │  │   │               │    │ PendingTransaction │  │            │  │   │
//! │  │   │ SqlitePool    │◄───│ SyncError          │  │ 001_...sql │  │   │
//! │  │   │               │    │ ItemCache          │  │            │  │   │
//! │  │   └───────────────┘    └────────────────────┘  └────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   <data dir>/fieldstock/fieldstock.db                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (queue, error log, item cache)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fieldstock_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/fieldstock.db")).await?;
//!
//! let pending = db.queue().get_queued_transactions().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::item::ItemCacheRepository;
pub use repository::queue::PendingTransactionRepository;
pub use repository::sync_error::SyncErrorRepository;
