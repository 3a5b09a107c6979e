//! # Domain Types
//!
//! Core domain types used throughout FieldStock.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────┐  ┌──────────────────┐  ┌──────────────────┐      │
//! │  │  NewTransaction  │  │QueuedTransaction │  │ SyncErrorRecord  │      │
//! │  │  ──────────────  │  │ ──────────────── │  │ ──────────────── │      │
//! │  │  what the user   │─►│ persisted row in │─►│ quarantined row  │      │
//! │  │  asked for       │  │ the device queue │  │ after N failures │      │
//! │  └──────────────────┘  └──────────────────┘  └──────────────────┘      │
//! │                                                                         │
//! │  ┌──────────────────┐  ┌──────────────────┐  ┌──────────────────┐      │
//! │  │ TransactionType  │  │  StockDirection  │  │  InventoryItem   │      │
//! │  │  In / Out /      │  │  CheckIn /       │  │  read-cache row  │      │
//! │  │  Adjustment      │  │  CheckOut        │  │  + batch snapshot│      │
//! │  └──────────────────┘  └──────────────────┘  └──────────────────┘      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual Timestamps
//! A queued movement carries two clocks:
//! - `device_timestamp`: when the movement happened on the device (authoritative)
//! - `created_at`: when the row entered the local queue (FIFO ordering)
//!
//! The server assigns its own timestamp on receipt; neither of these is replaced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// =============================================================================
// Transaction Type
// =============================================================================

/// The kind of stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum TransactionType {
    /// Stock received.
    In,
    /// Stock issued.
    Out,
    /// Stock count correction.
    Adjustment,
}

impl TransactionType {
    /// Wire/storage name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::In => "in",
            TransactionType::Out => "out",
            TransactionType::Adjustment => "adjustment",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionType {
    type Err = crate::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in" => Ok(TransactionType::In),
            "out" => Ok(TransactionType::Out),
            "adjustment" => Ok(TransactionType::Adjustment),
            _ => Err(crate::ValidationError::NotAllowed {
                field: "transaction_type".to_string(),
                allowed: vec!["in".into(), "out".into(), "adjustment".into()],
            }),
        }
    }
}

// =============================================================================
// Stock Direction
// =============================================================================

/// Check-in / check-out flag used by the batch cart and the pending delta.
///
/// The whole batch shares one direction; a cart never mixes in and out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum StockDirection {
    #[default]
    CheckIn,
    CheckOut,
}

impl From<StockDirection> for TransactionType {
    fn from(direction: StockDirection) -> Self {
        match direction {
            StockDirection::CheckIn => TransactionType::In,
            StockDirection::CheckOut => TransactionType::Out,
        }
    }
}

// =============================================================================
// Inventory Item
// =============================================================================

/// An inventory item as known to the device.
///
/// Used both as the row of the local read cache and as the snapshot a batch
/// item owns. The snapshot is frozen at add time and is not a live reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryItem {
    pub id: String,
    /// Inventory domain (table set) the item belongs to.
    pub domain: String,
    pub name: String,
    pub sku: Option<String>,
    pub barcode: Option<String>,
    /// Stock level as last reported by the server.
    pub current_stock: f64,
    /// Unit of measure ("pcs", "kg", ...).
    pub unit: Option<String>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// New Transaction
// =============================================================================

/// Parameters for enqueueing a movement.
///
/// `idempotency_key` and `device_timestamp` are optional: batch commits carry
/// the key generated when the item was scanned; everything else gets a fresh
/// key and the current clock at enqueue time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub item_id: String,
    pub transaction_type: TransactionType,
    pub quantity: f64,
    pub notes: Option<String>,
    pub source_location_id: Option<String>,
    pub destination_location_id: Option<String>,
    pub idempotency_key: Option<String>,
    pub device_timestamp: Option<DateTime<Utc>>,
}

impl NewTransaction {
    /// Creates a movement with no notes, locations or pre-generated key.
    pub fn new(item_id: impl Into<String>, transaction_type: TransactionType, quantity: f64) -> Self {
        NewTransaction {
            item_id: item_id.into(),
            transaction_type,
            quantity,
            notes: None,
            source_location_id: None,
            destination_location_id: None,
            idempotency_key: None,
            device_timestamp: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Marks the movement as a transfer between two locations.
    pub fn with_locations(
        mut self,
        source: Option<String>,
        destination: Option<String>,
    ) -> Self {
        self.source_location_id = source;
        self.destination_location_id = destination;
        self
    }
}

// =============================================================================
// Queued Transaction
// =============================================================================

/// A movement persisted in the device queue, awaiting confirmation.
///
/// ## Invariant
/// `idempotency_key` is generated once and travels with the movement through
/// every retry, including a manual retry from the error log. This is what makes
/// retransmission after a lost response safe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct QueuedTransaction {
    pub id: String,
    pub idempotency_key: String,
    pub transaction_type: TransactionType,
    pub item_id: String,
    /// Positive, at most 3 fractional digits.
    pub quantity: f64,
    pub notes: Option<String>,
    pub source_location_id: Option<String>,
    pub destination_location_id: Option<String>,
    #[ts(as = "String")]
    pub device_timestamp: DateTime<Utc>,
    pub user_id: String,
    pub domain: String,
    pub retry_count: i64,
    pub last_error: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl QueuedTransaction {
    /// Name of the remote procedure that applies movements for this domain.
    pub fn procedure_name(&self) -> String {
        procedure_name_for(&self.domain)
    }
}

/// Returns the remote submission procedure for an inventory domain.
///
/// ```rust
/// assert_eq!(
///     fieldstock_core::procedure_name_for("warehouse"),
///     "submit_warehouse_transaction"
/// );
/// ```
pub fn procedure_name_for(domain: &str) -> String {
    format!("submit_{domain}_transaction")
}

// =============================================================================
// Sync Error Log
// =============================================================================

/// Review state of a quarantined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SyncErrorStatus {
    /// Waiting for a human.
    #[default]
    Pending,
    /// Re-enqueued by an explicit retry.
    Retrying,
    /// Reviewed and dropped.
    Dismissed,
}

impl SyncErrorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncErrorStatus::Pending => "pending",
            SyncErrorStatus::Retrying => "retrying",
            SyncErrorStatus::Dismissed => "dismissed",
        }
    }
}

/// A transaction moved out of the retry queue after too many failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SyncErrorRecord {
    pub id: String,
    /// Full `QueuedTransaction` as JSON.
    pub transaction_data: String,
    pub error_message: String,
    pub user_id: String,
    pub status: SyncErrorStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl SyncErrorRecord {
    /// Decodes the quarantined transaction payload.
    pub fn transaction(&self) -> Result<QueuedTransaction, serde_json::Error> {
        serde_json::from_str(&self.transaction_data)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
