//! # fieldstock-core: Pure Business Logic for FieldStock
//!
//! This crate holds the logic that runs on the device before anything is
//! persisted or sent: quantity math, the scan batch, and the tap-to-adjust
//! pending delta. It has zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        FieldStock Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    UI (scanner / stock screens)                 │   │
//! │  │       Scan ──► Batch cart          Tap +/- ──► Pending delta    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            ★ fieldstock-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │ quantity  │  │   batch   │  │   delta   │  │   │
//! │  │   │ Queued-   │  │ clamp     │  │ Batch     │  │ Pending-  │  │   │
//! │  │   │ Transaction│ │ round     │  │ BatchItem │  │ Delta-    │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  │ Resolver  │  │   │
//! │  │                                                └───────────┘  │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ NewTransaction                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             fieldstock-sync (Sync Engine) / fieldstock-db       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (QueuedTransaction, InventoryItem, SyncErrorRecord, ...)
//! - [`quantity`] - The single clamp/round utility used at every mutation boundary
//! - [`batch`] - Batch Composition Manager (multi-item scan cart)
//! - [`delta`] - Pending Delta Resolver (single-item tap accumulator)
//! - [`error`] - Domain error types
//! - [`validation`] - Enqueue-time validation
//!
//! ## Example Usage
//!
//! ```rust
//! use fieldstock_core::quantity::clamp_quantity;
//!
//! assert_eq!(clamp_quantity(0.0), 0.001);
//! assert_eq!(clamp_quantity(2.34567), 2.346);
//! assert_eq!(clamp_quantity(50_000.0), 9999.999);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod batch;
pub mod delta;
pub mod error;
pub mod quantity;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use batch::{Batch, BatchItem};
pub use delta::{DeltaOutcome, PendingCommit, PendingDeltaResolver, PendingDeltaState};
pub use error::ValidationError;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Smallest quantity a single movement may carry.
pub const MIN_QUANTITY: f64 = 0.001;

/// Largest quantity a single movement may carry.
///
/// Guards against fat-finger entries (typing 10000 instead of 10).
pub const MAX_QUANTITY: f64 = 9999.999;

/// Fractional digits kept on every quantity.
pub const QUANTITY_DECIMALS: u32 = 3;
