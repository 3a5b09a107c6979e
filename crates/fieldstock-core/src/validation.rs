//! # Validation Module
//!
//! Enqueue-time validation for FieldStock movements.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Batch / Delta (in memory)                                    │
//! │  └── Quantities clamped, never rejected                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: SyncEngine::queue_transaction                                │
//! │  └── THIS MODULE: reject bad input before it is persisted              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── UNIQUE idempotency_key                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use fieldstock_core::validation::{validate_item_id, validate_quantity};
//!
//! validate_item_id("item-42").unwrap();
//! assert_eq!(validate_quantity(2.00049).unwrap(), 2.0);
//! ```

use crate::error::ValidationError;
use crate::quantity::round_quantity;
use crate::{NewTransaction, MAX_QUANTITY, MIN_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest free-text note accepted on a movement.
pub const MAX_NOTES_LENGTH: usize = 500;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an item id.
///
/// ## Example
/// ```rust
/// use fieldstock_core::validation::validate_item_id;
///
/// assert!(validate_item_id("abc-123").is_ok());
/// assert!(validate_item_id("   ").is_err());
/// ```
pub fn validate_item_id(item_id: &str) -> ValidationResult<()> {
    if item_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "item_id".to_string(),
        });
    }
    Ok(())
}

/// Validates an inventory domain name.
///
/// Domains become part of the remote procedure name, so only lowercase
/// letters, digits and underscores are allowed.
pub fn validate_domain(domain: &str) -> ValidationResult<()> {
    if domain.is_empty() {
        return Err(ValidationError::Required {
            field: "domain".to_string(),
        });
    }

    if !domain
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "domain".to_string(),
            reason: "must contain only lowercase letters, digits, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Trims notes; blank notes become `None`.
pub fn validate_notes(notes: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(notes) = notes.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };

    if notes.chars().count() > MAX_NOTES_LENGTH {
        return Err(ValidationError::TooLong {
            field: "notes".to_string(),
            max: MAX_NOTES_LENGTH,
        });
    }

    Ok(Some(notes.to_string()))
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a movement quantity and returns it rounded.
///
/// ## Rules
/// - Must be finite
/// - Must be positive (> 0)
/// - Must not exceed [`MAX_QUANTITY`]
///
/// Unlike the batch, enqueue does not clamp: a zero or oversized quantity here
/// is a caller bug and is rejected.
///
/// ```text
/// validate_quantity(q)
///      │
///      ├── NaN / inf?     → InvalidFormat
///      ├── q <= 0?        → MustBePositive
///      ├── q > 9999.999?  → OutOfRange
///      ├── round(q) == 0? → OutOfRange  (0.0004 rounds away)
///      └── OK             → round(q)
/// ```
pub fn validate_quantity(quantity: f64) -> ValidationResult<f64> {
    if !quantity.is_finite() {
        return Err(ValidationError::InvalidFormat {
            field: "quantity".to_string(),
            reason: "must be a finite number".to_string(),
        });
    }

    if quantity <= 0.0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    let rounded = round_quantity(quantity);
    if !(MIN_QUANTITY..=MAX_QUANTITY).contains(&rounded) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: MIN_QUANTITY,
            max: MAX_QUANTITY,
        });
    }

    Ok(rounded)
}

// =============================================================================
// Composite Validators
// =============================================================================

/// Validates a whole movement and returns a normalized copy
/// (rounded quantity, trimmed notes).
pub fn validate_new_transaction(tx: &NewTransaction) -> ValidationResult<NewTransaction> {
    validate_item_id(&tx.item_id)?;
    let quantity = validate_quantity(tx.quantity)?;
    let notes = validate_notes(tx.notes.as_deref())?;

    if let Some(key) = &tx.idempotency_key {
        if key.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "idempotency_key".to_string(),
            });
        }
    }

    Ok(NewTransaction {
        item_id: tx.item_id.trim().to_string(),
        quantity,
        notes,
        ..tx.clone()
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
