//! # Quantity Math
//!
//! The one place quantities are clamped and rounded.
//!
//! ## Why Round Everywhere?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004                                      │
//! │                                                                         │
//! │  Quantities are decimals with at most 3 fractional digits (kg, m, l).  │
//! │  Summing already-rounded values can still reintroduce error, so every  │
//! │  mutation boundary (batch edit, batch total, enqueue) rounds again.    │
//! │                                                                         │
//! │  Batch::update_quantity ──┐                                             │
//! │  Batch::total_units ──────┼──► clamp_quantity / round_to_decimal_places │
//! │  queue_transaction ───────┘                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::{MAX_QUANTITY, MIN_QUANTITY, QUANTITY_DECIMALS};

/// Rounds `value` to `places` fractional digits (half away from zero).
///
/// ## Example
/// ```rust
/// use fieldstock_core::quantity::round_to_decimal_places;
///
/// assert_eq!(round_to_decimal_places(1.23456, 3), 1.235);
/// assert_eq!(round_to_decimal_places(0.1 + 0.2, 3), 0.3);
/// ```
pub fn round_to_decimal_places(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    let rounded = (value * factor).round() / factor;
    // -0.0 reads badly in the UI and in JSON
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Rounds a quantity to [`QUANTITY_DECIMALS`].
#[inline]
pub fn round_quantity(value: f64) -> f64 {
    round_to_decimal_places(value, QUANTITY_DECIMALS)
}

/// Clamps a quantity into `[MIN_QUANTITY, MAX_QUANTITY]` and rounds it.
///
/// Values below the minimum (zero, negatives, NaN) clamp up to
/// [`MIN_QUANTITY`] instead of erroring. Positive infinity clamps to
/// [`MAX_QUANTITY`].
pub fn clamp_quantity(value: f64) -> f64 {
    if value.is_nan() {
        return MIN_QUANTITY;
    }
    round_quantity(value.clamp(MIN_QUANTITY, MAX_QUANTITY))
}

/// Returns true if `value` has no more than [`QUANTITY_DECIMALS`] fractional digits.
pub fn has_valid_precision(value: f64) -> bool {
    value.is_finite() && (round_quantity(value) - value).abs() < 1e-9
}
