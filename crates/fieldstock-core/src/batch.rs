//! # Batch Composition Manager
//!
//! The multi-item scan cart: scan several items, tune each quantity, then
//! commit the whole batch as one movement per item.
//!
//! ## Batch Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Batch Operations                                     │
//! │                                                                         │
//! │  User Action              Batch Method            State Change          │
//! │  ───────────              ────────────            ────────────          │
//! │                                                                         │
//! │  Scan item ──────────────► add_item() ──────────► push (qty 1, new key)│
//! │  Scan same item again ───► add_item() ──────────► rejected (false)     │
//! │  Tap + ──────────────────► increment_item() ────► qty + 1, clamped     │
//! │  Type quantity ──────────► update_quantity() ───► clamped + rounded    │
//! │  Swipe away ─────────────► remove_item(s)() ────► retain               │
//! │  Toggle in/out ──────────► set_transaction_type() ─► one flag per cart │
//! │  Commit ─────────────────► to_new_transactions() ─► one per item       │
//! │                            then clear()                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - Items are unique by `item_id` (a duplicate scan is rejected, not merged)
//! - Every quantity is in `[MIN_QUANTITY, MAX_QUANTITY]` with at most 3 decimals
//! - The idempotency key of an item is generated once, at add time, and is the
//!   key the committed movement carries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::quantity::{clamp_quantity, round_quantity};
use crate::{InventoryItem, NewTransaction, StockDirection};

/// An item in the scan batch.
///
/// `item` is a frozen copy of the inventory record taken when the item was
/// scanned, so the cart keeps displaying consistent data even if the read
/// cache refreshes underneath it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub item_id: String,
    pub item: InventoryItem,
    pub quantity: f64,
    pub idempotency_key: String,
    pub added_at: DateTime<Utc>,
}

impl BatchItem {
    fn from_item(item: InventoryItem) -> Self {
        BatchItem {
            item_id: item.id.clone(),
            item,
            quantity: 1.0,
            idempotency_key: Uuid::new_v4().to_string(),
            added_at: Utc::now(),
        }
    }
}

/// The scan batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Batch {
    items: Vec<BatchItem>,
    transaction_type: StockDirection,
}

impl Batch {
    /// Creates an empty check-in batch.
    pub fn new() -> Self {
        Batch::default()
    }

    /// Adds a scanned item with quantity 1.
    ///
    /// Returns `false` without touching the batch if the item is already in it.
    pub fn add_item(&mut self, item: InventoryItem) -> bool {
        if self.contains(&item.id) {
            return false;
        }
        self.items.push(BatchItem::from_item(item));
        true
    }

    /// Adds one unit to an item. Unknown ids are ignored.
    pub fn increment_item(&mut self, item_id: &str) {
        if let Some(entry) = self.get_mut(item_id) {
            entry.quantity = clamp_quantity(entry.quantity + 1.0);
        }
    }

    /// Sets an item's quantity, clamped into range and rounded.
    pub fn update_quantity(&mut self, item_id: &str, quantity: f64) {
        if let Some(entry) = self.get_mut(item_id) {
            entry.quantity = clamp_quantity(quantity);
        }
    }

    pub fn remove_item(&mut self, item_id: &str) {
        self.items.retain(|i| i.item_id != item_id);
    }

    pub fn remove_items<S: AsRef<str>>(&mut self, item_ids: &[S]) {
        self.items
            .retain(|i| !item_ids.iter().any(|id| id.as_ref() == i.item_id));
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn set_transaction_type(&mut self, direction: StockDirection) {
        self.transaction_type = direction;
    }

    pub fn transaction_type(&self) -> StockDirection {
        self.transaction_type
    }

    /// Number of distinct items.
    pub fn total_items(&self) -> usize {
        self.items.len()
    }

    /// Sum of all quantities, rounded to 3 decimals.
    pub fn total_units(&self) -> f64 {
        round_quantity(self.items.iter().map(|i| i.quantity).sum())
    }

    pub fn items(&self) -> &[BatchItem] {
        &self.items
    }

    pub fn get(&self, item_id: &str) -> Option<&BatchItem> {
        self.items.iter().find(|i| i.item_id == item_id)
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.get(item_id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Builds one movement per item, in scan order.
    ///
    /// Each movement carries the item's own idempotency key, so committing the
    /// same batch twice can never double-apply at the backend.
    pub fn to_new_transactions(&self, notes: Option<&str>) -> Vec<NewTransaction> {
        self.items
            .iter()
            .map(|entry| NewTransaction {
                item_id: entry.item_id.clone(),
                transaction_type: self.transaction_type.into(),
                quantity: entry.quantity,
                notes: notes.map(str::to_string),
                source_location_id: None,
                destination_location_id: None,
                idempotency_key: Some(entry.idempotency_key.clone()),
                device_timestamp: Some(entry.added_at),
            })
            .collect()
    }

    fn get_mut(&mut self, item_id: &str) -> Option<&mut BatchItem> {
        self.items.iter_mut().find(|i| i.item_id == item_id)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TransactionType, MAX_QUANTITY, MIN_QUANTITY};

    fn item(id: &str) -> InventoryItem {
        InventoryItem {
            id: id.to_string(),
            domain: "warehouse".to_string(),
            name: format!("Item {id}"),
            sku: None,
            barcode: None,
            current_stock: 10.0,
            unit: Some("pcs".to_string()),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_add_item_starts_at_one() {
        let mut batch = Batch::new();
        assert!(batch.add_item(item("a")));

        let entry = batch.get("a").unwrap();
        assert_eq!(entry.quantity, 1.0);
        assert!(!entry.idempotency_key.is_empty());
        assert_eq!(batch.total_items(), 1);
    }

    #[test]
    fn test_add_item_rejects_duplicates() {
        let mut batch = Batch::new();
        assert!(batch.add_item(item("a")));
        batch.update_quantity("a", 4.0);
        let key = batch.get("a").unwrap().idempotency_key.clone();

        assert!(!batch.add_item(item("a")));
        assert_eq!(batch.total_items(), 1);
        let entry = batch.get("a").unwrap();
        assert_eq!(entry.quantity, 4.0);
        assert_eq!(entry.idempotency_key, key);
    }

    #[test]
    fn test_each_item_gets_its_own_key() {
        let mut batch = Batch::new();
        batch.add_item(item("a"));
        batch.add_item(item("b"));
        assert_ne!(
            batch.get("a").unwrap().idempotency_key,
            batch.get("b").unwrap().idempotency_key
        );
    }

    #[test]
    fn test_increment_item() {
        let mut batch = Batch::new();
        batch.add_item(item("a"));
        batch.increment_item("a");
        batch.increment_item("a");
        assert_eq!(batch.get("a").unwrap().quantity, 3.0);

        batch.update_quantity("a", MAX_QUANTITY);
        batch.increment_item("a");
        assert_eq!(batch.get("a").unwrap().quantity, MAX_QUANTITY);

        // unknown ids are a no-op
        batch.increment_item("zzz");
        assert_eq!(batch.total_items(), 1);
    }

    #[test]
    fn test_update_quantity_clamps() {
        let mut batch = Batch::new();
        batch.add_item(item("a"));

        batch.update_quantity("a", 0.0);
        assert_eq!(batch.get("a").unwrap().quantity, MIN_QUANTITY);

        batch.update_quantity("a", -12.0);
        assert_eq!(batch.get("a").unwrap().quantity, MIN_QUANTITY);

        batch.update_quantity("a", f64::NAN);
        assert_eq!(batch.get("a").unwrap().quantity, MIN_QUANTITY);

        batch.update_quantity("a", 123_456.0);
        assert_eq!(batch.get("a").unwrap().quantity, MAX_QUANTITY);

        batch.update_quantity("a", 2.71828);
        assert_eq!(batch.get("a").unwrap().quantity, 2.718);
    }

    #[test]
    fn test_remove_items() {
        let mut batch = Batch::new();
        for id in ["a", "b", "c"] {
            batch.add_item(item(id));
        }

        batch.remove_item("b");
        batch.remove_item("missing");
        assert_eq!(batch.total_items(), 2);
        assert!(!batch.contains("b"));

        batch.remove_items(&["a", "nope"]);
        assert_eq!(batch.total_items(), 1);
        assert!(batch.contains("c"));

        batch.clear();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_total_units_rounds_sum() {
        let mut batch = Batch::new();
        batch.add_item(item("a"));
        batch.add_item(item("b"));
        batch.add_item(item("c"));
        batch.update_quantity("a", 0.1);
        batch.update_quantity("b", 0.2);
        batch.update_quantity("c", 1.0);

        assert_eq!(batch.total_units(), 1.3);
        assert_eq!(batch.total_items(), 3);
    }

    #[test]
    fn test_to_new_transactions_carries_keys_and_direction() {
        let mut batch = Batch::new();
        batch.add_item(item("a"));
        batch.add_item(item("b"));
        batch.update_quantity("b", 2.5);
        batch.set_transaction_type(StockDirection::CheckOut);

        let txs = batch.to_new_transactions(Some("truck 4"));
        assert_eq!(txs.len(), 2);

        assert_eq!(txs[0].item_id, "a");
        assert_eq!(txs[1].item_id, "b");
        assert_eq!(txs[1].quantity, 2.5);
        for (tx, entry) in txs.iter().zip(batch.items()) {
            assert_eq!(tx.transaction_type, TransactionType::Out);
            assert_eq!(tx.idempotency_key.as_deref(), Some(entry.idempotency_key.as_str()));
            assert_eq!(tx.notes.as_deref(), Some("truck 4"));
        }
    }

    #[test]
    fn test_snapshot_is_frozen() {
        let mut batch = Batch::new();
        let mut record = item("a");
        batch.add_item(record.clone());

        record.current_stock = 0.0;
        assert_eq!(batch.get("a").unwrap().item.current_stock, 10.0);
    }
}
