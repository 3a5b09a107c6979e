//! # Pending Delta Resolver
//!
//! Accumulates rapid +/- taps on a single item's stock into one pending change,
//! so ten taps become one movement instead of ten.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │             increment(a) / decrement(a)                                 │
//! │   ┌──────┐ ───────────────────────────────► ┌───────────────────────┐   │
//! │   │ Idle │                                  │ Accumulating { a, d } │   │
//! │   └──────┘ ◄─────────────────────────────── └───────────────────────┘   │
//! │      ▲       confirm()  → commit(a, |d|, dir)     │         │           │
//! │      │       cancel()   → nothing                 │         │           │
//! │      │       d reaches 0 → AutoCancelled          │         │ ±1 on a   │
//! │      │                                            │         ▼           │
//! │      │                                            │   (stays, d ± 1)    │
//! │      │                                            │                     │
//! │      │                       increment(b) ────────┘                     │
//! │      │                       → NeedsResolve, state unchanged            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A zero delta is never committed: it cancels itself the moment it hits 0.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{NewTransaction, StockDirection};

/// Snapshot of the resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PendingDeltaState {
    pub active_item_id: Option<String>,
    pub delta: i64,
}

/// Result of a tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum DeltaOutcome {
    /// The tap was applied.
    Ok,
    /// The tap brought the delta back to 0; the resolver is idle again.
    AutoCancelled,
    /// Another item holds the pending change. Nothing was applied.
    NeedsResolve,
}

/// A confirmed delta, ready to be queued as one movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCommit {
    pub item_id: String,
    /// Absolute value of the accumulated delta, always >= 1.
    pub quantity: u64,
    pub direction: StockDirection,
}

impl PendingCommit {
    /// Converts the commit into a movement with a fresh idempotency key.
    pub fn to_new_transaction(&self) -> NewTransaction {
        NewTransaction::new(
            self.item_id.clone(),
            self.direction.into(),
            self.quantity as f64,
        )
    }
}

/// Tap accumulator for a single item at a time.
///
/// `on_commit` runs synchronously inside [`confirm`](Self::confirm), once per
/// confirmed delta.
pub struct PendingDeltaResolver<F = fn(&PendingCommit)>
where
    F: FnMut(&PendingCommit),
{
    state: PendingDeltaState,
    on_commit: F,
}

fn discard_commit(_: &PendingCommit) {}

impl Default for PendingDeltaResolver {
    fn default() -> Self {
        PendingDeltaResolver::new(discard_commit as fn(&PendingCommit))
    }
}

impl<F> PendingDeltaResolver<F>
where
    F: FnMut(&PendingCommit),
{
    pub fn new(on_commit: F) -> Self {
        PendingDeltaResolver {
            state: PendingDeltaState::default(),
            on_commit,
        }
    }

    pub fn increment(&mut self, item_id: &str) -> DeltaOutcome {
        self.apply(item_id, 1)
    }

    pub fn decrement(&mut self, item_id: &str) -> DeltaOutcome {
        self.apply(item_id, -1)
    }

    fn apply(&mut self, item_id: &str, step: i64) -> DeltaOutcome {
        match self.state.active_item_id.as_deref() {
            None => {
                self.state.active_item_id = Some(item_id.to_string());
                self.state.delta = step;
                DeltaOutcome::Ok
            }
            Some(active) if active == item_id => {
                self.state.delta += step;
                if self.state.delta == 0 {
                    self.reset();
                    DeltaOutcome::AutoCancelled
                } else {
                    DeltaOutcome::Ok
                }
            }
            Some(_) => DeltaOutcome::NeedsResolve,
        }
    }

    /// Commits the pending delta and returns to idle.
    ///
    /// Returns `None` (and does not call `on_commit`) when idle.
    pub fn confirm(&mut self) -> Option<PendingCommit> {
        let item_id = self.state.active_item_id.take()?;
        let delta = std::mem::take(&mut self.state.delta);
        if delta == 0 {
            return None;
        }

        let commit = PendingCommit {
            item_id,
            quantity: delta.unsigned_abs(),
            direction: if delta > 0 {
                StockDirection::CheckIn
            } else {
                StockDirection::CheckOut
            },
        };
        (self.on_commit)(&commit);
        Some(commit)
    }

    /// Drops the pending delta without committing.
    pub fn cancel(&mut self) {
        self.reset();
    }

    /// Stock to display for `item_id`, including the pending delta if it is
    /// the active item.
    pub fn display_stock(&self, item_id: &str, original_stock: f64) -> f64 {
        match self.state.active_item_id.as_deref() {
            Some(active) if active == item_id => original_stock + self.state.delta as f64,
            _ => original_stock,
        }
    }

    pub fn state(&self) -> PendingDeltaState {
        self.state.clone()
    }

    pub fn is_idle(&self) -> bool {
        self.state.active_item_id.is_none()
    }

    fn reset(&mut self) {
        self.state = PendingDeltaState::default();
    }
}

impl<F> std::fmt::Debug for PendingDeltaResolver<F>
where
    F: FnMut(&PendingCommit),
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingDeltaResolver")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransactionType;

    fn recording() -> (
        std::rc::Rc<std::cell::RefCell<Vec<PendingCommit>>>,
        impl FnMut(&PendingCommit),
    ) {
        let commits = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = commits.clone();
        (commits, move |c: &PendingCommit| sink.borrow_mut().push(c.clone()))
    }

    #[test]
    fn test_increment_then_confirm_commits_once() {
        let (commits, on_commit) = recording();
        let mut resolver = PendingDeltaResolver::new(on_commit);

        for _ in 0..3 {
            assert_eq!(resolver.increment("a"), DeltaOutcome::Ok);
        }
        let commit = resolver.confirm().unwrap();

        assert_eq!(
            commit,
            PendingCommit {
                item_id: "a".to_string(),
                quantity: 3,
                direction: StockDirection::CheckIn,
            }
        );
        assert_eq!(commits.borrow().as_slice(), &[commit]);
        assert_eq!(resolver.state(), PendingDeltaState::default());
    }

    #[test]
    fn test_negative_delta_commits_check_out() {
        let mut resolver: PendingDeltaResolver = PendingDeltaResolver::default();
        resolver.decrement("a");
        resolver.decrement("a");

        let commit = resolver.confirm().unwrap();
        assert_eq!(commit.quantity, 2);
        assert_eq!(commit.direction, StockDirection::CheckOut);

        let tx = commit.to_new_transaction();
        assert_eq!(tx.transaction_type, TransactionType::Out);
        assert_eq!(tx.quantity, 2.0);
        assert!(tx.idempotency_key.is_none());
    }

    #[test]
    fn test_return_to_zero_auto_cancels() {
        let (commits, on_commit) = recording();
        let mut resolver = PendingDeltaResolver::new(on_commit);

        assert_eq!(resolver.increment("a"), DeltaOutcome::Ok);
        assert_eq!(resolver.decrement("a"), DeltaOutcome::AutoCancelled);
        assert!(resolver.is_idle());

        assert_eq!(resolver.confirm(), None);
        assert!(commits.borrow().is_empty());
    }

    #[test]
    fn test_cross_item_needs_resolve() {
        let mut resolver: PendingDeltaResolver = PendingDeltaResolver::default();
        resolver.increment("a");

        assert_eq!(resolver.increment("b"), DeltaOutcome::NeedsResolve);
        assert_eq!(resolver.decrement("b"), DeltaOutcome::NeedsResolve);
        assert_eq!(
            resolver.state(),
            PendingDeltaState {
                active_item_id: Some("a".to_string()),
                delta: 1,
            }
        );
    }

    #[test]
    fn test_cancel_does_not_commit() {
        let (commits, on_commit) = recording();
        let mut resolver = PendingDeltaResolver::new(on_commit);
        resolver.increment("a");
        resolver.increment("a");

        resolver.cancel();
        assert!(resolver.is_idle());
        assert!(commits.borrow().is_empty());

        // another item can now take over
        assert_eq!(resolver.increment("b"), DeltaOutcome::Ok);
    }

    #[test]
    fn test_display_stock() {
        let mut resolver: PendingDeltaResolver = PendingDeltaResolver::default();
        assert_eq!(resolver.display_stock("a", 10.0), 10.0);

        resolver.decrement("a");
        resolver.decrement("a");
        assert_eq!(resolver.display_stock("a", 10.0), 8.0);
        assert_eq!(resolver.display_stock("b", 10.0), 10.0);
    }

    #[test]
    fn test_confirm_when_idle_is_noop() {
        let (commits, on_commit) = recording();
        let mut resolver = PendingDeltaResolver::new(on_commit);
        assert_eq!(resolver.confirm(), None);
        assert!(commits.borrow().is_empty());
    }
}
