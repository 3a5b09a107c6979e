//! # Pending Transaction Repository
//!
//! The durable FIFO of movements that have not been confirmed by the backend.
//!
//! ## Queue Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Durable Movement Queue                               │
//! │                                                                         │
//! │  queue_transaction()                                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INSERT INTO pending_transactions  (retry_count = 0)                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            DRAIN CYCLE (SyncEngine::sync_queue)                 │   │
//! │  │                                                                 │   │
//! │  │  1. SELECT * ORDER BY created_at, rowid       (FIFO)           │   │
//! │  │                                                                 │   │
//! │  │  2. For each row, submit to the backend:                       │   │
//! │  │     a. Success → DELETE                                        │   │
//! │  │     b. Failure → retry_count += 1, last_error = ?             │   │
//! │  │     c. retry_count >= MAX → move to sync_errors (atomic)       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  KEY GUARANTEES:                                                       │
//! │  • A movement is never lost (it's in the local DB until confirmed)     │
//! │  • The idempotency key never changes while the row lives               │
//! │  • Offline? Rows queue up. Back online? The engine drains them.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use fieldstock_core::QueuedTransaction;

pub(crate) const SELECT_QUEUED: &str = r#"
    SELECT
        id, idempotency_key, transaction_type, item_id, quantity, notes,
        source_location_id, destination_location_id, device_timestamp,
        user_id, domain, retry_count, last_error, created_at
    FROM pending_transactions
"#;

pub(crate) const INSERT_QUEUED: &str = r#"
    INSERT INTO pending_transactions (
        id, idempotency_key, transaction_type, item_id, quantity, notes,
        source_location_id, destination_location_id, device_timestamp,
        user_id, domain, retry_count, last_error, created_at
    ) VALUES (
        ?1, ?2, ?3, ?4, ?5, ?6,
        ?7, ?8, ?9,
        ?10, ?11, ?12, ?13, ?14
    )
"#;

/// Binds every column of a queued movement to [`INSERT_QUEUED`].
pub(crate) fn bind_insert<'q>(
    tx: &'q QueuedTransaction,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    sqlx::query(INSERT_QUEUED)
        .bind(&tx.id)
        .bind(&tx.idempotency_key)
        .bind(tx.transaction_type)
        .bind(&tx.item_id)
        .bind(tx.quantity)
        .bind(&tx.notes)
        .bind(&tx.source_location_id)
        .bind(&tx.destination_location_id)
        .bind(tx.device_timestamp)
        .bind(&tx.user_id)
        .bind(&tx.domain)
        .bind(tx.retry_count)
        .bind(&tx.last_error)
        .bind(tx.created_at)
}

/// Repository for the durable movement queue.
#[derive(Debug, Clone)]
pub struct PendingTransactionRepository {
    pool: SqlitePool,
}

impl PendingTransactionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PendingTransactionRepository { pool }
    }

    /// Persists a movement.
    ///
    /// Fails with [`DbError::UniqueViolation`] if the id or idempotency key is
    /// already queued.
    pub async fn add_to_queue(&self, tx: &QueuedTransaction) -> DbResult<()> {
        debug!(
            id = %tx.id,
            item_id = %tx.item_id,
            transaction_type = %tx.transaction_type,
            "Queuing movement"
        );

        bind_insert(tx).execute(&self.pool).await?;
        Ok(())
    }

    /// All queued movements, oldest first.
    pub async fn get_queued_transactions(&self) -> DbResult<Vec<QueuedTransaction>> {
        let sql = format!("{SELECT_QUEUED} ORDER BY created_at ASC, rowid ASC");
        let rows = sqlx::query_as::<_, QueuedTransaction>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn get_queue_count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pending_transactions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<QueuedTransaction>> {
        let sql = format!("{SELECT_QUEUED} WHERE id = ?1");
        let row = sqlx::query_as::<_, QueuedTransaction>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Deletes a confirmed movement. Returns false if it was not queued.
    pub async fn remove_from_queue(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM pending_transactions WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Records a failed attempt and returns the new retry count.
    pub async fn increment_retry_count(&self, id: &str, error: &str) -> DbResult<i64> {
        let count: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE pending_transactions SET
                retry_count = retry_count + 1,
                last_error = ?2
            WHERE id = ?1
            RETURNING retry_count
            "#,
        )
        .bind(id)
        .bind(error)
        .fetch_optional(&self.pool)
        .await?;

        count.ok_or_else(|| DbError::not_found("Queued transaction", id))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{memory_db, queued};
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_add_and_get_by_id() {
        let db = memory_db().await;
        let repo = db.queue();
        let tx = queued("item-1");

        repo.add_to_queue(&tx).await.unwrap();

        let stored = repo.get_by_id(&tx.id).await.unwrap().unwrap();
        assert_eq!(stored, tx);
        assert_eq!(repo.get_queue_count().await.unwrap(), 1);
        assert!(repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_idempotency_key_rejected() {
        let db = memory_db().await;
        let repo = db.queue();
        let first = queued("item-1");
        let mut second = queued("item-2");
        second.idempotency_key = first.idempotency_key.clone();

        repo.add_to_queue(&first).await.unwrap();
        let err = repo.add_to_queue(&second).await.unwrap_err();

        assert!(matches!(err, DbError::UniqueViolation { .. }));
        assert_eq!(repo.get_queue_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let db = memory_db().await;
        let repo = db.queue();
        let base = Utc::now();

        let mut late = queued("late");
        late.created_at = base + Duration::seconds(10);
        let mut early = queued("early");
        early.created_at = base;
        let mut middle = queued("middle");
        middle.created_at = base + Duration::seconds(5);

        for tx in [&late, &early, &middle] {
            repo.add_to_queue(tx).await.unwrap();
        }

        let order: Vec<String> = repo
            .get_queued_transactions()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.item_id)
            .collect();
        assert_eq!(order, vec!["early", "middle", "late"]);
    }

    #[tokio::test]
    async fn test_same_timestamp_keeps_insertion_order() {
        let db = memory_db().await;
        let repo = db.queue();
        let now = Utc::now();

        for id in ["a", "b", "c"] {
            let mut tx = queued(id);
            tx.created_at = now;
            repo.add_to_queue(&tx).await.unwrap();
        }

        let order: Vec<String> = repo
            .get_queued_transactions()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.item_id)
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_increment_retry_count() {
        let db = memory_db().await;
        let repo = db.queue();
        let tx = queued("item-1");
        repo.add_to_queue(&tx).await.unwrap();

        assert_eq!(repo.increment_retry_count(&tx.id, "timeout").await.unwrap(), 1);
        assert_eq!(repo.increment_retry_count(&tx.id, "503").await.unwrap(), 2);

        let stored = repo.get_by_id(&tx.id).await.unwrap().unwrap();
        assert_eq!(stored.retry_count, 2);
        assert_eq!(stored.last_error.as_deref(), Some("503"));
        assert_eq!(stored.idempotency_key, tx.idempotency_key);

        let err = repo.increment_retry_count("missing", "x").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_remove_from_queue() {
        let db = memory_db().await;
        let repo = db.queue();
        let tx = queued("item-1");
        repo.add_to_queue(&tx).await.unwrap();

        assert!(repo.remove_from_queue(&tx.id).await.unwrap());
        assert!(!repo.remove_from_queue(&tx.id).await.unwrap());
        assert_eq!(repo.get_queue_count().await.unwrap(), 0);
    }
}
