//! # Sync Error Repository
//!
//! The permanent log of movements that exhausted their automatic retries.
//!
//! Entries are only ever created by [`SyncErrorRepository::quarantine`] and
//! are never drained by the engine. A human reviews them and either retries
//! (the original payload goes back into the queue, same idempotency key) or
//! dismisses them.
//!
//! ```text
//!   pending_transactions                     sync_errors
//!  ┌──────────────────┐   quarantine()     ┌──────────────────────┐
//!  │ retry_count >= N │ ─────────────────► │ status = pending     │
//!  └──────────────────┘   (one txn)        └──────────┬───────────┘
//!           ▲                                         │
//!           │            requeue()                    │ set_status()
//!           └──────────────────────────────── retrying / dismissed
//!                    (pending records only)
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::queue::bind_insert;
use fieldstock_core::{QueuedTransaction, SyncErrorRecord, SyncErrorStatus};

const SELECT_ERRORS: &str = r#"
    SELECT id, transaction_data, error_message, user_id, status, created_at, updated_at
    FROM sync_errors
"#;

/// Repository for the sync error log.
#[derive(Debug, Clone)]
pub struct SyncErrorRepository {
    pool: SqlitePool,
}

impl SyncErrorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SyncErrorRepository { pool }
    }

    /// Moves a movement from the queue into the error log.
    ///
    /// Insert and delete commit together: a crash in between can neither
    /// lose the movement nor leave it in both places.
    pub async fn quarantine(
        &self,
        tx: &QueuedTransaction,
        error_message: &str,
    ) -> DbResult<SyncErrorRecord> {
        let now = Utc::now();
        let record = SyncErrorRecord {
            id: Uuid::new_v4().to_string(),
            transaction_data: serde_json::to_string(tx)?,
            error_message: error_message.to_string(),
            user_id: tx.user_id.clone(),
            status: SyncErrorStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        let mut db_tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sync_errors (
                id, transaction_data, error_message, user_id, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&record.id)
        .bind(&record.transaction_data)
        .bind(&record.error_message)
        .bind(&record.user_id)
        .bind(record.status)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *db_tx)
        .await?;

        sqlx::query("DELETE FROM pending_transactions WHERE id = ?1")
            .bind(&tx.id)
            .execute(&mut *db_tx)
            .await?;

        db_tx.commit().await?;

        info!(
            transaction_id = %tx.id,
            error_id = %record.id,
            retry_count = tx.retry_count,
            "Movement quarantined to sync error log"
        );

        Ok(record)
    }

    /// Puts a quarantined movement back into the queue and marks the record
    /// `retrying`, in one transaction.
    ///
    /// Only `pending` records can be requeued. A record that was already
    /// retried or dismissed is left untouched and the queue is not written.
    pub async fn requeue(&self, error_id: &str, tx: &QueuedTransaction) -> DbResult<()> {
        let mut db_tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE sync_errors SET status = ?2, updated_at = ?3 WHERE id = ?1 AND status = ?4",
        )
        .bind(error_id)
        .bind(SyncErrorStatus::Retrying)
        .bind(Utc::now())
        .bind(SyncErrorStatus::Pending)
        .execute(&mut *db_tx)
        .await?;

        if updated.rows_affected() == 0 {
            let status: Option<SyncErrorStatus> =
                sqlx::query_scalar("SELECT status FROM sync_errors WHERE id = ?1")
                    .bind(error_id)
                    .fetch_optional(&mut *db_tx)
                    .await?;
            return Err(match status {
                Some(status) => DbError::InvalidStatus {
                    entity: "Sync error".to_string(),
                    id: error_id.to_string(),
                    status: status.as_str().to_string(),
                },
                None => DbError::not_found("Sync error", error_id),
            });
        }

        bind_insert(tx).execute(&mut *db_tx).await?;

        db_tx.commit().await?;

        debug!(error_id = %error_id, transaction_id = %tx.id, "Quarantined movement requeued");
        Ok(())
    }

    /// Lists error records, newest first, optionally filtered by status.
    pub async fn list(&self, status: Option<SyncErrorStatus>) -> DbResult<Vec<SyncErrorRecord>> {
        let records = match status {
            Some(status) => {
                let sql = format!("{SELECT_ERRORS} WHERE status = ?1 ORDER BY created_at DESC");
                sqlx::query_as::<_, SyncErrorRecord>(&sql)
                    .bind(status)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!("{SELECT_ERRORS} ORDER BY created_at DESC");
                sqlx::query_as::<_, SyncErrorRecord>(&sql)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(records)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<SyncErrorRecord>> {
        let sql = format!("{SELECT_ERRORS} WHERE id = ?1");
        let record = sqlx::query_as::<_, SyncErrorRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    pub async fn set_status(&self, id: &str, status: SyncErrorStatus) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE sync_errors SET status = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(status)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sync error", id));
        }
        Ok(())
    }

}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{memory_db, queued};

    #[tokio::test]
    async fn test_quarantine_moves_row_atomically() {
        let db = memory_db().await;
        let mut tx = queued("item-1");
        tx.retry_count = 5;
        tx.last_error = Some("HTTP 500".into());
        db.queue().add_to_queue(&tx).await.unwrap();

        let record = db.sync_errors().quarantine(&tx, "HTTP 500").await.unwrap();

        assert_eq!(db.queue().get_queue_count().await.unwrap(), 0);
        assert_eq!(record.status, SyncErrorStatus::Pending);
        assert_eq!(record.error_message, "HTTP 500");
        assert_eq!(record.user_id, "user-1");
        assert_eq!(record.transaction().unwrap(), tx);

        let listed = db.sync_errors().list(None).await.unwrap();
        assert_eq!(listed, vec![record]);
    }

    #[tokio::test]
    async fn test_requeue_restores_payload_and_marks_retrying() {
        let db = memory_db().await;
        let tx = queued("item-1");
        db.queue().add_to_queue(&tx).await.unwrap();
        let record = db.sync_errors().quarantine(&tx, "boom").await.unwrap();

        db.sync_errors().requeue(&record.id, &tx).await.unwrap();

        let back = db.queue().get_by_id(&tx.id).await.unwrap().unwrap();
        assert_eq!(back.idempotency_key, tx.idempotency_key);
        let record = db.sync_errors().get_by_id(&record.id).await.unwrap().unwrap();
        assert_eq!(record.status, SyncErrorStatus::Retrying);
    }

    #[tokio::test]
    async fn test_requeue_unknown_record_rolls_back() {
        let db = memory_db().await;
        let tx = queued("item-1");

        let err = db.sync_errors().requeue("missing", &tx).await.unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(db.queue().get_queue_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_requeue_twice_is_rejected() {
        let db = memory_db().await;
        let tx = queued("item-1");
        db.queue().add_to_queue(&tx).await.unwrap();
        let record = db.sync_errors().quarantine(&tx, "boom").await.unwrap();
        db.sync_errors().requeue(&record.id, &tx).await.unwrap();
        db.queue().remove_from_queue(&tx.id).await.unwrap();

        let err = db.sync_errors().requeue(&record.id, &tx).await.unwrap_err();

        assert!(matches!(err, DbError::InvalidStatus { ref status, .. } if status == "retrying"));
        assert_eq!(db.queue().get_queue_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_requeue_dismissed_record_is_rejected() {
        let db = memory_db().await;
        let tx = queued("item-1");
        let record = db.sync_errors().quarantine(&tx, "boom").await.unwrap();
        db.sync_errors()
            .set_status(&record.id, SyncErrorStatus::Dismissed)
            .await
            .unwrap();

        let err = db.sync_errors().requeue(&record.id, &tx).await.unwrap_err();

        assert!(matches!(err, DbError::InvalidStatus { .. }));
        assert_eq!(db.queue().get_queue_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let db = memory_db().await;
        let repo = db.sync_errors();
        let a = repo.quarantine(&queued("a"), "x").await.unwrap();
        let b = repo.quarantine(&queued("b"), "y").await.unwrap();

        repo.set_status(&a.id, SyncErrorStatus::Dismissed).await.unwrap();

        let pending = repo.list(Some(SyncErrorStatus::Pending)).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, b.id);
        let dismissed = repo.list(Some(SyncErrorStatus::Dismissed)).await.unwrap();
        assert_eq!(dismissed.len(), 1);
        assert_eq!(repo.list(None).await.unwrap().len(), 2);

        let err = repo.set_status("missing", SyncErrorStatus::Dismissed).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
