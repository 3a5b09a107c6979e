//! # Item Cache Repository
//!
//! Last known server state of the inventory, per domain. Scanning and the
//! stock screens read from here so they keep working offline; the sync
//! engine replaces a domain wholesale after each drain cycle.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use fieldstock_core::InventoryItem;

const SELECT_ITEMS: &str = r#"
    SELECT id, domain, name, sku, barcode, current_stock, unit, updated_at
    FROM item_cache
"#;

/// Repository for the local item read cache.
#[derive(Debug, Clone)]
pub struct ItemCacheRepository {
    pool: SqlitePool,
}

impl ItemCacheRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ItemCacheRepository { pool }
    }

    /// Replaces every cached item of `domain` with `items`.
    ///
    /// Readers see either the old set or the new one, never a mix. Items whose
    /// `domain` differs from the argument are stored under `domain`.
    pub async fn replace_domain(&self, domain: &str, items: &[InventoryItem]) -> DbResult<usize> {
        let mut db_tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM item_cache WHERE domain = ?1")
            .bind(domain)
            .execute(&mut *db_tx)
            .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO item_cache (
                    id, domain, name, sku, barcode, current_stock, unit, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&item.id)
            .bind(domain)
            .bind(&item.name)
            .bind(&item.sku)
            .bind(&item.barcode)
            .bind(item.current_stock)
            .bind(&item.unit)
            .bind(item.updated_at)
            .execute(&mut *db_tx)
            .await?;
        }

        db_tx.commit().await?;

        debug!(domain = %domain, count = items.len(), "Item cache replaced");
        Ok(items.len())
    }

    /// All cached items of a domain, by name.
    pub async fn list(&self, domain: &str) -> DbResult<Vec<InventoryItem>> {
        let sql = format!("{SELECT_ITEMS} WHERE domain = ?1 ORDER BY name ASC");
        let items = sqlx::query_as::<_, InventoryItem>(&sql)
            .bind(domain)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    pub async fn get_by_id(&self, domain: &str, id: &str) -> DbResult<Option<InventoryItem>> {
        let sql = format!("{SELECT_ITEMS} WHERE domain = ?1 AND id = ?2");
        let item = sqlx::query_as::<_, InventoryItem>(&sql)
            .bind(domain)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    /// Looks an item up by scanned barcode.
    pub async fn find_by_barcode(
        &self,
        domain: &str,
        barcode: &str,
    ) -> DbResult<Option<InventoryItem>> {
        let sql = format!("{SELECT_ITEMS} WHERE domain = ?1 AND barcode = ?2 LIMIT 1");
        let item = sqlx::query_as::<_, InventoryItem>(&sql)
            .bind(domain)
            .bind(barcode)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::memory_db;
    use chrono::Utc;

    fn item(id: &str, domain: &str, stock: f64) -> InventoryItem {
        InventoryItem {
            id: id.to_string(),
            domain: domain.to_string(),
            name: format!("Item {id}"),
            sku: Some(format!("SKU-{id}")),
            barcode: Some(format!("400{id}")),
            current_stock: stock,
            unit: None,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_replace_domain_swaps_contents() {
        let db = memory_db().await;
        let repo = db.items();

        repo.replace_domain("warehouse", &[item("1", "warehouse", 5.0), item("2", "warehouse", 1.0)])
            .await
            .unwrap();
        repo.replace_domain("tools", &[item("9", "tools", 2.0)])
            .await
            .unwrap();

        let n = repo
            .replace_domain("warehouse", &[item("2", "warehouse", 7.5)])
            .await
            .unwrap();
        assert_eq!(n, 1);

        let warehouse = repo.list("warehouse").await.unwrap();
        assert_eq!(warehouse.len(), 1);
        assert_eq!(warehouse[0].id, "2");
        assert_eq!(warehouse[0].current_stock, 7.5);

        // other domains are untouched
        assert_eq!(repo.list("tools").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lookups() {
        let db = memory_db().await;
        let repo = db.items();
        repo.replace_domain("warehouse", &[item("1", "warehouse", 3.0)])
            .await
            .unwrap();

        assert!(repo.get_by_id("warehouse", "1").await.unwrap().is_some());
        assert!(repo.get_by_id("tools", "1").await.unwrap().is_none());

        let found = repo.find_by_barcode("warehouse", "4001").await.unwrap().unwrap();
        assert_eq!(found.id, "1");
    }
}
