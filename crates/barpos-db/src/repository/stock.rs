//! # Stock Repository
//!
//! Inventory ledger for stock-controlled products.
//!
//! ## Atomic Decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                Why the check lives in the UPDATE                        │
//! │                                                                         │
//! │  ❌ WRONG: read, compare, write                                         │
//! │     SELECT quantity ...            -- both tasks read 1                │
//! │     UPDATE stock SET quantity = 0  -- both tasks sell the last can     │
//! │                                                                         │
//! │  ✅ CORRECT: conditional delta                                          │
//! │     UPDATE stock SET quantity = quantity - ?                           │
//! │     WHERE product_id = ? AND quantity >= ?                             │
//! │                                                                         │
//! │  0 rows affected → read the row to report WHY (missing or too low).   │
//! │  CHECK (quantity >= 0) in the schema is the last line of defence.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use barpos_core::validation::validate_non_negative;
use barpos_core::{AuditAction, Clock, CoreError, Stock};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use ts_rs::TS;

use crate::error::DbResult;
use crate::repository::begin_write;
use crate::repository::audit::AuditRepository;
use crate::repository::product::ProductRepository;

const STOCK_COLUMNS: &str = "product_id, quantity, min_quantity, updated_at";

/// Manual correction of a stock row. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockAdjustment {
    pub quantity: Option<i64>,
    pub min_quantity: Option<i64>,
    pub reason: Option<String>,
}

/// Repository for stock rows.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl StockRepository {
    /// Creates a new StockRepository.
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        StockRepository { pool, clock }
    }

    /// Gets the stock row of a product.
    pub async fn get(&self, product_id: &str) -> DbResult<Option<Stock>> {
        let mut conn = self.pool.acquire().await?;
        self.find_in(&mut conn, product_id).await
    }

    pub(crate) async fn find_in(
        &self,
        conn: &mut SqliteConnection,
        product_id: &str,
    ) -> DbResult<Option<Stock>> {
        let sql = format!("SELECT {STOCK_COLUMNS} FROM stock WHERE product_id = ?1");
        let stock = sqlx::query_as::<_, Stock>(&sql)
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(stock)
    }

    /// Takes `qty` units out of stock inside the caller's transaction.
    ///
    /// ## Errors
    /// * `StockNotConfigured` - the product has no stock row
    /// * `InsufficientStock` - fewer than `qty` units on hand
    pub async fn decrement(
        &self,
        conn: &mut SqliteConnection,
        product_id: &str,
        qty: i64,
    ) -> DbResult<()> {
        debug!(product_id = %product_id, qty, "Decrementing stock");

        let result = sqlx::query(
            r#"
            UPDATE stock
            SET quantity = quantity - ?2, updated_at = ?3
            WHERE product_id = ?1 AND quantity >= ?2
            "#,
        )
        .bind(product_id)
        .bind(qty)
        .bind(self.clock.now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(match self.find_in(conn, product_id).await? {
                None => CoreError::StockNotConfigured(product_id.to_string()),
                Some(stock) => CoreError::InsufficientStock {
                    product_id: product_id.to_string(),
                    available: stock.quantity,
                    requested: qty,
                },
            }
            .into());
        }

        Ok(())
    }

    /// Puts `qty` units back into stock inside the caller's transaction.
    ///
    /// ## Errors
    /// * `StockNotConfigured` - the product has no stock row
    pub async fn increment(
        &self,
        conn: &mut SqliteConnection,
        product_id: &str,
        qty: i64,
    ) -> DbResult<()> {
        debug!(product_id = %product_id, qty, "Incrementing stock");

        let result = sqlx::query(
            r#"
            UPDATE stock
            SET quantity = quantity + ?2, updated_at = ?3
            WHERE product_id = ?1
            "#,
        )
        .bind(product_id)
        .bind(qty)
        .bind(self.clock.now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::StockNotConfigured(product_id.to_string()).into());
        }

        Ok(())
    }

    /// Manual correction: overwrites quantity and/or threshold and writes a
    /// `STOCK_ADJUSTMENT` audit row in the same transaction.
    ///
    /// ## Errors
    /// * `ProductNotFound`
    /// * `ProductDoesNotControlStock`
    /// * `StockNotConfigured`
    /// * `Validation` - a negative quantity or threshold
    pub async fn adjust(
        &self,
        actor_id: &str,
        product_id: &str,
        adjustment: StockAdjustment,
    ) -> DbResult<Stock> {
        if let Some(quantity) = adjustment.quantity {
            validate_non_negative("quantity", quantity).map_err(CoreError::from)?;
        }
        if let Some(min_quantity) = adjustment.min_quantity {
            validate_non_negative("min_quantity", min_quantity).map_err(CoreError::from)?;
        }

        let products = ProductRepository::new(self.pool.clone(), self.clock.clone());
        let audit = AuditRepository::new(self.pool.clone(), self.clock.clone());

        let mut tx = begin_write(&self.pool).await?;

        let product = products
            .find_in(&mut tx, product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;
        if !product.controls_stock {
            return Err(CoreError::ProductDoesNotControlStock(product_id.to_string()).into());
        }
        let before = self
            .find_in(&mut tx, product_id)
            .await?
            .ok_or_else(|| CoreError::StockNotConfigured(product_id.to_string()))?;

        let now = self.clock.now();
        sqlx::query(
            r#"
            UPDATE stock
            SET quantity = COALESCE(?2, quantity),
                min_quantity = COALESCE(?3, min_quantity),
                updated_at = ?4
            WHERE product_id = ?1
            "#,
        )
        .bind(product_id)
        .bind(adjustment.quantity)
        .bind(adjustment.min_quantity)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let after = Stock {
            product_id: before.product_id.clone(),
            quantity: adjustment.quantity.unwrap_or(before.quantity),
            min_quantity: adjustment.min_quantity.unwrap_or(before.min_quantity),
            updated_at: now,
        };

        audit
            .record(
                &mut tx,
                Some(actor_id),
                None,
                AuditAction::StockAdjustment,
                Some(json!({
                    "productId": product_id,
                    "previousQuantity": before.quantity,
                    "quantity": adjustment.quantity,
                    "previousMinQuantity": before.min_quantity,
                    "minQuantity": adjustment.min_quantity,
                    "reason": adjustment.reason,
                })),
            )
            .await?;

        tx.commit().await?;

        info!(
            product_id = %product_id,
            quantity = after.quantity,
            min_quantity = after.min_quantity,
            "Stock adjusted"
        );

        Ok(after)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use barpos_core::NewProduct;

    async fn setup() -> (Database, String, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let beer = db
            .products()
            .create(NewProduct {
                name: "Cerveja Lata".into(),
                category: "Bebidas".into(),
                price_cents: 800,
                controls_stock: true,
                quantity: Some(3),
                min_quantity: Some(1),
            })
            .await
            .unwrap();
        let fries = db
            .products()
            .create(NewProduct {
                name: "Porção Batata".into(),
                category: "Cozinha".into(),
                price_cents: 2500,
                controls_stock: false,
                ..Default::default()
            })
            .await
            .unwrap();
        (db, beer.id, fries.id)
    }

    #[tokio::test]
    async fn test_decrement_and_increment() {
        let (db, beer, _) = setup().await;
        let stock = db.stock();

        let mut tx = db.pool().begin().await.unwrap();
        stock.decrement(&mut tx, &beer, 2).await.unwrap();
        stock.increment(&mut tx, &beer, 1).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(stock.get(&beer).await.unwrap().unwrap().quantity, 2);
    }

    #[tokio::test]
    async fn test_decrement_below_zero_is_rejected() {
        let (db, beer, _) = setup().await;
        let stock = db.stock();

        let mut tx = db.pool().begin().await.unwrap();
        let err = stock.decrement(&mut tx, &beer, 4).await.unwrap_err();
        drop(tx);

        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock {
                available: 3,
                requested: 4,
                ..
            })
        ));
        assert_eq!(stock.get(&beer).await.unwrap().unwrap().quantity, 3);
    }

    #[tokio::test]
    async fn test_missing_stock_row() {
        let (db, _, fries) = setup().await;
        let stock = db.stock();

        let mut tx = db.pool().begin().await.unwrap();
        let err = stock.decrement(&mut tx, &fries, 1).await.unwrap_err();
        assert_eq!(err.code(), "STOCK_NOT_CONFIGURED");
        let err = stock.increment(&mut tx, &fries, 1).await.unwrap_err();
        assert_eq!(err.code(), "STOCK_NOT_CONFIGURED");
    }

    #[tokio::test]
    async fn test_adjust_writes_audit() {
        let (db, beer, _) = setup().await;

        let adjusted = db
            .stock()
            .adjust(
                "manager-1",
                &beer,
                StockAdjustment {
                    quantity: Some(48),
                    min_quantity: None,
                    reason: Some("delivery".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(adjusted.quantity, 48);
        assert_eq!(adjusted.min_quantity, 1);

        let stored = db.stock().get(&beer).await.unwrap().unwrap();
        assert_eq!(stored.quantity, 48);

        let entries = db.audit().by_action(AuditAction::StockAdjustment).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].actor_id.as_deref(), Some("manager-1"));
        assert!(entries[0].register_id.is_none());
        let details: serde_json::Value =
            serde_json::from_str(entries[0].details_json.as_deref().unwrap()).unwrap();
        assert_eq!(details["previousQuantity"], 3);
        assert_eq!(details["reason"], "delivery");
    }

    #[tokio::test]
    async fn test_adjust_rejections() {
        let (db, beer, fries) = setup().await;
        let stock = db.stock();

        let err = stock
            .adjust("m", "missing", StockAdjustment::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PRODUCT_NOT_FOUND");

        let err = stock
            .adjust("m", &fries, StockAdjustment::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PRODUCT_DOES_NOT_CONTROL_STOCK");

        let err = stock
            .adjust(
                "m",
                &beer,
                StockAdjustment {
                    quantity: Some(-1),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        assert!(db.audit().recent(10).await.unwrap().is_empty());
    }
}
