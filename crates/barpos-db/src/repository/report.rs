//! # Report Repository
//!
//! Read-only aggregates over closed orders. Nothing here writes.
//!
//! Windows are half-open: `from <= closed_at < to`. For a whole day pass
//! the next midnight as `to`, not 23:59:59.

use barpos_core::{DaySummary, ProductListing, SaleRecord, TopProduct};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use crate::repository::product::ListingRow;

/// Default row count for [`ReportRepository::top_products`].
pub const DEFAULT_TOP_PRODUCTS_LIMIT: u32 = 20;

/// Repository for sales reports.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    /// Creates a new ReportRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Total sold in the window plus the number of orders still open.
    pub async fn day_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<DaySummary> {
        let (total_sold_cents, closed_orders): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(total_cents), 0), COUNT(*)
            FROM orders
            WHERE status = 'CLOSED' AND closed_at >= ?1 AND closed_at < ?2
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        let open_orders: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE status <> 'CLOSED'")
                .fetch_one(&self.pool)
                .await?;

        debug!(%from, %to, total_sold_cents, closed_orders, open_orders, "Day summary");
        Ok(DaySummary {
            total_sold_cents,
            closed_orders,
            open_orders,
        })
    }

    /// Orders closed in the window, oldest first. `to` is exclusive.
    pub async fn sales_by_period(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<SaleRecord>> {
        let sales = sqlx::query_as::<_, SaleRecord>(
            r#"
            SELECT
                o.id AS order_id, o.closed_at, o.total_cents, o.mode,
                t.label AS table_label, o.customer_name
            FROM orders o
            LEFT JOIN dining_tables t ON t.id = o.table_id
            WHERE o.status = 'CLOSED' AND o.closed_at >= ?1 AND o.closed_at < ?2
            ORDER BY o.closed_at, o.rowid
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Best sellers by units among non-canceled items of orders closed in
    /// the window, with each product's category. `to` is exclusive.
    pub async fn top_products(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: Option<u32>,
    ) -> DbResult<Vec<TopProduct>> {
        let limit = limit.unwrap_or(DEFAULT_TOP_PRODUCTS_LIMIT);

        let products = sqlx::query_as::<_, TopProduct>(
            r#"
            SELECT
                p.id AS product_id, p.name, p.category,
                SUM(i.quantity) AS quantity,
                SUM(i.total_cents) AS total_cents
            FROM order_items i
            INNER JOIN orders o ON o.id = i.order_id
            INNER JOIN products p ON p.id = i.product_id
            WHERE i.canceled_at IS NULL
              AND o.status = 'CLOSED' AND o.closed_at >= ?1 AND o.closed_at < ?2
            GROUP BY p.id, p.name, p.category
            ORDER BY quantity DESC, total_cents DESC, p.name
            LIMIT ?3
            "#,
        )
        .bind(from)
        .bind(to)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Stock-controlled products at or below their minimum.
    pub async fn low_stock(&self) -> DbResult<Vec<ProductListing>> {
        let rows = sqlx::query_as::<_, ListingRow>(
            r#"
            SELECT
                p.id, p.name, p.category, p.price_cents,
                p.is_active, p.controls_stock, p.created_at,
                s.quantity, s.min_quantity, s.updated_at AS stock_updated_at
            FROM products p
            INNER JOIN stock s ON s.product_id = p.id
            WHERE p.controls_stock = 1 AND p.is_active = 1 AND s.quantity <= s.min_quantity
            ORDER BY s.quantity, p.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ProductListing::from).collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use barpos_core::{Clock, FixedClock, IdentificationMode, NewProduct, PaymentMethod};
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 18, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_reports_over_closed_orders() {
        let clock = Arc::new(FixedClock::new(start()));
        let db = Database::new(DbConfig::in_memory())
            .await
            .unwrap()
            .with_clock(clock.clone());

        let beer = db
            .products()
            .create(NewProduct {
                name: "Cerveja Lata".into(),
                category: "Bebidas".into(),
                price_cents: 800,
                controls_stock: true,
                quantity: Some(12),
                min_quantity: Some(10),
            })
            .await
            .unwrap();
        let fries = db
            .products()
            .create(NewProduct {
                name: "Porção Batata".into(),
                category: "Cozinha".into(),
                price_cents: 2500,
                ..Default::default()
            })
            .await
            .unwrap();
        let table = db.tables().create("4").await.unwrap();
        db.cash().open_register("cashier", 0).await.unwrap();

        let orders = db.orders();

        // Closed by table: 3 beers (one canceled) + fries.
        let first = orders
            .open("a", IdentificationMode::Table, Some(&table.id), None)
            .await
            .unwrap();
        orders.add_item("a", &first.id, &beer.id, 2, None).await.unwrap();
        let extra = orders.add_item("a", &first.id, &beer.id, 1, None).await.unwrap();
        orders.cancel_item("a", &extra.id, None).await.unwrap();
        orders.add_item("a", &first.id, &fries.id, 1, None).await.unwrap();
        orders
            .add_payment("a", &first.id, PaymentMethod::Pix, 4_100)
            .await
            .unwrap();
        clock.advance(Duration::minutes(30));
        orders.close("cashier", &first.id).await.unwrap();

        // Closed by name: 1 beer.
        let second = orders
            .open("a", IdentificationMode::Customer, None, Some("Ana"))
            .await
            .unwrap();
        orders.add_item("a", &second.id, &beer.id, 1, None).await.unwrap();
        orders
            .add_payment("a", &second.id, PaymentMethod::Cash, 800)
            .await
            .unwrap();
        clock.advance(Duration::minutes(30));
        orders.close("cashier", &second.id).await.unwrap();

        // Still open; excluded from sales.
        let third = orders
            .open("a", IdentificationMode::Customer, None, Some("Bia"))
            .await
            .unwrap();
        orders.add_item("a", &third.id, &fries.id, 4, None).await.unwrap();

        let reports = db.reports();
        let to = clock.now() + Duration::seconds(1);

        let summary = reports.day_summary(start(), to).await.unwrap();
        assert_eq!(summary.total_sold_cents, 4_100 + 800);
        assert_eq!(summary.closed_orders, 2);
        assert_eq!(summary.open_orders, 1);
        assert_eq!(summary.average_ticket().cents(), 2_450);

        let sales = reports.sales_by_period(start(), to).await.unwrap();
        assert_eq!(sales.len(), 2);
        assert_eq!(sales[0].order_id, first.id);
        assert_eq!(sales[0].identification(), "4");
        assert_eq!(sales[1].identification(), "Ana");
        assert!(sales[0].closed_at < sales[1].closed_at);

        let top = reports.top_products(start(), to, None).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "Cerveja Lata");
        assert_eq!(top[0].category, "Bebidas");
        assert_eq!(top[1].category, "Cozinha");
        assert_eq!(top[0].quantity, 3);
        assert_eq!(top[0].total_cents, 2_400);
        assert_eq!(top[1].quantity, 1);

        let top = reports.top_products(start(), to, Some(1)).await.unwrap();
        assert_eq!(top.len(), 1);

        // Window before anything closed.
        let empty = reports
            .day_summary(start() - Duration::hours(1), start())
            .await
            .unwrap();
        assert_eq!(empty.total_sold_cents, 0);
        assert_eq!(empty.average_ticket().cents(), 0);

        // `to` is exclusive: a window ending exactly at the second close
        // holds only the first.
        let until_second = reports
            .sales_by_period(start(), sales[1].closed_at)
            .await
            .unwrap();
        assert_eq!(until_second.len(), 1);
        assert_eq!(until_second[0].order_id, first.id);

        // 12 - 3 sold = 9 ≤ min 10.
        let low = reports.low_stock().await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].product.id, beer.id);
        assert_eq!(low[0].stock.as_ref().unwrap().quantity, 9);
    }
}
