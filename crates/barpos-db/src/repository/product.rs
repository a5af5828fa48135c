//! # Product Repository
//!
//! Catalog of sellable products and the stock row each stock-controlled
//! product owns.
//!
//! ## Product / Stock Pairing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create(NewProduct { controls_stock: true, quantity: 100, .. })        │
//! │       │                                                                 │
//! │       ▼   one transaction                                               │
//! │  INSERT INTO products ...                                              │
//! │  INSERT INTO stock (product_id, quantity, min_quantity) ...            │
//! │                                                                         │
//! │  controls_stock = false → no stock row, sales never touch inventory    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Products are never deleted: order items keep referencing them. Use
//! `set_active(false)` to take one off the menu.

use std::sync::Arc;

use barpos_core::validation::{validate_name, validate_non_negative};
use barpos_core::{new_id, Clock, CoreError, NewProduct, Product, ProductListing, Stock};
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::DbResult;
use crate::repository::begin_write;
use crate::repository::report::ReportRepository;

const PRODUCT_COLUMNS: &str = "id, name, category, price_cents, is_active, controls_stock, created_at";

/// Flat row of `products LEFT JOIN stock`.
#[derive(sqlx::FromRow)]
pub(crate) struct ListingRow {
    id: String,
    name: String,
    category: String,
    price_cents: i64,
    is_active: bool,
    controls_stock: bool,
    created_at: DateTime<Utc>,
    quantity: Option<i64>,
    min_quantity: Option<i64>,
    stock_updated_at: Option<DateTime<Utc>>,
}

impl From<ListingRow> for ProductListing {
    fn from(row: ListingRow) -> Self {
        let stock = match (row.quantity, row.min_quantity, row.stock_updated_at) {
            (Some(quantity), Some(min_quantity), Some(updated_at)) => Some(Stock {
                product_id: row.id.clone(),
                quantity,
                min_quantity,
                updated_at,
            }),
            _ => None,
        };

        ProductListing {
            product: Product {
                id: row.id,
                name: row.name,
                category: row.category,
                price_cents: row.price_cents,
                is_active: row.is_active,
                controls_stock: row.controls_stock,
                created_at: row.created_at,
            },
            stock,
        }
    }
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let beer = db.products().create(NewProduct {
///     name: "Cerveja Lata".into(),
///     category: "Bebidas".into(),
///     price_cents: 800,
///     controls_stock: true,
///     quantity: Some(100),
///     min_quantity: Some(10),
/// }).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        ProductRepository { pool, clock }
    }

    /// Inserts a product, plus its stock row when it controls stock.
    ///
    /// ## Errors
    /// * `Validation` - blank name/category, negative price or stock
    pub async fn create(&self, input: NewProduct) -> DbResult<Product> {
        let name = validate_name("name", &input.name).map_err(CoreError::from)?;
        let category = validate_name("category", &input.category).map_err(CoreError::from)?;
        validate_non_negative("price_cents", input.price_cents).map_err(CoreError::from)?;
        let quantity = input.quantity.unwrap_or(0);
        let min_quantity = input.min_quantity.unwrap_or(0);
        validate_non_negative("quantity", quantity).map_err(CoreError::from)?;
        validate_non_negative("min_quantity", min_quantity).map_err(CoreError::from)?;

        let now = self.clock.now();
        let product = Product {
            id: new_id(),
            name,
            category,
            price_cents: input.price_cents,
            is_active: true,
            controls_stock: input.controls_stock,
            created_at: now,
        };

        debug!(name = %product.name, controls_stock = product.controls_stock, "Inserting product");

        let mut tx = begin_write(&self.pool).await?;

        sqlx::query(
            r#"
            INSERT INTO products (id, name, category, price_cents, is_active, controls_stock, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.category)
        .bind(product.price_cents)
        .bind(product.is_active)
        .bind(product.controls_stock)
        .bind(product.created_at)
        .execute(&mut *tx)
        .await?;

        if product.controls_stock {
            sqlx::query(
                r#"
                INSERT INTO stock (product_id, quantity, min_quantity, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(&product.id)
            .bind(quantity)
            .bind(min_quantity)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(product_id = %product.id, name = %product.name, "Product created");
        Ok(product)
    }

    /// Gets a product by its ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        self.find_in(&mut conn, id).await
    }

    pub(crate) async fn find_in(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(product)
    }

    /// Lists products with their stock, ordered by category then name.
    pub async fn list(&self, include_inactive: bool) -> DbResult<Vec<ProductListing>> {
        let rows = sqlx::query_as::<_, ListingRow>(
            r#"
            SELECT
                p.id, p.name, p.category, p.price_cents,
                p.is_active, p.controls_stock, p.created_at,
                s.quantity, s.min_quantity, s.updated_at AS stock_updated_at
            FROM products p
            LEFT JOIN stock s ON s.product_id = p.id
            WHERE ?1 OR p.is_active = 1
            ORDER BY p.category, p.name
            "#,
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), "Listed products");
        Ok(rows.into_iter().map(ProductListing::from).collect())
    }

    /// Active stock-controlled products at or below their minimum threshold.
    /// Same listing as [`ReportRepository::low_stock`].
    pub async fn list_low_stock(&self) -> DbResult<Vec<ProductListing>> {
        ReportRepository::new(self.pool.clone()).low_stock().await
    }

    /// Takes a product on or off the menu.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<Product> {
        debug!(id = %id, active, "Setting product active flag");

        let result = sqlx::query("UPDATE products SET is_active = ?2 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ProductNotFound(id.to_string()).into());
        }

        self.get(id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
    }

    /// Changes the menu price. Items already on orders keep their snapshot.
    pub async fn update_price(&self, id: &str, price_cents: i64) -> DbResult<Product> {
        validate_non_negative("price_cents", price_cents).map_err(CoreError::from)?;

        let result = sqlx::query("UPDATE products SET price_cents = ?2 WHERE id = ?1")
            .bind(id)
            .bind(price_cents)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ProductNotFound(id.to_string()).into());
        }

        info!(product_id = %id, price_cents, "Product price updated");
        self.get(id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
    }

    /// Counts products (for seeding and diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
