//! # Order Repository
//!
//! The order engine: open a tab, add and cancel items, take payments, close.
//! Every operation is a single transaction that also moves stock, table
//! occupancy and the audit trail.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Order Lifecycle                                  │
//! │                                                                         │
//! │  1. OPEN                                                               │
//! │     └── open() → Order { status: OPEN, total: 0 }                      │
//! │         requires an open register; TABLE mode occupies the table       │
//! │                                                                         │
//! │  2. IN_PROGRESS                                                        │
//! │     └── add_item()    → snapshot price, stock −qty, total +line        │
//! │     └── cancel_item() → stock +qty, total −line, audit ITEM_CANCELED   │
//! │     └── add_payment() → append (no cap, split tender allowed)          │
//! │     └── convert_identification() → swap table / customer name          │
//! │                                                                         │
//! │  3. CLOSED (terminal)                                                  │
//! │     └── close() → requires items and paid ≥ total                      │
//! │         frees the table, audit ORDER_CLOSED                            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every UPDATE on `orders` carries `AND status <> 'CLOSED'`: if another
//! writer closed the order after we read it, the write matches no row and
//! the whole transaction is abandoned with `OrderAlreadyClosed`.

use std::sync::Arc;

use barpos_core::cash::require_open_for_order;
use barpos_core::order::line_total;
use barpos_core::validation::{normalize_optional, resolve_identification, validate_amount};
use barpos_core::{
    new_id, AuditAction, Clock, CoreError, IdentificationMode, Money, Order, OrderDetails,
    OrderFilter, OrderItem, OrderStatus, Payment, PaymentMethod, TableStatus,
};
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::begin_write;
use crate::repository::audit::AuditRepository;
use crate::repository::cash::CashRepository;
use crate::repository::product::ProductRepository;
use crate::repository::stock::StockRepository;
use crate::repository::table::TableRepository;

const ORDER_COLUMNS: &str =
    "id, mode, table_id, customer_name, status, total_cents, opened_by, opened_at, closed_at";
const ITEM_COLUMNS: &str = "id, order_id, product_id, quantity, note, unit_price_cents, \
                            total_cents, created_at, canceled_at";
const PAYMENT_COLUMNS: &str = "id, order_id, method, amount_cents, paid_at";

/// Repository for orders, their items and payments.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    cash: CashRepository,
    tables: TableRepository,
    products: ProductRepository,
    stock: StockRepository,
    audit: AuditRepository,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        OrderRepository {
            cash: CashRepository::new(pool.clone(), clock.clone()),
            tables: TableRepository::new(pool.clone(), clock.clone()),
            products: ProductRepository::new(pool.clone(), clock.clone()),
            stock: StockRepository::new(pool.clone(), clock.clone()),
            audit: AuditRepository::new(pool.clone(), clock.clone()),
            pool,
            clock,
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Opens a new order.
    ///
    /// ## Errors
    /// * `CashRegisterMustBeOpen`
    /// * `OrderIdentificationRequired` - missing table id / blank customer name
    /// * `TableNotFound`, `TableNotAvailable` - TABLE mode only
    pub async fn open(
        &self,
        actor_id: &str,
        mode: IdentificationMode,
        table_id: Option<&str>,
        customer_name: Option<&str>,
    ) -> DbResult<Order> {
        let mut tx = begin_write(&self.pool).await?;

        require_open_for_order(self.cash.get_open_in(&mut tx).await?)?;
        let identification = resolve_identification(mode, table_id, customer_name)?;

        if let Some(table_id) = identification.table_id() {
            self.tables.assign(&mut tx, table_id).await?;
        }

        let order = Order {
            id: new_id(),
            mode: identification.mode(),
            table_id: identification.table_id().map(str::to_string),
            customer_name: identification.customer_name().map(str::to_string),
            status: OrderStatus::Open,
            total_cents: 0,
            opened_by: actor_id.to_string(),
            opened_at: self.clock.now(),
            closed_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, mode, table_id, customer_name, status,
                total_cents, opened_by, opened_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&order.id)
        .bind(order.mode)
        .bind(&order.table_id)
        .bind(&order.customer_name)
        .bind(order.status)
        .bind(order.total_cents)
        .bind(&order.opened_by)
        .bind(order.opened_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| table_conflict(e, order.table_id.as_deref()))?;

        tx.commit().await?;

        info!(
            order_id = %order.id,
            mode = %order.mode,
            table_id = ?order.table_id,
            opened_by = %actor_id,
            "Order opened"
        );
        Ok(order)
    }

    /// Moves an order between table and customer identification.
    ///
    /// The previously held table is released before the new one is
    /// assigned, so converting to the same table succeeds.
    ///
    /// ## Errors
    /// * `OrderNotFound`, `OrderAlreadyClosed`
    /// * `OrderIdentificationRequired`
    /// * `TableNotFound`, `TableNotAvailable`
    pub async fn convert_identification(
        &self,
        actor_id: &str,
        order_id: &str,
        to: IdentificationMode,
        table_id: Option<&str>,
        customer_name: Option<&str>,
    ) -> DbResult<Order> {
        let mut tx = begin_write(&self.pool).await?;

        let order = self.require_in(&mut tx, order_id).await?;
        order.ensure_mutable()?;
        let identification = resolve_identification(to, table_id, customer_name)?;

        if let Some(previous) = order.table_id.as_deref() {
            self.tables.release(&mut tx, previous).await?;
        }
        if let Some(next) = identification.table_id() {
            self.tables.assign(&mut tx, next).await?;
        }

        let updated = Order {
            mode: identification.mode(),
            table_id: identification.table_id().map(str::to_string),
            customer_name: identification.customer_name().map(str::to_string),
            ..order
        };

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET mode = ?2, table_id = ?3, customer_name = ?4
            WHERE id = ?1 AND status <> 'CLOSED'
            "#,
        )
        .bind(&updated.id)
        .bind(updated.mode)
        .bind(&updated.table_id)
        .bind(&updated.customer_name)
        .execute(&mut *tx)
        .await
        .map_err(|e| table_conflict(e, updated.table_id.as_deref()))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::OrderAlreadyClosed(order_id.to_string()).into());
        }

        tx.commit().await?;

        debug!(
            order_id = %order_id,
            mode = %updated.mode,
            table_id = ?updated.table_id,
            actor = %actor_id,
            "Order identification converted"
        );
        Ok(updated)
    }

    /// Adds `qty` units of a product at its current price.
    ///
    /// ## Errors
    /// * `OrderNotFound`, `OrderAlreadyClosed`
    /// * `ProductNotFound` - missing or inactive
    /// * `InvalidQuantity` - qty ≤ 0
    /// * `StockNotConfigured`, `InsufficientStock` - stock-controlled products
    pub async fn add_item(
        &self,
        actor_id: &str,
        order_id: &str,
        product_id: &str,
        qty: i64,
        note: Option<&str>,
    ) -> DbResult<OrderItem> {
        let mut tx = begin_write(&self.pool).await?;

        let order = self.require_in(&mut tx, order_id).await?;
        order.ensure_mutable()?;

        let product = self
            .products
            .find_in(&mut tx, product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        let total = line_total(product.price(), qty)?;

        if product.controls_stock {
            self.stock.decrement(&mut tx, &product.id, qty).await?;
        }

        let item = OrderItem {
            id: new_id(),
            order_id: order.id.clone(),
            product_id: product.id.clone(),
            quantity: qty,
            note: normalize_optional(note),
            unit_price_cents: product.price_cents,
            total_cents: total.cents(),
            created_at: self.clock.now(),
            canceled_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO order_items (
                id, order_id, product_id, quantity, note,
                unit_price_cents, total_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&item.id)
        .bind(&item.order_id)
        .bind(&item.product_id)
        .bind(item.quantity)
        .bind(&item.note)
        .bind(item.unit_price_cents)
        .bind(item.total_cents)
        .bind(item.created_at)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = ?2, total_cents = total_cents + ?3
            WHERE id = ?1 AND status <> 'CLOSED'
            "#,
        )
        .bind(&order.id)
        .bind(order.status.after_item_added())
        .bind(item.total_cents)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::OrderAlreadyClosed(order.id).into());
        }

        tx.commit().await?;

        debug!(
            order_id = %item.order_id,
            product_id = %item.product_id,
            qty,
            line_total = %total,
            actor = %actor_id,
            "Item added"
        );
        Ok(item)
    }

    /// Cancels an item: restores stock and takes its line off the total.
    ///
    /// The ITEM_CANCELED audit row is attributed to the open register, if any.
    ///
    /// ## Errors
    /// * `ItemNotFound`, `ItemAlreadyCanceled`
    /// * `OrderAlreadyClosed`
    /// * `StockNotConfigured` - stock-controlled product lost its stock row
    pub async fn cancel_item(
        &self,
        actor_id: &str,
        item_id: &str,
        reason: Option<&str>,
    ) -> DbResult<OrderItem> {
        let mut tx = begin_write(&self.pool).await?;

        let item = self
            .find_item_in(&mut tx, item_id)
            .await?
            .ok_or_else(|| CoreError::ItemNotFound(item_id.to_string()))?;
        item.ensure_cancelable()?;

        let order = self.require_in(&mut tx, &item.order_id).await?;
        order.ensure_mutable()?;

        let canceled_at = self.clock.now();
        let result = sqlx::query(
            "UPDATE order_items SET canceled_at = ?2 WHERE id = ?1 AND canceled_at IS NULL",
        )
        .bind(&item.id)
        .bind(canceled_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ItemAlreadyCanceled(item.id).into());
        }

        let controls_stock = self
            .products
            .find_in(&mut tx, &item.product_id)
            .await?
            .map(|p| p.controls_stock)
            .unwrap_or(false);
        if controls_stock {
            self.stock
                .increment(&mut tx, &item.product_id, item.quantity)
                .await?;
        }

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET total_cents = total_cents - ?2
            WHERE id = ?1 AND status <> 'CLOSED'
            "#,
        )
        .bind(&order.id)
        .bind(item.total_cents)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::OrderAlreadyClosed(order.id).into());
        }

        let register = self.cash.get_open_in(&mut tx).await?;
        let reason = normalize_optional(reason);
        self.audit
            .record(
                &mut tx,
                Some(actor_id),
                register.as_ref().map(|r| r.id.as_str()),
                AuditAction::ItemCanceled,
                Some(json!({
                    "itemId": item.id,
                    "orderId": order.id,
                    "productId": item.product_id,
                    "quantity": item.quantity,
                    "totalCents": item.total_cents,
                    "reason": reason,
                })),
            )
            .await?;

        tx.commit().await?;

        info!(
            item_id = %item.id,
            order_id = %order.id,
            actor = %actor_id,
            "Item canceled"
        );
        Ok(OrderItem {
            canceled_at: Some(canceled_at),
            ..item
        })
    }

    /// Appends a payment. Payments are not capped at the balance due.
    ///
    /// ## Errors
    /// * `OrderNotFound`, `OrderAlreadyClosed`
    /// * `InvalidAmount` - amount ≤ 0
    pub async fn add_payment(
        &self,
        actor_id: &str,
        order_id: &str,
        method: PaymentMethod,
        amount_cents: i64,
    ) -> DbResult<Payment> {
        let mut tx = begin_write(&self.pool).await?;

        let order = self.require_in(&mut tx, order_id).await?;
        order.ensure_mutable()?;
        validate_amount(amount_cents)?;

        let payment = Payment {
            id: new_id(),
            order_id: order.id.clone(),
            method,
            amount_cents,
            paid_at: self.clock.now(),
        };

        sqlx::query(
            r#"
            INSERT INTO payments (id, order_id, method, amount_cents, paid_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.order_id)
        .bind(payment.method)
        .bind(payment.amount_cents)
        .bind(payment.paid_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            order_id = %order_id,
            method = ?method,
            amount = %payment.amount(),
            actor = %actor_id,
            "Payment recorded"
        );
        Ok(payment)
    }

    /// Closes an order once it has items and is fully paid.
    ///
    /// ## Errors
    /// * `CashRegisterMustBeOpen`
    /// * `OrderNotFound`, `OrderAlreadyClosed`
    /// * `OrderHasNoItems`
    /// * `InsufficientPayment`
    pub async fn close(&self, actor_id: &str, order_id: &str) -> DbResult<Order> {
        let mut tx = begin_write(&self.pool).await?;

        let register = require_open_for_order(self.cash.get_open_in(&mut tx).await?)?;
        let order = self.require_in(&mut tx, order_id).await?;

        let active_items: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM order_items WHERE order_id = ?1 AND canceled_at IS NULL",
        )
        .bind(&order.id)
        .fetch_one(&mut *tx)
        .await?;
        let paid = self.paid_in(&mut tx, &order.id).await?;

        order.ensure_closable(active_items as usize, paid)?;

        let closed_at = self.clock.now();
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'CLOSED', closed_at = ?2
            WHERE id = ?1 AND status <> 'CLOSED'
            "#,
        )
        .bind(&order.id)
        .bind(closed_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::OrderAlreadyClosed(order.id).into());
        }

        if let Some(table_id) = order.table_id.as_deref() {
            self.tables.release(&mut tx, table_id).await?;
        }

        self.audit
            .record(
                &mut tx,
                Some(actor_id),
                Some(&register.id),
                AuditAction::OrderClosed,
                Some(json!({
                    "orderId": order.id,
                    "totalCents": order.total_cents,
                    "paidCents": paid.cents(),
                })),
            )
            .await?;

        tx.commit().await?;

        info!(
            order_id = %order.id,
            total = %order.total(),
            paid = %paid,
            actor = %actor_id,
            "Order closed"
        );
        Ok(Order {
            status: OrderStatus::Closed,
            closed_at: Some(closed_at),
            ..order
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// An order with its table, items (canceled included) and payments.
    ///
    /// ## Errors
    /// * `OrderNotFound`
    pub async fn get(&self, order_id: &str) -> DbResult<OrderDetails> {
        let mut conn = self.pool.acquire().await?;

        let order = self.require_in(&mut conn, order_id).await?;

        let table = match order.table_id.as_deref() {
            Some(table_id) => self.tables.find_in(&mut conn, table_id).await?,
            None => None,
        };

        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ?1 ORDER BY created_at, rowid"
        );
        let items = sqlx::query_as::<_, OrderItem>(&sql)
            .bind(&order.id)
            .fetch_all(&mut *conn)
            .await?;

        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = ?1 ORDER BY paid_at, rowid"
        );
        let payments = sqlx::query_as::<_, Payment>(&sql)
            .bind(&order.id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(OrderDetails {
            order,
            table,
            items,
            payments,
        })
    }

    /// Orders not yet closed, newest first.
    pub async fn list_active(&self) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE status <> 'CLOSED' \
             ORDER BY opened_at DESC, rowid DESC"
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(orders)
    }

    /// Orders matching `filter`, newest first. Closed orders included.
    pub async fn list(&self, filter: &OrderFilter) -> DbResult<Vec<Order>> {
        let customer = normalize_optional(filter.customer_contains.as_deref());

        let sql = format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE (?1 IS NULL OR status = ?1)
              AND (?2 IS NULL OR table_id = ?2)
              AND (?3 IS NULL OR instr(lower(customer_name), lower(?3)) > 0)
            ORDER BY opened_at DESC, rowid DESC
            "#
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(filter.status)
            .bind(&filter.table_id)
            .bind(&customer)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = orders.len(), ?filter, "Listed orders");
        Ok(orders)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn find_in(&self, conn: &mut SqliteConnection, order_id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(order_id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(order)
    }

    async fn require_in(&self, conn: &mut SqliteConnection, order_id: &str) -> DbResult<Order> {
        self.find_in(conn, order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()).into())
    }

    async fn find_item_in(
        &self,
        conn: &mut SqliteConnection,
        item_id: &str,
    ) -> DbResult<Option<OrderItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE id = ?1");
        let item = sqlx::query_as::<_, OrderItem>(&sql)
            .bind(item_id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(item)
    }

    async fn paid_in(&self, conn: &mut SqliteConnection, order_id: &str) -> DbResult<Money> {
        let paid: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(amount_cents), 0) FROM payments WHERE order_id = ?1")
                .bind(order_id)
                .fetch_one(&mut *conn)
                .await?;

        Ok(Money::from_cents(paid))
    }
}

/// A second non-closed order on a table trips `idx_orders_active_table`.
fn table_conflict(err: sqlx::Error, table_id: Option<&str>) -> DbError {
    match (DbError::from(err), table_id) {
        (err, Some(table_id)) if err.is_unique_on("orders.table_id") => {
            CoreError::TableNotAvailable {
                table_id: table_id.to_string(),
                status: TableStatus::Occupied,
            }
            .into()
        }
        (err, _) => err,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
