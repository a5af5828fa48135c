//! # Domain Types
//!
//! Core domain types used throughout BarPOS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Order      │   │  CashRegister   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  price_cents    │   │  mode + table/  │   │  status         │       │
//! │  │  controls_stock │   │    customer     │   │  opening_float  │       │
//! │  │       │         │   │  status         │   │  closing_float  │       │
//! │  │       ▼         │   │  total_cents    │   │       │         │       │
//! │  │    Stock        │   │   │        │    │   │       ▼         │       │
//! │  │  quantity ≥ 0   │   │   ▼        ▼    │   │  CashMovement   │       │
//! │  └─────────────────┘   │ OrderItem Payment│   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! │  ┌─────────────────┐   ┌─────────────────┐                              │
//! │  │     Table       │   │  AuditLogEntry  │                              │
//! │  │  FREE/OCCUPIED/ │   │  append-only    │                              │
//! │  │  AWAITING_PAY.  │   └─────────────────┘                              │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Enum values serialize (and are stored) as SCREAMING_SNAKE_CASE.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Product & Stock
// =============================================================================

/// A product on the menu.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category: String,
    /// Current price in cents. Copied into each item at add time.
    pub price_cents: i64,
    /// Inactive products cannot be added to orders.
    pub is_active: bool,
    /// Whether a sale decrements a [`Stock`] row.
    pub controls_stock: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// Inventory level of a stock-controlled product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Stock {
    pub product_id: String,
    pub quantity: i64,
    /// Advisory threshold; only the low-stock report looks at it.
    pub min_quantity: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Stock {
    /// At or below the minimum threshold.
    pub fn is_low(&self) -> bool {
        self.quantity <= self.min_quantity
    }
}

/// A product together with its stock row (if it controls stock).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductListing {
    pub product: Product,
    pub stock: Option<Stock>,
}

/// Input for creating a product.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    pub price_cents: i64,
    pub controls_stock: bool,
    /// Initial stock quantity; defaults to 0.
    pub quantity: Option<i64>,
    /// Minimum stock threshold; defaults to 0.
    pub min_quantity: Option<i64>,
}

// =============================================================================
// Table
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableStatus {
    Free,
    Occupied,
    AwaitingPayment,
}

impl TableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableStatus::Free => "FREE",
            TableStatus::Occupied => "OCCUPIED",
            TableStatus::AwaitingPayment => "AWAITING_PAYMENT",
        }
    }
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A physical table in the venue.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Table {
    pub id: String,
    /// Display name or number ("12", "Terrace 3").
    pub label: String,
    pub status: TableStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Order
// =============================================================================

/// How an order is identified on the floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentificationMode {
    Table,
    Customer,
}

impl fmt::Display for IdentificationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentificationMode::Table => f.write_str("TABLE"),
            IdentificationMode::Customer => f.write_str("CUSTOMER"),
        }
    }
}

/// A validated identification: exactly one of table or customer name.
///
/// Built by [`crate::validation::resolve_identification`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identification {
    Table(String),
    Customer(String),
}

impl Identification {
    pub fn mode(&self) -> IdentificationMode {
        match self {
            Identification::Table(_) => IdentificationMode::Table,
            Identification::Customer(_) => IdentificationMode::Customer,
        }
    }

    pub fn table_id(&self) -> Option<&str> {
        match self {
            Identification::Table(id) => Some(id),
            Identification::Customer(_) => None,
        }
    }

    pub fn customer_name(&self) -> Option<&str> {
        match self {
            Identification::Table(_) => None,
            Identification::Customer(name) => Some(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Created, no item added yet.
    Open,
    /// At least one item was added.
    InProgress,
    /// Terminal.
    Closed,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Open
    }
}

/// An open tab.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub mode: IdentificationMode,
    pub table_id: Option<String>,
    pub customer_name: Option<String>,
    pub status: OrderStatus,
    /// Sum of `total_cents` over non-canceled items.
    pub total_cents: i64,
    pub opened_by: String,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
}

/// Criteria for listing orders. Every field is optional; an empty filter lists every order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub table_id: Option<String>,
    /// Case-insensitive substring of the customer name.
    pub customer_contains: Option<String>,
}

impl Order {
    /// Returns the running total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A line on an order. Uses snapshot pattern to freeze the price.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub note: Option<String>,
    /// Unit price at time of sale (frozen).
    pub unit_price_cents: i64,
    /// unit_price × quantity (frozen).
    pub total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    /// `None` while the item is active.
    #[ts(as = "Option<String>")]
    pub canceled_at: Option<DateTime<Utc>>,
}

impl OrderItem {
    #[inline]
    pub fn is_canceled(&self) -> bool {
        self.canceled_at.is_some()
    }

    /// Returns the line total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Payment
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Credit,
    Debit,
    Pix,
    Cash,
}

/// A payment towards an order. Append-only.
/// An order can have several payments (split tender).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub paid_at: DateTime<Utc>,
}

impl Payment {
    /// Returns the payment amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// Read projection of an order with its lines and payments.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderDetails {
    pub order: Order,
    pub table: Option<Table>,
    /// Creation order, canceled items included.
    pub items: Vec<OrderItem>,
    /// Payment order.
    pub payments: Vec<Payment>,
}

impl OrderDetails {
    /// Sum of all recorded payments.
    pub fn paid(&self) -> Money {
        self.payments.iter().map(Payment::amount).sum()
    }

    /// Items that have not been canceled.
    pub fn active_items(&self) -> impl Iterator<Item = &OrderItem> {
        self.items.iter().filter(|item| !item.is_canceled())
    }

    /// Total still owed; negative when overpaid.
    pub fn balance_due(&self) -> Money {
        self.order.total() - self.paid()
    }
}

// =============================================================================
// Cash Register
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CashRegisterStatus {
    Open,
    Closed,
}

/// One register shift.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashRegister {
    pub id: String,
    pub status: CashRegisterStatus,
    pub opened_by: String,
    pub opening_float_cents: i64,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
    /// Counted cash, set only at close.
    pub closing_float_cents: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    /// Cash taken out of the drawer.
    Withdrawal,
    /// Cash put into the drawer.
    Reinforcement,
}

/// An in-shift cash adjustment not tied to an order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashMovement {
    pub id: String,
    pub register_id: String,
    pub performed_by: String,
    pub kind: MovementKind,
    pub amount_cents: i64,
    pub reason: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl CashMovement {
    /// Effect on the drawer: positive for reinforcements.
    pub fn signed_amount(&self) -> Money {
        match self.kind {
            MovementKind::Reinforcement => Money::from_cents(self.amount_cents),
            MovementKind::Withdrawal => Money::from_cents(-self.amount_cents),
        }
    }
}

// =============================================================================
// Audit
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    StockAdjustment,
    RegisterOpened,
    RegisterClosed,
    ItemCanceled,
    OrderClosed,
    Withdrawal,
    Reinforcement,
}

impl From<MovementKind> for AuditAction {
    fn from(kind: MovementKind) -> Self {
        match kind {
            MovementKind::Withdrawal => AuditAction::Withdrawal,
            MovementKind::Reinforcement => AuditAction::Reinforcement,
        }
    }
}

/// An append-only audit row.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct AuditLogEntry {
    pub id: String,
    pub actor_id: Option<String>,
    pub register_id: Option<String>,
    pub action: AuditAction,
    /// Opaque JSON document.
    pub details_json: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Reports
// =============================================================================

/// Totals for a time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DaySummary {
    /// Sum of totals of orders closed in the window.
    pub total_sold_cents: i64,
    pub closed_orders: i64,
    /// Orders not yet closed, regardless of window.
    pub open_orders: i64,
}

impl DaySummary {
    pub fn total_sold(&self) -> Money {
        Money::from_cents(self.total_sold_cents)
    }

    /// Average ticket; zero when nothing was closed.
    pub fn average_ticket(&self) -> Money {
        if self.closed_orders == 0 {
            return Money::zero();
        }
        Money::from_cents(self.total_sold_cents / self.closed_orders)
    }
}

/// One closed order in a sales listing.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleRecord {
    pub order_id: String,
    #[ts(as = "String")]
    pub closed_at: DateTime<Utc>,
    pub total_cents: i64,
    pub mode: IdentificationMode,
    pub table_label: Option<String>,
    pub customer_name: Option<String>,
}

impl SaleRecord {
    /// Table label or customer name, whichever identifies the order.
    pub fn identification(&self) -> &str {
        self.table_label
            .as_deref()
            .or(self.customer_name.as_deref())
            .unwrap_or("")
    }
}

/// Units and revenue of one product over a window.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TopProduct {
    pub product_id: String,
    pub name: String,
    pub category: String,
    pub quantity: i64,
    pub total_cents: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(total: i64, canceled: bool) -> OrderItem {
        OrderItem {
            id: "i".into(),
            order_id: "o".into(),
            product_id: "p".into(),
            quantity: 1,
            note: None,
            unit_price_cents: total,
            total_cents: total,
            created_at: Utc::now(),
            canceled_at: canceled.then(Utc::now),
        }
    }

    #[test]
    fn test_order_status_default() {
        assert_eq!(OrderStatus::default(), OrderStatus::Open);
    }

    #[test]
    fn test_enum_serialization_matches_storage() {
        assert_eq!(
            serde_json::to_string(&TableStatus::AwaitingPayment).unwrap(),
            "\"AWAITING_PAYMENT\""
        );
        assert_eq!(
            serde_json::to_string(&OrderStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
        assert_eq!(serde_json::to_string(&PaymentMethod::Pix).unwrap(), "\"PIX\"");
    }

    #[test]
    fn test_identification_accessors() {
        let by_table = Identification::Table("t1".into());
        assert_eq!(by_table.mode(), IdentificationMode::Table);
        assert_eq!(by_table.table_id(), Some("t1"));
        assert_eq!(by_table.customer_name(), None);

        let by_name = Identification::Customer("Ana".into());
        assert_eq!(by_name.mode(), IdentificationMode::Customer);
        assert_eq!(by_name.customer_name(), Some("Ana"));
    }

    #[test]
    fn test_order_details_balance() {
        let now = Utc::now();
        let details = OrderDetails {
            order: Order {
                id: "o".into(),
                mode: IdentificationMode::Customer,
                table_id: None,
                customer_name: Some("Ana".into()),
                status: OrderStatus::InProgress,
                total_cents: 2000,
                opened_by: "u".into(),
                opened_at: now,
                closed_at: None,
            },
            table: None,
            items: vec![item(2000, false), item(500, true)],
            payments: vec![Payment {
                id: "p".into(),
                order_id: "o".into(),
                method: PaymentMethod::Cash,
                amount_cents: 1500,
                paid_at: now,
            }],
        };

        assert_eq!(details.active_items().count(), 1);
        assert_eq!(details.paid().cents(), 1500);
        assert_eq!(details.balance_due().cents(), 500);
    }

    #[test]
    fn test_movement_sign() {
        let mut movement = CashMovement {
            id: "m".into(),
            register_id: "r".into(),
            performed_by: "u".into(),
            kind: MovementKind::Withdrawal,
            amount_cents: 700,
            reason: None,
            created_at: Utc::now(),
        };
        assert_eq!(movement.signed_amount().cents(), -700);
        movement.kind = MovementKind::Reinforcement;
        assert_eq!(movement.signed_amount().cents(), 700);
        assert_eq!(AuditAction::from(movement.kind), AuditAction::Reinforcement);
    }
}
