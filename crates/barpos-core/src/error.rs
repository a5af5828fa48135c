//! # Error Types
//!
//! Domain-specific error types for barpos-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  barpos-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule failures (typed, stable code)    │
//! │  └── ValidationError  - Catalog input validation failures              │
//! │                                                                         │
//! │  barpos-db errors (separate crate)                                     │
//! │  └── DbError          - Storage failures, wraps CoreError as Domain    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError::Domain → API layer       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every [`CoreError`] is a precondition the caller can fix (open the
//! register, pick a free table, pay the rest). Codes from
//! [`CoreError::code`] are stable and safe to show to clients.

use serde::Serialize;
use thiserror::Error;

use crate::types::{IdentificationMode, TableStatus};

// =============================================================================
// Core Error
// =============================================================================

/// Business rule failures raised by the order, cash, stock and table logic.
///
/// Any of these aborts the enclosing transaction. The API collaborator maps
/// [`CoreError::code`] onto whatever transport it speaks.
#[derive(Debug, Error)]
pub enum CoreError {
    // ---- identification -----------------------------------------------------
    /// TABLE mode without a table id, or CUSTOMER mode with a blank name.
    #[error("Order identification required for {0} mode")]
    OrderIdentificationRequired(IdentificationMode),

    // ---- not found ----------------------------------------------------------
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Product is missing or has been deactivated.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Order item not found: {0}")]
    ItemNotFound(String),

    // ---- state conflicts ----------------------------------------------------
    /// The order is CLOSED; every mutating operation is rejected.
    #[error("Order {0} is already closed")]
    OrderAlreadyClosed(String),

    #[error("Order item {0} is already canceled")]
    ItemAlreadyCanceled(String),

    #[error("Table {table_id} is not available (currently {status})")]
    TableNotAvailable { table_id: String, status: TableStatus },

    #[error("A cash register is already open")]
    CashRegisterAlreadyOpen,

    /// Raised by the register ledger's own writes.
    #[error("No cash register is open")]
    NoOpenCashRegister,

    /// Raised by the order engine when a financial operation needs a shift.
    #[error("A cash register must be open for this operation")]
    CashRegisterMustBeOpen,

    #[error("Order {0} has no active items")]
    OrderHasNoItems(String),

    /// ## User Workflow
    /// ```text
    /// Order total: 2000, paid: 1500
    ///      │
    ///      ▼
    /// close() → InsufficientPayment { total: 2000, paid: 1500 }
    ///      │
    ///      ▼
    /// add_payment(500) → close() succeeds
    /// ```
    #[error("Order {order_id} is underpaid: total {total_cents}, paid {paid_cents}")]
    InsufficientPayment {
        order_id: String,
        total_cents: i64,
        paid_cents: i64,
    },

    #[error("Insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// Product controls stock but has no stock row.
    #[error("Stock not configured for product {0}")]
    StockNotConfigured(String),

    #[error("Product {0} does not control stock")]
    ProductDoesNotControlStock(String),

    // ---- input validity -----------------------------------------------------
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Coarse classification of a [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Identification,
    NotFound,
    Conflict,
    InvalidInput,
}

impl CoreError {
    /// Stable machine-readable code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::OrderIdentificationRequired(_) => "ORDER_IDENTIFICATION_REQUIRED",
            CoreError::OrderNotFound(_) => "ORDER_NOT_FOUND",
            CoreError::TableNotFound(_) => "TABLE_NOT_FOUND",
            CoreError::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            CoreError::ItemNotFound(_) => "ITEM_NOT_FOUND",
            CoreError::OrderAlreadyClosed(_) => "ORDER_ALREADY_CLOSED",
            CoreError::ItemAlreadyCanceled(_) => "ITEM_ALREADY_CANCELED",
            CoreError::TableNotAvailable { .. } => "TABLE_NOT_AVAILABLE",
            CoreError::CashRegisterAlreadyOpen => "CASH_REGISTER_ALREADY_OPEN",
            CoreError::NoOpenCashRegister => "NO_OPEN_CASH_REGISTER",
            CoreError::CashRegisterMustBeOpen => "CASH_REGISTER_MUST_BE_OPEN",
            CoreError::OrderHasNoItems(_) => "ORDER_HAS_NO_ITEMS",
            CoreError::InsufficientPayment { .. } => "INSUFFICIENT_PAYMENT",
            CoreError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            CoreError::StockNotConfigured(_) => "STOCK_NOT_CONFIGURED",
            CoreError::ProductDoesNotControlStock(_) => "PRODUCT_DOES_NOT_CONTROL_STOCK",
            CoreError::InvalidQuantity(_) => "INVALID_QUANTITY",
            CoreError::InvalidAmount(_) => "INVALID_AMOUNT",
            CoreError::Validation(_) => "VALIDATION_ERROR",
        }
    }

    /// Which family of failure this is.
    pub fn category(&self) -> ErrorCategory {
        match self {
            CoreError::OrderIdentificationRequired(_) => ErrorCategory::Identification,
            CoreError::OrderNotFound(_)
            | CoreError::TableNotFound(_)
            | CoreError::ProductNotFound(_)
            | CoreError::ItemNotFound(_) => ErrorCategory::NotFound,
            CoreError::InvalidQuantity(_)
            | CoreError::InvalidAmount(_)
            | CoreError::Validation(_) => ErrorCategory::InvalidInput,
            _ => ErrorCategory::Conflict,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for catalog inputs (product names, prices, table labels, floats)
/// where the failure has no dedicated business variant.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
