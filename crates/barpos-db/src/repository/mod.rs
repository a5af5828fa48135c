//! # Repository Module
//!
//! Database repository implementations for BarPOS.
//!
//! ## Repository Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Who Calls Whom Inside a Transaction                  │
//! │                                                                         │
//! │  OrderRepository                  CashRepository                       │
//! │  ├── open / convert ──► TableRepository::assign / release              │
//! │  ├── add / cancel   ──► StockRepository::decrement / increment         │
//! │  ├── open / close   ──► CashRepository::get_open_in                    │
//! │  └── cancel / close ──► AuditRepository::record ◄── open / close /     │
//! │                                                     record_movement    │
//! │                                                                         │
//! │  Every write starts with `begin_write` (BEGIN IMMEDIATE). The          │
//! │  `*_in(conn, ..)` helpers run on the caller's transaction             │
//! │  connection; they never touch the pool.                                │
//! │                                                                         │
//! │  ReportRepository reads only.                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`OrderRepository`] - Order lifecycle, items, payments
//! - [`CashRepository`] - Register shifts and cash movements
//! - [`StockRepository`] - Inventory levels
//! - [`TableRepository`] - Tables and occupancy
//! - [`ProductRepository`] - Catalog
//! - [`AuditRepository`] - Append-only audit trail
//! - [`ReportRepository`] - Sales aggregates
//!
//! [`OrderRepository`]: order::OrderRepository
//! [`CashRepository`]: cash::CashRepository
//! [`StockRepository`]: stock::StockRepository
//! [`TableRepository`]: table::TableRepository
//! [`ProductRepository`]: product::ProductRepository
//! [`AuditRepository`]: audit::AuditRepository
//! [`ReportRepository`]: report::ReportRepository

pub mod audit;
pub mod cash;
pub mod order;
pub mod product;
pub mod report;
pub mod stock;
pub mod table;

use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::DbResult;

/// Opens a transaction that takes the SQLite write lock up front.
///
/// Concurrent writers wait here, up to `busy_timeout`, before reading
/// anything. A deferred `BEGIN` would let a writer read a snapshot that a
/// competing commit makes stale, and its first write would then fail with
/// `database is locked` without waiting.
pub(crate) async fn begin_write(pool: &SqlitePool) -> DbResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}
