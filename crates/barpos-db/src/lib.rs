//! # barpos-db: Database Layer for BarPOS
//!
//! Storage and transactional engine for the bar's orders, register shifts,
//! stock and tables. SQLite through sqlx; every mutating call is one
//! transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        BarPOS Data Flow                                 │
//! │                                                                         │
//! │  API layer (actor id from auth)                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     barpos-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ OrderRepo     │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ CashRepo      │    │ 001_initial_ │  │   │
//! │  │   │ WAL + busy    │    │ StockRepo ..  │    │   schema.sql │  │   │
//! │  │   │ Clock         │    │               │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   $BARPOS_DATABASE_PATH (default ./barpos.db)                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (orders, cash, stock, ...)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use barpos_db::{Database, DbConfig};
//! use barpos_core::{IdentificationMode, PaymentMethod};
//!
//! let db = Database::new(DbConfig::from_env()).await?;
//!
//! db.cash().open_register(cashier_id, 10_000).await?;
//! let order = db.orders()
//!     .open(attendant_id, IdentificationMode::Table, Some(&table_id), None)
//!     .await?;
//! db.orders().add_item(attendant_id, &order.id, &beer_id, 3, None).await?;
//! db.orders().add_payment(cashier_id, &order.id, PaymentMethod::Pix, 2_400).await?;
//! db.orders().close(cashier_id, &order.id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::audit::AuditRepository;
pub use repository::cash::CashRepository;
pub use repository::order::OrderRepository;
pub use repository::product::ProductRepository;
pub use repository::report::ReportRepository;
pub use repository::stock::{StockAdjustment, StockRepository};
pub use repository::table::TableRepository;
