//! # barpos-core: Pure Domain Logic for BarPOS
//!
//! This crate holds the rules of the bar's order/cash/stock engine as pure
//! types and functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        BarPOS Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              API collaborator (HTTP, auth, roles)               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ actor id + inputs                      │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               barpos-db (repositories, transactions)           │   │
//! │  │   orders • cash • stock • tables • products • audit • reports  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ calls rules inside each transaction    │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ barpos-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌────────┐  │   │
//! │  │   │  types  │ │  money  │ │  order  │ │   cash   │ │ roles  │  │   │
//! │  │   │ Order   │ │  Money  │ │ guards  │ │ Shift-   │ │ Role → │  │   │
//! │  │   │ Table.. │ │         │ │ close   │ │ Balance  │ │ caps   │  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └──────────┘ └────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Order, CashRegister, etc.)
//! - [`money`] - Money type with integer arithmetic
//! - [`error`] - Typed business failures with stable codes
//! - [`validation`] - Identification and input rules
//! - [`order`] - Order state guards and the close check
//! - [`cash`] - Register shift reconciliation
//! - [`roles`] - Role to capability mapping
//! - [`clock`] - Injectable time source
//!
//! ## Example Usage
//!
//! ```rust
//! use barpos_core::cash::ShiftBalance;
//! use barpos_core::money::Money;
//!
//! let balance = ShiftBalance::reconcile(
//!     Money::from_cents(10_000), // opening float
//!     Money::from_cents(3_000),  // payments during the shift
//!     Money::from_cents(5_000),  // reinforcements
//!     Money::zero(),             // withdrawals
//!     Money::from_cents(18_000), // counted at close
//! );
//! assert!(balance.is_balanced());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cash;
pub mod clock;
pub mod error;
pub mod money;
pub mod order;
pub mod roles;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cash::{ClosedShift, ShiftBalance};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{CoreError, CoreResult, ErrorCategory, ValidationError};
pub use money::Money;
pub use roles::{Capability, Role};
pub use types::*;

/// Generates a new entity id (UUID v4).
///
/// ## Why UUID v4?
/// Ids are created by the application, not the database, so a row's id is
/// known before its INSERT and can be referenced by the audit row written
/// in the same transaction.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
