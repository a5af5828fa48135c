//! # Order Rules
//!
//! The pure half of the order engine: state guards and the close check.
//! The storage half lives in `barpos-db::repository::order` and calls these
//! inside its transactions.
//!
//! ## State Machine
//! ```text
//!   open()            add_item() (first)           close()
//!  ───────► OPEN ─────────────────────► IN_PROGRESS ───────► CLOSED
//!             │                              ▲                 │
//!             └──────── close() is refused ──┘                 │
//!                   (OrderHasNoItems)                          ▼
//!                                                 every mutation refused
//!                                                 (OrderAlreadyClosed)
//! ```

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Order, OrderItem, OrderStatus};
use crate::validation::validate_quantity;

impl OrderStatus {
    #[inline]
    pub fn is_closed(&self) -> bool {
        matches!(self, OrderStatus::Closed)
    }

    /// Status after an item has been added.
    pub fn after_item_added(self) -> OrderStatus {
        match self {
            OrderStatus::Open | OrderStatus::InProgress => OrderStatus::InProgress,
            OrderStatus::Closed => OrderStatus::Closed,
        }
    }
}

impl Order {
    /// Fails with `OrderAlreadyClosed` once the order is terminal.
    pub fn ensure_mutable(&self) -> CoreResult<()> {
        if self.status.is_closed() {
            return Err(CoreError::OrderAlreadyClosed(self.id.clone()));
        }
        Ok(())
    }

    /// Checks every precondition of closing except the open-register gate.
    ///
    /// ## Rules
    /// 1. Order must not be CLOSED already
    /// 2. At least one non-canceled item
    /// 3. Sum of payments ≥ total (overpayment is accepted as-is)
    pub fn ensure_closable(&self, active_items: usize, paid: Money) -> CoreResult<()> {
        self.ensure_mutable()?;

        if active_items == 0 {
            return Err(CoreError::OrderHasNoItems(self.id.clone()));
        }

        if paid < self.total() {
            return Err(CoreError::InsufficientPayment {
                order_id: self.id.clone(),
                total_cents: self.total_cents,
                paid_cents: paid.cents(),
            });
        }

        Ok(())
    }
}

impl OrderItem {
    /// Fails with `ItemAlreadyCanceled` if the item was canceled before.
    pub fn ensure_cancelable(&self) -> CoreResult<()> {
        if self.is_canceled() {
            return Err(CoreError::ItemAlreadyCanceled(self.id.clone()));
        }
        Ok(())
    }
}

/// Computes the frozen line total for `qty` units at `unit_price`.
///
/// ## Example
/// ```rust
/// use barpos_core::money::Money;
/// use barpos_core::order::line_total;
///
/// assert_eq!(line_total(Money::from_cents(800), 3).unwrap().cents(), 2400);
/// assert!(line_total(Money::from_cents(800), 0).is_err());
/// ```
pub fn line_total(unit_price: Money, qty: i64) -> CoreResult<Money> {
    validate_quantity(qty)?;
    unit_price
        .checked_multiply_quantity(qty)
        .ok_or(CoreError::InvalidQuantity(qty))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IdentificationMode;
    use chrono::Utc;

    fn order(status: OrderStatus, total: i64) -> Order {
        Order {
            id: "order-1".into(),
            mode: IdentificationMode::Customer,
            table_id: None,
            customer_name: Some("Caio".into()),
            status,
            total_cents: total,
            opened_by: "u1".into(),
            opened_at: Utc::now(),
            closed_at: None,
        }
    }

    #[test]
    fn test_status_transitions() {
        assert_eq!(OrderStatus::Open.after_item_added(), OrderStatus::InProgress);
        assert_eq!(OrderStatus::InProgress.after_item_added(), OrderStatus::InProgress);
        assert!(OrderStatus::Closed.is_closed());
    }

    #[test]
    fn test_closed_order_is_immutable() {
        let err = order(OrderStatus::Closed, 0).ensure_mutable().unwrap_err();
        assert!(matches!(err, CoreError::OrderAlreadyClosed(id) if id == "order-1"));
        assert!(order(OrderStatus::Open, 0).ensure_mutable().is_ok());
    }

    #[test]
    fn test_close_requires_items() {
        let err = order(OrderStatus::Open, 0)
            .ensure_closable(0, Money::zero())
            .unwrap_err();
        assert_eq!(err.code(), "ORDER_HAS_NO_ITEMS");
    }

    #[test]
    fn test_close_requires_full_payment() {
        let o = order(OrderStatus::InProgress, 2000);

        let err = o.ensure_closable(1, Money::from_cents(1500)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientPayment { total_cents: 2000, paid_cents: 1500, .. }
        ));

        assert!(o.ensure_closable(1, Money::from_cents(2000)).is_ok());
        // Overpayment is accepted, no change-due logic.
        assert!(o.ensure_closable(1, Money::from_cents(5000)).is_ok());
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line_total(Money::from_cents(800), 3).unwrap().cents(), 2400);
        assert!(matches!(
            line_total(Money::from_cents(800), -1),
            Err(CoreError::InvalidQuantity(-1))
        ));
        assert!(line_total(Money::from_cents(i64::MAX), 2).is_err());
    }
}
