//! # Shift Reconciliation
//!
//! Expected-balance math for closing a register.
//!
//! ```text
//! expected    = opening float
//!             + Σ payments with paid_at in [opened_at, closed_at]
//!             + Σ reinforcements of this shift
//!             − Σ withdrawals of this shift
//! discrepancy = counted closing float − expected
//! ```
//!
//! A discrepancy is recorded for review and never blocks the close.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{CashRegister, CashRegisterStatus};

/// The reconciliation figures written to the audit trail at close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShiftBalance {
    pub opening_float_cents: i64,
    pub payments_cents: i64,
    pub reinforcements_cents: i64,
    pub withdrawals_cents: i64,
    pub expected_cents: i64,
    pub closing_float_cents: i64,
    /// Positive when the drawer holds more than expected.
    pub discrepancy_cents: i64,
}

impl ShiftBalance {
    pub fn reconcile(
        opening_float: Money,
        payments: Money,
        reinforcements: Money,
        withdrawals: Money,
        closing_float: Money,
    ) -> Self {
        let expected = opening_float + payments + reinforcements - withdrawals;
        let discrepancy = closing_float - expected;

        ShiftBalance {
            opening_float_cents: opening_float.cents(),
            payments_cents: payments.cents(),
            reinforcements_cents: reinforcements.cents(),
            withdrawals_cents: withdrawals.cents(),
            expected_cents: expected.cents(),
            closing_float_cents: closing_float.cents(),
            discrepancy_cents: discrepancy.cents(),
        }
    }

    /// Net effect of cash movements.
    pub fn movements_net(&self) -> Money {
        Money::from_cents(self.reinforcements_cents - self.withdrawals_cents)
    }

    pub fn expected(&self) -> Money {
        Money::from_cents(self.expected_cents)
    }

    pub fn discrepancy(&self) -> Money {
        Money::from_cents(self.discrepancy_cents)
    }

    pub fn is_balanced(&self) -> bool {
        self.discrepancy_cents == 0
    }
}

/// Result of closing a register: the closed row and its reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ClosedShift {
    pub register: CashRegister,
    pub balance: ShiftBalance,
}

impl CashRegister {
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == CashRegisterStatus::Open
    }

    pub fn opening_float(&self) -> Money {
        Money::from_cents(self.opening_float_cents)
    }
}

/// Turns "no open register" into the error the order engine reports.
pub fn require_open_for_order(register: Option<CashRegister>) -> CoreResult<CashRegister> {
    register.ok_or(CoreError::CashRegisterMustBeOpen)
}

/// Turns "no open register" into the error the register ledger reports.
pub fn require_open_for_ledger(register: Option<CashRegister>) -> CoreResult<CashRegister> {
    register.ok_or(CoreError::NoOpenCashRegister)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_balanced_shift() {
        let balance = ShiftBalance::reconcile(
            Money::from_cents(10_000),
            Money::from_cents(3_000),
            Money::from_cents(5_000),
            Money::zero(),
            Money::from_cents(18_000),
        );

        assert_eq!(balance.expected_cents, 18_000);
        assert!(balance.is_balanced());
        assert_eq!(balance.movements_net().cents(), 5_000);
    }

    #[test]
    fn test_short_drawer() {
        let balance = ShiftBalance::reconcile(
            Money::from_cents(10_000),
            Money::from_cents(2_500),
            Money::zero(),
            Money::from_cents(4_000),
            Money::from_cents(8_000),
        );

        assert_eq!(balance.expected_cents, 8_500);
        assert_eq!(balance.discrepancy().cents(), -500);
        assert_eq!(balance.movements_net().cents(), -4_000);
    }

    #[test]
    fn test_require_open() {
        assert!(matches!(
            require_open_for_order(None),
            Err(CoreError::CashRegisterMustBeOpen)
        ));
        assert!(matches!(
            require_open_for_ledger(None),
            Err(CoreError::NoOpenCashRegister)
        ));

        let register = CashRegister {
            id: "r1".into(),
            status: CashRegisterStatus::Open,
            opened_by: "u1".into(),
            opening_float_cents: 100,
            opened_at: Utc::now(),
            closed_at: None,
            closing_float_cents: None,
        };
        let register = require_open_for_order(Some(register)).unwrap();
        assert!(register.is_open());
        assert_eq!(register.opening_float().cents(), 100);
    }
}
