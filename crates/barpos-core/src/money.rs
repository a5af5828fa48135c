//! # Money
//!
//! Every amount in BarPOS is an `i64` count of centavos: prices, line
//! totals, payments, register floats, cash movements and discrepancies.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  price 800 × qty 3        = 2400          (line total, frozen)         │
//! │  Σ active line totals     = order total                                │
//! │  closing − expected       = discrepancy   (signed, may be negative)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Storage columns hold the raw cents; `Money` is the arithmetic view.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use ts_rs::TS;

/// An amount in centavos. Signed: balances and discrepancies go negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// `self × qty`, or `None` on overflow.
    ///
    /// ```rust
    /// use barpos_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(800).checked_multiply_quantity(3), Some(Money::from_cents(2400)));
    /// assert_eq!(Money::from_cents(800).checked_multiply_quantity(i64::MAX), None);
    /// ```
    #[inline]
    pub fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        self.0.checked_mul(qty).map(Money)
    }
}

/// Log-friendly form, e.g. `R$ 10,99`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}R$ {},{:02}", sign, abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_in_reais() {
        assert_eq!(Money::from_cents(1099).to_string(), "R$ 10,99");
        assert_eq!(Money::from_cents(500).to_string(), "R$ 5,00");
        assert_eq!(Money::from_cents(-550).to_string(), "-R$ 5,50");
        assert_eq!(Money::zero().to_string(), "R$ 0,00");
    }

    #[test]
    fn test_discrepancy_arithmetic() {
        let expected = Money::from_cents(10_000) + Money::from_cents(3_000);
        let counted = Money::from_cents(12_500);
        assert_eq!((counted - expected).cents(), -500);
        assert_eq!((-(counted - expected)).cents(), 500);

        let mut drawer = Money::from_cents(10_000);
        drawer += Money::from_cents(5_000);
        drawer -= Money::from_cents(2_000);
        assert_eq!(drawer.cents(), 13_000);
    }

    #[test]
    fn test_sum_of_payments() {
        let paid: Money = [1_500, 500].into_iter().map(Money::from_cents).sum();
        assert_eq!(paid.cents(), 2_000);

        let none: Money = std::iter::empty().sum();
        assert!(none.is_zero());
    }

    #[test]
    fn test_serializes_as_plain_cents() {
        assert_eq!(serde_json::to_string(&Money::from_cents(2400)).unwrap(), "2400");
    }
}
