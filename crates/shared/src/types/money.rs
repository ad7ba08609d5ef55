//! Money type with fixed 2-decimal scale.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! This type wraps `rust_decimal::Decimal` for exact arithmetic.
//! The deployment is single-currency, so no currency code is carried.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when constructing a [`Money`] value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    /// The amount is negative.
    #[error("Amount cannot be negative: {0}")]
    Negative(Decimal),

    /// The amount has more than 2 decimal places.
    #[error("Amount has more than 2 decimal places: {0}")]
    TooPrecise(Decimal),
}

/// A non-negative monetary amount with at most 2 decimal places.
///
/// Uses `Decimal` internally to avoid floating-point precision errors.
/// All ledger amounts (session prices, tenders, credit balances) are
/// `Money` values; negative or over-precise inputs are rejected at
/// construction.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// The zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Creates a `Money` value, validating sign and scale.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Negative` for negative amounts and
    /// `MoneyError::TooPrecise` for amounts with more than 2 decimal
    /// places.
    pub fn try_new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative(amount));
        }
        let normalized = amount.normalize();
        if normalized.scale() > 2 {
            return Err(MoneyError::TooPrecise(amount));
        }
        Ok(Self(normalized))
    }

    /// Returns the inner decimal amount.
    #[must_use]
    pub const fn amount(self) -> Decimal {
        self.0
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the amount is strictly positive.
    #[must_use]
    pub fn is_positive(self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Adds two amounts.
    #[must_use]
    pub fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }

    /// Subtracts `other`, clamping at zero.
    ///
    /// Debt arithmetic never goes negative; an over-payment is handled
    /// separately as a credit delta.
    #[must_use]
    pub fn saturating_sub(self, other: Self) -> Self {
        if other.0 >= self.0 {
            Self::ZERO
        } else {
            Self(self.0 - other.0)
        }
    }

    /// Subtracts `other`, returning `None` if the result would be negative.
    #[must_use]
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        if other.0 > self.0 {
            None
        } else {
            Some(Self(self.0 - other.0))
        }
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Self::add)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::try_new(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.amount()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_try_new() {
        let money = Money::try_new(dec!(100.50)).unwrap();
        assert_eq!(money.amount(), dec!(100.50));
    }

    #[test]
    fn test_money_rejects_negative() {
        assert_eq!(
            Money::try_new(dec!(-10)),
            Err(MoneyError::Negative(dec!(-10)))
        );
    }

    #[test]
    fn test_money_rejects_over_precision() {
        assert_eq!(
            Money::try_new(dec!(10.005)),
            Err(MoneyError::TooPrecise(dec!(10.005)))
        );
    }

    #[test]
    fn test_money_accepts_trailing_zero_scale() {
        // 10.500 normalizes to 10.5, which is within 2 decimal places.
        let money = Money::try_new(dec!(10.500)).unwrap();
        assert_eq!(money.amount(), dec!(10.5));
    }

    #[test]
    fn test_money_zero() {
        assert!(Money::ZERO.is_zero());
        assert!(!Money::ZERO.is_positive());
        assert!(Money::try_new(dec!(0.01)).unwrap().is_positive());
    }

    #[test]
    fn test_money_add() {
        let a = Money::try_new(dec!(100)).unwrap();
        let b = Money::try_new(dec!(50.25)).unwrap();
        assert_eq!(a.add(b).amount(), dec!(150.25));
    }

    #[test]
    fn test_money_saturating_sub() {
        let a = Money::try_new(dec!(100)).unwrap();
        let b = Money::try_new(dec!(150)).unwrap();
        assert_eq!(a.saturating_sub(b), Money::ZERO);
        assert_eq!(b.saturating_sub(a).amount(), dec!(50));
    }

    #[test]
    fn test_money_checked_sub() {
        let a = Money::try_new(dec!(100)).unwrap();
        let b = Money::try_new(dec!(150)).unwrap();
        assert_eq!(a.checked_sub(b), None);
        assert_eq!(b.checked_sub(a).unwrap().amount(), dec!(50));
    }

    #[test]
    fn test_money_min() {
        let a = Money::try_new(dec!(40)).unwrap();
        let b = Money::try_new(dec!(60)).unwrap();
        assert_eq!(a.min(b), a);
        assert_eq!(b.min(a), a);
    }

    #[test]
    fn test_money_sum() {
        let total: Money = [dec!(10), dec!(20.50), dec!(0.50)]
            .into_iter()
            .map(|d| Money::try_new(d).unwrap())
            .sum();
        assert_eq!(total.amount(), dec!(31));
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::try_new(dec!(10.5)).unwrap().to_string(), "10.50");
        assert_eq!(Money::ZERO.to_string(), "0.00");
    }

    #[test]
    fn test_money_ordering() {
        let a = Money::try_new(dec!(10)).unwrap();
        let b = Money::try_new(dec!(10.01)).unwrap();
        assert!(a < b);
    }
}
