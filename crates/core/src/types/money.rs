//! Monetary values using decimal arithmetic.

use core::fmt;
use core::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::quantity::Quantity;

/// Errors that can occur when constructing a [`Money`] value.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// Not a decimal number.
    #[error("value must be a number")]
    Invalid,
    /// Below zero.
    #[error("value must be 0 or greater")]
    Negative,
    /// Does not fit in the cents column.
    #[error("value is too large")]
    Overflow,
}

/// A non-negative amount with two decimal places.
///
/// Stored in the database as integer cents. The currency is implied by the
/// deployment; the application never converts between currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create from a decimal, rounding to cents.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Negative`] for amounts below zero.
    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative);
        }
        Ok(Self(
            amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        ))
    }

    /// Parse user input such as `"12.5"` or `"0.10"`.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Invalid`] if the text is not a number and
    /// [`MoneyError::Negative`] below zero.
    pub fn parse(s: &str) -> Result<Self, MoneyError> {
        let amount = Decimal::from_str(s.trim()).map_err(|_| MoneyError::Invalid)?;
        Self::new(amount)
    }

    /// Create from a database cents value.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Negative`] for negative cents.
    pub fn from_cents(cents: i64) -> Result<Self, MoneyError> {
        Self::new(Decimal::new(cents, 2))
    }

    /// Amount in cents for database storage.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the amount exceeds `i64` cents.
    pub fn to_cents(self) -> Result<i64, MoneyError> {
        (self.0 * Decimal::ONE_HUNDRED)
            .to_i64()
            .ok_or(MoneyError::Overflow)
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(self) -> Decimal {
        self.0
    }

    /// Value of `quantity` units priced at `self` each.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the product does not fit a decimal.
    pub fn checked_times(self, quantity: Quantity) -> Result<Self, MoneyError> {
        self.0
            .checked_mul(Decimal::from(quantity.get()))
            .map(Self)
            .ok_or(MoneyError::Overflow)
    }

    /// Sum of two amounts.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the sum does not fit a decimal.
    pub fn checked_add(self, rhs: Self) -> Result<Self, MoneyError> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or(MoneyError::Overflow)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rounds_to_cents() {
        assert_eq!(Money::parse("0.105").unwrap().to_string(), "0.11");
        assert_eq!(Money::parse("12.5").unwrap().to_string(), "12.50");
    }

    #[test]
    fn test_parse_rejects_negative_and_garbage() {
        assert_eq!(Money::parse("-1"), Err(MoneyError::Negative));
        assert_eq!(Money::parse("abc"), Err(MoneyError::Invalid));
    }

    #[test]
    fn test_cents_conversion() {
        let money = Money::from_cents(1999).unwrap();
        assert_eq!(money.to_string(), "19.99");
        assert_eq!(money.to_cents().unwrap(), 1999);
        assert!(Money::from_cents(-1).is_err());
    }

    #[test]
    fn test_times_and_add() {
        let screws = Money::parse("0.10")
            .unwrap()
            .checked_times(Quantity::new(100).unwrap())
            .unwrap();
        let drill = Money::parse("49.99")
            .unwrap()
            .checked_times(Quantity::new(1).unwrap())
            .unwrap();
        assert_eq!(screws.checked_add(drill).unwrap().to_string(), "59.99");
    }

    #[test]
    fn test_large_totals_overflow_instead_of_panicking() {
        let max = Money::parse("92233720368547758.07").unwrap();
        assert!(max.to_cents().is_ok());

        let line = max.checked_times(Quantity::new(i64::from(u32::MAX)).unwrap()).unwrap();
        let total = core::iter::repeat_n(line, 300).try_fold(Money::ZERO, Money::checked_add);
        assert_eq!(total, Err(MoneyError::Overflow));
    }
}
