//! Item quantity.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// The value was below zero.
    #[error("quantity must be 0 or greater")]
    Negative,
    /// The value does not fit the storage column.
    #[error("quantity is too large")]
    TooLarge,
}

/// Number of units of an item in a box. Never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Quantity(u32);

impl Quantity {
    /// Quantity used when a form leaves the field blank.
    pub const DEFAULT: Self = Self(1);

    /// Create a quantity from a signed value.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError::Negative`] below zero and
    /// [`QuantityError::TooLarge`] above `u32::MAX`.
    pub fn new(value: i64) -> Result<Self, QuantityError> {
        if value < 0 {
            return Err(QuantityError::Negative);
        }
        u32::try_from(value)
            .map(Self)
            .map_err(|_| QuantityError::TooLarge)
    }

    /// Returns the quantity as an unsigned integer.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Returns the quantity as `i64` for database binding.
    #[must_use]
    pub fn as_i64(self) -> i64 {
        i64::from(self.0)
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for i64 {
    fn from(q: Quantity) -> Self {
        q.as_i64()
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_rejected() {
        assert_eq!(Quantity::new(-1), Err(QuantityError::Negative));
    }

    #[test]
    fn test_zero_allowed() {
        assert_eq!(Quantity::new(0).unwrap().get(), 0);
    }

    #[test]
    fn test_too_large() {
        assert_eq!(
            Quantity::new(i64::from(u32::MAX) + 1),
            Err(QuantityError::TooLarge)
        );
    }

    #[test]
    fn test_default_is_one() {
        assert_eq!(Quantity::default().get(), 1);
    }

    #[test]
    fn test_deserialize_rejects_negative() {
        let result: Result<Quantity, _> = serde_json::from_str("-5");
        assert!(result.is_err());
    }
}
