//! Positive item quantity.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors produced when parsing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// Zero or negative quantity.
    #[error("quantity must be a positive integer")]
    NotPositive,
    /// Not an integer (fractional, non-numeric, or wrong JSON type).
    #[error("quantity must be an integer")]
    NotAnInteger,
    /// Larger than the database column can hold.
    #[error("quantity is too large")]
    TooLarge,
}

/// A strictly positive number of units of one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// Largest quantity accepted, bounded by the `INTEGER` column type.
    #[allow(clippy::cast_sign_loss)]
    pub const MAX: u32 = i32::MAX as u32;

    /// One unit.
    pub const ONE: Self = Self(1);

    /// Create a quantity.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::NotPositive` for zero and
    /// `QuantityError::TooLarge` above [`Quantity::MAX`].
    pub const fn new(value: u32) -> Result<Self, QuantityError> {
        if value == 0 {
            return Err(QuantityError::NotPositive);
        }
        if value > Self::MAX {
            return Err(QuantityError::TooLarge);
        }
        Ok(Self(value))
    }

    /// Parse a quantity from a signed integer (e.g. a database column).
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::NotPositive` for values below one.
    pub fn from_i64(value: i64) -> Result<Self, QuantityError> {
        if value <= 0 {
            return Err(QuantityError::NotPositive);
        }
        u32::try_from(value)
            .map_err(|_| QuantityError::TooLarge)
            .and_then(Self::new)
    }

    /// Parse a quantity from untrusted JSON.
    ///
    /// Accepts integer numbers and strings holding an integer (`2`, `"2"`).
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::NotAnInteger` for fractional numbers,
    /// non-numeric strings and other JSON types, and
    /// `QuantityError::NotPositive` for zero or negative values.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, QuantityError> {
        match value {
            serde_json::Value::Number(n) => n
                .as_i64()
                .ok_or(QuantityError::NotAnInteger)
                .and_then(Self::from_i64),
            serde_json::Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| QuantityError::NotAnInteger)
                .and_then(Self::from_i64),
            _ => Err(QuantityError::NotAnInteger),
        }
    }

    /// Get the underlying count.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Value for an `INTEGER` column.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn as_i32(&self) -> i32 {
        // Bounded by MAX at construction
        self.0 as i32
    }

    /// Add two quantities, failing if the sum exceeds [`Quantity::MAX`].
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::TooLarge` on overflow.
    pub fn checked_add(self, other: Self) -> Result<Self, QuantityError> {
        self.0
            .checked_add(other.0)
            .ok_or(QuantityError::TooLarge)
            .and_then(Self::new)
    }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
