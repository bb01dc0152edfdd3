//! Fixed-point prices using decimal arithmetic.
//!
//! Prices are stored as `NUMERIC(10,2)` and serialized as decimal strings
//! with two places (`"19.99"`, `"0.00"`) so no precision is lost between the
//! database, the API and the payment provider.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize, Serializer};

/// Errors produced when validating or converting a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The price is zero or negative.
    #[error("price must be greater than zero")]
    NotPositive,
    /// The price has more than two decimal places.
    #[error("price must have at most 2 decimal places")]
    TooPrecise,
    /// The value is not a decimal number.
    #[error("price must be a decimal number")]
    Invalid,
    /// The amount does not fit in the provider's minor-unit integer.
    #[error("amount is too large")]
    Overflow,
    /// The amount is wider than the column it is stored in.
    #[error("amount must be at most {max}")]
    TooLarge { max: Price },
}

/// A monetary amount in the shop currency's standard unit (dollars, not cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Zero amount, used as the total of an empty cart.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Largest listing price, bounded by `product.price NUMERIC(10, 2)`.
    // 9_999_999_999 cents, split into the low and middle 32-bit words
    pub const MAX_LISTING: Self = Self(Decimal::from_parts(1_410_065_407, 2, 0, false, 2));

    /// Largest order total, bounded by `"order".total_amount NUMERIC(12, 2)`.
    // 999_999_999_999 cents
    pub const MAX_ORDER_TOTAL: Self = Self(Decimal::from_parts(3_567_587_327, 232, 0, false, 2));

    /// Wrap a decimal amount without validation.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Build a price from a whole number of minor units (cents).
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// Validate a price a product can be listed with.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::NotPositive` for zero or negative amounts,
    /// `PriceError::TooPrecise` for more than two decimal places and
    /// `PriceError::TooLarge` above [`Price::MAX_LISTING`].
    pub fn listing(amount: Decimal) -> Result<Self, PriceError> {
        if amount <= Decimal::ZERO {
            return Err(PriceError::NotPositive);
        }
        if amount.normalize().scale() > 2 {
            return Err(PriceError::TooPrecise);
        }
        if amount > Self::MAX_LISTING.0 {
            return Err(PriceError::TooLarge {
                max: Self::MAX_LISTING,
            });
        }
        Ok(Self(amount))
    }

    /// Check that an order total fits the order ledger.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::TooLarge` above [`Price::MAX_ORDER_TOTAL`].
    pub fn order_total(self) -> Result<Self, PriceError> {
        if self > Self::MAX_ORDER_TOTAL {
            return Err(PriceError::TooLarge {
                max: Self::MAX_ORDER_TOTAL,
            });
        }
        Ok(self)
    }

    /// Parse and validate a listing price from user input.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Invalid` if the string is not a decimal, then
    /// applies the same rules as [`Price::listing`].
    pub fn parse_listing(s: &str) -> Result<Self, PriceError> {
        let amount = s.trim().parse::<Decimal>().map_err(|_| PriceError::Invalid)?;
        Self::listing(amount)
    }

    /// Multiply a unit price by a quantity.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }

    /// Convert to the integer minor units (cents) a payment provider expects.
    ///
    /// Rounds half away from zero to the nearest cent.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Overflow` if the amount does not fit in an `i64`.
    pub fn to_minor_units(self) -> Result<i64, PriceError> {
        let cents = (self.0 * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        i64::try_from(cents).map_err(|_| PriceError::Overflow)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Price {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Price {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(amount))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Price {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

/// ISO 4217 currency codes accepted by the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyCode {
    #[default]
    Usd,
    Eur,
    Gbp,
    Cad,
    Aud,
}

impl CurrencyCode {
    /// Lowercase code as sent to Stripe.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Usd => "usd",
            Self::Eur => "eur",
            Self::Gbp => "gbp",
            Self::Cad => "cad",
            Self::Aud => "aud",
        }
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "usd" => Ok(Self::Usd),
            "eur" => Ok(Self::Eur),
            "gbp" => Ok(Self::Gbp),
            "cad" => Ok(Self::Cad),
            "aud" => Ok(Self::Aud),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_listing_rejects_non_positive() {
        assert_eq!(Price::listing(Decimal::ZERO), Err(PriceError::NotPositive));
        assert_eq!(Price::listing(dec("-1.00")), Err(PriceError::NotPositive));
    }

    #[test]
    fn test_listing_rejects_sub_cent_precision() {
        assert_eq!(Price::listing(dec("1.005")), Err(PriceError::TooPrecise));
        // Trailing zeros are not extra precision
        assert!(Price::listing(dec("1.500")).is_ok());
    }

    #[test]
    fn test_listing_fits_numeric_10_2() {
        assert_eq!(Price::MAX_LISTING.to_string(), "99999999.99");
        assert!(Price::parse_listing("99999999.99").is_ok());
        assert_eq!(
            Price::parse_listing("1000000000.00"),
            Err(PriceError::TooLarge {
                max: Price::MAX_LISTING
            })
        );
    }

    #[test]
    fn test_order_total_fits_numeric_12_2() {
        assert_eq!(Price::MAX_ORDER_TOTAL.to_string(), "9999999999.99");
        assert!(Price::MAX_ORDER_TOTAL.order_total().is_ok());
        let over = Price::MAX_LISTING.times(101);
        assert!(matches!(over.order_total(), Err(PriceError::TooLarge { .. })));
    }

    #[test]
    fn test_parse_listing() {
        assert_eq!(Price::parse_listing(" 10.00 ").unwrap(), Price::from_cents(1000));
        assert_eq!(Price::parse_listing("ten"), Err(PriceError::Invalid));
    }

    #[test]
    fn test_times_and_sum() {
        let total: Price = [Price::from_cents(1000).times(2), Price::from_cents(250).times(3)]
            .into_iter()
            .sum();
        assert_eq!(total, Price::from_cents(2750));
    }

    #[test]
    fn test_sum_of_nothing_is_zero() {
        let total: Price = std::iter::empty().sum();
        assert_eq!(total, Price::ZERO);
    }

    #[test]
    fn test_to_minor_units_rounds_half_away_from_zero() {
        assert_eq!(Price::from_cents(2000).to_minor_units().unwrap(), 2000);
        assert_eq!(Price::new(dec("0.125")).to_minor_units().unwrap(), 13);
        assert_eq!(Price::new(dec("0.124")).to_minor_units().unwrap(), 12);
    }

    #[test]
    fn test_display_two_places() {
        assert_eq!(Price::new(dec("20")).to_string(), "20.00");
        assert_eq!(Price::from_cents(1999).to_string(), "19.99");
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&Price::from_cents(1050)).unwrap();
        assert_eq!(json, "\"10.50\"");
        assert_eq!(serde_json::to_string(&Price::ZERO).unwrap(), "\"0.00\"");
        assert_eq!(
            serde_json::from_str::<Price>("\"10.50\"").unwrap(),
            Price::from_cents(1050)
        );
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("USD".parse::<CurrencyCode>().unwrap(), CurrencyCode::Usd);
        assert_eq!(CurrencyCode::Gbp.as_str(), "gbp");
        assert!("xyz".parse::<CurrencyCode>().is_err());
    }
}
