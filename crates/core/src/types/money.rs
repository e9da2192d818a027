//! Decimal money amounts.
//!
//! The marketplace settles in a single currency, so an amount is just a
//! [`Decimal`]. Amounts serialize as strings to keep full precision on the
//! wire.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A non-currency-tagged monetary amount (bid, reserve, price at purchase).
///
/// ```
/// use bid_gallery_core::Money;
/// use rust_decimal::Decimal;
///
/// let bid = Money::new(Decimal::new(-25, 0)).clamp_non_negative();
/// assert_eq!(bid, Money::ZERO);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Decimal places a stored amount may carry.
    pub const MAX_SCALE: u32 = 2;

    /// Digits a stored amount may carry before the decimal point.
    pub const MAX_INTEGER_DIGITS: u32 = 10;

    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    #[must_use]
    pub const fn amount(self) -> Decimal {
        self.0
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Negative amounts become zero; everything else is unchanged.
    #[must_use]
    pub const fn clamp_non_negative(self) -> Self {
        if self.is_negative() { Self::ZERO } else { self }
    }

    /// Whether the amount fits a `NUMERIC(12, 2)` column exactly.
    ///
    /// Trailing zeros do not count towards the scale, so `1.500` fits.
    #[must_use]
    pub fn is_storable(self) -> bool {
        let limit = Decimal::from(10_u64.pow(Self::MAX_INTEGER_DIGITS));
        self.0.normalize().scale() <= Self::MAX_SCALE && self.0.abs() < limit
    }

    /// Adds two amounts, returning `None` on overflow.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Money {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Money {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        Ok(Self(<Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Money {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_non_negative() {
        assert_eq!(Money::new(Decimal::new(-1, 2)).clamp_non_negative(), Money::ZERO);
        assert_eq!(
            Money::new(Decimal::new(600, 0)).clamp_non_negative(),
            Money::new(Decimal::new(600, 0))
        );
        assert_eq!(Money::ZERO.clamp_non_negative(), Money::ZERO);
    }

    #[test]
    fn test_ordering_compares_amounts() {
        let reserve = Money::new(Decimal::new(500, 0));
        assert!(Money::new(Decimal::new(50000, 2)) >= reserve);
        assert!(Money::new(Decimal::new(49999, 2)) < reserve);
    }

    #[test]
    fn test_is_storable_bounds_scale_and_magnitude() {
        assert!(Money::new(Decimal::new(60050, 2)).is_storable());
        assert!(Money::new(Decimal::new(1500, 3)).is_storable());
        assert!(Money::new(Decimal::new(999_999_999_999, 2)).is_storable());
        assert!(Money::ZERO.is_storable());

        assert!(!Money::new(Decimal::new(1005, 3)).is_storable());
        assert!(!Money::new(Decimal::new(10_000_000_000, 0)).is_storable());
        assert!(!Money::new(Decimal::new(-10_000_000_000, 0)).is_storable());
        assert!(!Money::new("123456789012345.6789".parse().unwrap()).is_storable());
    }

    #[test]
    fn test_serializes_as_string() {
        let money = Money::new(Decimal::new(60050, 2));
        assert_eq!(serde_json::to_string(&money).unwrap(), "\"600.50\"");
    }
}
