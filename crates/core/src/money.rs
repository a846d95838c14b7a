//! Exact-decimal monetary amounts.
//!
//! Prices and discounts are never floating point. Amounts are held as
//! [`rust_decimal::Decimal`] normalized to two fraction digits, which is also the
//! persisted scale (`NUMERIC(12,2)`).

use core::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Number of fraction digits kept for every amount.
pub const MONEY_SCALE: u32 = 2;

/// A monetary amount with exact decimal semantics.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// Wrap a decimal, rounding half away from zero to exactly two fraction digits.
    pub fn new(amount: Decimal) -> Self {
        let mut amount = amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
        amount.rescale(MONEY_SCALE);
        Self(amount)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Largest amount a `NUMERIC(12,2)` column holds: `9999999999.99`.
    pub fn max_stored() -> Self {
        Self(Decimal::new(999_999_999_999, MONEY_SCALE))
    }

    /// `1999` → `19.99`.
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, MONEY_SCALE))
    }

    /// `19.99` → `1999`. Sub-cent remainders are truncated.
    pub fn to_cents(&self) -> i64 {
        (self.0 * Decimal::ONE_HUNDRED)
            .trunc()
            .to_i64()
            .unwrap_or(i64::MAX)
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Money {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim())
            .map(Self::new)
            .map_err(|e| DomainError::validation(format!("invalid amount '{s}': {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn cents_conversion_is_exact() {
        let m = Money::from_cents(1999);
        assert_eq!(m.to_string(), "19.99");
        assert_eq!(m.to_cents(), 1999);
    }

    #[test]
    fn new_rounds_to_two_places() {
        let m: Money = "10.005".parse().unwrap();
        assert_eq!(m.to_cents(), 1001);
        let m: Money = "10.004".parse().unwrap();
        assert_eq!(m.to_cents(), 1000);
    }

    #[test]
    fn sign_helpers() {
        assert!(Money::from_cents(1).is_positive());
        assert!(!Money::zero().is_positive());
        assert!(Money::from_cents(-1).is_negative());
        assert_eq!(Money::max_stored().to_string(), "9999999999.99");
    }

    #[test]
    fn serde_accepts_numbers_and_writes_two_digit_strings() {
        let m: Money = serde_json::from_str("24.5").unwrap();
        assert_eq!(serde_json::to_string(&m).unwrap(), "\"24.50\"");
        let m: Money = serde_json::from_str("\"3.999\"").unwrap();
        assert_eq!(m, Money::from_cents(400));
    }

    #[test]
    fn rejects_non_numeric_input() {
        assert!(matches!("ten".parse::<Money>(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn decimal_sums_do_not_drift() {
        let mut total = Money::zero().amount();
        for _ in 0..10 {
            total += Money::from_cents(10).amount();
        }
        assert_eq!(Money::new(total), Money::from_cents(100));
    }

    proptest! {
        #[test]
        fn cents_round_trip(cents in -1_000_000_000i64..1_000_000_000i64) {
            prop_assert_eq!(Money::from_cents(cents).to_cents(), cents);
        }
    }
}
