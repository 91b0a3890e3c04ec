//! Monetary amounts.
//!
//! Amounts are exact decimals in the group's currency. Store rows may render
//! them as integers, floats (`numeric` columns) or strings; all three decode.
//! Addition is exact, so reordering or batching a sum never changes it.

use std::fmt;
use std::iter::Sum;
use std::ops::Neg;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize, Serializer};
use utoipa::ToSchema;

/// Signed amount in currency units.
///
/// Serialises as a JSON integer when whole and as a JSON float otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = f64, example = 50)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Amount of `units` whole currency units.
    #[must_use]
    pub fn new(units: i64) -> Self {
        Self(Decimal::from(units))
    }

    #[must_use]
    pub const fn from_decimal(value: Decimal) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn as_decimal(self) -> Decimal {
        self.0
    }

    #[must_use]
    pub fn is_positive(self) -> bool {
        self.0 > Decimal::ZERO
    }

    #[must_use]
    pub fn is_negative(self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Saturating addition used for running totals stored on profiles.
    #[must_use]
    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let value = self.0.normalize();
        if value.scale() == 0 {
            if let Some(units) = value.to_i64() {
                return serializer.serialize_i64(units);
            }
        }
        match value.to_f64() {
            Some(float) => serializer.serialize_f64(float),
            None => serializer.collect_str(&value),
        }
    }
}

impl FromStr for Amount {
    type Err = rust_decimal::Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(text).map(Self)
    }
}

impl Neg for Amount {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Self::saturating_add)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.normalize().fmt(f)
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

/// Direction of an administrative balance adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    Add,
    Deduct,
}

impl AdjustmentKind {
    /// Apply the direction to a non-negative magnitude.
    #[must_use]
    pub fn signed(self, magnitude: Amount) -> Amount {
        match self {
            Self::Add => magnitude,
            Self::Deduct => -magnitude,
        }
    }

    /// Direction implied by a signed amount; zero counts as `Add`.
    #[must_use]
    pub fn of(amount: Amount) -> Self {
        if amount.is_negative() { Self::Deduct } else { Self::Add }
    }
}
