//! Currency amounts.
//!
//! Amounts are held as integer micro-dollars so that estimates are exact and
//! repeatable. They serialize as a decimal USD number.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

const MICROS_PER_USD: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_micros(micros: i64) -> Self {
        Money(micros)
    }

    pub fn from_usd(usd: f64) -> Self {
        Money((usd * MICROS_PER_USD).round() as i64)
    }

    pub const fn micros(self) -> i64 {
        self.0
    }

    pub fn as_usd(self) -> f64 {
        self.0 as f64 / MICROS_PER_USD
    }

    /// Multiply by a non-negative factor, rounding to the nearest micro-dollar.
    /// `None` when the product is not representable.
    pub fn checked_scale(self, factor: f64) -> Option<Self> {
        let scaled = (self.0 as f64 * factor).round();
        // i64::MAX as f64 rounds up to 2^63, which itself does not fit
        (scaled.is_finite() && scaled.abs() < i64::MAX as f64).then(|| Money(scaled as i64))
    }

    pub fn checked_add(self, rhs: Money) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Money)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

/// Saturates at the representable bounds.
impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.4}", self.as_usd())
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_usd())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let usd = f64::deserialize(deserializer)?;
        Ok(Money::from_usd(usd))
    }
}
