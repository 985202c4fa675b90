use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

//--------------------------------------       Money         ---------------------------------------------------------
/// An amount of Nepalese rupees, stored as an integer number of paisa (1/100 rupee).
///
/// Amounts are never held as floating point values inside the engine. Floats only appear at the edges, when a client
/// declares a total, or when a gateway echoes an amount back as a decimal string.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Money(i64);

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as an amount of money: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Money {}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Rs. {}", self.to_decimal_string())
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub const fn from_paisa(paisa: i64) -> Self {
        Self(paisa)
    }

    pub fn from_rupees(rupees: i64) -> Self {
        Self(rupees * 100)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Converts a decimal rupee amount (as sent by browsers and payment gateways) into paisa, rounding to the nearest
    /// paisa.
    pub fn from_decimal(rupees: f64) -> Result<Self, MoneyConversionError> {
        if !rupees.is_finite() {
            return Err(MoneyConversionError(format!("{rupees} is not a finite number")));
        }
        let paisa = (rupees * 100.0).round();
        if paisa.abs() > i64::MAX as f64 {
            return Err(MoneyConversionError(format!("{rupees} is out of range")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(paisa as i64))
    }

    /// Parses a decimal string such as `"250.00"`, `"250"` or `"1,250.0"`.
    pub fn parse_decimal(s: &str) -> Result<Self, MoneyConversionError> {
        let value = s.trim().replace(',', "").parse::<f64>().map_err(|e| MoneyConversionError(format!("{s}: {e}")))?;
        Self::from_decimal(value)
    }

    /// The amount in rupees with exactly two decimal places, e.g. `250.00`. This is the representation used in signed
    /// gateway messages, so it must be stable.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        format!("{sign}{}.{:02}", abs / 100, abs % 100)
    }

    /// The distance between this amount and a declared decimal amount, measured in paisa.
    pub fn drift_from(&self, declared_rupees: f64) -> f64 {
        (declared_rupees * 100.0 - self.0 as f64).abs()
    }
}
