use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::{op, WattHours};

//--------------------------------------      Cents       ------------------------------------------------------------
/// An amount of Kenyan Shillings, stored as an integer number of cents.
///
/// All settlement arithmetic happens in minor currency units so that repeated trades never accumulate floating-point
/// drift.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Cents(i64);

op!(binary Cents, Add, add);
op!(binary Cents, Sub, sub);
op!(inplace Cents, SubAssign, sub_assign);
op!(unary Cents, Neg, neg);

impl Mul<i64> for Cents {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in cents: {0}")]
pub struct CentsConversionError(pub String);

impl From<i64> for Cents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Cents {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Cents {}

impl TryFrom<f64> for Cents {
    type Error = CentsConversionError;

    /// Converts an amount of shillings (e.g. "12.50" from an API payload) into cents, rounding to the nearest cent.
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(CentsConversionError(format!("{value} is not a finite amount")));
        }
        let cents = (value * 100.0).round();
        if cents.abs() > i64::MAX as f64 {
            return Err(CentsConversionError(format!("{value} is too large to convert to cents")));
        }
        Ok(Self(cents as i64))
    }
}

impl Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KSh {}.{:02}", self.0 / 100, (self.0 % 100).abs())
    }
}

impl Cents {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_shillings(shillings: i64) -> Self {
        Self(shillings * 100)
    }

    /// The settlement total for an energy trade. `unit_price` is the price of one kilowatt-hour.
    ///
    /// Computed entirely in integer units (`Wh * cents_per_kWh / 1000`). Sub-cent remainders are truncated. A total
    /// that does not fit in an `i64` of cents is an error, never a silent wrap.
    pub fn for_energy(energy: WattHours, unit_price: Cents) -> Result<Self, CentsConversionError> {
        energy
            .value()
            .checked_mul(unit_price.value())
            .map(|total| Self(total / 1000))
            .ok_or_else(|| CentsConversionError(format!("{energy} at {unit_price}/kWh overflows the settlement total")))
    }

    /// Rounds up to the next whole shilling. M-Pesa only collects whole-shilling amounts, and the payer must never be
    /// prompted for less than the trade total.
    pub fn round_up_to_shilling(&self) -> Result<Self, CentsConversionError> {
        self.0
            .checked_add(99)
            .map(|cents| Self(cents / 100 * 100))
            .ok_or_else(|| CentsConversionError(format!("{self} cannot be rounded up to a whole shilling")))
    }

    /// The number of whole shillings in this amount. Only meaningful after [`Cents::round_up_to_shilling`].
    pub fn whole_shillings(&self) -> i64 {
        self.0 / 100
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn settlement_total_is_exact() {
        // 2.5 kWh at 12.00 KES/kWh
        let total = Cents::for_energy(WattHours::from(2500), Cents::from(1200)).unwrap();
        assert_eq!(total, Cents::from(3000));
        assert_eq!(total.to_string(), "KSh 30.00");
    }

    #[test]
    fn no_floating_drift_for_small_amounts() {
        // 0.1 kWh at 3.00 KES/kWh must be exactly 30 cents
        let total = Cents::for_energy(WattHours::from(100), Cents::from(300)).unwrap();
        assert_eq!(total, Cents::from(30));
        assert_eq!(total.to_string(), "KSh 0.30");
    }

    #[test]
    fn round_up_to_whole_shillings() {
        assert_eq!(Cents::from(3000).round_up_to_shilling().unwrap(), Cents::from(3000));
        assert_eq!(Cents::from(3001).round_up_to_shilling().unwrap(), Cents::from(3100));
        assert_eq!(Cents::from(30).round_up_to_shilling().unwrap(), Cents::from(100));
        assert_eq!(Cents::from(3100).whole_shillings(), 31);
    }

    #[test]
    fn overflowing_totals_are_errors_not_wraps() {
        // A couple of petawatt-hours at KSh 120/kWh does not fit in an i64 of cents.
        let energy = WattHours::try_from_kwh_f64(2.0e15).unwrap();
        assert!(Cents::for_energy(energy, Cents::from(12_000)).is_err());
        assert!(Cents::from(i64::MAX).round_up_to_shilling().is_err());
    }

    #[test]
    fn from_f64_shillings() {
        assert_eq!(Cents::try_from(12.0).unwrap(), Cents::from(1200));
        assert_eq!(Cents::try_from(0.12).unwrap(), Cents::from(12));
        assert!(Cents::try_from(f64::NAN).is_err());
    }

    #[test]
    fn arithmetic_ops() {
        let a = Cents::from(150);
        let b = Cents::from(50);
        assert_eq!(a + b, Cents::from(200));
        assert_eq!(a - b, Cents::from(100));
        assert_eq!(-a, Cents::from(-150));
        assert_eq!(a * 3, Cents::from(450));
    }
}
