use std::{fmt::Display, iter::Sum, ops::Add};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

//--------------------------------------    WattHours     ------------------------------------------------------------
/// An amount of electrical energy, stored as an integer number of watt-hours.
///
/// Smart meters and trade requests quote kilowatt-hours with fractional parts. Converting to integer watt-hours at the
/// boundary keeps settlement arithmetic exact.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct WattHours(i64);

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in watt-hours: {0}")]
pub struct EnergyConversionError(pub String);

impl From<i64> for WattHours {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Add for WattHours {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sum for WattHours {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl WattHours {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_kwh(kwh: i64) -> Self {
        Self(kwh * 1000)
    }

    /// Converts a fractional kilowatt-hour reading into watt-hours, rounding to the nearest watt-hour.
    pub fn try_from_kwh_f64(kwh: f64) -> Result<Self, EnergyConversionError> {
        if !kwh.is_finite() {
            return Err(EnergyConversionError(format!("{kwh} is not a finite energy amount")));
        }
        let wh = (kwh * 1000.0).round();
        if wh.abs() > i64::MAX as f64 {
            return Err(EnergyConversionError(format!("{kwh} kWh is too large")));
        }
        Ok(Self(wh as i64))
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl Display for WattHours {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kwh = self.0 as f64 / 1000.0;
        write!(f, "{kwh:0.3} kWh")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kwh_conversions() {
        assert_eq!(WattHours::from_kwh(2), WattHours::from(2000));
        assert_eq!(WattHours::try_from_kwh_f64(2.5).unwrap(), WattHours::from(2500));
        assert_eq!(WattHours::try_from_kwh_f64(0.1).unwrap(), WattHours::from(100));
        assert!(WattHours::try_from_kwh_f64(f64::INFINITY).is_err());
    }

    #[test]
    fn display_in_kwh() {
        assert_eq!(WattHours::from(2500).to_string(), "2.500 kWh");
    }
}
