use serde::{Deserialize, Serialize};
use std::{fmt, iter::Sum, ops::Mul, str::FromStr};

use crate::error::PrintError;

/// Amount of money in minor units (hundredths)
///
/// Renders without a currency symbol, and without a fractional part for whole
/// amounts: `125` and `125.50`, never `125.00`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero
    pub const ZERO: Self = Self(0);

    /// From minor units (`12550` is `125.50`)
    #[must_use]
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// From whole major units (`125` is `125`), saturating at the `i64` range
    #[must_use]
    pub const fn from_major(major: i64) -> Self {
        Self(major.saturating_mul(100))
    }

    /// From a decimal amount, rounded to the nearest minor unit
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_decimal(amount: f64) -> Self {
        Self((amount * 100.0).round() as i64)
    }

    /// Minor units
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Whether the amount has no fractional part
    #[must_use]
    pub const fn is_whole(self) -> bool {
        self.0 % 100 == 0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let (major, minor) = (abs / 100, abs % 100);

        if minor == 0 {
            write!(f, "{sign}{major}")
        } else {
            write!(f, "{sign}{major}.{minor:02}")
        }
    }
}

impl FromStr for Money {
    type Err = PrintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PrintError::Config(format!("invalid money amount: {s:?}"));
        let trimmed = s.trim();
        let (negative, digits) = trimmed
            .strip_prefix('-')
            .map_or((false, trimmed), |rest| (true, rest));

        let (major, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        if major.is_empty() || fraction.len() > 2 {
            return Err(invalid());
        }
        if !major.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let major: i64 = major.parse().map_err(|_| invalid())?;
        let minor: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => fraction.parse().map_err(|_| invalid())?,
        };

        let value = major
            .checked_mul(100)
            .and_then(|v| v.checked_add(minor))
            .ok_or_else(invalid)?;
        Ok(Self(if negative { -value } else { value }))
    }
}

// Arithmetic saturates at the i64 range.
impl Mul<u32> for Money {
    type Output = Self;

    fn mul(self, rhs: u32) -> Self {
        Self(self.0.saturating_mul(i64::from(rhs)))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Self(iter.fold(0, |acc: i64, m| acc.saturating_add(m.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic_saturates() {
        assert_eq!(Money::from_major(i64::MAX), Money::from_minor(i64::MAX));
        assert_eq!(Money::from_major(i64::MIN), Money::from_minor(i64::MIN));
        assert_eq!(Money::from_minor(i64::MAX) * 2, Money::from_minor(i64::MAX));
        assert_eq!(Money::from_minor(i64::MIN) * 3, Money::from_minor(i64::MIN));

        let total: Money = [Money::from_minor(i64::MAX), Money::from_major(1)]
            .into_iter()
            .sum();
        assert_eq!(total, Money::from_minor(i64::MAX));
        assert_eq!(Money::from_minor(i64::MIN).to_string(), "-92233720368547758.08");
    }

    #[test]
    fn test_format_rules() {
        assert_eq!(Money::from_major(125).to_string(), "125");
        assert_eq!(Money::from_decimal(125.5).to_string(), "125.50");
        assert_eq!(Money::ZERO.to_string(), "0");
        assert_eq!(Money::from_minor(5).to_string(), "0.05");
        assert_eq!(Money::from_minor(-250).to_string(), "-2.50");
        assert_eq!(Money::from_minor(-300).to_string(), "-3");
    }

    #[test]
    fn test_reformat_is_idempotent() {
        for minor in [0, 1, 50, 99, 100, 12_550, 12_500, -75, 1_000_000] {
            let rendered = Money::from_minor(minor).to_string();
            let reparsed: Money = rendered.parse().unwrap();
            assert_eq!(reparsed.to_string(), rendered);
            assert_eq!(reparsed.minor(), minor);
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!("125".parse::<Money>().unwrap(), Money::from_major(125));
        assert_eq!("125.5".parse::<Money>().unwrap(), Money::from_minor(12_550));
        assert_eq!("-0.25".parse::<Money>().unwrap(), Money::from_minor(-25));
        assert!("".parse::<Money>().is_err());
        assert!("1.234".parse::<Money>().is_err());
        assert!("1,50".parse::<Money>().is_err());
        assert!(".5".parse::<Money>().is_err());
    }

    #[test]
    fn test_arithmetic() {
        let price = Money::from_major(25);
        assert_eq!(price * 2, Money::from_major(50));
        let total: Money = [price, Money::from_decimal(0.5)].into_iter().sum();
        assert_eq!(total.to_string(), "25.50");
        assert!(total > price);
        assert!(!total.is_whole());
    }
}
